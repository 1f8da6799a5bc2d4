use axum::{http::StatusCode, response::IntoResponse, routing::get, Router};
use prometheus::{Encoder, IntCounter, IntGauge, Registry, TextEncoder};

/// Prometheus collectors for the season broadcast.
///
/// Shared behind an `Arc` between the broadcast loop and the `/metrics`
/// endpoint.
pub struct Metrics {
    pub registry: Registry,
    /// Connections accepted at the transport level, tracked or not.
    pub connections_accepted_total: IntCounter,
    /// Connections holding a broadcast slot.
    pub clients_tracked: IntGauge,
    /// Connections accepted after every slot was taken.
    pub overflow_connections: IntGauge,
    pub broadcast_cycles_total: IntCounter,
    pub messages_sent_total: IntCounter,
    pub write_timeouts_total: IntCounter,
    pub write_errors_total: IntCounter,
}

impl Metrics {
    pub fn new() -> prometheus::Result<Self> {
        let registry = Registry::new_custom(Some("season_server".into()), None)?;

        macro_rules! reg {
            ($metric:expr) => {{
                let collector = $metric?;
                registry.register(Box::new(collector.clone()))?;
                collector
            }};
        }

        Ok(Self {
            connections_accepted_total: reg!(IntCounter::new(
                "connections_accepted_total",
                "Total number of accepted client connections"
            )),
            clients_tracked: reg!(IntGauge::new(
                "clients_tracked",
                "Number of connections receiving broadcasts"
            )),
            overflow_connections: reg!(IntGauge::new(
                "overflow_connections",
                "Number of connections accepted past the slot limit"
            )),
            broadcast_cycles_total: reg!(IntCounter::new(
                "broadcast_cycles_total",
                "Total number of broadcast timer firings"
            )),
            messages_sent_total: reg!(IntCounter::new(
                "messages_sent_total",
                "Total number of season messages flushed to clients"
            )),
            write_timeouts_total: reg!(IntCounter::new(
                "write_timeouts_total",
                "Total number of season writes abandoned after the write timeout"
            )),
            write_errors_total: reg!(IntCounter::new(
                "write_errors_total",
                "Total number of season writes that failed with an I/O error"
            )),
            registry,
        })
    }

    /// Serves the registry as text on `/metrics`.
    pub fn router(&self) -> Router {
        let registry = self.registry.clone();
        Router::new().route(
            "/metrics",
            get(move || {
                let registry = registry.clone();
                async move {
                    match encode_text(&registry) {
                        Ok(text) => text.into_response(),
                        Err(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response(),
                    }
                }
            }),
        )
    }

    pub fn render(&self) -> prometheus::Result<String> {
        encode_text(&self.registry)
    }
}

fn encode_text(registry: &Registry) -> prometheus::Result<String> {
    let mut buffer = Vec::new();
    TextEncoder::new().encode(&registry.gather(), &mut buffer)?;
    Ok(String::from_utf8_lossy(&buffer).into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collectors_are_registered_with_prefix() {
        let metrics = Metrics::new().unwrap();
        metrics.messages_sent_total.inc_by(3);
        metrics.clients_tracked.set(2);

        let text = metrics.render().unwrap();
        assert!(text.contains("season_server_messages_sent_total 3"));
        assert!(text.contains("season_server_clients_tracked 2"));
        assert!(text.contains("season_server_write_timeouts_total 0"));
    }
}
