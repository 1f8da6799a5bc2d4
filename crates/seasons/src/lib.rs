//! Seasons: the shared vocabulary of the season broadcast.
//!
//! The wire format is deliberately primitive and kept byte-compatible with the
//! existing deployments:
//!
//!   - plain TCP, default port 9999, no handshake beyond connect;
//!   - server -> client only;
//!   - each message is the raw ASCII name of a season, with no length prefix,
//!     delimiter, checksum or version field.
//!
//! Wire names:
//!
//!   PRINTEMPS  spring
//!   ETE        summer
//!   AUTOMNE    autumn
//!   HIVER      winter
//!
//! `NONE` is the display name of the "no season received yet" state. It is
//! accepted by the decoder but never produced by the server.

use std::fmt;

/// Default TCP port of the season broadcast.
pub const DEFAULT_PORT: u16 = 9999;

/// Number of seasons in the broadcast rotation.
pub const ROTATION_LEN: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Season {
    #[default]
    None,
    Spring,
    Summer,
    Autumn,
    Winter,
}

/// Wire names in rotation order; index `i` is `Season::from_rotation_index(i)`.
const WIRE_NAMES: [(&str, Season); ROTATION_LEN] = [
    ("PRINTEMPS", Season::Spring),
    ("ETE", Season::Summer),
    ("AUTOMNE", Season::Autumn),
    ("HIVER", Season::Winter),
];

const NONE_NAME: &str = "NONE";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WireError {
    #[error("empty season payload")]
    Empty,
    #[error("season payload is not valid UTF-8")]
    NotUtf8,
    #[error("unknown season payload {0:?}")]
    UnknownSeason(String),
}

impl Season {
    /// Maps a rotation index (taken mod 4) onto the broadcast order
    /// spring, summer, autumn, winter.
    #[inline]
    pub fn from_rotation_index(index: usize) -> Self {
        WIRE_NAMES[index % ROTATION_LEN].1
    }

    /// The literal text used on the wire (and in window titles).
    pub fn wire_name(self) -> &'static str {
        match self {
            Season::None => NONE_NAME,
            Season::Spring => "PRINTEMPS",
            Season::Summer => "ETE",
            Season::Autumn => "AUTOMNE",
            Season::Winter => "HIVER",
        }
    }

    /// True for the seasons that drive the falling-particle effect.
    #[inline]
    pub fn has_precipitation(self) -> bool {
        matches!(self, Season::Autumn | Season::Winter)
    }
}

impl fmt::Display for Season {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.wire_name())
    }
}

impl std::str::FromStr for Season {
    type Err = WireError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() {
            return Err(WireError::Empty);
        }
        if s == NONE_NAME {
            return Ok(Season::None);
        }
        WIRE_NAMES
            .iter()
            .find(|(name, _)| *name == s)
            .map(|(_, season)| *season)
            .ok_or_else(|| WireError::UnknownSeason(s.to_owned()))
    }
}

/// Bytes to write for one broadcast message.
#[inline]
pub fn encode(season: Season) -> &'static [u8] {
    season.wire_name().as_bytes()
}

/// Decodes the payload of one inbound read as a season.
///
/// One read is expected to carry exactly one name. If the transport coalesced
/// several messages into one read the payload is an exact concatenation of
/// wire names, and the last one wins. Fragments are rejected.
pub fn decode_payload(payload: &[u8]) -> Result<Season, WireError> {
    if payload.is_empty() {
        return Err(WireError::Empty);
    }
    let text = std::str::from_utf8(payload).map_err(|_| WireError::NotUtf8)?;

    if let Ok(season) = text.parse() {
        return Ok(season);
    }

    split_coalesced(text).ok_or_else(|| WireError::UnknownSeason(text.to_owned()))
}

/// Greedy split of a concatenation of wire names; returns the last one.
/// No wire name is a prefix of another, so the greedy split is unique.
fn split_coalesced(mut rest: &str) -> Option<Season> {
    let mut last = None;
    while !rest.is_empty() {
        let (name, season) = WIRE_NAMES
            .iter()
            .find(|(name, _)| rest.starts_with(name))?;
        last = Some(*season);
        rest = &rest[name.len()..];
    }
    last
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case(0, Season::Spring)]
    #[test_case(1, Season::Summer)]
    #[test_case(2, Season::Autumn)]
    #[test_case(3, Season::Winter)]
    #[test_case(4, Season::Spring)]
    #[test_case(7, Season::Winter)]
    fn rotation_index_wraps(index: usize, expected: Season) {
        assert_eq!(Season::from_rotation_index(index), expected);
    }

    #[test_case(b"PRINTEMPS", Season::Spring)]
    #[test_case(b"ETE", Season::Summer)]
    #[test_case(b"AUTOMNE", Season::Autumn)]
    #[test_case(b"HIVER", Season::Winter)]
    #[test_case(b"NONE", Season::None)]
    fn decodes_literal_names(payload: &[u8], expected: Season) {
        assert_eq!(decode_payload(payload), Ok(expected));
    }

    #[test]
    fn encode_matches_wire_literals() {
        assert_eq!(encode(Season::Spring), b"PRINTEMPS");
        assert_eq!(encode(Season::Summer), b"ETE");
        assert_eq!(encode(Season::Autumn), b"AUTOMNE");
        assert_eq!(encode(Season::Winter), b"HIVER");
    }

    #[test]
    fn coalesced_payload_takes_last_name() {
        assert_eq!(decode_payload(b"ETEAUTOMNE"), Ok(Season::Autumn));
        assert_eq!(decode_payload(b"HIVERPRINTEMPSETE"), Ok(Season::Summer));
    }

    #[test]
    fn fragments_and_garbage_are_rejected() {
        assert_eq!(
            decode_payload(b"AUTO"),
            Err(WireError::UnknownSeason("AUTO".into()))
        );
        assert_eq!(
            decode_payload(b"ETEAUTO"),
            Err(WireError::UnknownSeason("ETEAUTO".into()))
        );
        assert_eq!(decode_payload(b"ete"), Err(WireError::UnknownSeason("ete".into())));
        assert_eq!(decode_payload(b""), Err(WireError::Empty));
        assert_eq!(decode_payload(&[0xff, 0xfe]), Err(WireError::NotUtf8));
    }

    #[test]
    fn only_autumn_and_winter_precipitate() {
        assert!(!Season::None.has_precipitation());
        assert!(!Season::Spring.has_precipitation());
        assert!(!Season::Summer.has_precipitation());
        assert!(Season::Autumn.has_precipitation());
        assert!(Season::Winter.has_precipitation());
    }
}
