//! Season broadcast server for the terrain viewers.
//!
//! Pushes one of `PRINTEMPS`, `ETE`, `AUTOMNE`, `HIVER` to each tracked client
//! per cycle, offset by the client's slot so the windows show different
//! seasons at the same time.

pub mod config;
pub mod metrics;
pub mod rotation;
pub mod server;
pub mod slots;
