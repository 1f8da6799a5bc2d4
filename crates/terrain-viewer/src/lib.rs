//! Season-reactive terrain viewer library.
//!
//! Turns grayscale heightmaps into a 3D terrain, draws it in one of six
//! render modes tinted by the current season, and rains particles over it in
//! autumn and winter. Each window is a [`app::TerrainClient`] ticking at its
//! own refresh rate; seasons arrive over TCP from `season_server`.

pub mod app;
pub mod camera;
pub mod clock;
pub mod config;
pub mod draw;
pub mod heightmap;
pub mod input;
pub mod net;
pub mod particles;
pub mod renderer;
pub mod terrain;
