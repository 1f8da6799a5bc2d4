//! Season-driven precipitation: a fixed pool of points falling onto the
//! terrain, respawned above a random sample once they sink below it.

use crate::draw::{DrawSink, Primitive, Rgb};
use crate::heightmap::Mesh;
use glam::Vec3;
use rand::{rngs::StdRng, Rng, SeedableRng};
use seasons::Season;
use std::ops::Range;

pub const MAX_PARTICLES: usize = 1000;

/// Spawn height range.
pub const SPAWN_Z: Range<f32> = 0.3..0.8;
/// Per-tick fall distance range.
pub const FALLING_SPEED: Range<f32> = 0.001..0.011;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Particle {
    pub position: Vec3,
    /// Terrain elevation under the spawn column.
    pub min_z: f32,
    pub falling_speed: f32,
}

impl Particle {
    /// Picks a random sample of `mesh` and places a particle above it.
    pub fn spawn(mesh: &Mesh, rng: &mut impl Rng) -> Self {
        let i = rng.gen_range(0..mesh.width());
        let j = rng.gen_range(0..mesh.height());
        let ground = mesh.sample(i, j);

        Self {
            position: Vec3::new(ground.x, ground.y, rng.gen_range(SPAWN_Z)),
            min_z: ground.z,
            falling_speed: rng.gen_range(FALLING_SPEED),
        }
    }

    #[inline]
    fn landed(&self) -> bool {
        self.position.z < self.min_z
    }
}

/// Point color while precipitation is active.
pub fn particle_tint(season: Season) -> Option<Rgb> {
    match season {
        Season::Autumn => Some(Rgb::BLUE),
        Season::Winter => Some(Rgb::WHITE),
        _ => None,
    }
}

pub struct ParticlePool {
    particles: Vec<Particle>,
    rng: StdRng,
}

impl ParticlePool {
    /// Fills the pool with `MAX_PARTICLES` fresh particles.
    pub fn create(mesh: &Mesh) -> Self {
        Self::with_rng(mesh, StdRng::from_entropy())
    }

    pub fn with_seed(mesh: &Mesh, seed: u64) -> Self {
        Self::with_rng(mesh, StdRng::seed_from_u64(seed))
    }

    fn with_rng(mesh: &Mesh, mut rng: StdRng) -> Self {
        let particles = (0..MAX_PARTICLES)
            .map(|_| Particle::spawn(mesh, &mut rng))
            .collect();
        Self { particles, rng }
    }

    #[inline]
    pub fn particles(&self) -> &[Particle] {
        &self.particles
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.particles.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.particles.is_empty()
    }

    /// Draws and advances every particle while the season precipitates.
    /// Other seasons leave the pool untouched.
    ///
    /// A particle is drawn at its current height, then falls; once below its
    /// floor its slot is respawned over a random sample of `mesh`.
    pub fn tick(&mut self, season: Season, mesh: &Mesh, sink: &mut impl DrawSink) {
        let Some(tint) = particle_tint(season) else {
            return;
        };

        sink.color(tint);
        sink.begin(Primitive::Points);
        for slot in self.particles.iter_mut() {
            sink.vertex(slot.position);

            slot.position.z -= slot.falling_speed;
            if slot.landed() {
                *slot = Particle::spawn(mesh, &mut self.rng);
            }
        }
        sink.end();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::draw::{DrawCall, DrawList};
    use crate::heightmap::RawPixels;
    use approx::assert_relative_eq;

    fn flat_mesh(red: u8) -> Mesh {
        Mesh::load(&RawPixels::from_fn(8, 6, |_, _| red)).unwrap()
    }

    #[test]
    fn create_fills_every_slot_within_ranges() {
        let mesh = Mesh::load(&RawPixels::from_fn(16, 16, |x, y| (x * y) as u8)).unwrap();
        let pool = ParticlePool::with_seed(&mesh, 7);
        assert_eq!(pool.len(), MAX_PARTICLES);

        let bounds = mesh.bounds();
        for p in pool.particles() {
            assert!(SPAWN_Z.contains(&p.position.z));
            assert!(FALLING_SPEED.contains(&p.falling_speed));
            assert!(p.position.x >= bounds.min_x && p.position.x <= bounds.max_x);
            assert!(p.position.y >= bounds.min_y && p.position.y <= bounds.max_y);
            assert!(p.position.z >= p.min_z);
            assert!(mesh.samples().iter().any(|s| s.x == p.position.x
                && s.y == p.position.y
                && s.z == p.min_z));
        }
    }

    #[test]
    fn inactive_seasons_freeze_the_pool() {
        let mesh = flat_mesh(50);
        let mut pool = ParticlePool::with_seed(&mesh, 1);
        let before = pool.particles().to_vec();

        for season in [Season::None, Season::Spring, Season::Summer] {
            let mut list = DrawList::new();
            pool.tick(season, &mesh, &mut list);
            assert!(list.is_empty());
        }
        assert_eq!(pool.particles(), before.as_slice());
    }

    #[test]
    fn active_seasons_draw_then_fall() {
        let mesh = flat_mesh(50);
        let mut pool = ParticlePool::with_seed(&mesh, 2);
        let before = pool.particles().to_vec();

        let mut list = DrawList::new();
        pool.tick(Season::Winter, &mesh, &mut list);

        assert_eq!(list.calls()[0], DrawCall::Color(Rgb::WHITE));
        assert_eq!(list.vertex_count(Primitive::Points), MAX_PARTICLES);
        // Drawn at the pre-fall position.
        assert_eq!(list.calls()[2], DrawCall::Vertex(before[0].position));
        for (old, new) in before.iter().zip(pool.particles()) {
            if new.falling_speed == old.falling_speed && new.min_z == old.min_z {
                assert_relative_eq!(new.position.z, old.position.z - old.falling_speed);
            }
        }

        let mut list = DrawList::new();
        pool.tick(Season::Autumn, &mesh, &mut list);
        assert_eq!(list.calls()[0], DrawCall::Color(Rgb::BLUE));
    }

    #[test]
    fn particle_respawns_after_expected_ticks() {
        let mesh = flat_mesh(100);
        let mut pool = ParticlePool::with_seed(&mesh, 3);
        let (z0, min_z, speed) = (0.5_f32, 0.1_f32, 0.03_f32);
        pool.particles[0] = Particle {
            position: Vec3::new(0.0, 0.0, z0),
            min_z,
            falling_speed: speed,
        };
        // ceil((0.5 - 0.1) / 0.03) = 14
        let expected = ((z0 - min_z) / speed).ceil() as usize;
        assert_eq!(expected, 14);

        let mut sink = DrawList::new();
        for _ in 0..expected - 1 {
            pool.tick(Season::Winter, &mesh, &mut sink);
            assert_relative_eq!(pool.particles[0].falling_speed, speed);
        }
        pool.tick(Season::Winter, &mesh, &mut sink);

        let respawned = pool.particles[0];
        assert!(FALLING_SPEED.contains(&respawned.falling_speed));
        assert!(SPAWN_Z.contains(&respawned.position.z));
        assert!(respawned.position.z >= respawned.min_z);
    }

    #[test]
    fn tints_match_precipitating_seasons() {
        assert_eq!(particle_tint(Season::Autumn), Some(Rgb::BLUE));
        assert_eq!(particle_tint(Season::Winter), Some(Rgb::WHITE));
        assert_eq!(particle_tint(Season::Summer), None);
    }
}
