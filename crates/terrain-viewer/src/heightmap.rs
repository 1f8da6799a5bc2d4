//! Terrain mesh construction from a decoded grayscale elevation image.
//!
//! Every pixel becomes one vertex. Column `i` and row `j` map to a model-space
//! position centred on the origin, and the red channel scales to elevation:
//!
//! ```text
//! x = i / W - (W / 2) / W
//! y = j / H - (H / 2) / H
//! z = 0.001 * red
//! ```

use glam::Vec3;
use std::path::{Path, PathBuf};

/// Elevation per unit of red channel.
pub const ELEVATION_SCALE: f32 = 0.001;

/// Read access to a decoded image. File formats are the loader's concern.
pub trait PixelSource {
    fn width(&self) -> u32;
    fn height(&self) -> u32;
    /// Red channel of pixel `(x, y)`; `x < width`, `y < height`.
    fn red(&self, x: u32, y: u32) -> u8;
}

impl PixelSource for image::RgbImage {
    fn width(&self) -> u32 {
        self.dimensions().0
    }

    fn height(&self) -> u32 {
        self.dimensions().1
    }

    #[inline]
    fn red(&self, x: u32, y: u32) -> u8 {
        self.get_pixel(x, y).0[0]
    }
}

impl PixelSource for image::GrayImage {
    fn width(&self) -> u32 {
        self.dimensions().0
    }

    fn height(&self) -> u32 {
        self.dimensions().1
    }

    #[inline]
    fn red(&self, x: u32, y: u32) -> u8 {
        self.get_pixel(x, y).0[0]
    }
}

/// Row-major red channel values, mostly useful for tests and synthetic terrain.
#[derive(Debug, Clone)]
pub struct RawPixels {
    width: u32,
    height: u32,
    red: Vec<u8>,
}

impl RawPixels {
    /// Wraps an existing buffer; it must hold exactly `width * height` values.
    pub fn new(width: u32, height: u32, red: Vec<u8>) -> Result<Self, MeshError> {
        let expected = width as usize * height as usize;
        if red.len() != expected {
            return Err(MeshError::BufferSize {
                expected,
                actual: red.len(),
            });
        }
        Ok(Self { width, height, red })
    }

    pub fn from_fn(width: u32, height: u32, mut f: impl FnMut(u32, u32) -> u8) -> Self {
        let mut red = Vec::with_capacity((width * height) as usize);
        for y in 0..height {
            for x in 0..width {
                red.push(f(x, y));
            }
        }
        Self { width, height, red }
    }
}

impl PixelSource for RawPixels {
    fn width(&self) -> u32 {
        self.width
    }

    fn height(&self) -> u32 {
        self.height
    }

    #[inline]
    fn red(&self, x: u32, y: u32) -> u8 {
        self.red[(y * self.width + x) as usize]
    }
}

#[derive(Debug, thiserror::Error)]
pub enum MeshError {
    #[error("heightmap has no pixels ({width}x{height})")]
    EmptySource { width: u32, height: u32 },
    #[error("pixel buffer holds {actual} values, expected {expected}")]
    BufferSize { expected: usize, actual: usize },
}

#[derive(Debug, thiserror::Error)]
pub enum TerrainError {
    #[error("failed to decode heightmap '{}'", path.display())]
    SourceDecodeFailure {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
    #[error("heightmap '{}' is unusable", path.display())]
    InvalidSource {
        path: PathBuf,
        #[source]
        source: MeshError,
    },
}

/// Axis-aligned extents in the model-space XY plane.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds {
    pub min_x: f32,
    pub min_y: f32,
    pub max_x: f32,
    pub max_y: f32,
}

/// A `W x H` grid of terrain vertices, immutable once built.
#[derive(Debug, Clone)]
pub struct Mesh {
    width: u32,
    height: u32,
    /// Row-major: sample `(i, j)` lives at `j * width + i`.
    samples: Vec<Vec3>,
    bounds: Bounds,
}

impl Mesh {
    /// Builds the vertex grid from a decoded image. Pure and deterministic.
    pub fn load(source: &impl PixelSource) -> Result<Self, MeshError> {
        let (width, height) = (source.width(), source.height());
        if width == 0 || height == 0 {
            return Err(MeshError::EmptySource { width, height });
        }

        let (w, h) = (width as f32, height as f32);
        let x_offset = (w / 2.0) / w;
        let y_offset = (h / 2.0) / h;

        let mut samples = Vec::with_capacity(width as usize * height as usize);
        for j in 0..height {
            for i in 0..width {
                samples.push(Vec3::new(
                    i as f32 / w - x_offset,
                    j as f32 / h - y_offset,
                    ELEVATION_SCALE * source.red(i, j) as f32,
                ));
            }
        }

        // First and last sample. With row-major order and x, y monotonic in
        // i, j these are also the true XY extents; `scan_bounds` checks it.
        let first = samples[0];
        let last = samples[samples.len() - 1];
        let bounds = Bounds {
            min_x: first.x,
            min_y: first.y,
            max_x: last.x,
            max_y: last.y,
        };

        Ok(Self {
            width,
            height,
            samples,
            bounds,
        })
    }

    #[inline]
    pub fn width(&self) -> u32 {
        self.width
    }

    #[inline]
    pub fn height(&self) -> u32 {
        self.height
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Vertex at column `i`, row `j`.
    #[inline]
    pub fn sample(&self, i: u32, j: u32) -> Vec3 {
        self.samples[(j * self.width + i) as usize]
    }

    #[inline]
    pub fn samples(&self) -> &[Vec3] {
        &self.samples
    }

    /// Cached extents taken from the first and last sample.
    #[inline]
    pub fn bounds(&self) -> Bounds {
        self.bounds
    }

    /// Full min/max scan over every sample.
    pub fn scan_bounds(&self) -> Bounds {
        self.samples.iter().fold(
            Bounds {
                min_x: f32::INFINITY,
                min_y: f32::INFINITY,
                max_x: f32::NEG_INFINITY,
                max_y: f32::NEG_INFINITY,
            },
            |b, s| Bounds {
                min_x: b.min_x.min(s.x),
                min_y: b.min_y.min(s.y),
                max_x: b.max_x.max(s.x),
                max_y: b.max_y.max(s.y),
            },
        )
    }
}

/// Decodes an image file and builds its mesh.
pub fn load_file(path: &Path) -> Result<Mesh, TerrainError> {
    let image = image::open(path)
        .map_err(|source| TerrainError::SourceDecodeFailure {
            path: path.to_path_buf(),
            source,
        })?
        .to_rgb8();

    let mesh = Mesh::load(&image).map_err(|source| TerrainError::InvalidSource {
        path: path.to_path_buf(),
        source,
    })?;

    log::info!(
        "Loaded heightmap {} ({}x{}, {} samples)",
        path.display(),
        mesh.width(),
        mesh.height(),
        mesh.len()
    );
    Ok(mesh)
}

/// The small rotation of bundled heightmaps a window cycles through.
#[derive(Debug, Clone)]
pub struct HeightmapRotation {
    paths: Vec<PathBuf>,
    current: usize,
}

impl HeightmapRotation {
    pub const BUNDLED: [&'static str; 3] = ["heightmap-1.png", "heightmap-2.png", "heightmap-3.png"];

    /// Starts on the second bundled map.
    pub fn bundled(dir: &Path) -> Self {
        Self {
            paths: Self::BUNDLED.iter().map(|name| dir.join(name)).collect(),
            current: 1,
        }
    }

    pub fn new(paths: Vec<PathBuf>) -> Self {
        Self { paths, current: 0 }
    }

    pub fn current(&self) -> Option<&Path> {
        self.paths.get(self.current).map(PathBuf::as_path)
    }

    /// Moves to the next heightmap, wrapping around.
    pub fn advance(&mut self) -> Option<&Path> {
        if self.paths.is_empty() {
            return None;
        }
        self.current = (self.current + 1) % self.paths.len();
        self.current()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use test_case::test_case;

    fn ramp(width: u32, height: u32) -> RawPixels {
        RawPixels::from_fn(width, height, |x, y| ((x + y) * 10 % 256) as u8)
    }

    #[test_case(2, 2)]
    #[test_case(3, 5)]
    #[test_case(7, 4)]
    #[test_case(64, 64)]
    fn produces_one_sample_per_pixel(width: u32, height: u32) {
        let mesh = Mesh::load(&ramp(width, height)).unwrap();
        assert_eq!(mesh.len(), (width * height) as usize);
        assert_eq!(mesh.width(), width);
        assert_eq!(mesh.height(), height);
    }

    #[test]
    fn positions_are_centred_and_monotonic() {
        let mesh = Mesh::load(&ramp(4, 8)).unwrap();

        for j in 0..8 {
            assert_relative_eq!(mesh.sample(0, j).x, -0.5);
            for i in 1..4 {
                assert!(mesh.sample(i, j).x > mesh.sample(i - 1, j).x);
            }
        }
        for i in 0..4 {
            assert_relative_eq!(mesh.sample(i, 0).y, -0.5);
            for j in 1..8 {
                assert!(mesh.sample(i, j).y > mesh.sample(i, j - 1).y);
            }
        }
        assert_relative_eq!(mesh.sample(3, 0).x, 0.25);
        assert_relative_eq!(mesh.sample(0, 7).y, 0.375);
    }

    #[test]
    fn elevation_scales_red_channel() {
        let pixels = RawPixels::from_fn(3, 2, |x, y| if (x, y) == (2, 1) { 255 } else { 100 });
        let mesh = Mesh::load(&pixels).unwrap();

        assert_relative_eq!(mesh.sample(2, 1).z, 0.255, epsilon = 1e-6);
        assert_relative_eq!(mesh.sample(0, 0).z, 0.1, epsilon = 1e-6);
    }

    #[test]
    fn cached_bounds_match_full_scan() {
        for (w, h) in [(2, 2), (5, 3), (3, 9)] {
            let mesh = Mesh::load(&ramp(w, h)).unwrap();
            assert_eq!(mesh.bounds(), mesh.scan_bounds());
        }
    }

    #[test]
    fn empty_source_is_rejected() {
        let pixels = RawPixels::new(0, 4, Vec::new()).unwrap();
        assert!(matches!(
            Mesh::load(&pixels),
            Err(MeshError::EmptySource { width: 0, height: 4 })
        ));
    }

    #[test_case(3, 3, 8)]
    #[test_case(3, 3, 10)]
    #[test_case(2, 0, 1)]
    fn short_or_long_buffers_are_rejected(width: u32, height: u32, len: usize) {
        assert!(matches!(
            RawPixels::new(width, height, vec![0; len]),
            Err(MeshError::BufferSize { actual, .. }) if actual == len
        ));
    }

    #[test]
    fn exact_buffer_loads() {
        let pixels = RawPixels::new(2, 2, vec![0, 50, 100, 150]).unwrap();
        let mesh = Mesh::load(&pixels).unwrap();
        assert_relative_eq!(mesh.sample(1, 1).z, 0.15, epsilon = 1e-6);
    }

    #[test]
    fn rgb_image_reads_red_channel() {
        let image = image::RgbImage::from_fn(2, 2, |x, _| image::Rgb([x as u8 * 200, 7, 9]));
        let mesh = Mesh::load(&image).unwrap();
        assert_relative_eq!(mesh.sample(1, 0).z, 0.2, epsilon = 1e-6);
        assert_relative_eq!(mesh.sample(0, 1).z, 0.0);
    }

    #[test]
    fn missing_file_is_a_decode_failure() {
        let err = load_file(Path::new("does/not/exist.png")).unwrap_err();
        assert!(matches!(err, TerrainError::SourceDecodeFailure { .. }));
    }

    #[test]
    fn rotation_wraps_through_bundled_maps() {
        let mut rotation = HeightmapRotation::bundled(Path::new("assets"));
        assert_eq!(rotation.current(), Some(Path::new("assets/heightmap-2.png")));
        assert_eq!(rotation.advance(), Some(Path::new("assets/heightmap-3.png")));
        assert_eq!(rotation.advance(), Some(Path::new("assets/heightmap-1.png")));
        assert_eq!(rotation.advance(), Some(Path::new("assets/heightmap-2.png")));
    }
}
