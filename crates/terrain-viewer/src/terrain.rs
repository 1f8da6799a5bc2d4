//! Terrain draw strategies.
//!
//! Every strategy walks the grid column-major (`i` outer, `j` inner). The
//! connected modes work on 2x2 blocks
//!
//! ```text
//! (i, j+1) ---- (i+1, j+1)
//!    |      \        |
//!    |        \      |
//! (i, j) ------ (i+1, j)
//! ```
//!
//! split along the `(i, j+1)-(i+1, j)` diagonal into
//! `{(i,j), (i,j+1), (i+1,j)}` and `{(i,j+1), (i+1,j+1), (i+1,j)}`.

use crate::camera::ViewState;
use crate::draw::{DrawSink, Primitive, Rgb};
use crate::heightmap::Mesh;
use seasons::Season;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum RenderMode {
    #[default]
    Points,
    Lines,
    Triangles,
    /// Alternating fixed tints per triangle, to show the tessellation.
    TwoTone,
    /// Per-vertex altitude ramp.
    Textured,
    /// Textured fill with the wireframe drawn over it.
    Combo,
}

impl RenderMode {
    pub const ALL: [RenderMode; 6] = [
        RenderMode::Points,
        RenderMode::Lines,
        RenderMode::Triangles,
        RenderMode::TwoTone,
        RenderMode::Textured,
        RenderMode::Combo,
    ];

    /// Unknown indices fall back to `Points`.
    pub fn from_index(index: usize) -> Self {
        Self::ALL.get(index).copied().unwrap_or(RenderMode::Points)
    }

    pub fn index(self) -> usize {
        self as usize
    }

    /// 0 -> 1 -> 2 -> 3 -> 4 -> 5 -> 0.
    pub fn next(self) -> Self {
        Self::from_index((self.index() + 1) % Self::ALL.len())
    }
}

pub const SPRING_TINT: Rgb = Rgb::new(0.0, 0.7, 0.2);
pub const SUMMER_TINT: Rgb = Rgb::new(1.0, 1.0, 0.0);
pub const AUTUMN_TINT: Rgb = Rgb::new(0.86, 0.4, 0.0);
pub const WINTER_TINT: Rgb = Rgb::new(0.8, 0.8, 0.8);

pub const TWO_TONE_ACCENT: Rgb = Rgb::new(0.0, 1.0, 0.0);
pub const TWO_TONE_BASE: Rgb = Rgb::WHITE;

/// Tint override for the season-tinted modes; `None` keeps white.
pub fn season_tint(season: Season) -> Option<Rgb> {
    match season {
        Season::Spring => Some(SPRING_TINT),
        Season::Summer => Some(SUMMER_TINT),
        Season::Autumn => Some(AUTUMN_TINT),
        Season::Winter => Some(WINTER_TINT),
        Season::None => None,
    }
}

/// Altitude color ramp. A value exactly on a band boundary takes the
/// higher band.
pub fn altitude_color(z: f32) -> Rgb {
    if z >= 0.2 {
        Rgb::WHITE
    } else if z >= 0.1 {
        Rgb::new(z, 1.0, 1.0)
    } else if z >= 0.05 {
        Rgb::new(1.0, z, z)
    } else {
        Rgb::BLUE
    }
}

/// Rotation applied per tick while auto-rotate is on.
pub const DEFAULT_AUTO_ROTATE_SPEED: f32 = 0.5;

/// Stateless terrain painter; one per window.
#[derive(Debug, Clone, Copy, Default)]
pub struct TerrainRenderer;

impl TerrainRenderer {
    pub fn new() -> Self {
        Self
    }

    /// Draws `mesh` in the mode selected by `view`. The view transform itself
    /// is applied by the backend from the same snapshot.
    pub fn render_frame(
        &self,
        mesh: &Mesh,
        view: &ViewState,
        season: Season,
        sink: &mut impl DrawSink,
    ) {
        match view.render_mode {
            RenderMode::Points => self.draw_points(mesh, season, sink),
            RenderMode::Lines => self.draw_lines(mesh, season, sink),
            RenderMode::Triangles => self.draw_triangles(mesh, season, sink),
            RenderMode::TwoTone => self.draw_two_tone(mesh, sink),
            RenderMode::Textured => self.draw_textured(mesh, sink),
            RenderMode::Combo => {
                self.draw_textured(mesh, sink);
                self.draw_lines(mesh, season, sink);
            }
        }
    }

    fn apply_season(&self, season: Season, sink: &mut impl DrawSink) {
        sink.color(season_tint(season).unwrap_or(Rgb::WHITE));
    }

    pub fn draw_points(&self, mesh: &Mesh, season: Season, sink: &mut impl DrawSink) {
        self.apply_season(season, sink);
        sink.begin(Primitive::Points);
        for i in 0..mesh.width() {
            for j in 0..mesh.height() {
                sink.vertex(mesh.sample(i, j));
            }
        }
        sink.end();
    }

    /// Outlines both triangles of every block; the shared diagonal is drawn
    /// once per triangle.
    pub fn draw_lines(&self, mesh: &Mesh, season: Season, sink: &mut impl DrawSink) {
        self.apply_season(season, sink);
        sink.begin(Primitive::Lines);
        for_each_block(mesh, |[a, b, c, d]| {
            for (from, to) in [(a, b), (b, c), (c, a), (b, d), (d, c), (c, b)] {
                sink.vertex(from);
                sink.vertex(to);
            }
        });
        sink.end();
    }

    pub fn draw_triangles(&self, mesh: &Mesh, season: Season, sink: &mut impl DrawSink) {
        self.apply_season(season, sink);
        sink.begin(Primitive::Triangles);
        for_each_block(mesh, |[a, b, c, d]| {
            for v in [a, b, c, b, d, c] {
                sink.vertex(v);
            }
        });
        sink.end();
    }

    pub fn draw_two_tone(&self, mesh: &Mesh, sink: &mut impl DrawSink) {
        sink.begin(Primitive::Triangles);
        for_each_block(mesh, |[a, b, c, d]| {
            sink.color(TWO_TONE_ACCENT);
            for v in [a, b, c] {
                sink.vertex(v);
            }
            sink.color(TWO_TONE_BASE);
            for v in [b, d, c] {
                sink.vertex(v);
            }
        });
        sink.end();
    }

    pub fn draw_textured(&self, mesh: &Mesh, sink: &mut impl DrawSink) {
        sink.begin(Primitive::Triangles);
        for_each_block(mesh, |[a, b, c, d]| {
            for v in [a, b, c, b, d, c] {
                sink.color(altitude_color(v.z));
                sink.vertex(v);
            }
        });
        sink.end();
    }
}

/// Calls `f` with `[(i,j), (i,j+1), (i+1,j), (i+1,j+1)]` for every block.
fn for_each_block(mesh: &Mesh, mut f: impl FnMut([glam::Vec3; 4])) {
    let (w, h) = (mesh.width(), mesh.height());
    for i in 0..w.saturating_sub(1) {
        for j in 0..h.saturating_sub(1) {
            f([
                mesh.sample(i, j),
                mesh.sample(i, j + 1),
                mesh.sample(i + 1, j),
                mesh.sample(i + 1, j + 1),
            ]);
        }
    }
}
