use crate::{
    camera::{SharedView, ViewState, ROTATION_STEP_DEG, ZOOM_STEP},
    clock::RefreshRate,
    draw::DrawSink,
    heightmap::{self, HeightmapRotation, Mesh},
    input::Command,
    net::SeasonChannel,
    particles::ParticlePool,
    terrain::{TerrainRenderer, DEFAULT_AUTO_ROTATE_SPEED},
};
use seasons::Season;

/// Terrain plus the weather particles spawned over it.
struct Scene {
    mesh: Mesh,
    particles: ParticlePool,
}

/// Everything one rendering window owns.
pub struct TerrainClient {
    scene: Option<Scene>,
    heightmaps: HeightmapRotation,
    view: SharedView,
    season: SeasonChannel,
    renderer: TerrainRenderer,
    rate: RefreshRate,
    auto_rotate: bool,
    rotate_speed: f32,
    title_dirty: bool,
}

impl TerrainClient {
    pub fn new(
        rate: RefreshRate,
        view: SharedView,
        season: SeasonChannel,
        heightmaps: HeightmapRotation,
    ) -> Self {
        Self {
            scene: None,
            heightmaps,
            view,
            season,
            renderer: TerrainRenderer::new(),
            rate,
            auto_rotate: true,
            rotate_speed: DEFAULT_AUTO_ROTATE_SPEED,
            title_dirty: true,
        }
    }

    /// Loads the current heightmap of the rotation.
    pub fn load_current_heightmap(&mut self) {
        if let Some(path) = self.heightmaps.current().map(|p| p.to_path_buf()) {
            match heightmap::load_file(&path) {
                Ok(mesh) => self.install_mesh(mesh),
                Err(e) => log::error!("{}: {:#}", self.label(), anyhow::Error::from(e)),
            }
        }
    }

    /// Swaps in a new terrain. Particles already in flight keep falling;
    /// respawns land on the new mesh.
    pub fn install_mesh(&mut self, mesh: Mesh) {
        match self.scene.take() {
            Some(Scene { particles, .. }) => self.scene = Some(Scene { mesh, particles }),
            None => {
                let particles = ParticlePool::create(&mesh);
                self.scene = Some(Scene { mesh, particles });
            }
        }
    }

    pub fn mesh(&self) -> Option<&Mesh> {
        self.scene.as_ref().map(|s| &s.mesh)
    }

    pub fn particles(&self) -> Option<&ParticlePool> {
        self.scene.as_ref().map(|s| &s.particles)
    }

    #[inline]
    pub fn rate(&self) -> RefreshRate {
        self.rate
    }

    #[inline]
    pub fn season(&self) -> Season {
        self.season.season()
    }

    #[inline]
    pub fn auto_rotate(&self) -> bool {
        self.auto_rotate
    }

    pub fn view(&self) -> &SharedView {
        &self.view
    }

    pub fn label(&self) -> String {
        format!("{}FPS window", self.rate.get())
    }

    /// Window title: refresh rate and current season.
    pub fn title(&self) -> String {
        format!("{}FPS - {}", self.rate.get(), self.season())
    }

    /// Applies pending season messages.
    pub fn poll_season(&mut self) {
        if self.season.poll() {
            log::info!("{}: season {}", self.label(), self.season());
            self.title_dirty = true;
        }
    }

    /// The new title, if the rate or season changed since the last call.
    pub fn take_title(&mut self) -> Option<String> {
        std::mem::take(&mut self.title_dirty).then(|| self.title())
    }

    /// Applies one command. Returns true when the tick schedule must restart
    /// at the new refresh rate.
    pub fn handle(&mut self, command: Command) -> bool {
        let mut reschedule = false;
        match command {
            Command::ZoomIn => self.view.update(|v| v.scale += ZOOM_STEP),
            Command::ZoomOut => self.view.update(|v| v.scale -= ZOOM_STEP),
            Command::TiltUp => self.view.update(|v| v.rot_x += ROTATION_STEP_DEG),
            Command::TiltDown => self.view.update(|v| v.rot_x -= ROTATION_STEP_DEG),
            Command::YawLeft => self.view.update(|v| v.rot_y += ROTATION_STEP_DEG),
            Command::YawRight => self.view.update(|v| v.rot_y -= ROTATION_STEP_DEG),
            Command::CycleRenderMode => {
                let mode = self.view.update(|v| {
                    v.render_mode = v.render_mode.next();
                    v.render_mode
                });
                log::debug!("{}: render mode {:?}", self.label(), mode);
            }
            Command::ToggleAutoRotate => self.auto_rotate = !self.auto_rotate,
            Command::IncreaseRefreshRate | Command::DecreaseRefreshRate => {
                self.rate = match command {
                    Command::IncreaseRefreshRate => self.rate.faster(),
                    _ => self.rate.slower(),
                };
                reschedule = true;
                self.title_dirty = true;
            }
            Command::CycleHeightmap => {
                if self.heightmaps.advance().is_some() {
                    self.load_current_heightmap();
                }
            }
        }
        reschedule
    }

    /// One scheduled frame: season update, terrain, particles, auto-rotate.
    /// Returns the view the frame was drawn with so the backend can apply
    /// the same transform.
    pub fn tick(&mut self, sink: &mut impl DrawSink) -> ViewState {
        self.poll_season();
        let view = self.view.snapshot();
        let season = self.season.season();

        if let Some(scene) = self.scene.as_mut() {
            self.renderer.render_frame(&scene.mesh, &view, season, sink);
            scene.particles.tick(season, &scene.mesh, sink);
        }

        if self.auto_rotate {
            let speed = self.rotate_speed;
            self.view.update(|v| v.rot_y += speed);
        }
        view
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::draw::{DrawList, Primitive};
    use crate::heightmap::RawPixels;
    use crate::terrain::RenderMode;
    use approx::assert_relative_eq;

    fn client(view: SharedView) -> TerrainClient {
        let mut client = TerrainClient::new(
            RefreshRate::new(60),
            view,
            SeasonChannel::offline(),
            HeightmapRotation::new(Vec::new()),
        );
        client.install_mesh(Mesh::load(&RawPixels::from_fn(4, 4, |x, _| x as u8 * 20)).unwrap());
        client
    }

    #[test]
    fn title_shows_rate_and_season() {
        let mut c = client(SharedView::default());
        assert_eq!(c.title(), "60FPS - NONE");
        assert_eq!(c.take_title().as_deref(), Some("60FPS - NONE"));
        assert_eq!(c.take_title(), None);
    }

    #[test]
    fn view_commands_step_the_camera() {
        let mut c = client(SharedView::default());
        let start = c.view().snapshot();

        c.handle(Command::ZoomIn);
        c.handle(Command::ZoomIn);
        c.handle(Command::ZoomOut);
        c.handle(Command::TiltUp);
        c.handle(Command::YawRight);

        let v = c.view().snapshot();
        assert_relative_eq!(v.scale, start.scale + ZOOM_STEP, epsilon = 1e-6);
        assert_relative_eq!(v.rot_x, start.rot_x + 1.0);
        assert_relative_eq!(v.rot_y, start.rot_y - 1.0);
    }

    #[test]
    fn render_mode_command_cycles() {
        let mut c = client(SharedView::default());
        let mut seen = vec![c.view().snapshot().render_mode];
        for _ in 0..6 {
            c.handle(Command::CycleRenderMode);
            seen.push(c.view().snapshot().render_mode);
        }
        assert_eq!(
            seen,
            vec![
                RenderMode::Points,
                RenderMode::Lines,
                RenderMode::Triangles,
                RenderMode::TwoTone,
                RenderMode::Textured,
                RenderMode::Combo,
                RenderMode::Points,
            ]
        );
    }

    #[test]
    fn refresh_commands_reschedule_within_range() {
        let mut c = client(SharedView::default());
        c.take_title();
        assert!(c.handle(Command::IncreaseRefreshRate));
        assert_eq!(c.take_title().as_deref(), Some("120FPS - NONE"));
        assert!(!c.handle(Command::ZoomIn));
        assert_eq!(c.rate().get(), 120);
        c.handle(Command::IncreaseRefreshRate);
        assert_eq!(c.rate().get(), 120);
        for _ in 0..10 {
            c.handle(Command::DecreaseRefreshRate);
        }
        assert_eq!(c.rate().get(), 1);
        assert_eq!(c.title(), "1FPS - NONE");
    }

    #[test]
    fn auto_rotate_advances_yaw_each_tick() {
        let mut c = client(SharedView::default());
        let mut sink = DrawList::new();

        let drawn = c.tick(&mut sink);
        assert_relative_eq!(c.view().snapshot().rot_y, drawn.rot_y + DEFAULT_AUTO_ROTATE_SPEED);

        c.handle(Command::ToggleAutoRotate);
        let before = c.view().snapshot().rot_y;
        c.tick(&mut sink);
        assert_relative_eq!(c.view().snapshot().rot_y, before);
    }

    #[test]
    fn auto_rotate_toggle_is_per_window() {
        let shared = SharedView::default();
        let mut a = client(shared.clone());
        let mut b = client(shared.clone());

        a.handle(Command::ToggleAutoRotate);
        assert!(!a.auto_rotate());
        assert!(b.auto_rotate());

        let mut sink = DrawList::new();
        a.tick(&mut sink);
        b.tick(&mut sink);
        assert_relative_eq!(shared.snapshot().rot_y, DEFAULT_AUTO_ROTATE_SPEED);
    }

    #[test]
    fn shared_view_mode_applies_to_every_window() {
        let shared = SharedView::default();
        let mut a = client(shared.clone());
        let mut b = client(shared);

        a.handle(Command::CycleRenderMode);
        a.handle(Command::CycleRenderMode);

        let mut sink = DrawList::new();
        let drawn = b.tick(&mut sink);
        assert_eq!(drawn.render_mode, RenderMode::Triangles);
        assert_eq!(sink.vertex_count(Primitive::Triangles), 3 * 3 * 6);
    }

    #[test]
    fn tick_without_mesh_draws_nothing() {
        let mut c = TerrainClient::new(
            RefreshRate::new(10),
            SharedView::default(),
            SeasonChannel::offline(),
            HeightmapRotation::new(vec!["missing.png".into()]),
        );
        c.load_current_heightmap();
        assert!(c.mesh().is_none());

        let mut sink = DrawList::new();
        c.tick(&mut sink);
        assert!(sink.is_empty());
    }

    #[test]
    fn failed_heightmap_switch_keeps_current_mesh() {
        let mut c = TerrainClient::new(
            RefreshRate::new(10),
            SharedView::default(),
            SeasonChannel::offline(),
            HeightmapRotation::new(vec!["a.png".into(), "b.png".into()]),
        );
        c.install_mesh(Mesh::load(&RawPixels::from_fn(3, 3, |_, _| 0)).unwrap());
        c.handle(Command::CycleHeightmap);
        assert_eq!(c.mesh().map(Mesh::len), Some(9));
        assert_eq!(c.particles().map(ParticlePool::len), Some(1000));
    }
}
