//! Entry point for the terrain viewer.

use anyhow::{Context, Result};
use clap::Parser;
use std::{sync::Arc, time::Instant};
use terrain_viewer::{
    app::TerrainClient,
    camera::{SharedView, ViewState},
    clock::{FrameClock, RefreshRate},
    config::Config,
    draw::DrawList,
    heightmap::HeightmapRotation,
    input::command_for_key,
    net::SeasonChannel,
    renderer::{
        context::{Gpu, WindowSurface},
        Renderer,
    },
};
use winit::{
    event::{ElementState, Event, WindowEvent},
    event_loop::{ControlFlow, EventLoop, EventLoopWindowTarget},
    keyboard::{Key, NamedKey},
    window::{Window, WindowBuilder},
};

/// One terrain window: its client, tick schedule and last recorded frame.
struct ViewerWindow {
    window: Arc<Window>,
    renderer: Renderer,
    client: TerrainClient,
    clock: FrameClock,
    frame: DrawList,
    drawn_with: ViewState,
}

impl ViewerWindow {
    fn refresh_title(&mut self) {
        if let Some(title) = self.client.take_title() {
            self.window.set_title(&title);
        }
    }

    fn tick(&mut self) {
        self.frame.clear();
        self.drawn_with = self.client.tick(&mut self.frame);
        self.refresh_title();
        self.window.request_redraw();
    }

    fn present(&mut self, gpu: &Gpu, elwt: &EventLoopWindowTarget<()>) {
        match self.renderer.render(gpu, &self.frame, &self.drawn_with) {
            Ok(()) => {}
            Err(wgpu::SurfaceError::Lost) => self.renderer.surface.reconfigure(gpu),
            Err(wgpu::SurfaceError::OutOfMemory) => {
                log::error!("WGPU out of memory, exiting.");
                elwt.exit();
            }
            Err(e) => log::warn!("{}: render error: {e:?}", self.client.label()),
        }
    }
}

fn open_window(
    event_loop: &EventLoop<()>,
    gpu: &mut Option<Gpu>,
    config: &Config,
    rate: RefreshRate,
    view: SharedView,
) -> Result<ViewerWindow> {
    let window = Arc::new(
        WindowBuilder::new()
            .with_title(format!("{}FPS", rate.get()))
            .with_inner_size(winit::dpi::LogicalSize::new(640, 640))
            .build(event_loop)?,
    );

    let surface = match gpu.as_ref() {
        Some(gpu) => WindowSurface::new(gpu, window.clone())?,
        None => {
            let (shared, surface) = pollster::block_on(Gpu::new(window.clone()))?;
            *gpu = Some(shared);
            surface
        }
    };
    let gpu = gpu.as_ref().context("GPU context missing after initialisation")?;
    let renderer = Renderer::new(gpu, surface);

    let label = format!("{}FPS window", rate.get());
    let season = if config.offline {
        SeasonChannel::offline()
    } else {
        SeasonChannel::connect(config.server_addr.clone(), config.connect_timeout(), label)
    };

    let mut client = TerrainClient::new(
        rate,
        view,
        season,
        HeightmapRotation::bundled(&config.heightmap_dir),
    );
    client.load_current_heightmap();

    let mut viewer = ViewerWindow {
        window,
        renderer,
        client,
        clock: FrameClock::new(rate, Instant::now()),
        frame: DrawList::new(),
        drawn_with: ViewState::default(),
    };
    viewer.refresh_title();
    Ok(viewer)
}

fn main() -> Result<()> {
    // Initialize logging; default to "info" if RUST_LOG is unset.
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = Config::parse();
    config.validate()?;
    log::info!("starting terrain viewer with config: {:?}", config);

    let event_loop = EventLoop::new()?;
    let shared_view = config.share_camera.then(SharedView::default);

    let mut gpu = None;
    let mut windows = Vec::new();
    for rate in config.rates() {
        let view = shared_view.clone().unwrap_or_default();
        windows.push(open_window(&event_loop, &mut gpu, &config, rate, view)?);
    }
    let gpu = gpu.context("no window was opened")?;

    event_loop.run(move |event, elwt| match event {
        Event::WindowEvent { window_id, event } => {
            let Some(idx) = windows.iter().position(|w| w.window.id() == window_id) else {
                return;
            };
            match event {
                WindowEvent::CloseRequested => {
                    log::info!("{} closed", windows[idx].client.label());
                    windows.remove(idx);
                    if windows.is_empty() {
                        elwt.exit();
                    }
                }
                WindowEvent::Resized(size) => windows[idx].renderer.resize(&gpu, size),
                WindowEvent::KeyboardInput { event, .. } if event.state == ElementState::Pressed => {
                    if event.logical_key == Key::Named(NamedKey::Escape) {
                        elwt.exit();
                        return;
                    }
                    let viewer = &mut windows[idx];
                    if let Some(command) = command_for_key(&event.logical_key) {
                        if viewer.client.handle(command) {
                            viewer.clock.restart(viewer.client.rate(), Instant::now());
                        }
                        viewer.refresh_title();
                    }
                }
                WindowEvent::RedrawRequested => windows[idx].present(&gpu, elwt),
                _ => {}
            }
        }
        Event::AboutToWait => {
            let now = Instant::now();
            for viewer in windows.iter_mut() {
                viewer.client.poll_season();
                viewer.refresh_title();
                if viewer.clock.poll(now) {
                    viewer.tick();
                }
            }
            if let Some(next) = windows.iter().map(|w| w.clock.deadline()).min() {
                elwt.set_control_flow(ControlFlow::WaitUntil(next));
            }
        }
        _ => {}
    })?;

    Ok(())
}
