//! GPU backend: replays a recorded [`DrawList`] into one window's swap chain.

pub mod context;
pub mod pipelines;

use self::{
    context::{Gpu, WindowSurface},
    pipelines::terrain::{TerrainPipeline, TerrainVertex},
};
use crate::{
    camera::ViewState,
    draw::{DrawList, Primitive},
};
use glam::Mat4;
use std::ops::Range;
use winit::dpi::PhysicalSize;

/// Fixed orthographic volume the terrain is drawn in.
pub fn projection() -> Mat4 {
    Mat4::orthographic_rh(-1.0, 1.0, -1.0, 1.0, -100.0, 100.0)
}

pub fn model_view_proj(view: &ViewState) -> Mat4 {
    projection() * view.model_matrix()
}

/// One frame's vertices flattened into a single upload, with the range each
/// primitive run occupies.
#[derive(Debug, Default)]
pub struct FrameGeometry {
    pub vertices: Vec<TerrainVertex>,
    pub runs: Vec<(Primitive, Range<u32>)>,
}

impl FrameGeometry {
    pub fn from_list(list: &DrawList) -> Self {
        let mut geometry = Self::default();
        for batch in list.batches() {
            let start = geometry.vertices.len() as u32;
            geometry
                .vertices
                .extend(batch.vertices.iter().map(|(p, c)| TerrainVertex {
                    position: p.to_array(),
                    color: c.0,
                }));
            geometry
                .runs
                .push((batch.primitive, start..geometry.vertices.len() as u32));
        }
        geometry
    }
}

/// Rendering state of one window.
pub struct Renderer {
    pub surface: WindowSurface,
    terrain: TerrainPipeline,
    vertex_buffer: wgpu::Buffer,
    vertex_capacity: u64,
}

impl Renderer {
    const INITIAL_VERTICES: u64 = 64 * 1024;

    pub fn new(gpu: &Gpu, surface: WindowSurface) -> Self {
        let terrain = TerrainPipeline::new(&gpu.device, surface.format());
        let vertex_buffer = Self::vertex_buffer(&gpu.device, Self::INITIAL_VERTICES);
        Self {
            surface,
            terrain,
            vertex_buffer,
            vertex_capacity: Self::INITIAL_VERTICES,
        }
    }

    fn vertex_buffer(device: &wgpu::Device, vertices: u64) -> wgpu::Buffer {
        device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Terrain Vertex Buffer"),
            size: vertices * std::mem::size_of::<TerrainVertex>() as u64,
            usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        })
    }

    pub fn resize(&mut self, gpu: &Gpu, new_size: PhysicalSize<u32>) {
        self.surface.resize(gpu, new_size);
    }

    #[inline]
    pub fn size(&self) -> PhysicalSize<u32> {
        self.surface.size
    }

    /// Clears to black and draws `frame` with the transform of `view`.
    pub fn render(
        &mut self,
        gpu: &Gpu,
        frame: &DrawList,
        view: &ViewState,
    ) -> Result<(), wgpu::SurfaceError> {
        let geometry = FrameGeometry::from_list(frame);

        let needed = geometry.vertices.len() as u64;
        if needed > self.vertex_capacity {
            self.vertex_capacity = needed.next_power_of_two();
            self.vertex_buffer = Self::vertex_buffer(&gpu.device, self.vertex_capacity);
        }
        if !geometry.vertices.is_empty() {
            gpu.queue
                .write_buffer(&self.vertex_buffer, 0, bytemuck::cast_slice(&geometry.vertices));
        }
        self.terrain.write_uniforms(&gpu.queue, model_view_proj(view));

        let output = self.surface.surface.get_current_texture()?;
        let swap_view = output
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());

        let mut encoder = gpu
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Terrain Frame Encoder"),
            });
        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Terrain Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &swap_view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
            });

            pass.set_vertex_buffer(0, self.vertex_buffer.slice(..));
            for (primitive, range) in &geometry.runs {
                self.terrain.bind(&mut pass, *primitive);
                pass.draw(range.clone(), 0..1);
            }
        }

        gpu.queue.submit(std::iter::once(encoder.finish()));
        output.present();
        Ok(())
    }
}
