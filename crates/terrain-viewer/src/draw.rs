//! Immediate-mode drawing seam between the terrain logic and the GPU backend.

use glam::Vec3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Primitive {
    Points,
    Lines,
    Triangles,
}

/// Linear RGB color, components in `[0, 1]`.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct Rgb(pub [f32; 3]);

impl Rgb {
    pub const WHITE: Rgb = Rgb([1.0, 1.0, 1.0]);
    pub const BLUE: Rgb = Rgb([0.0, 0.0, 1.0]);

    #[inline]
    pub const fn new(r: f32, g: f32, b: f32) -> Self {
        Self([r, g, b])
    }
}

/// Receives draw calls. The current color applies to every following vertex
/// until changed; colors persist across `begin`/`end` pairs.
pub trait DrawSink {
    fn begin(&mut self, primitive: Primitive);
    fn color(&mut self, color: Rgb);
    fn vertex(&mut self, position: Vec3);
    fn end(&mut self);
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DrawCall {
    Begin(Primitive),
    Color(Rgb),
    Vertex(Vec3),
    End,
}

/// A recorded frame.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DrawList {
    calls: Vec<DrawCall>,
}

impl DrawList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clear(&mut self) {
        self.calls.clear();
    }

    #[inline]
    pub fn calls(&self) -> &[DrawCall] {
        &self.calls
    }

    pub fn is_empty(&self) -> bool {
        self.calls.is_empty()
    }

    /// Number of vertices emitted for `primitive`.
    pub fn vertex_count(&self, primitive: Primitive) -> usize {
        let mut current = None;
        let mut count = 0;
        for call in &self.calls {
            match call {
                DrawCall::Begin(p) => current = Some(*p),
                DrawCall::End => current = None,
                DrawCall::Vertex(_) if current == Some(primitive) => count += 1,
                _ => {}
            }
        }
        count
    }

    /// Splits the recording into contiguous runs of one primitive, each
    /// vertex resolved against the color in effect when it was emitted.
    pub fn batches(&self) -> Vec<Batch> {
        let mut batches = Vec::new();
        let mut color = Rgb::WHITE;
        let mut open: Option<Batch> = None;

        for call in &self.calls {
            match *call {
                DrawCall::Begin(primitive) => {
                    if let Some(batch) = open.take() {
                        batches.push(batch);
                    }
                    open = Some(Batch {
                        primitive,
                        vertices: Vec::new(),
                    });
                }
                DrawCall::Color(c) => color = c,
                DrawCall::Vertex(position) => {
                    if let Some(batch) = open.as_mut() {
                        batch.vertices.push((position, color));
                    }
                }
                DrawCall::End => {
                    if let Some(batch) = open.take() {
                        batches.push(batch);
                    }
                }
            }
        }
        if let Some(batch) = open {
            batches.push(batch);
        }
        batches.retain(|b| !b.vertices.is_empty());
        batches
    }
}

impl DrawSink for DrawList {
    fn begin(&mut self, primitive: Primitive) {
        self.calls.push(DrawCall::Begin(primitive));
    }

    fn color(&mut self, color: Rgb) {
        self.calls.push(DrawCall::Color(color));
    }

    fn vertex(&mut self, position: Vec3) {
        self.calls.push(DrawCall::Vertex(position));
    }

    fn end(&mut self) {
        self.calls.push(DrawCall::End);
    }
}

/// Vertices of one primitive run, ready for upload.
#[derive(Debug, Clone, PartialEq)]
pub struct Batch {
    pub primitive: Primitive,
    pub vertices: Vec<(Vec3, Rgb)>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn batches_carry_color_state_across_runs() {
        let mut list = DrawList::new();
        list.color(Rgb::BLUE);
        list.begin(Primitive::Points);
        list.vertex(Vec3::ZERO);
        list.end();
        list.begin(Primitive::Lines);
        list.vertex(Vec3::X);
        list.color(Rgb::WHITE);
        list.vertex(Vec3::Y);
        list.end();

        let batches = list.batches();
        assert_eq!(batches.len(), 2);
        assert_eq!(batches[0].primitive, Primitive::Points);
        assert_eq!(batches[0].vertices, vec![(Vec3::ZERO, Rgb::BLUE)]);
        assert_eq!(
            batches[1].vertices,
            vec![(Vec3::X, Rgb::BLUE), (Vec3::Y, Rgb::WHITE)]
        );
        assert_eq!(list.vertex_count(Primitive::Lines), 2);
        assert_eq!(list.vertex_count(Primitive::Triangles), 0);
    }

    #[test]
    fn empty_runs_are_dropped() {
        let mut list = DrawList::new();
        list.begin(Primitive::Triangles);
        list.end();
        assert!(list.batches().is_empty());
    }
}
