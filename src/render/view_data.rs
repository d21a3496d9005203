use cgmath::Matrix4;
use wgpu::{util::DeviceExt, BindGroup, BindGroupLayout, Buffer, RenderPass, RenderPipeline};

use super::render::Renderer;
use crate::config::{FloorConfig, GridConfig};
use crate::model::MeshPart;

bitflags::bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct DirtyFlags: u32 {
        const DIRTY_NONE = 0b00000000;
        const DIRTY_MATERIAL = 0b00000001;
        const DIRTY_TRANSFORM = 0b00000010;
        const DIRTY_ALL = Self::DIRTY_MATERIAL.bits() | Self::DIRTY_TRANSFORM.bits();
    }
}

#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub(crate) struct Vertex {
    pub point: [f32; 3],
    pub normal: [f32; 3],
}

impl Vertex {
    const ATTRIBS: [wgpu::VertexAttribute; 2] =
        wgpu::vertex_attr_array![0 => Float32x3, 1 => Float32x3];

    pub(crate) fn desc() -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<Vertex>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &Self::ATTRIBS,
        }
    }
}

#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub(crate) struct LineVertex {
    pub point: [f32; 3],
    pub color: [f32; 4],
}

impl LineVertex {
    const ATTRIBS: [wgpu::VertexAttribute; 2] =
        wgpu::vertex_attr_array![0 => Float32x3, 1 => Float32x4];

    pub(crate) fn desc() -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<LineVertex>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &Self::ATTRIBS,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) struct Material {
    pub color: [f32; 4],
    pub roughness: f32,
    pub metalness: f32,
    pub env_intensity: f32,
}

/// Per-draw uniform: model matrix plus material, padded to vec4s.
#[repr(C)]
#[derive(Copy, Clone, Debug, bytemuck::Pod, bytemuck::Zeroable)]
struct DrawUniform {
    model: [[f32; 4]; 4],
    color: [f32; 4],
    params: [f32; 4],
}

impl DrawUniform {
    fn new(model: &Matrix4<f32>, material: &Material) -> Self {
        Self {
            model: (*model).into(),
            color: material.color,
            params: [
                material.roughness,
                material.metalness,
                material.env_intensity,
                0.0,
            ],
        }
    }
}

pub(crate) struct MeshBuffers {
    vertex_buffer: Buffer,
    index_buffer: Buffer,
    draw_buffer: Buffer,
    draw_bind_group: BindGroup,
}

/// A triangle mesh on the GPU with its own material and transform.
pub(crate) struct ViewData {
    vertices: Vec<Vertex>,
    triangles: Vec<u32>,
    pub(crate) material: Material,
    pub(crate) transform: Matrix4<f32>,
    pub(crate) transparent: bool,
    pub(crate) dirty: DirtyFlags,
    pub(crate) buffers: Option<MeshBuffers>,
}

impl ViewData {
    pub(crate) fn new(
        vertices: Vec<Vertex>,
        triangles: Vec<u32>,
        material: Material,
        transform: Matrix4<f32>,
    ) -> Self {
        Self {
            vertices,
            triangles,
            transparent: material.color[3] < 1.0,
            material,
            transform,
            dirty: DirtyFlags::DIRTY_ALL,
            buffers: None,
        }
    }

    pub(crate) fn from_part(part: &MeshPart, material: Material, transform: Matrix4<f32>) -> Self {
        let vertices = Vec::from_iter(
            part.positions
                .chunks_exact(3)
                .zip(part.normals.chunks_exact(3))
                .map(|(p, n)| Vertex {
                    point: [p[0], p[1], p[2]],
                    normal: [n[0], n[1], n[2]],
                }),
        );
        Self::new(vertices, part.indices.clone(), material, transform)
    }

    pub(crate) fn init_resources(&mut self, render: &Renderer, draw_layout: &BindGroupLayout) {
        let vertex_buffer = render
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("vertex_buffer"),
                contents: bytemuck::cast_slice(&self.vertices),
                usage: wgpu::BufferUsages::VERTEX,
            });

        let index_buffer = render
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("index_buffer"),
                contents: bytemuck::cast_slice(&self.triangles),
                usage: wgpu::BufferUsages::INDEX,
            });

        let draw_buffer = render
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("draw_buffer"),
                contents: bytemuck::cast_slice(&[DrawUniform::new(&self.transform, &self.material)]),
                usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            });

        let draw_bind_group = render.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("draw_bind_group"),
            layout: draw_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: draw_buffer.as_entire_binding(),
            }],
        });

        self.buffers = Some(MeshBuffers {
            vertex_buffer,
            index_buffer,
            draw_buffer,
            draw_bind_group,
        });
        self.dirty = DirtyFlags::DIRTY_NONE;
    }

    pub(crate) fn set_transform(&mut self, transform: Matrix4<f32>) {
        if self.transform != transform {
            self.transform = transform;
            self.dirty.insert(DirtyFlags::DIRTY_TRANSFORM);
        }
    }

    pub(crate) fn set_material(&mut self, material: Material) {
        if self.material != material {
            self.material = material;
            self.dirty.insert(DirtyFlags::DIRTY_MATERIAL);
        }
    }

    /// Push pending changes to the GPU. Geometry is immutable once uploaded,
    /// a new model gets new `ViewData`.
    pub(crate) fn sync(&mut self, render: &Renderer, draw_layout: &BindGroupLayout) {
        let Some(buffers) = self.buffers.as_ref() else {
            self.init_resources(render, draw_layout);
            return;
        };
        if self
            .dirty
            .intersects(DirtyFlags::DIRTY_MATERIAL | DirtyFlags::DIRTY_TRANSFORM)
        {
            render.queue.write_buffer(
                &buffers.draw_buffer,
                0,
                bytemuck::cast_slice(&[DrawUniform::new(&self.transform, &self.material)]),
            );
        }
        self.dirty = DirtyFlags::DIRTY_NONE;
    }

    pub(crate) fn render<'b, 'a: 'b>(
        &'a self,
        render_pass: &'b mut RenderPass<'a>,
        pipeline: &'a RenderPipeline,
    ) {
        let Some(buffers) = self.buffers.as_ref() else {
            return;
        };
        render_pass.set_pipeline(pipeline);
        render_pass.set_bind_group(1, &buffers.draw_bind_group, &[]);
        render_pass.set_vertex_buffer(0, buffers.vertex_buffer.slice(..));
        render_pass.set_index_buffer(buffers.index_buffer.slice(..), wgpu::IndexFormat::Uint32);
        render_pass.draw_indexed(0..self.triangles.len() as u32, 0, 0..1);
    }
}

/// Line list in world space, e.g. a ground grid.
pub(crate) struct LineData {
    vertices: Vec<LineVertex>,
    pub(crate) buffer: Option<Buffer>,
}

impl LineData {
    pub(crate) fn new(vertices: Vec<LineVertex>) -> Self {
        Self {
            vertices,
            buffer: None,
        }
    }

    pub(crate) fn init_resources(&mut self, render: &Renderer) {
        if self.buffer.is_some() {
            return;
        }
        self.buffer = Some(
            render
                .device
                .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                    label: Some("line_buffer"),
                    contents: bytemuck::cast_slice(&self.vertices),
                    usage: wgpu::BufferUsages::VERTEX,
                }),
        );
    }

    pub(crate) fn render<'b, 'a: 'b>(
        &'a self,
        render_pass: &'b mut RenderPass<'a>,
        pipeline: &'a RenderPipeline,
    ) {
        let Some(buffer) = self.buffer.as_ref() else {
            return;
        };
        render_pass.set_pipeline(pipeline);
        render_pass.set_vertex_buffer(0, buffer.slice(..));
        render_pass.draw(0..self.vertices.len() as u32, 0..1);
    }
}

/// Flat disc facing up, as a center vertex plus a ring.
pub(crate) fn floor_disc(floor: &FloorConfig) -> ViewData {
    let segments = floor.segments.max(3);
    let up = [0.0, 1.0, 0.0];
    let mut vertices = vec![Vertex {
        point: [0.0, floor.y, 0.0],
        normal: up,
    }];
    for i in 0..=segments {
        let angle = i as f32 / segments as f32 * std::f32::consts::TAU;
        vertices.push(Vertex {
            point: [
                floor.radius * angle.cos(),
                floor.y,
                -floor.radius * angle.sin(),
            ],
            normal: up,
        });
    }
    let triangles = Vec::from_iter((1..=segments).flat_map(|i| [0, i, i + 1]));
    ViewData::new(
        vertices,
        triangles,
        Material {
            color: floor.color,
            roughness: floor.roughness,
            metalness: floor.metalness,
            env_intensity: floor.env_intensity,
        },
        Matrix4::from_scale(1.0),
    )
}

/// Square grid of `divisions` cells per side; the two center lines get
/// their own color.
pub(crate) fn grid_lines(grid: &GridConfig) -> Vec<LineVertex> {
    let divisions = grid.divisions.max(1);
    let half = grid.size / 2.0;
    let step = grid.size / divisions as f32;
    let center = divisions / 2;
    let mut vertices = Vec::with_capacity((divisions as usize + 1) * 4);
    for i in 0..=divisions {
        let k = -half + i as f32 * step;
        let rgb = if divisions % 2 == 0 && i == center {
            grid.center_color
        } else {
            grid.line_color
        };
        let color = [rgb[0], rgb[1], rgb[2], grid.opacity];
        for point in [
            [-half, grid.y, k],
            [half, grid.y, k],
            [k, grid.y, -half],
            [k, grid.y, half],
        ] {
            vertices.push(LineVertex { point, color });
        }
    }
    vertices
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Skin, ViewerConfig};
    use crate::model::PartMaterial;
    use approx::assert_relative_eq;

    #[test]
    fn uniform_layouts_are_vec4_aligned() {
        assert_eq!(std::mem::size_of::<DrawUniform>() % 16, 0);
        assert_eq!(std::mem::size_of::<Vertex>(), 24);
        assert_eq!(std::mem::size_of::<LineVertex>(), 28);
    }

    #[test]
    fn part_vertices_pair_positions_with_normals() {
        let part = MeshPart::new(
            vec![0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 0.0],
            None,
            vec![0, 1, 2],
            PartMaterial::default(),
        );
        let material = Material {
            color: [1.0, 1.0, 1.0, 1.0],
            roughness: 1.0,
            metalness: 0.0,
            env_intensity: 0.0,
        };
        let data = ViewData::from_part(&part, material, Matrix4::from_scale(1.0));
        assert_eq!(data.vertices.len(), 3);
        assert_eq!(data.triangles.len(), 3);
        assert_eq!(data.vertices[1].point, [1.0, 0.0, 0.0]);
        assert_eq!(data.vertices[1].normal, [0.0, 0.0, 1.0]);
        assert!(!data.transparent);
    }

    #[test]
    fn changes_mark_the_data_dirty() {
        let material = Material {
            color: [1.0, 1.0, 1.0, 0.5],
            roughness: 1.0,
            metalness: 0.0,
            env_intensity: 0.0,
        };
        let mut data = ViewData::new(vec![], vec![], material, Matrix4::from_scale(1.0));
        assert!(data.transparent);
        data.dirty = DirtyFlags::DIRTY_NONE;
        data.set_transform(Matrix4::from_scale(1.0));
        assert_eq!(data.dirty, DirtyFlags::DIRTY_NONE);
        data.set_transform(Matrix4::from_scale(2.0));
        assert!(data.dirty.contains(DirtyFlags::DIRTY_TRANSFORM));
        data.set_material(Material {
            roughness: 0.4,
            ..material
        });
        assert!(data.dirty.contains(DirtyFlags::DIRTY_MATERIAL));
    }

    #[test]
    fn fresh_data_needs_only_its_uniform_written() {
        let config = ViewerConfig::for_skin(Skin::Transparent);
        let data = floor_disc(config.floor.as_ref().unwrap());
        assert!(data.buffers.is_none());
        assert_eq!(data.dirty, DirtyFlags::DIRTY_ALL);
        assert_eq!(
            DirtyFlags::DIRTY_ALL,
            DirtyFlags::DIRTY_MATERIAL | DirtyFlags::DIRTY_TRANSFORM
        );
    }

    #[test]
    fn floor_is_a_closed_fan() {
        let config = ViewerConfig::for_skin(Skin::Transparent);
        let floor = floor_disc(config.floor.as_ref().unwrap());
        assert_eq!(floor.vertices.len(), 34);
        assert_eq!(floor.triangles.len(), 32 * 3);
        assert!(floor.transparent);
        let far = floor.vertices.iter().map(|v| v.point[0]).fold(f32::MIN, f32::max);
        assert_relative_eq!(far, 8.0);
        assert!(floor.vertices.iter().all(|v| v.point[1] == -0.5));
    }

    #[test]
    fn grid_has_two_lines_per_division_step() {
        let config = ViewerConfig::for_skin(Skin::Transparent);
        let grid = config.grid.unwrap();
        let lines = grid_lines(&grid);
        assert_eq!(lines.len(), 11 * 4);
        let centered = lines
            .iter()
            .filter(|v| v.color[..3] == grid.center_color[..])
            .count();
        assert_eq!(centered, 4);
        assert!(lines.iter().all(|v| v.color[3] == 0.2));
        assert!(lines.iter().all(|v| v.point[0].abs() <= 5.0 && v.point[2].abs() <= 5.0));
    }
}
