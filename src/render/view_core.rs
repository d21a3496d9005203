use cgmath::{Deg, InnerSpace, Matrix3, Matrix4, SquareMatrix};
use wgpu::{
    util::DeviceExt, BindGroup, BindGroupLayout, Buffer, CompareFunction, RenderPipeline, Sampler,
    TextureView,
};

use super::{
    render::{Renderer, DEPTH_FORMAT},
    view_data::{LineVertex, Vertex},
};
use crate::{
    config::{CameraConfig, LightRig},
    controls::OrbitControls,
    environment::CubeFaces,
};

const SHADER: &str = include_str!("shader.wgsl");
const VS_MESH: &str = "vs_main";
const FS_MESH: &str = "fs_main";
const VS_LINE: &str = "vs_line";
const FS_LINE: &str = "fs_line";
const VS_SKY: &str = "vs_sky";
const FS_SKY: &str = "fs_sky";

#[rustfmt::skip]
const OPENGL_TO_WGPU_MATRIX: Matrix4<f32> = Matrix4::new(
    1.0, 0.0, 0.0, 0.0,
    0.0, 1.0, 0.0, 0.0,
    0.0, 0.0, 0.5, 0.0,
    0.0, 0.0, 0.5, 1.0,
);

/// Per-frame camera and lighting. WebGL has no unaligned uniform
/// bindings, so everything is a vec4 or a mat4.
#[repr(C)]
#[derive(Copy, Clone, Debug, bytemuck::Pod, bytemuck::Zeroable)]
struct SceneUniform {
    view_proj: [[f32; 4]; 4],
    /// Inverse of the projection times the rotation part of the view.
    inv_view_proj: [[f32; 4]; 4],
    camera_position: [f32; 4],
    /// Direction towards each light, intensity in `w`.
    light_dirs: [[f32; 4]; 3],
    light_colors: [[f32; 4]; 3],
    /// Color, intensity in `w`.
    ambient: [f32; 4],
    /// `x` is 1 once a cube map is bound.
    env: [f32; 4],
}

impl SceneUniform {
    fn new(
        controls: &OrbitControls,
        camera: &CameraConfig,
        lights: &LightRig,
        aspect: f32,
        has_environment: bool,
    ) -> Self {
        let view = controls.view_matrix();
        let proj = OPENGL_TO_WGPU_MATRIX
            * cgmath::perspective(Deg(camera.fov_deg), aspect, camera.near, camera.far);
        let rotation = Matrix4::from(Matrix3::from_cols(
            view.x.truncate(),
            view.y.truncate(),
            view.z.truncate(),
        ));
        let inv_view_proj = (proj * rotation).invert().unwrap_or(Matrix4::identity());

        let mut light_dirs = [[0.0; 4]; 3];
        let mut light_colors = [[0.0; 4]; 3];
        for (i, light) in lights.lights().into_iter().enumerate() {
            let dir = if light.position.magnitude2() > 0.0 {
                light.position.normalize()
            } else {
                light.position
            };
            light_dirs[i] = [dir.x, dir.y, dir.z, light.intensity];
            light_colors[i] = [light.color[0], light.color[1], light.color[2], 1.0];
        }
        let [r, g, b] = lights.ambient_color;

        Self {
            view_proj: (proj * view).into(),
            inv_view_proj: inv_view_proj.into(),
            camera_position: [
                controls.position.x,
                controls.position.y,
                controls.position.z,
                1.0,
            ],
            light_dirs,
            light_colors,
            ambient: [r, g, b, lights.ambient_intensity],
            env: [if has_environment { 1.0 } else { 0.0 }, 0.0, 0.0, 0.0],
        }
    }
}

fn uniform_entry(binding: u32, visibility: wgpu::ShaderStages) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility,
        ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Uniform,
            has_dynamic_offset: false,
            min_binding_size: None,
        },
        count: None,
    }
}

/// Upload six square RGBA faces as a cube texture.
fn create_cube_texture(render: &Renderer, size: u32, faces: &[&[u8]]) -> TextureView {
    let extent = wgpu::Extent3d {
        width: size,
        height: size,
        depth_or_array_layers: 6,
    };
    let texture = render.device.create_texture(&wgpu::TextureDescriptor {
        label: Some("environment_texture"),
        size: extent,
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: wgpu::TextureFormat::Rgba8Unorm,
        usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
        view_formats: &[],
    });
    for (layer, face) in faces.iter().enumerate() {
        render.queue.write_texture(
            wgpu::ImageCopyTexture {
                texture: &texture,
                mip_level: 0,
                origin: wgpu::Origin3d {
                    x: 0,
                    y: 0,
                    z: layer as u32,
                },
                aspect: wgpu::TextureAspect::All,
            },
            face,
            wgpu::ImageDataLayout {
                offset: 0,
                bytes_per_row: Some(4 * size),
                rows_per_image: Some(size),
            },
            wgpu::Extent3d {
                width: size,
                height: size,
                depth_or_array_layers: 1,
            },
        );
    }
    texture.create_view(&wgpu::TextureViewDescriptor {
        label: Some("environment_view"),
        dimension: Some(wgpu::TextureViewDimension::Cube),
        ..Default::default()
    })
}

/// Shared GPU state: scene uniforms, the environment cube map and the
/// pipelines every drawable goes through.
pub(crate) struct ViewCore {
    scene_layout: BindGroupLayout,
    pub(crate) draw_layout: BindGroupLayout,
    scene_buffer: Buffer,
    scene_bind_group: BindGroup,
    sampler: Sampler,
    has_environment: bool,

    pub(crate) mesh_pipeline: RenderPipeline,
    pub(crate) transparent_pipeline: RenderPipeline,
    pub(crate) line_pipeline: RenderPipeline,
    sky_pipeline: RenderPipeline,
}

impl ViewCore {
    pub(crate) fn new(render: &Renderer) -> Self {
        let device = &render.device;
        let scene_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("scene_bind_group_layout"),
            entries: &[
                uniform_entry(0, wgpu::ShaderStages::VERTEX_FRAGMENT),
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Float { filterable: true },
                        view_dimension: wgpu::TextureViewDimension::Cube,
                        multisampled: false,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 2,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
            ],
        });
        let draw_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("draw_bind_group_layout"),
            entries: &[uniform_entry(0, wgpu::ShaderStages::VERTEX_FRAGMENT)],
        });

        let scene_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("scene_buffer"),
            contents: bytemuck::cast_slice(&[<SceneUniform as bytemuck::Zeroable>::zeroed()]),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });
        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("environment_sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            ..Default::default()
        });
        // Black placeholder until a real cube map arrives.
        let black: &[u8] = &[0, 0, 0, 255];
        let placeholder = create_cube_texture(render, 1, &[black; 6]);
        let scene_bind_group =
            Self::create_scene_bind_group(render, &scene_layout, &scene_buffer, &placeholder, &sampler);

        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("shader"),
            source: wgpu::ShaderSource::Wgsl(SHADER.into()),
        });
        let mesh_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("mesh_pipeline_layout"),
            bind_group_layouts: &[&scene_layout, &draw_layout],
            push_constant_ranges: &[],
        });
        let scene_only_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("scene_pipeline_layout"),
            bind_group_layouts: &[&scene_layout],
            push_constant_ranges: &[],
        });

        let color_targets = [Some(wgpu::ColorTargetState {
            format: render.config.format,
            blend: Some(wgpu::BlendState::PREMULTIPLIED_ALPHA_BLENDING),
            write_mask: wgpu::ColorWrites::ALL,
        })];
        let depth = |write: bool, compare: CompareFunction| {
            Some(wgpu::DepthStencilState {
                format: DEPTH_FORMAT,
                depth_write_enabled: write,
                depth_compare: compare,
                stencil: wgpu::StencilState::default(),
                bias: wgpu::DepthBiasState::default(),
            })
        };

        let mesh_desc = wgpu::RenderPipelineDescriptor {
            label: Some("mesh_pipeline"),
            layout: Some(&mesh_layout),
            cache: None,
            vertex: wgpu::VertexState {
                module: &shader,
                entry_point: VS_MESH,
                compilation_options: Default::default(),
                buffers: &[Vertex::desc()],
            },
            fragment: Some(wgpu::FragmentState {
                module: &shader,
                entry_point: FS_MESH,
                compilation_options: Default::default(),
                targets: &color_targets,
            }),
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                front_face: wgpu::FrontFace::Ccw,
                // Double sided.
                cull_mode: None,
                ..Default::default()
            },
            depth_stencil: depth(true, CompareFunction::Less),
            multisample: wgpu::MultisampleState::default(),
            multiview: None,
        };
        let mesh_pipeline = device.create_render_pipeline(&mesh_desc);

        let mut transparent_desc = mesh_desc.clone();
        transparent_desc.label = Some("transparent_pipeline");
        transparent_desc.depth_stencil = depth(false, CompareFunction::Less);
        let transparent_pipeline = device.create_render_pipeline(&transparent_desc);

        let line_pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("line_pipeline"),
            layout: Some(&scene_only_layout),
            cache: None,
            vertex: wgpu::VertexState {
                module: &shader,
                entry_point: VS_LINE,
                compilation_options: Default::default(),
                buffers: &[LineVertex::desc()],
            },
            fragment: Some(wgpu::FragmentState {
                module: &shader,
                entry_point: FS_LINE,
                compilation_options: Default::default(),
                targets: &color_targets,
            }),
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::LineList,
                ..Default::default()
            },
            depth_stencil: depth(false, CompareFunction::Less),
            multisample: wgpu::MultisampleState::default(),
            multiview: None,
        });

        let sky_pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("sky_pipeline"),
            layout: Some(&scene_only_layout),
            cache: None,
            vertex: wgpu::VertexState {
                module: &shader,
                entry_point: VS_SKY,
                compilation_options: Default::default(),
                buffers: &[],
            },
            fragment: Some(wgpu::FragmentState {
                module: &shader,
                entry_point: FS_SKY,
                compilation_options: Default::default(),
                targets: &color_targets,
            }),
            primitive: wgpu::PrimitiveState::default(),
            depth_stencil: depth(false, CompareFunction::Always),
            multisample: wgpu::MultisampleState::default(),
            multiview: None,
        });

        Self {
            scene_layout,
            draw_layout,
            scene_buffer,
            scene_bind_group,
            sampler,
            has_environment: false,
            mesh_pipeline,
            transparent_pipeline,
            line_pipeline,
            sky_pipeline,
        }
    }

    fn create_scene_bind_group(
        render: &Renderer,
        layout: &BindGroupLayout,
        buffer: &Buffer,
        environment: &TextureView,
        sampler: &Sampler,
    ) -> BindGroup {
        render.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("scene_bind_group"),
            layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::TextureView(environment),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: wgpu::BindingResource::Sampler(sampler),
                },
            ],
        })
    }

    pub(crate) fn set_environment(&mut self, render: &Renderer, cube: &CubeFaces) {
        let faces = Vec::from_iter(cube.faces.iter().map(Vec::as_slice));
        let view = create_cube_texture(render, cube.size, &faces);
        self.scene_bind_group = Self::create_scene_bind_group(
            render,
            &self.scene_layout,
            &self.scene_buffer,
            &view,
            &self.sampler,
        );
        self.has_environment = true;
    }

    #[inline]
    pub(crate) fn has_environment(&self) -> bool {
        self.has_environment
    }

    pub(crate) fn update(
        &self,
        render: &Renderer,
        controls: &OrbitControls,
        camera: &CameraConfig,
        lights: &LightRig,
    ) {
        let aspect = render.w() as f32 / render.h().max(1) as f32;
        let uniform = SceneUniform::new(controls, camera, lights, aspect, self.has_environment);
        render
            .queue
            .write_buffer(&self.scene_buffer, 0, bytemuck::cast_slice(&[uniform]));
    }

    pub(crate) fn bind<'b, 'a: 'b>(&'a self, render_pass: &'b mut wgpu::RenderPass<'a>) {
        render_pass.set_bind_group(0, &self.scene_bind_group, &[]);
    }

    /// Environment as background. Drawn first, it ignores and keeps the
    /// depth buffer.
    pub(crate) fn render_sky<'b, 'a: 'b>(&'a self, render_pass: &'b mut wgpu::RenderPass<'a>) {
        if !self.has_environment {
            return;
        }
        render_pass.set_pipeline(&self.sky_pipeline);
        render_pass.draw(0..3, 0..1);
    }
}
