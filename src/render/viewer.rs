use anyhow::Result;
use std::{cell::RefCell, rc::Rc};
use winit::dpi::PhysicalPosition;

use super::{
    render::Renderer,
    view_core::ViewCore,
    view_data::{floor_disc, grid_lines, LineData, Material, ViewData},
};
use crate::{
    config::ViewerConfig,
    controls::OrbitControls,
    environment::CubeFaces,
    model::{ModelMesh, PartMaterial},
    scene::Scene,
    stats::FrameStats,
};

/// Last cursor position of the drag in progress.
pub enum MousePressed {
    Left(Option<PhysicalPosition<f64>>),
    Right(Option<PhysicalPosition<f64>>),
    None,
}

enum EnvironmentState {
    /// The skin has no environment.
    Disabled,
    Pending,
    Ready(CubeFaces),
    Uploaded,
    /// Loading failed, the flat background stays.
    Fallback,
}

impl EnvironmentState {
    fn is_active(&self) -> bool {
        matches!(self, Self::Ready(_) | Self::Uploaded)
    }
}

pub struct Viewer {
    pub render: Rc<RefCell<Option<Renderer>>>,
    config: ViewerConfig,
    scene: Scene,
    controls: OrbitControls,
    view_core: Option<ViewCore>,

    model_data: Vec<ViewData>,
    uploaded_generation: u64,
    floor: Option<ViewData>,
    grid: Option<LineData>,
    environment: EnvironmentState,

    stats: FrameStats,
    pub pressed_state: MousePressed,
}

impl Viewer {
    pub fn new(render: Rc<RefCell<Option<Renderer>>>, config: ViewerConfig) -> Self {
        let controls = OrbitControls::new(
            config.controls,
            config.camera.position,
            config.camera.target,
            config.camera.fov_deg.to_radians(),
        );
        let environment = if config.environment.is_some() {
            EnvironmentState::Pending
        } else {
            EnvironmentState::Disabled
        };
        Self {
            render,
            scene: Scene::new(&config),
            controls,
            view_core: None,
            model_data: Vec::new(),
            uploaded_generation: 0,
            floor: config.floor.as_ref().map(floor_disc),
            grid: config.grid.as_ref().map(|grid| LineData::new(grid_lines(grid))),
            environment,
            stats: FrameStats::default(),
            pressed_state: MousePressed::None,
            config,
        }
    }

    #[inline]
    pub fn config(&self) -> &ViewerConfig {
        &self.config
    }

    /// Show `mesh` instead of the current model and frame the camera on it.
    pub fn set_model(&mut self, mesh: ModelMesh) {
        let name = mesh.name.clone();
        let n_triangles = mesh.n_triangles();
        if let Some(previous) = self.scene.replace_model(mesh) {
            leptos::logging::log!("replacing model {}", previous.mesh.name);
        }
        if let Some(model) = self.scene.model() {
            let framing = &model.framing;
            self.controls
                .frame(framing.camera_position, framing.camera_target);
            leptos::logging::log!(
                "loaded {} ({} triangles, scale {:.4})",
                name,
                n_triangles,
                framing.scale
            );
        }
    }

    pub fn has_model(&self) -> bool {
        self.scene.model().is_some()
    }

    /// Back to the initial camera.
    pub fn reset_camera(&mut self) {
        self.controls.reset();
    }

    pub fn set_rotation_speed(&mut self, speed: f32) {
        if speed.is_finite() {
            self.scene.rotation_speed = speed.max(0.0);
        }
    }

    #[inline]
    pub fn rotation_speed(&self) -> f32 {
        self.scene.rotation_speed
    }

    /// Returns whether the model rotates now.
    pub fn toggle_rotation(&mut self) -> bool {
        self.scene.toggle_rotation()
    }

    #[inline]
    pub fn rotation_enabled(&self) -> bool {
        self.scene.rotation_enabled
    }

    /// Hand over the fetched cube map, or `None` when loading failed.
    pub fn set_environment(&mut self, faces: Option<CubeFaces>) {
        if matches!(self.environment, EnvironmentState::Disabled) {
            return;
        }
        self.environment = match faces {
            Some(faces) => EnvironmentState::Ready(faces),
            None => EnvironmentState::Fallback,
        };
        let materials = Vec::from_iter(
            self.scene
                .model()
                .into_iter()
                .flat_map(|model| model.mesh.parts.iter())
                .map(|part| self.model_material(&part.material)),
        );
        for (data, material) in self.model_data.iter_mut().zip(materials) {
            data.set_material(material);
        }
    }

    #[inline]
    pub fn fps(&self) -> u32 {
        self.stats.fps()
    }

    fn model_material(&self, part: &PartMaterial) -> Material {
        match &self.config.environment {
            Some(env) if self.environment.is_active() => Material {
                color: part.color,
                roughness: env.model_roughness,
                metalness: env.model_metalness,
                env_intensity: env.model_intensity,
            },
            _ => Material {
                color: part.color,
                roughness: part.roughness,
                metalness: part.metalness,
                env_intensity: 0.0,
            },
        }
    }

    /// Rebuild the per-part draw data after the model changed. The old
    /// buffers are dropped with the old data.
    fn sync_model_data(&mut self) {
        if self.scene.generation() == self.uploaded_generation {
            return;
        }
        let transform = self.scene.model_matrix();
        let model_data = match self.scene.model() {
            Some(model) => Vec::from_iter(model.mesh.parts.iter().map(|part| {
                ViewData::from_part(part, self.model_material(&part.material), transform)
            })),
            None => Vec::new(),
        };
        self.model_data = model_data;
        self.uploaded_generation = self.scene.generation();
    }

    pub fn render(&mut self) -> Result<()> {
        let render_cell = self.render.clone();
        let render = render_cell.borrow();
        let Some(render) = render.as_ref() else {
            return Ok(());
        };

        self.scene.tick();
        self.controls.update();
        self.sync_model_data();

        let view_core = self.view_core.get_or_insert_with(|| ViewCore::new(render));
        if let EnvironmentState::Ready(faces) = &self.environment {
            view_core.set_environment(render, faces);
            self.environment = EnvironmentState::Uploaded;
        }

        let transform = self.scene.model_matrix();
        for data in self.model_data.iter_mut() {
            data.set_transform(transform);
            data.sync(render, &view_core.draw_layout);
        }
        if let Some(floor) = self.floor.as_mut() {
            floor.sync(render, &view_core.draw_layout);
        }
        if let Some(grid) = self.grid.as_mut() {
            grid.init_resources(render);
        }
        view_core.update(
            render,
            &self.controls,
            &self.config.camera,
            &self.config.lights,
        );
        let view_core: &ViewCore = view_core;

        let clear = if view_core.has_environment() {
            wgpu::Color::BLACK
        } else {
            let [r, g, b, a] = self.config.background.map(f64::from);
            wgpu::Color {
                r: r * a,
                g: g * a,
                b: b * a,
                a,
            }
        };

        let texture = render.surface.get_current_texture()?;
        let view = texture
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());
        let mut encoder = render
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor { label: None });
        {
            let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: None,
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(clear),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: &render.depth_texture_view,
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(1.0),
                        store: wgpu::StoreOp::Discard,
                    }),
                    stencil_ops: None,
                }),
                timestamp_writes: None,
                occlusion_query_set: None,
            });
            render_pass.set_viewport(0.0, 0.0, render.w() as f32, render.h() as f32, 0.0, 1.0);
            view_core.bind(&mut render_pass);
            view_core.render_sky(&mut render_pass);

            let (transparent, opaque): (Vec<&ViewData>, Vec<&ViewData>) = self
                .floor
                .iter()
                .chain(self.model_data.iter())
                .partition(|data| data.transparent);
            for data in opaque {
                data.render(&mut render_pass, &view_core.mesh_pipeline);
            }
            if let Some(grid) = self.grid.as_ref() {
                grid.render(&mut render_pass, &view_core.line_pipeline);
            }
            for data in transparent {
                data.render(&mut render_pass, &view_core.transparent_pipeline);
            }
        }

        render.queue.submit(std::iter::once(encoder.finish()));
        texture.present();
        self.stats.frame(now_ms());
        Ok(())
    }

    pub fn mouse_move(&mut self, pos: PhysicalPosition<f64>) {
        let height = self
            .render
            .borrow()
            .as_ref()
            .map_or(0.0, |render| render.h() as f32);
        match &mut self.pressed_state {
            MousePressed::Left(last) => {
                if let Some(prev) = last.replace(pos) {
                    self.controls.rotate(
                        (pos.x - prev.x) as f32,
                        (pos.y - prev.y) as f32,
                        height,
                    );
                }
            }
            MousePressed::Right(last) => {
                if let Some(prev) = last.replace(pos) {
                    self.controls
                        .pan((pos.x - prev.x) as f32, (pos.y - prev.y) as f32, height);
                }
            }
            MousePressed::None => {}
        }
    }

    /// Positive `delta_y` (wheel up) moves the camera closer.
    pub fn mouse_scroll(&mut self, delta_y: f64) {
        if delta_y != 0.0 {
            self.controls.zoom(delta_y.signum() as f32);
        }
    }
}

fn now_ms() -> f64 {
    web_sys::window()
        .and_then(|window| window.performance())
        .map_or_else(js_sys::Date::now, |performance| performance.now())
}
