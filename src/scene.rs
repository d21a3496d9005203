use cgmath::{Matrix4, Rad, SquareMatrix};

use crate::{
    config::ViewerConfig,
    geometry::{normalize_with, FitOptions, Framing},
    model::ModelMesh,
};

/// A model owned by the scene together with its fit.
#[derive(Clone, Debug)]
pub struct LoadedModel {
    pub mesh: ModelMesh,
    pub framing: Framing,
}

impl LoadedModel {
    pub fn new(mesh: ModelMesh, fit: &FitOptions) -> Self {
        let framing = normalize_with(&mesh.bbox, fit);
        Self { mesh, framing }
    }
}

/// CPU side of what is on screen: at most one model and its spin.
pub struct Scene {
    model: Option<LoadedModel>,
    generation: u64,
    fit: FitOptions,
    rotation_step: f32,
    pub rotation_enabled: bool,
    pub rotation_speed: f32,
    rotation_angle: f32,
}

impl Scene {
    pub fn new(config: &ViewerConfig) -> Self {
        Self {
            model: None,
            generation: 0,
            fit: config.fit,
            rotation_step: config.rotation_step,
            rotation_enabled: config.rotation_enabled,
            rotation_speed: config.rotation_speed,
            rotation_angle: 0.0,
        }
    }

    /// Normalize `mesh` and make it the scene's only model. The previous model
    /// is handed back to the caller.
    pub fn replace_model(&mut self, mesh: ModelMesh) -> Option<LoadedModel> {
        let loaded = LoadedModel::new(mesh, &self.fit);
        self.generation += 1;
        self.rotation_angle = 0.0;
        self.model.replace(loaded)
    }

    pub fn model(&self) -> Option<&LoadedModel> {
        self.model.as_ref()
    }

    /// Changes whenever the model is replaced.
    #[inline]
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Advance the spin by one frame.
    pub fn tick(&mut self) {
        if self.rotation_enabled && self.model.is_some() {
            self.rotation_angle = (self.rotation_angle + self.rotation_step * self.rotation_speed)
                % std::f32::consts::TAU;
        }
    }

    pub fn toggle_rotation(&mut self) -> bool {
        self.rotation_enabled = !self.rotation_enabled;
        self.rotation_enabled
    }

    #[inline]
    pub fn rotation_angle(&self) -> f32 {
        self.rotation_angle
    }

    /// Model to world: scale and center first, then spin about the origin.
    pub fn model_matrix(&self) -> Matrix4<f32> {
        match &self.model {
            Some(model) => {
                Matrix4::from_angle_y(Rad(self.rotation_angle))
                    * Matrix4::from_translation(model.framing.translation)
                    * Matrix4::from_scale(model.framing.scale)
            }
            None => Matrix4::identity(),
        }
    }
}
