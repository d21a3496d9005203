//! Orbit camera controls: the camera circles a target point, never dips below
//! the horizon and stays within a distance band.

use std::f32::consts::{PI, TAU};

use cgmath::{InnerSpace, Matrix4, Point3, Vector3, Zero};

use crate::config::ControlsConfig;

const EPS: f32 = 1e-6;

#[derive(Clone, Copy, Debug, PartialEq)]
struct Spherical {
    radius: f32,
    /// Polar angle from +y.
    phi: f32,
    /// Azimuth around +y, measured from +z.
    theta: f32,
}

impl Spherical {
    fn from_offset(offset: Vector3<f32>) -> Self {
        let radius = offset.magnitude();
        if radius == 0.0 {
            return Self {
                radius,
                phi: 0.0,
                theta: 0.0,
            };
        }
        Self {
            radius,
            phi: (offset.y / radius).clamp(-1.0, 1.0).acos(),
            theta: offset.x.atan2(offset.z),
        }
    }

    fn to_offset(self) -> Vector3<f32> {
        let sin_phi = self.phi.sin();
        Vector3::new(
            self.radius * sin_phi * self.theta.sin(),
            self.radius * self.phi.cos(),
            self.radius * sin_phi * self.theta.cos(),
        )
    }
}

pub struct OrbitControls {
    config: ControlsConfig,
    fov: f32,
    pub position: Point3<f32>,
    pub target: Point3<f32>,
    position0: Point3<f32>,
    target0: Point3<f32>,

    delta_theta: f32,
    delta_phi: f32,
    scale: f32,
    pan_offset: Vector3<f32>,
}

impl OrbitControls {
    /// `fov` is the vertical field of view in radians, used to pan at the
    /// speed of the cursor.
    pub fn new(config: ControlsConfig, position: Point3<f32>, target: Point3<f32>, fov: f32) -> Self {
        Self {
            config,
            fov,
            position,
            target,
            position0: position,
            target0: target,
            delta_theta: 0.0,
            delta_phi: 0.0,
            scale: 1.0,
            pan_offset: Vector3::zero(),
        }
    }

    /// Drag by `(dx, dy)` pixels on a viewport `height` pixels tall. A drag
    /// across the full height turns the camera once around.
    pub fn rotate(&mut self, dx: f32, dy: f32, height: f32) {
        if height <= 0.0 {
            return;
        }
        self.delta_theta -= TAU * dx / height * self.config.rotate_speed;
        self.delta_phi -= TAU * dy / height * self.config.rotate_speed;
    }

    /// Positive `steps` move the camera closer.
    pub fn zoom(&mut self, steps: f32) {
        if steps == 0.0 {
            return;
        }
        let zoom_scale = 0.95f32.powf(self.config.zoom_speed);
        if steps > 0.0 {
            self.scale *= zoom_scale;
        } else {
            self.scale /= zoom_scale;
        }
    }

    /// Slide the target in the ground plane by a cursor drag.
    pub fn pan(&mut self, dx: f32, dy: f32, height: f32) {
        if height <= 0.0 {
            return;
        }
        let offset = self.position - self.target;
        let target_distance = offset.magnitude() * (self.fov / 2.0).tan();
        let forward = -offset;
        let right = forward.cross(Vector3::unit_y());
        if right.magnitude2() < EPS {
            return;
        }
        let right = right.normalize();
        let ahead = Vector3::unit_y().cross(right);

        let speed = self.config.pan_speed;
        self.pan_offset += right * (-2.0 * dx * target_distance / height * speed);
        self.pan_offset += ahead * (2.0 * dy * target_distance / height * speed);
    }

    /// Apply pending input. Returns whether the camera moved.
    pub fn update(&mut self) -> bool {
        let old_position = self.position;
        let old_target = self.target;
        let mut spherical = Spherical::from_offset(self.position - self.target);

        let damping = if self.config.enable_damping {
            self.config.damping_factor
        } else {
            1.0
        };
        spherical.theta += self.delta_theta * damping;
        spherical.phi += self.delta_phi * damping;
        spherical.phi = spherical
            .phi
            .clamp(self.config.min_polar_angle, self.config.max_polar_angle)
            .clamp(EPS, PI - EPS);
        spherical.radius = (spherical.radius * self.scale)
            .clamp(self.config.min_distance, self.config.max_distance);

        self.target += self.pan_offset * damping;
        self.position = self.target + spherical.to_offset();

        if self.config.enable_damping {
            let keep = 1.0 - damping;
            self.delta_theta *= keep;
            self.delta_phi *= keep;
            self.pan_offset *= keep;
        } else {
            self.delta_theta = 0.0;
            self.delta_phi = 0.0;
            self.pan_offset = Vector3::zero();
        }
        self.scale = 1.0;

        (self.position - old_position).magnitude2() > EPS
            || (self.target - old_target).magnitude2() > EPS
    }

    /// Remember the current camera as the reset state.
    pub fn save_state(&mut self) {
        self.position0 = self.position;
        self.target0 = self.target;
    }

    /// Back to the saved camera, dropping any motion in flight.
    pub fn reset(&mut self) {
        self.position = self.position0;
        self.target = self.target0;
        self.stop();
    }

    /// Jump to a framing chosen for a newly loaded model.
    pub fn frame(&mut self, position: Point3<f32>, target: Point3<f32>) {
        self.position = position;
        self.target = target;
        self.stop();
    }

    fn stop(&mut self) {
        self.delta_theta = 0.0;
        self.delta_phi = 0.0;
        self.scale = 1.0;
        self.pan_offset = Vector3::zero();
    }

    #[inline]
    pub fn distance(&self) -> f32 {
        (self.position - self.target).magnitude()
    }

    pub fn view_matrix(&self) -> Matrix4<f32> {
        Matrix4::look_at_rh(self.position, self.target, Vector3::unit_y())
    }
}
