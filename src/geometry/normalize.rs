use cgmath::{Point3, Vector3, Zero};

use super::BBox;

/// Largest dimension of a loaded model after normalization.
pub const DEFAULT_TARGET_SIZE: f32 = 2.5;

/// Where a model goes and where the camera looks once it is loaded.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Framing {
    pub scale: f32,
    pub translation: Vector3<f32>,
    pub camera_position: Point3<f32>,
    pub camera_target: Point3<f32>,
    /// Size of the model after scaling.
    pub size: Vector3<f32>,
}

/// Camera placement relative to the normalized model size.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FitOptions {
    pub target_size: f32,
    /// Camera height as a multiple of the scaled model height.
    pub camera_height: f32,
    /// Camera distance as a multiple of the scaled model depth.
    pub camera_distance: f32,
    /// Look-at height as a multiple of the scaled model height.
    pub target_height: f32,
}

impl Default for FitOptions {
    fn default() -> Self {
        Self {
            target_size: DEFAULT_TARGET_SIZE,
            camera_height: 1.2,
            camera_distance: 2.0,
            target_height: 0.2,
        }
    }
}

/// Fit a model with bounds `bbox` into a cube of edge `target_size` centered
/// at the origin, and frame the camera on it.
///
/// A box with no extent (empty, a single point, or non-finite) keeps its
/// original scale.
pub fn normalize(bbox: &BBox, target_size: f32) -> Framing {
    normalize_with(
        bbox,
        &FitOptions {
            target_size,
            ..Default::default()
        },
    )
}

pub fn normalize_with(bbox: &BBox, options: &FitOptions) -> Framing {
    let target_size = options.target_size;
    let usable = !bbox.is_empty() && is_finite(&bbox.min) && is_finite(&bbox.max);
    let max_dim = if usable { bbox.max_len() } else { 0.0 };
    let degenerate = !(max_dim.is_finite() && max_dim > 0.0);
    let scale = if degenerate || !target_size.is_finite() || target_size <= 0.0 {
        1.0
    } else {
        target_size / max_dim
    };

    let center = if usable {
        bbox.center()
    } else {
        Vector3::zero()
    };
    let translation = if is_finite(&center) {
        -center * scale
    } else {
        Vector3::zero()
    };

    let size = if degenerate {
        Vector3::zero()
    } else {
        bbox.size() * scale
    };
    // The z floor keeps flat models from putting the camera straight above
    // the target.
    let floor = if target_size.is_finite() && target_size > 0.0 {
        target_size
    } else {
        DEFAULT_TARGET_SIZE
    };
    let camera_position = Point3::new(
        0.0,
        size.y * options.camera_height,
        (size.z * options.camera_distance).max(floor),
    );
    let camera_target = Point3::new(0.0, size.y * options.target_height, 0.0);

    Framing {
        scale,
        translation,
        camera_position,
        camera_target,
        size,
    }
}

#[inline]
fn is_finite(v: &Vector3<f32>) -> bool {
    v.x.is_finite() && v.y.is_finite() && v.z.is_finite()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn apply(framing: &Framing, p: Vector3<f32>) -> Vector3<f32> {
        p * framing.scale + framing.translation
    }

    #[test]
    fn max_dimension_matches_target() {
        let bbox = BBox::new(Vector3::new(10.0, -4.0, 3.0), Vector3::new(30.0, 6.0, 8.0));
        let framing = normalize(&bbox, 2.5);
        let min = apply(&framing, bbox.min);
        let max = apply(&framing, bbox.max);
        let normalized = BBox::new(min, max);
        assert_relative_eq!(normalized.max_len(), 2.5, epsilon = 1e-5);
        assert_relative_eq!(framing.scale, 0.125);
    }

    #[test]
    fn center_lands_on_origin() {
        let bbox = BBox::new(Vector3::new(-7.0, 2.0, 100.0), Vector3::new(-1.0, 5.0, 104.0));
        let framing = normalize(&bbox, 1.0);
        let center = apply(&framing, bbox.center());
        assert_relative_eq!(center.x, 0.0, epsilon = 1e-5);
        assert_relative_eq!(center.y, 0.0, epsilon = 1e-5);
        assert_relative_eq!(center.z, 0.0, epsilon = 1e-5);
    }

    #[test]
    fn camera_follows_scaled_proportions() {
        let bbox = BBox::new(Vector3::new(0.0, 0.0, 0.0), Vector3::new(2.0, 4.0, 8.0));
        let framing = normalize(&bbox, 4.0);
        assert_relative_eq!(framing.size.y, 2.0);
        assert_relative_eq!(framing.camera_position.y, 2.4);
        assert_relative_eq!(framing.camera_position.z, 8.0);
        assert_relative_eq!(framing.camera_target.y, 0.4);
    }

    #[test]
    fn flat_model_keeps_camera_off_the_vertical_axis() {
        let bbox = BBox::new(Vector3::new(-1.0, -1.0, 0.0), Vector3::new(1.0, 1.0, 0.0));
        let framing = normalize(&bbox, 2.5);
        assert_relative_eq!(framing.camera_position.z, 2.5);
    }

    #[test]
    fn point_sized_model_keeps_unit_scale() {
        let p = Vector3::new(3.0, 3.0, 3.0);
        let framing = normalize(&BBox::new(p, p), 2.5);
        assert_eq!(framing.scale, 1.0);
        let center = apply(&framing, p);
        assert_relative_eq!(center.x, 0.0);
    }

    #[test]
    fn empty_or_broken_boxes_stay_finite() {
        for bbox in [
            BBox::default(),
            BBox::new(Vector3::new(0.0, 0.0, 0.0), Vector3::new(f32::INFINITY, 1.0, 1.0)),
            BBox::new(Vector3::new(f32::NAN, 0.0, 0.0), Vector3::new(1.0, 1.0, 1.0)),
        ] {
            let framing = normalize(&bbox, 2.5);
            assert!(framing.scale.is_finite());
            assert_eq!(framing.scale, 1.0);
            assert!(is_finite(&framing.translation));
            assert!(framing.camera_position.z.is_finite());
        }
    }

    #[test]
    fn fit_options_shape_the_camera() {
        let bbox = BBox::new(Vector3::new(0.0, 0.0, 0.0), Vector3::new(1.0, 1.0, 1.0));
        let options = FitOptions {
            target_size: 5.0,
            camera_height: 1.5,
            camera_distance: 2.0,
            target_height: 0.5,
        };
        let framing = normalize_with(&bbox, &options);
        assert_relative_eq!(framing.scale, 5.0);
        assert_relative_eq!(framing.camera_position.y, 7.5);
        assert_relative_eq!(framing.camera_position.z, 10.0);
        assert_relative_eq!(framing.camera_target.y, 2.5);
    }

    #[test]
    fn invalid_target_size_falls_back_to_unit_scale() {
        let bbox = BBox::new(Vector3::new(0.0, 0.0, 0.0), Vector3::new(1.0, 1.0, 1.0));
        assert_eq!(normalize(&bbox, 0.0).scale, 1.0);
        assert_eq!(normalize(&bbox, f32::NAN).scale, 1.0);
    }
}
