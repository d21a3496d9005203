use cgmath::{Matrix4, Point3, Transform, Vector3};

mod normalize;

pub use normalize::{normalize, normalize_with, FitOptions, Framing, DEFAULT_TARGET_SIZE};

/// Axis aligned box. The default box is empty: `min` holds `f32::MAX` and
/// `max` holds `f32::MIN` so that the first merged point defines both corners.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BBox {
    pub min: Vector3<f32>,
    pub max: Vector3<f32>,
}

impl Default for BBox {
    fn default() -> Self {
        Self {
            min: Vector3::new(f32::MAX, f32::MAX, f32::MAX),
            max: Vector3::new(f32::MIN, f32::MIN, f32::MIN),
        }
    }
}

impl BBox {
    pub fn new(min: Vector3<f32>, max: Vector3<f32>) -> Self {
        Self { min, max }
    }

    /// Box over a flat `[x, y, z, x, y, z, ...]` buffer.
    pub fn from_points(points: &[f32]) -> Self {
        let mut bbox = Self::default();
        for p in points.chunks_exact(3) {
            bbox.merge(&Vector3::new(p[0], p[1], p[2]));
        }
        bbox
    }

    #[inline]
    pub fn merge(&mut self, point: &Vector3<f32>) {
        self.min.x = self.min.x.min(point.x);
        self.min.y = self.min.y.min(point.y);
        self.min.z = self.min.z.min(point.z);
        self.max.x = self.max.x.max(point.x);
        self.max.y = self.max.y.max(point.y);
        self.max.z = self.max.z.max(point.z);
    }

    #[inline]
    pub fn merge_box(&mut self, other: &BBox) {
        if other.is_empty() {
            return;
        }
        self.merge(&other.min);
        self.merge(&other.max);
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.min.x > self.max.x || self.min.y > self.max.y || self.min.z > self.max.z
    }

    #[inline]
    pub fn center(&self) -> Vector3<f32> {
        (self.min + self.max) / 2.0
    }

    #[inline]
    pub fn size(&self) -> Vector3<f32> {
        self.max - self.min
    }

    #[inline]
    pub fn max_len(&self) -> f32 {
        let size = self.size();
        size.x.max(size.y).max(size.z)
    }

    /// Box around the eight transformed corners.
    pub fn transformed(&self, mat: &Matrix4<f32>) -> BBox {
        if self.is_empty() {
            return *self;
        }
        let mut bbox = BBox::default();
        for i in 0..8 {
            let corner = Point3::new(
                if i & 1 == 0 { self.min.x } else { self.max.x },
                if i & 2 == 0 { self.min.y } else { self.max.y },
                if i & 4 == 0 { self.min.z } else { self.max.z },
            );
            let p = mat.transform_point(corner);
            bbox.merge(&Vector3::new(p.x, p.y, p.z));
        }
        bbox
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn default_box_is_empty() {
        let bbox = BBox::default();
        assert!(bbox.is_empty());
        assert!(BBox::from_points(&[]).is_empty());
    }

    #[test]
    fn from_points_takes_componentwise_extents() {
        let bbox = BBox::from_points(&[1.0, -2.0, 3.0, -1.0, 4.0, 0.5, 0.0, 0.0, 9.0]);
        assert_eq!(bbox.min, Vector3::new(-1.0, -2.0, 0.5));
        assert_eq!(bbox.max, Vector3::new(1.0, 4.0, 9.0));
        assert_relative_eq!(bbox.max_len(), 8.5);
    }

    #[test]
    fn merging_an_empty_box_changes_nothing() {
        let mut bbox = BBox::new(Vector3::new(0.0, 0.0, 0.0), Vector3::new(1.0, 1.0, 1.0));
        bbox.merge_box(&BBox::default());
        assert_eq!(bbox.max, Vector3::new(1.0, 1.0, 1.0));
        assert_eq!(bbox.min, Vector3::new(0.0, 0.0, 0.0));
    }

    #[test]
    fn transformed_box_follows_scale_and_translation() {
        let bbox = BBox::new(Vector3::new(-1.0, -1.0, -1.0), Vector3::new(1.0, 1.0, 1.0));
        let mat = Matrix4::from_translation(Vector3::new(2.0, 0.0, 0.0)) * Matrix4::from_scale(3.0);
        let moved = bbox.transformed(&mat);
        assert_relative_eq!(moved.min.x, -1.0);
        assert_relative_eq!(moved.max.x, 5.0);
        assert_relative_eq!(moved.max.y, 3.0);
    }
}
