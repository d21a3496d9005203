//! Model loading: format detection, OBJ and GLTF/GLB parsing into flat
//! world-space mesh parts.
//!
//! Parsing is delegated to `tobj` and `gltf`. Whatever the source format, a
//! loaded model ends up as a list of [`MeshPart`]s whose positions already
//! include every node transform, so the bounding box of the parts is the
//! world-space bounding box of the model.

use std::fmt;

use cgmath::{InnerSpace, Vector3};
use rand::{
    distributions::{Distribution, Uniform},
    rngs::SmallRng,
    SeedableRng,
};
use thiserror::Error;

use crate::geometry::BBox;

mod gltf;
mod obj;

/// Extensions offered by the file picker.
pub const ACCEPTED_EXTENSIONS: &str = ".gltf,.glb,.obj";

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("Unsupported file format: {0}")]
    UnsupportedFormat(String),
    #[error("Failed to read file: {0}")]
    Read(String),
    #[error("Failed to parse OBJ model: {0}")]
    Obj(#[from] tobj::LoadError),
    #[error("Failed to parse GLTF model: {0}")]
    Gltf(#[from] ::gltf::Error),
    #[error("Model contains no renderable geometry")]
    EmptyModel,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ModelFormat {
    Gltf,
    Glb,
    Obj,
}

impl ModelFormat {
    pub fn from_file_name(name: &str) -> Result<Self, LoadError> {
        let lower = name.to_lowercase();
        if lower.ends_with(".gltf") {
            Ok(Self::Gltf)
        } else if lower.ends_with(".glb") {
            Ok(Self::Glb)
        } else if lower.ends_with(".obj") {
            Ok(Self::Obj)
        } else {
            Err(LoadError::UnsupportedFormat(name.to_owned()))
        }
    }
}

impl fmt::Display for ModelFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Gltf => write!(f, "GLTF"),
            Self::Glb => write!(f, "GLB"),
            Self::Obj => write!(f, "OBJ"),
        }
    }
}

/// Surface parameters of one mesh part.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PartMaterial {
    pub color: [f32; 4],
    pub roughness: f32,
    pub metalness: f32,
}

impl Default for PartMaterial {
    fn default() -> Self {
        Self {
            color: [0.8, 0.8, 0.8, 1.0],
            roughness: 1.0,
            metalness: 0.0,
        }
    }
}

/// One indexed triangle mesh in model space.
#[derive(Clone, Debug)]
pub struct MeshPart {
    pub positions: Vec<f32>,
    pub normals: Vec<f32>,
    pub indices: Vec<u32>,
    pub material: PartMaterial,
}

impl MeshPart {
    /// Build a part, generating flat normals when none are supplied.
    ///
    /// Indices that point past the position buffer and trailing incomplete
    /// triangles are dropped.
    pub fn new(
        positions: Vec<f32>,
        normals: Option<Vec<f32>>,
        indices: Vec<u32>,
        material: PartMaterial,
    ) -> Self {
        let n_points = (positions.len() / 3) as u32;
        let indices = Vec::from_iter(
            indices
                .chunks_exact(3)
                .filter(|tri| tri.iter().all(|idx| *idx < n_points))
                .flatten()
                .copied(),
        );
        match normals {
            Some(normals) if normals.len() == positions.len() => Self {
                positions,
                normals,
                indices,
                material,
            },
            _ => flat_shaded(&positions, &indices, material),
        }
    }

    #[inline]
    pub fn n_triangles(&self) -> usize {
        self.indices.len() / 3
    }

    /// Box over the referenced points. Indices with no point behind them
    /// are skipped, since the fields can be edited after `new`.
    pub fn bbox(&self) -> BBox {
        let mut bbox = BBox::default();
        for idx in &self.indices {
            let start = *idx as usize * 3;
            if let Some(p) = self.positions.get(start..start + 3) {
                bbox.merge(&Vector3::new(p[0], p[1], p[2]));
            }
        }
        bbox
    }
}

/// Un-weld the triangles so that each one carries its own face normal.
fn flat_shaded(points: &[f32], triangles: &[u32], material: PartMaterial) -> MeshPart {
    let point = |idx: u32| {
        let start = idx as usize * 3;
        Vector3::new(points[start], points[start + 1], points[start + 2])
    };
    let mut positions = Vec::with_capacity(triangles.len() * 3);
    let mut normals = Vec::with_capacity(triangles.len() * 3);
    for tri in triangles.chunks_exact(3) {
        let verts = [point(tri[0]), point(tri[1]), point(tri[2])];
        let normal = (verts[1] - verts[0]).cross(verts[2] - verts[0]);
        let normal = if normal.magnitude2() > 0.0 {
            normal.normalize()
        } else {
            Vector3::unit_y()
        };
        for v in verts {
            positions.extend_from_slice(&[v.x, v.y, v.z]);
            normals.extend_from_slice(&[normal.x, normal.y, normal.z]);
        }
    }
    let indices = Vec::from_iter(0..(positions.len() / 3) as u32);
    MeshPart {
        positions,
        normals,
        indices,
        material,
    }
}

/// Pastel color for parts that come without a material.
pub(crate) fn fallback_color(part_index: usize) -> [f32; 4] {
    let mut rng = SmallRng::seed_from_u64(part_index as u64);
    let between = Uniform::from(0.55..0.9);
    [
        between.sample(&mut rng),
        between.sample(&mut rng),
        between.sample(&mut rng),
        1.0,
    ]
}

/// A loaded model. Never empty: it holds at least one triangle.
#[derive(Clone, Debug)]
pub struct ModelMesh {
    pub name: String,
    pub format: ModelFormat,
    pub parts: Vec<MeshPart>,
    pub bbox: BBox,
}

impl ModelMesh {
    pub fn new(name: String, format: ModelFormat, parts: Vec<MeshPart>) -> Result<Self, LoadError> {
        let parts = Vec::from_iter(parts.into_iter().filter(|part| part.n_triangles() > 0));
        if parts.is_empty() {
            return Err(LoadError::EmptyModel);
        }
        let mut bbox = BBox::default();
        for part in &parts {
            bbox.merge_box(&part.bbox());
        }
        Ok(Self {
            name,
            format,
            parts,
            bbox,
        })
    }

    pub fn n_triangles(&self) -> usize {
        self.parts.iter().map(MeshPart::n_triangles).sum()
    }
}

/// Parse `bytes` according to the extension of `name`.
///
/// The extension is checked before any parser runs.
pub fn load_model(name: &str, bytes: &[u8]) -> Result<ModelMesh, LoadError> {
    let format = ModelFormat::from_file_name(name)?;
    let parts = match format {
        ModelFormat::Obj => obj::parse(bytes)?,
        ModelFormat::Gltf | ModelFormat::Glb => self::gltf::parse(bytes)?,
    };
    ModelMesh::new(display_name(name), format, parts)
}

/// File name without its extension.
pub fn display_name(name: &str) -> String {
    match name.rfind('.') {
        Some(pos) if pos > 0 => name[..pos].to_owned(),
        _ => name.to_owned(),
    }
}

/// Read a browser file and parse it.
pub async fn read_model_from_file(file: web_sys::File) -> Result<ModelMesh, LoadError> {
    let name = file.name();
    // Reject before touching the file contents.
    ModelFormat::from_file_name(&name)?;
    let buffer = wasm_bindgen_futures::JsFuture::from(file.array_buffer())
        .await
        .map_err(|err| LoadError::Read(format!("{:?}", err)))?;
    let bytes = js_sys::Uint8Array::new(&buffer).to_vec();
    load_model(&name, &bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    const TETRAHEDRON: &str = "\
o tet
v 0 0 0
v 4 0 0
v 0 2 0
v 0 0 1
f 1 3 2
f 1 2 4
f 1 4 3
f 2 3 4
";

    #[test]
    fn format_detection_is_case_insensitive() {
        assert_eq!(ModelFormat::from_file_name("a.OBJ").unwrap(), ModelFormat::Obj);
        assert_eq!(ModelFormat::from_file_name("b.gltf").unwrap(), ModelFormat::Gltf);
        assert_eq!(ModelFormat::from_file_name("C.Glb").unwrap(), ModelFormat::Glb);
    }

    #[test]
    fn unsupported_extensions_are_rejected() {
        for name in ["model.fbx", "model.dae", "model", "obj", "model.obj.zip"] {
            assert!(matches!(
                ModelFormat::from_file_name(name),
                Err(LoadError::UnsupportedFormat(_))
            ));
        }
    }

    #[test]
    fn unsupported_extension_never_reaches_a_parser() {
        // Valid OBJ text that any parser would accept.
        let err = load_model("tet.fbx", TETRAHEDRON.as_bytes()).unwrap_err();
        assert!(matches!(err, LoadError::UnsupportedFormat(name) if name == "tet.fbx"));
    }

    #[test]
    fn bbox_skips_indices_past_the_points() {
        let part = MeshPart {
            positions: vec![0.0, 0.0, 0.0, 1.0, 2.0, 3.0, -1.0, 0.0, 0.0],
            normals: vec![0.0; 9],
            indices: vec![0, 1, 2, 1, 2, 7],
            material: PartMaterial::default(),
        };
        let bbox = part.bbox();
        assert_eq!(bbox.min, Vector3::new(-1.0, 0.0, 0.0));
        assert_eq!(bbox.max, Vector3::new(1.0, 2.0, 3.0));
    }

    #[test]
    fn obj_text_loads_through_the_front_door() {
        let model = load_model("tet.obj", TETRAHEDRON.as_bytes()).unwrap();
        assert_eq!(model.name, "tet");
        assert_eq!(model.format, ModelFormat::Obj);
        assert_eq!(model.n_triangles(), 4);
        assert_eq!(model.bbox.max, Vector3::new(4.0, 2.0, 1.0));
    }

    #[test]
    fn broken_gltf_is_a_parse_error() {
        let err = load_model("broken.gltf", b"{ not json").unwrap_err();
        assert!(matches!(err, LoadError::Gltf(_)));
    }

    #[test]
    fn flat_normals_are_generated_per_face() {
        let part = MeshPart::new(
            vec![0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 0.0],
            None,
            vec![0, 1, 2],
            PartMaterial::default(),
        );
        assert_eq!(part.normals, vec![0.0, 0.0, 1.0, 0.0, 0.0, 1.0, 0.0, 0.0, 1.0]);
        assert_eq!(part.indices, vec![0, 1, 2]);
    }

    #[test]
    fn out_of_range_triangles_are_dropped() {
        let part = MeshPart::new(
            vec![0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 0.0],
            Some(vec![0.0, 0.0, 1.0, 0.0, 0.0, 1.0, 0.0, 0.0, 1.0]),
            vec![0, 1, 2, 0, 1, 7, 2],
            PartMaterial::default(),
        );
        assert_eq!(part.n_triangles(), 1);
    }

    #[test]
    fn model_without_triangles_is_empty() {
        let part = MeshPart::new(vec![0.0; 9], None, vec![], PartMaterial::default());
        assert!(matches!(
            ModelMesh::new("none".into(), ModelFormat::Obj, vec![part]),
            Err(LoadError::EmptyModel)
        ));
    }

    #[test]
    fn fallback_colors_are_stable() {
        assert_eq!(fallback_color(3), fallback_color(3));
        assert!(fallback_color(0)[..3].iter().all(|c| (0.55..0.9).contains(c)));
    }

    #[test]
    fn display_name_strips_extension() {
        assert_eq!(display_name("chair.glb"), "chair");
        assert_eq!(display_name("my.chair.obj"), "my.chair");
        assert_eq!(display_name(".obj"), ".obj");
    }
}
