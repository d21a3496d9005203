use std::io::BufReader;

use super::{fallback_color, LoadError, MeshPart, PartMaterial};

/// Parse OBJ text. Materials are not resolved: an uploaded OBJ comes without
/// its `.mtl` sidecar, so every part gets a fallback color.
pub(super) fn parse(bytes: &[u8]) -> Result<Vec<MeshPart>, LoadError> {
    let mut reader = BufReader::new(bytes);
    let options = tobj::LoadOptions {
        triangulate: true,
        single_index: true,
        ignore_points: true,
        ignore_lines: true,
        ..Default::default()
    };
    let (models, _materials) =
        tobj::load_obj_buf(&mut reader, &options, |_| Ok((Vec::new(), Default::default())))?;

    Ok(Vec::from_iter(models.into_iter().enumerate().map(|(i, model)| {
        let mesh = model.mesh;
        let positions = Vec::from_iter(mesh.positions.iter().map(|v| *v as f32));
        let normals = if mesh.normals.is_empty() {
            None
        } else {
            Some(Vec::from_iter(mesh.normals.iter().map(|v| *v as f32)))
        };
        MeshPart::new(
            positions,
            normals,
            mesh.indices,
            PartMaterial {
                color: fallback_color(i),
                ..Default::default()
            },
        )
    })))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quads_are_triangulated() {
        let text = "v 0 0 0\nv 1 0 0\nv 1 1 0\nv 0 1 0\nf 1 2 3 4\n";
        let parts = parse(text.as_bytes()).unwrap();
        assert_eq!(parts.len(), 1);
        assert_eq!(parts[0].n_triangles(), 2);
    }

    #[test]
    fn objects_become_separate_parts() {
        let text = "\
o a
v 0 0 0
v 1 0 0
v 0 1 0
f 1 2 3
o b
v 0 0 5
v 1 0 5
v 0 1 5
f 4 5 6
";
        let parts = parse(text.as_bytes()).unwrap();
        assert_eq!(parts.len(), 2);
        assert_eq!(parts[1].bbox().min.z, 5.0);
        assert_ne!(parts[0].material.color, parts[1].material.color);
    }

    #[test]
    fn supplied_normals_are_kept() {
        let text = "\
v 0 0 0
v 1 0 0
v 0 1 0
vn 0 0 -1
f 1//1 2//1 3//1
";
        let parts = parse(text.as_bytes()).unwrap();
        assert_eq!(&parts[0].normals[..3], &[0.0, 0.0, -1.0]);
    }

    #[test]
    fn malformed_face_is_an_error() {
        let text = "v 0 0 0\nf 1 2 x\n";
        assert!(matches!(parse(text.as_bytes()), Err(LoadError::Obj(_))));
    }
}
