use std::collections::HashSet;

use cgmath::{Matrix, Matrix3, Matrix4, Point3, SquareMatrix, Transform, Vector3};
use gltf::{buffer, mesh::util::ReadIndices, mesh::Mode, Document, Gltf, Node};

use super::{LoadError, MeshPart, PartMaterial};

/// Parse a `.gltf` (JSON with embedded buffers) or `.glb` payload.
///
/// External buffer files cannot be resolved from a single upload; such files
/// fail with a GLTF error. Images are never read, so textures that are
/// external or undecodable do not keep the geometry from loading.
pub(super) fn parse(bytes: &[u8]) -> Result<Vec<MeshPart>, LoadError> {
    let Gltf { document, blob } = Gltf::from_slice(bytes)?;
    let buffers = gltf::import_buffers(&document, None, blob)?;
    let mut parts = Vec::new();
    for node in root_nodes(&document) {
        visit(&node, &Matrix4::identity(), &buffers, &mut parts);
    }
    Ok(parts)
}

fn root_nodes(document: &Document) -> Vec<Node<'_>> {
    if let Some(scene) = document.default_scene().or_else(|| document.scenes().next()) {
        return scene.nodes().collect();
    }
    let children: HashSet<usize> = document
        .nodes()
        .flat_map(|node| node.children().map(|child| child.index()).collect::<Vec<_>>())
        .collect();
    document
        .nodes()
        .filter(|node| !children.contains(&node.index()))
        .collect()
}

fn visit(node: &Node, parent: &Matrix4<f32>, buffers: &[buffer::Data], parts: &mut Vec<MeshPart>) {
    let world = parent * Matrix4::from(node.transform().matrix());
    if let Some(mesh) = node.mesh() {
        let normal_mat = normal_matrix(&world);
        for prim in mesh.primitives() {
            if prim.mode() != Mode::Triangles {
                leptos::logging::warn!(
                    "skip primitive {} of mesh {:?}: mode {:?} is not renderable",
                    prim.index(),
                    mesh.name(),
                    prim.mode()
                );
                continue;
            }
            let reader = prim.reader(|b| buffers.get(b.index()).map(|data| data.0.as_slice()));
            let Some(pos_iter) = reader.read_positions() else {
                continue;
            };
            let positions = Vec::from_iter(pos_iter.flat_map(|p| {
                let p = world.transform_point(Point3::from(p));
                [p.x, p.y, p.z]
            }));
            let normals = reader.read_normals().map(|it| {
                Vec::from_iter(it.flat_map(|n| {
                    let n = normal_mat * Vector3::from(n);
                    let len = (n.x * n.x + n.y * n.y + n.z * n.z).sqrt();
                    let n = if len > 0.0 { n / len } else { n };
                    [n.x, n.y, n.z]
                }))
            });
            let indices: Vec<u32> = match reader.read_indices() {
                Some(ReadIndices::U8(it)) => it.map(|v| v as u32).collect(),
                Some(ReadIndices::U16(it)) => it.map(|v| v as u32).collect(),
                Some(ReadIndices::U32(it)) => it.collect(),
                None => Vec::from_iter(0..(positions.len() / 3) as u32),
            };

            let pbr = prim.material().pbr_metallic_roughness();
            let material = PartMaterial {
                color: pbr.base_color_factor(),
                roughness: pbr.roughness_factor(),
                metalness: pbr.metallic_factor(),
            };
            parts.push(MeshPart::new(positions, normals, indices, material));
        }
    }
    for child in node.children() {
        visit(&child, &world, buffers, parts);
    }
}

/// Inverse transpose of the upper 3x3 block, identity when singular.
fn normal_matrix(world: &Matrix4<f32>) -> Matrix3<f32> {
    let linear = Matrix3::from_cols(world.x.truncate(), world.y.truncate(), world.z.truncate());
    linear
        .invert()
        .map(|inv| inv.transpose())
        .unwrap_or_else(Matrix3::identity)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    const RED_MATERIAL: &str =
        r#"{"pbrMetallicRoughness": {"baseColorFactor": [1.0, 0.0, 0.0, 1.0], "metallicFactor": 0.25}}"#;

    /// One triangle, unindexed, no normals, wrapped in a node hierarchy with
    /// the given JSON `nodes` block.
    fn glb(nodes: &str) -> Vec<u8> {
        glb_with(nodes, RED_MATERIAL, "")
    }

    /// Like [`glb`] with a custom `material` and `extra` top-level entries,
    /// each followed by a comma.
    fn glb_with(nodes: &str, material: &str, extra: &str) -> Vec<u8> {
        let positions: [f32; 9] = [0.0, 0.0, 0.0, 2.0, 0.0, 0.0, 0.0, 1.0, 0.0];
        let mut bin = Vec::from(bytemuck::cast_slice::<f32, u8>(&positions));
        let json = format!(
            r#"{{
"asset": {{"version": "2.0"}},
"scene": 0,
"scenes": [{{"nodes": [0]}}],
"nodes": {nodes},
"meshes": [{{"primitives": [{{"attributes": {{"POSITION": 0}}, "material": 0}}]}}],
"materials": [{material}],
{extra}
"accessors": [{{"bufferView": 0, "componentType": 5126, "count": 3, "type": "VEC3",
  "min": [0.0, 0.0, 0.0], "max": [2.0, 1.0, 0.0]}}],
"bufferViews": [{{"buffer": 0, "byteLength": 36}}],
"buffers": [{{"byteLength": 36}}]
}}"#
        );
        let mut json = json.into_bytes();
        while json.len() % 4 != 0 {
            json.push(b' ');
        }
        while bin.len() % 4 != 0 {
            bin.push(0);
        }

        let total = 12 + 8 + json.len() + 8 + bin.len();
        let mut out = Vec::with_capacity(total);
        out.extend_from_slice(b"glTF");
        out.extend_from_slice(&2u32.to_le_bytes());
        out.extend_from_slice(&(total as u32).to_le_bytes());
        out.extend_from_slice(&(json.len() as u32).to_le_bytes());
        out.extend_from_slice(b"JSON");
        out.extend_from_slice(&json);
        out.extend_from_slice(&(bin.len() as u32).to_le_bytes());
        out.extend_from_slice(b"BIN\0");
        out.extend_from_slice(&bin);
        out
    }

    #[test]
    fn binary_triangle_loads_with_material() {
        let parts = parse(&glb(r#"[{"mesh": 0}]"#)).unwrap();
        assert_eq!(parts.len(), 1);
        let part = &parts[0];
        assert_eq!(part.n_triangles(), 1);
        assert_eq!(part.material.color, [1.0, 0.0, 0.0, 1.0]);
        assert_relative_eq!(part.material.metalness, 0.25);
        assert_relative_eq!(part.material.roughness, 1.0);
        // Flat normal of a triangle in the xy plane.
        assert_relative_eq!(part.normals[2], 1.0);
    }

    #[test]
    fn node_transforms_reach_world_space() {
        let nodes = r#"[
            {"children": [1], "translation": [10.0, 0.0, 0.0]},
            {"mesh": 0, "scale": [3.0, 3.0, 3.0]}
        ]"#;
        let parts = parse(&glb(nodes)).unwrap();
        let bbox = parts[0].bbox();
        assert_relative_eq!(bbox.min.x, 10.0);
        assert_relative_eq!(bbox.max.x, 16.0);
        assert_relative_eq!(bbox.max.y, 3.0);
    }

    #[test]
    fn rotated_normals_stay_unit_length() {
        // 90 degrees about x: the +z face normal turns into -y.
        let nodes = r#"[{"mesh": 0, "rotation": [0.7071068, 0.0, 0.0, 0.7071068], "scale": [2.0, 2.0, 2.0]}]"#;
        let parts = parse(&glb(nodes)).unwrap();
        let n = &parts[0].normals[..3];
        assert_relative_eq!(n[1], -1.0, epsilon = 1e-5);
        assert_relative_eq!((n[0] * n[0] + n[1] * n[1] + n[2] * n[2]).sqrt(), 1.0, epsilon = 1e-5);
    }

    #[test]
    fn external_texture_does_not_block_geometry() {
        let material = r#"{"pbrMetallicRoughness": {"baseColorTexture": {"index": 0}, "baseColorFactor": [0.0, 1.0, 0.0, 1.0]}}"#;
        let extra = r#""textures": [{"source": 0}], "images": [{"uri": "textures/albedo.png"}],"#;
        let parts = parse(&glb_with(r#"[{"mesh": 0}]"#, material, extra)).unwrap();
        assert_eq!(parts.len(), 1);
        assert_eq!(parts[0].n_triangles(), 1);
        assert_eq!(parts[0].material.color, [0.0, 1.0, 0.0, 1.0]);
    }

    #[test]
    fn corrupt_embedded_texture_does_not_block_geometry() {
        let material = r#"{"pbrMetallicRoughness": {"baseColorTexture": {"index": 0}}}"#;
        let extra =
            r#""textures": [{"source": 0}], "images": [{"uri": "data:image/png;base64,AAAAAAAA"}],"#;
        let parts = parse(&glb_with(r#"[{"mesh": 0}]"#, material, extra)).unwrap();
        assert_eq!(parts[0].n_triangles(), 1);
    }

    #[test]
    fn external_buffer_is_a_parse_error() {
        let json = r#"{
"asset": {"version": "2.0"},
"buffers": [{"byteLength": 36, "uri": "mesh.bin"}]
}"#;
        assert!(matches!(parse(json.as_bytes()), Err(LoadError::Gltf(_))));
    }

    #[test]
    fn truncated_binary_is_an_error() {
        let mut bytes = glb(r#"[{"mesh": 0}]"#);
        bytes.truncate(30);
        assert!(matches!(parse(&bytes), Err(LoadError::Gltf(_))));
    }
}
