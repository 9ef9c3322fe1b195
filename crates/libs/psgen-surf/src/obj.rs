//! Wavefront OBJ interchange.
//!
//! Writing emits only the subset the renderer needs: `v x y z` lines with 6
//! decimals and `f i j k` lines with 1-based indices. Reading goes through
//! `tobj` and accepts any OBJ whose faces are triangles.

use crate::{gen::Shape, mesh::TriangleMesh};
use base::{math::dvec3, Error};
use std::{
    fs::File,
    io::{BufRead, BufReader, BufWriter, Write},
    path::{Path, PathBuf},
};

/// Writes the mesh in OBJ format.
///
/// Each header line is written as a comment, followed by a blank line, the
/// vertices, another blank line and the faces.
pub fn write_obj<W: Write>(
    writer: &mut W,
    header: &[String],
    mesh: &TriangleMesh,
) -> std::io::Result<()> {
    for line in header {
        writeln!(writer, "# {}", line)?;
    }
    writeln!(writer)?;
    for v in &mesh.vertices {
        writeln!(writer, "v {:.6} {:.6} {:.6}", v.x, v.y, v.z)?;
    }
    writeln!(writer)?;
    for f in &mesh.faces {
        writeln!(writer, "f {} {} {}", f[0], f[1], f[2])?;
    }
    Ok(())
}

/// Header lines describing a generated shape.
pub fn shape_header(shape: &Shape) -> Vec<String> {
    let mut header = vec![format!("{} OBJ file", shape.kind())];
    header.extend(shape.describe());
    header
}

/// Generates `shape` and saves it to `path`.
pub fn save_shape<P: AsRef<Path>>(shape: &Shape, path: P) -> Result<TriangleMesh, Error> {
    let mesh = shape.generate()?;
    save_obj(path.as_ref(), &shape_header(shape), &mesh)?;
    Ok(mesh)
}

/// Saves the mesh to `path`.
pub fn save_obj(path: &Path, header: &[String], mesh: &TriangleMesh) -> Result<(), Error> {
    let file = File::create(path).map_err(|err| Error::io(err, path))?;
    let mut writer = BufWriter::new(file);
    write_obj(&mut writer, header, mesh)
        .and_then(|_| writer.flush())
        .map_err(|err| Error::io(err, path))?;
    log::info!(
        "Wrote {} ({} vertices, {} faces)",
        path.display(),
        mesh.vertex_count(),
        mesh.face_count()
    );
    Ok(())
}

/// Writes every preset shape into `dir` as `<name>.obj`.
///
/// The directory is created if needed. Returns the written paths in preset
/// order.
pub fn save_presets<P: AsRef<Path>>(dir: P) -> Result<Vec<PathBuf>, Error> {
    let dir = dir.as_ref();
    std::fs::create_dir_all(dir).map_err(|err| Error::io(err, dir))?;
    crate::gen::presets()
        .iter()
        .map(|(name, shape)| {
            let path = dir.join(format!("{}.obj", name));
            save_shape(shape, &path).map(|_| path)
        })
        .collect()
}

/// Parses OBJ text.
///
/// Every object in the file is merged into one mesh. Faces must be
/// triangles referring to declared vertices; anything else is reported as a
/// format error against `path`. Vertices are renumbered in order of first
/// use by a face, so unreferenced vertices are dropped.
pub fn parse_obj<R: BufRead>(mut reader: R, path: &Path) -> Result<TriangleMesh, Error> {
    let options = tobj::LoadOptions {
        single_index: false,
        triangulate: false,
        ignore_points: true,
        ignore_lines: true,
    };
    let (models, _) = tobj::load_obj_buf(&mut reader, &options, |_| {
        Err(tobj::LoadError::OpenFileFailed)
    })
    .map_err(|err| Error::format(path, err.to_string()))?;

    let mut mesh = TriangleMesh::default();
    for model in &models {
        let arities = &model.mesh.face_arities;
        if let Some(arity) = arities.iter().find(|&&n| n != 3) {
            return Err(Error::format(
                path,
                format!("object '{}': expected triangles, got a {}-gon", model.name, arity),
            ));
        }
        let offset = mesh.vertex_count() as u32;
        mesh.vertices.extend(
            model
                .mesh
                .positions
                .chunks_exact(3)
                .map(|p| dvec3(p[0], p[1], p[2])),
        );
        mesh.faces.extend(
            model
                .mesh
                .indices
                .chunks_exact(3)
                .map(|f| [offset + f[0] + 1, offset + f[1] + 1, offset + f[2] + 1]),
        );
    }
    log::debug!(
        "Parsed {}: {} objects, {} vertices, {} faces",
        path.display(),
        models.len(),
        mesh.vertex_count(),
        mesh.face_count()
    );
    Ok(mesh)
}

/// Reads an OBJ file.
pub fn read_obj<P: AsRef<Path>>(path: P) -> Result<TriangleMesh, Error> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|err| Error::io(err, path))?;
    parse_obj(BufReader::new(file), path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gen::cube;
    use std::io::Cursor;

    fn scratch_dir() -> PathBuf {
        let dir = std::env::temp_dir().join(format!("psgen-obj-{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn test_cube_round_trip_counts() {
        let dir = scratch_dir();
        let path = dir.join("cube.obj");
        save_shape(&Shape::Cube { size: 1.5 }, &path).unwrap();
        let mesh = read_obj(&path).unwrap();
        let expected = cube(1.5).unwrap();
        assert_eq!(mesh.vertex_count(), 8);
        assert_eq!(mesh.face_count(), 12);
        for (got, want) in mesh.faces.iter().zip(&expected.faces) {
            for k in 0..3 {
                let a = mesh.vertices[got[k] as usize - 1];
                let b = expected.vertices[want[k] as usize - 1];
                assert!((a - b).length() < 1e-6, "{a} != {b}");
            }
        }
        std::fs::remove_dir_all(dir).unwrap();
    }

    #[test]
    fn test_text_layout() {
        let mut buf = Vec::new();
        let shape = Shape::Cube { size: 2.0 };
        write_obj(&mut buf, &shape_header(&shape), &shape.generate().unwrap()).unwrap();
        let text = String::from_utf8(buf).unwrap();
        let lines: Vec<_> = text.lines().collect();
        assert_eq!(lines[0], "# Cube OBJ file");
        assert_eq!(lines[1], "# Size: 2.0");
        assert_eq!(lines[2], "");
        assert_eq!(lines[3], "v -1.000000 -1.000000 -1.000000");
        assert_eq!(lines[11], "");
        assert_eq!(lines[12], "f 6 7 8");
        assert_eq!(lines.len(), 24);
    }

    #[test]
    fn test_parse_accepts_slashed_indices() {
        let text = "o thing\nv 0 0 0\nv 1 0 0\nv 0 1 0\nvn 0 0 1\nf 1//1 2//1 3//1\n";
        let mesh = parse_obj(Cursor::new(text), Path::new("thing.obj")).unwrap();
        assert_eq!(mesh.faces, vec![[1, 2, 3]]);
        assert_eq!(mesh.vertices[1], dvec3(1.0, 0.0, 0.0));
    }

    #[test]
    fn test_parse_merges_objects() {
        let text = "o a\nv 0 0 0\nv 1 0 0\nv 0 1 0\nf 1 2 3\n\
                    o b\nv 0 0 1\nv 1 0 1\nv 0 1 1\nf 4 5 6\n";
        let mesh = parse_obj(Cursor::new(text), Path::new("ab.obj")).unwrap();
        assert_eq!(mesh.vertex_count(), 6);
        assert_eq!(mesh.faces, vec![[1, 2, 3], [4, 5, 6]]);
        assert_eq!(mesh.vertices[3], dvec3(0.0, 0.0, 1.0));
    }

    #[test]
    fn test_parse_rejects_bad_faces() {
        let quad = "v 0 0 0\nv 1 0 0\nv 1 1 0\nv 0 1 0\nf 1 2 3 4\n";
        let err = parse_obj(Cursor::new(quad), Path::new("quad.obj")).unwrap_err();
        assert!(matches!(err, Error::Format { .. }));

        let out_of_range = "v 0 0 0\nv 1 0 0\nv 1 1 0\nf 1 2 4\n";
        let err = parse_obj(Cursor::new(out_of_range), Path::new("oor.obj")).unwrap_err();
        assert!(matches!(err, Error::Format { ref path, .. } if path.ends_with("oor.obj")));

        let bad_vertex = "v 0 zero 0\nv 1 0 0\nv 0 1 0\nf 1 2 3\n";
        let err = parse_obj(Cursor::new(bad_vertex), Path::new("v.obj")).unwrap_err();
        assert!(matches!(err, Error::Format { .. }), "{err}");
    }

    #[test]
    fn test_save_presets() {
        let dir = scratch_dir().join("objects");
        let paths = save_presets(&dir).unwrap();
        let names: Vec<_> = paths
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(
            names,
            [
                "sphere.obj",
                "sphere_lowpoly.obj",
                "cube.obj",
                "plane.obj",
                "cylinder.obj",
                "torus.obj"
            ]
        );
        let torus = read_obj(&paths[5]).unwrap();
        assert_eq!(torus.face_count(), 2 * 24 * 12);
        std::fs::remove_dir_all(dir.parent().unwrap()).unwrap();
    }
}
