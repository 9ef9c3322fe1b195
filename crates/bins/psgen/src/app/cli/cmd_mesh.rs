use crate::app::{cli::ansi, Config};
use base::Error;
use std::path::PathBuf;
use surf::{obj, Shape, ShapeKind};

#[derive(clap::Args, Debug)]
#[clap(about = "Write parametric meshes as OBJ files.")]
pub struct MeshOptions {
    /// Shape to generate.
    #[clap(
        value_enum,
        help = "Shape to generate. If not specified, the whole preset set\nis written."
    )]
    pub shape: Option<ShapeKind>,

    #[clap(long, help = "Radius of the sphere or cylinder")]
    pub radius: Option<f64>,

    #[clap(long, help = "Edge length of the cube")]
    pub size: Option<f64>,

    #[clap(long, help = "Width of the plane")]
    pub width: Option<f64>,

    #[clap(long, help = "Height of the plane or cylinder")]
    pub height: Option<f64>,

    #[clap(short, long, help = "Subdivisions of the sphere, plane or cylinder")]
    pub subdivisions: Option<u32>,

    #[clap(long, help = "Major radius of the torus")]
    pub major_radius: Option<f64>,

    #[clap(long, help = "Minor radius of the torus")]
    pub minor_radius: Option<f64>,

    #[clap(long, help = "Segments around the torus axis")]
    pub major_subdivisions: Option<u32>,

    #[clap(long, help = "Segments around the torus tube")]
    pub minor_subdivisions: Option<u32>,

    #[clap(
        short,
        long,
        help = "Output file, or output directory for the preset set\n[default: configured mesh \
                directory]"
    )]
    pub output: Option<PathBuf>,
}

impl MeshOptions {
    /// Default parameters of `kind` overridden by the given ones.
    fn shape(&self, kind: ShapeKind) -> Shape {
        match Shape::default_of(kind) {
            Shape::Sphere {
                radius,
                subdivisions,
            } => Shape::Sphere {
                radius: self.radius.unwrap_or(radius),
                subdivisions: self.subdivisions.unwrap_or(subdivisions),
            },
            Shape::Cube { size } => Shape::Cube {
                size: self.size.unwrap_or(size),
            },
            Shape::Plane {
                width,
                height,
                subdivisions,
            } => Shape::Plane {
                width: self.width.unwrap_or(width),
                height: self.height.unwrap_or(height),
                subdivisions: self.subdivisions.unwrap_or(subdivisions),
            },
            Shape::Cylinder {
                radius,
                height,
                subdivisions,
            } => Shape::Cylinder {
                radius: self.radius.unwrap_or(radius),
                height: self.height.unwrap_or(height),
                subdivisions: self.subdivisions.unwrap_or(subdivisions),
            },
            Shape::Torus {
                major_radius,
                minor_radius,
                major_subdivisions,
                minor_subdivisions,
            } => Shape::Torus {
                major_radius: self.major_radius.unwrap_or(major_radius),
                minor_radius: self.minor_radius.unwrap_or(minor_radius),
                major_subdivisions: self.major_subdivisions.unwrap_or(major_subdivisions),
                minor_subdivisions: self.minor_subdivisions.unwrap_or(minor_subdivisions),
            },
        }
    }
}

pub fn mesh(opts: MeshOptions, config: Config) -> Result<(), Error> {
    let Some(kind) = opts.shape else {
        let dir = opts
            .output
            .as_deref()
            .map_or_else(|| config.mesh_dir(), |p| config.resolve_path(p));
        for path in obj::save_presets(&dir)? {
            println!("  {} {}", ansi::CYAN_CHECK, path.display());
        }
        return Ok(());
    };

    let shape = opts.shape(kind);
    let path = match opts.output.as_deref() {
        Some(p) => config.resolve_path(p),
        None => config
            .mesh_dir()
            .join(format!("{}.obj", kind.to_string().to_lowercase())),
    };
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|err| Error::io(err, parent))?;
    }
    let mesh = obj::save_shape(&shape, &path)?;
    let report = mesh.validate();
    if !report.is_clean() {
        log::warn!("{} has {} issues: {:?}", path.display(), report.issues.len(), report.issues);
    }
    println!(
        "  {} {} ({} vertices, {} faces)",
        ansi::CYAN_CHECK,
        path.display(),
        report.vertex_count,
        report.face_count
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::args::{CliArgs, SubCommand};
    use clap::Parser;

    #[test]
    fn test_overrides_apply_to_the_right_shape() {
        let args =
            CliArgs::try_parse_from(["psgen", "mesh", "torus", "--minor-radius", "0.2"]).unwrap();
        let SubCommand::Mesh(opts) = args.command else {
            panic!("expected mesh");
        };
        assert_eq!(opts.shape(ShapeKind::Torus), Shape::Torus {
            major_radius: 1.0,
            minor_radius: 0.2,
            major_subdivisions: 32,
            minor_subdivisions: 16,
        });
        assert_eq!(opts.shape(ShapeKind::Cube), Shape::Cube { size: 1.0 });
    }
}
