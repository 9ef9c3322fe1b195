use crate::{
    app::{args::SubCommand, Config},
    dataset::DatasetReport,
    render::{ExternalRenderer, DEFAULT_KEPT_FAILURES},
};
use base::Error;
use std::path::{Path, PathBuf};

/// ANSI color codes.
pub mod ansi {
    pub use base::cli::ansi::*;

    /// Red exclamation mark.
    pub const RED_EXCLAMATION: &str = "\u{001b}[31m!\u{001b}[0m";
    /// Cyan check mark.
    pub const CYAN_CHECK: &str = "\u{001b}[36m✓\u{001b}[0m";
}

mod cmd_batch;
mod cmd_generate;
mod cmd_lights;
mod cmd_material;
mod cmd_mesh;
mod cmd_preview;
mod cmd_verify;

pub use cmd_batch::BatchOptions;
pub use cmd_generate::GenerateOptions;
pub use cmd_lights::LightsOptions;
pub use cmd_material::MaterialOptions;
pub use cmd_mesh::MeshOptions;
pub use cmd_preview::PreviewOptions;
pub use cmd_verify::VerifyOptions;

/// Entry point of psgen CLI.
pub fn run(cmd: SubCommand, config: Config) -> Result<(), Error> {
    match cmd {
        SubCommand::Mesh(opts) => cmd_mesh::mesh(opts, config),
        SubCommand::Lights(opts) => cmd_lights::lights(opts, config),
        SubCommand::Material(opts) => cmd_material::material(opts, config),
        SubCommand::Generate(opts) => cmd_generate::generate(opts, config),
        SubCommand::Batch(opts) => cmd_batch::batch(opts, config),
        SubCommand::Preview(opts) => cmd_preview::preview(opts, config),
        SubCommand::Verify(opts) => cmd_verify::verify(opts, config),
        SubCommand::PrintInfo => {
            println!("{}", config);
            Ok(())
        },
    }
}

/// Renderer configured in the `[renderer]` table.
pub(crate) fn external_renderer(config: &Config) -> Result<ExternalRenderer, Error> {
    let renderer = config.renderer();
    let program = renderer.program.as_deref().ok_or_else(|| {
        Error::config("no renderer configured, set `program` in the [renderer] table of psgen.toml")
    })?;
    Ok(ExternalRenderer::new(program, renderer.args.clone())?
        .with_kept_failures(renderer.keep_failed.unwrap_or(DEFAULT_KEPT_FAILURES)))
}

/// Creates the output root if needed.
pub(crate) fn prepare_output_root(
    config: &Config,
    output: Option<&Path>,
) -> Result<PathBuf, Error> {
    let root = match output {
        Some(dir) => config.resolve_path(dir),
        None => config.output_dir(),
    };
    std::fs::create_dir_all(&root).map_err(|err| Error::io(err, &root))?;
    Ok(root)
}

/// Meshes and BRDFs given on the command line, or found in the configured
/// directories when none is given.
///
/// A missing BRDF directory leaves the list empty so that the neutral
/// material is used; no mesh at all is an error.
pub(crate) fn input_files(
    config: &Config,
    meshes: &[PathBuf],
    brdfs: &[PathBuf],
) -> Result<(Vec<PathBuf>, Vec<PathBuf>), Error> {
    let meshes = if meshes.is_empty() {
        files_with_extension(&config.mesh_dir(), "obj")?
    } else {
        meshes.iter().map(|p| config.resolve_path(p)).collect()
    };
    let brdfs = if brdfs.is_empty() {
        let dir = config.brdf_dir();
        if dir.is_dir() {
            files_with_extension(&dir, "binary")?
        } else {
            log::warn!("BRDF directory {} not found, using the neutral material", dir.display());
            Vec::new()
        }
    } else {
        brdfs.iter().map(|p| config.resolve_path(p)).collect()
    };
    if meshes.is_empty() {
        return Err(Error::config("no mesh to render"));
    }
    Ok((meshes, brdfs))
}

/// Files of `dir` with the given extension, sorted by name.
pub(crate) fn files_with_extension(dir: &Path, ext: &str) -> Result<Vec<PathBuf>, Error> {
    let entries = std::fs::read_dir(dir).map_err(|err| Error::io(err, dir))?;
    let mut files = Vec::new();
    for entry in entries {
        let path = entry.map_err(|err| Error::io(err, dir))?.path();
        if path.is_file() && path.extension().is_some_and(|e| e.eq_ignore_ascii_case(ext)) {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

/// Prints one line per dataset.
pub(crate) fn print_report(report: &DatasetReport) {
    match &report.error {
        None => println!(
            "  {} {} ({} images) -> {}",
            ansi::CYAN_CHECK,
            report.name,
            report.images.len(),
            report.dir.display()
        ),
        Some(err) => println!(
            "  {} {} failed at {}: {}",
            ansi::RED_EXCLAMATION,
            report.name,
            report
                .failed_at()
                .map_or_else(|| "init".to_string(), |s| s.to_string()),
            err
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_files_with_extension() {
        let dir = std::env::temp_dir().join(format!("psgen-cli-{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(dir.join("nested.obj")).unwrap();
        for name in ["b.obj", "a.OBJ", "c.binary", "notes.txt"] {
            std::fs::write(dir.join(name), "").unwrap();
        }
        let objs = files_with_extension(&dir, "obj").unwrap();
        assert_eq!(objs, vec![dir.join("a.OBJ"), dir.join("b.obj")]);
        assert_eq!(files_with_extension(&dir, "binary").unwrap().len(), 1);
        assert!(matches!(
            files_with_extension(&dir.join("missing"), "obj"),
            Err(Error::Io { .. })
        ));
        std::fs::remove_dir_all(dir).unwrap();
    }
}
