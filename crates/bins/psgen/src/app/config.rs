use crate::dataset::{DatasetOptions, DEFAULT_BRDF_CACHE_CAPACITY};
use base::{utils::canonicalize_path, Error};
use serde::{Deserialize, Serialize};
use std::{
    fmt,
    path::{Path, PathBuf},
};

/// Name of the user configuration file.
pub const CONFIG_FILE_NAME: &str = "psgen.toml";

/// psgen configuration.
#[derive(Debug)]
pub struct Config {
    /// Path to the system configuration directory, if the platform has one.
    pub(crate) sys_config_dir: Option<PathBuf>,

    /// Current working directory (where the user started the program).
    pub(crate) cwd: PathBuf,

    /// File the user configuration was read from.
    pub(crate) source: Option<PathBuf>,

    /// User-defined configuration.
    pub(crate) user: UserConfig,
}

/// External renderer settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RendererConfig {
    /// Program name or path.
    pub program: Option<PathBuf>,
    /// Arguments passed before the scene arguments.
    pub args: Vec<String>,
    /// Number of failed render scratch directories kept for inspection.
    pub keep_failed: Option<usize>,
}

/// Options configured by user.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UserConfig {
    /// Root of the generated datasets.
    /// If not set, `renders` in the current working directory is used.
    pub output_dir: Option<PathBuf>,

    /// Directory searched for `*.binary` BRDF files.
    pub brdf_dir: Option<PathBuf>,

    /// Directory searched for `*.obj` meshes.
    pub mesh_dir: Option<PathBuf>,

    /// Maximum number of BRDF tables kept in memory; `0` for no limit.
    pub brdf_cache_capacity: Option<usize>,

    /// External renderer.
    pub renderer: RendererConfig,

    /// Dataset defaults.
    pub dataset: DatasetOptions,
}

impl UserConfig {
    /// Load [`UserConfig`] from a .toml file.
    ///
    /// Relative paths are resolved against the directory of the file.
    pub fn load(path: &Path) -> Result<Self, Error> {
        let base = path.parent().unwrap_or_else(|| Path::new("."));
        let string = std::fs::read_to_string(path).map_err(|err| Error::io(err, path))?;
        let mut config: UserConfig = toml::from_str(&string)
            .map_err(|err| Error::config(format!("{}: {}", path.display(), err)))?;
        for dir in [
            &mut config.output_dir,
            &mut config.brdf_dir,
            &mut config.mesh_dir,
        ] {
            if let Some(d) = dir.as_deref() {
                *dir = Some(canonicalize_path(base, Some(d)));
            }
        }
        // Bare program names are looked up on PATH later.
        if let Some(program) = config.renderer.program.as_deref() {
            if program.components().count() > 1 {
                config.renderer.program = Some(canonicalize_path(base, Some(program)));
            }
        }
        log::info!("    - User output directory: {:?}", config.output_dir);
        log::info!("    - User BRDF directory: {:?}", config.brdf_dir);
        log::info!("    - User mesh directory: {:?}", config.mesh_dir);
        log::info!("    - Renderer: {:?}", config.renderer.program);
        Ok(config)
    }
}

impl Config {
    /// Loads the configuration.
    ///
    /// The user configuration is read from `filepath` if given, otherwise
    /// from `psgen.toml` in the current working directory, otherwise from
    /// `psgen.toml` in the system configuration directory. Without any of
    /// them the built-in defaults are used; nothing is written.
    ///
    /// # Default configuration directory
    ///
    /// + On *nix system: "$XDG_CONFIG_HOME/psgen" or "$HOME/.config/psgen"
    ///
    /// + On windows system: `%APPDATA%\psgen`
    ///
    /// + On macos system: "$HOME/Library/Application Support/psgen"
    pub fn load_config(filepath: Option<&Path>) -> Result<Self, Error> {
        log::info!("Loading configurations...");
        let cwd = std::env::current_dir().map_err(|err| Error::io(err, "."))?;
        let sys_config_dir = dirs::config_dir().map(|dir| dir.join("psgen"));
        if let Some(dir) = &sys_config_dir {
            log::info!("  - Sys configuration directory: {}", dir.display());
        }

        let source = match filepath {
            Some(path) => {
                let path = canonicalize_path(&cwd, Some(path));
                if !path.is_file() {
                    return Err(Error::config(format!(
                        "configuration file {} does not exist",
                        path.display()
                    )));
                }
                Some(path)
            },
            None => [
                Some(cwd.join(CONFIG_FILE_NAME)),
                sys_config_dir.as_ref().map(|d| d.join(CONFIG_FILE_NAME)),
            ]
            .into_iter()
            .flatten()
            .find(|p| p.is_file()),
        };
        let user = match &source {
            Some(path) => {
                log::info!("  Load configuration from {}", path.display());
                UserConfig::load(path)?
            },
            None => {
                log::info!("  No configuration file found, using defaults");
                UserConfig::default()
            },
        };
        Ok(Self {
            sys_config_dir,
            cwd,
            source,
            user,
        })
    }

    /// Returns the current working directory.
    pub fn cwd(&self) -> &Path { &self.cwd }

    /// File the configuration was read from.
    pub fn source(&self) -> Option<&Path> { self.source.as_deref() }

    /// User part of the configuration.
    pub fn user(&self) -> &UserConfig { &self.user }

    /// Root directory of the generated datasets.
    pub fn output_dir(&self) -> PathBuf {
        self.user
            .output_dir
            .clone()
            .unwrap_or_else(|| self.cwd.join("renders"))
    }

    /// Directory searched for BRDF files.
    pub fn brdf_dir(&self) -> PathBuf {
        self.user
            .brdf_dir
            .clone()
            .unwrap_or_else(|| self.cwd.join("brdfs"))
    }

    /// Directory searched for meshes.
    pub fn mesh_dir(&self) -> PathBuf {
        self.user
            .mesh_dir
            .clone()
            .unwrap_or_else(|| self.cwd.join("objects"))
    }

    /// Capacity of the BRDF cache, `None` meaning unbounded.
    pub fn brdf_cache_capacity(&self) -> Option<usize> {
        match self.user.brdf_cache_capacity {
            Some(0) => None,
            Some(n) => Some(n),
            None => Some(DEFAULT_BRDF_CACHE_CAPACITY),
        }
    }

    /// External renderer settings.
    pub fn renderer(&self) -> &RendererConfig { &self.user.renderer }

    /// Dataset defaults.
    pub fn dataset_options(&self) -> DatasetOptions { self.user.dataset.clone() }

    /// Resolves `path` against the current working directory.
    pub fn resolve_path(&self, path: &Path) -> PathBuf { canonicalize_path(&self.cwd, Some(path)) }
}

impl fmt::Display for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let opts = &self.user.dataset;
        writeln!(f, "Configuration")?;
        match &self.source {
            Some(path) => writeln!(f, "  - file              : {}", path.display())?,
            None => writeln!(f, "  - file              : <defaults>")?,
        }
        if let Some(dir) = &self.sys_config_dir {
            writeln!(f, "  - sys config dir    : {}", dir.display())?;
        }
        writeln!(f, "  - cwd               : {}", self.cwd.display())?;
        writeln!(f, "  - output dir        : {}", self.output_dir().display())?;
        writeln!(f, "  - brdf dir          : {}", self.brdf_dir().display())?;
        writeln!(f, "  - mesh dir          : {}", self.mesh_dir().display())?;
        match self.brdf_cache_capacity() {
            Some(n) => writeln!(f, "  - brdf cache        : {} tables", n)?,
            None => writeln!(f, "  - brdf cache        : unbounded")?,
        }
        match &self.user.renderer.program {
            Some(program) => writeln!(
                f,
                "  - renderer          : {} {}",
                program.display(),
                self.user.renderer.args.join(" ")
            )?,
            None => writeln!(f, "  - renderer          : <not configured>")?,
        }
        writeln!(f, "Dataset defaults")?;
        writeln!(
            f,
            "  - lights            : {} {} at distance {}, intensity {}",
            opts.light_count, opts.pattern, opts.light_distance, opts.light_intensity
        )?;
        writeln!(
            f,
            "  - camera            : {} -> {}, fov {}, {}x{}",
            opts.camera.position,
            opts.camera.target,
            opts.camera.fov,
            opts.camera.width,
            opts.camera.height
        )?;
        writeln!(f, "  - spp               : {}", opts.spp)?;
        writeln!(f, "  - integrator        : {:?}", opts.integrator)?;
        writeln!(f, "  - approximation     : {}", opts.approximation)?;
        write!(
            f,
            "  - thresholds        : mask {}, shadow {}",
            opts.mask_threshold, opts.shadow_threshold
        )
    }
}
