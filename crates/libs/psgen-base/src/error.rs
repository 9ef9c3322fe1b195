//! Error type shared by all psgen crates.

use std::{
    fmt::{Display, Formatter},
    path::{Path, PathBuf},
};

/// Errors raised while preparing photometric-stereo datasets.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A file is missing or can't be read/written.
    #[error("I/O error on '{}': {source}", .path.display())]
    Io {
        /// File or directory the operation was performed on.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The content of a file doesn't match its expected layout.
    #[error("Malformed data in '{}': {message}", .path.display())]
    Format {
        /// File being decoded.
        path: PathBuf,
        /// What went wrong.
        message: String,
    },

    /// A generator or sampler was called with an invalid argument.
    #[error("Invalid parameter `{name}`: {message}")]
    Parameter {
        /// Name of the offending parameter.
        name: &'static str,
        /// Why the value was rejected.
        message: String,
    },

    /// Unknown pattern, light type, dataset name or configuration value.
    #[error("Configuration error: {0}")]
    Config(String),

    /// The external renderer failed.
    #[error("Render error: {0}")]
    Render(String),

    /// Generation was cancelled from the outside.
    #[error("Cancelled")]
    Cancelled,

    /// De/Serialisation error.
    #[error("Serialisation error: {0}")]
    Serialisation(#[from] SerialisationError),

    /// Raster image encoding or decoding failed.
    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),
}

impl Error {
    /// Creates an [`Error::Io`] for the given path.
    pub fn io<P: AsRef<Path>>(source: std::io::Error, path: P) -> Self {
        Self::Io {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }

    /// Creates an [`Error::Format`] for the given path.
    pub fn format<P: AsRef<Path>, S: Into<String>>(path: P, message: S) -> Self {
        Self::Format {
            path: path.as_ref().to_path_buf(),
            message: message.into(),
        }
    }

    /// Creates an [`Error::Parameter`].
    pub fn parameter<S: Into<String>>(name: &'static str, message: S) -> Self {
        Self::Parameter {
            name,
            message: message.into(),
        }
    }

    /// Creates an [`Error::Config`].
    pub fn config<S: Into<String>>(message: S) -> Self { Self::Config(message.into()) }

    /// Creates an [`Error::Render`].
    pub fn render<S: Into<String>>(message: S) -> Self { Self::Render(message.into()) }

    /// Short category name, used in reports.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Io { .. } => "io",
            Self::Format { .. } => "format",
            Self::Parameter { .. } => "parameter",
            Self::Config(_) => "config",
            Self::Render(_) => "render",
            Self::Cancelled => "cancelled",
            Self::Serialisation(_) => "serialisation",
            Self::Image(_) => "image",
        }
    }
}

/// Errors from the serialisation formats used by psgen.
#[derive(Debug)]
pub enum SerialisationError {
    /// Toml serialisation error.
    TomlSe(toml::ser::Error),
    /// Toml deserialisation error.
    TomlDe(toml::de::Error),
    /// Yaml error.
    Yaml(serde_yaml::Error),
    /// Json error.
    Json(serde_json::Error),
}

impl Display for SerialisationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::TomlSe(err) => write!(f, "Toml serialisation error: {}", err),
            Self::TomlDe(err) => write!(f, "Toml deserialisation error: {}", err),
            Self::Yaml(err) => write!(f, "Yaml error: {}", err),
            Self::Json(err) => write!(f, "Json error: {}", err),
        }
    }
}

impl std::error::Error for SerialisationError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::TomlSe(err) => Some(err),
            Self::TomlDe(err) => Some(err),
            Self::Yaml(err) => Some(err),
            Self::Json(err) => Some(err),
        }
    }
}

impl From<serde_yaml::Error> for Error {
    fn from(err: serde_yaml::Error) -> Self { Self::Serialisation(SerialisationError::Yaml(err)) }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self { Self::Serialisation(SerialisationError::Json(err)) }
}

impl From<toml::ser::Error> for Error {
    fn from(err: toml::ser::Error) -> Self { Self::Serialisation(SerialisationError::TomlSe(err)) }
}

impl From<toml::de::Error> for Error {
    fn from(err: toml::de::Error) -> Self { Self::Serialisation(SerialisationError::TomlDe(err)) }
}
