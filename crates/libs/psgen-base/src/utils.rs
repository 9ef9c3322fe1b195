//! Path helpers.

use std::path::{Component, Path, PathBuf};

const HOME: [&str; 6] = [
    "~/",
    "~\\",
    "$HOME/",
    "%USERPROFILE%/",
    "%HOMEPATH%/",
    "%HOME%/",
];

/// Expands a leading home directory marker (`~/`, `$HOME/`, ...).
///
/// Returns the path unchanged if it has no such prefix or if the home
/// directory can't be determined.
pub fn expand_home(path: &Path) -> PathBuf {
    let text = path.to_string_lossy();
    for prefix in HOME {
        if let Some(rest) = text.strip_prefix(prefix) {
            if let Some(home) = dirs::home_dir() {
                return home.join(rest);
            }
        }
    }
    path.to_path_buf()
}

/// Resolves `path` against `base`.
///
/// Home prefixes are expanded first, then relative paths are joined onto
/// `base`. Existing paths are canonicalized, the others normalised
/// lexically.
pub fn canonicalize_path(base: &Path, path: Option<&Path>) -> PathBuf {
    log::trace!(
        "Canonicalizing path: base={}, path={:?}",
        base.display(),
        path
    );
    let resolved = match path {
        None => base.to_path_buf(),
        Some(path) => {
            let expanded = expand_home(path);
            if expanded.is_relative() {
                base.join(expanded)
            } else {
                expanded
            }
        },
    };
    resolved
        .canonicalize()
        .unwrap_or_else(|_| normalise_path(&resolved))
}

/// Removes `.` and `..` components without touching the file system.
pub fn normalise_path(path: &Path) -> PathBuf {
    let mut components = path.components().peekable();
    let mut ret = if let Some(c @ Component::Prefix(..)) = components.peek().cloned() {
        components.next();
        PathBuf::from(c.as_os_str())
    } else {
        PathBuf::new()
    };

    for component in components {
        match component {
            Component::Prefix(..) => {},
            Component::RootDir => ret.push(component.as_os_str()),
            Component::CurDir => {},
            Component::ParentDir => {
                ret.pop();
            },
            Component::Normal(c) => ret.push(c),
        }
    }
    ret
}

/// Joins path components with `/`, whatever the host separator is.
pub fn slash_path<I, S>(parts: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    parts
        .into_iter()
        .map(|p| p.as_ref().to_owned())
        .collect::<Vec<_>>()
        .join("/")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalise_path() {
        let path = Path::new("/a/b/c/../../d");
        assert_eq!(normalise_path(path), Path::new("/a/d"));
        assert_eq!(normalise_path(Path::new("./x/./y")), Path::new("x/y"));
    }

    #[test]
    fn test_canonicalize_relative_missing_path() {
        let base = Path::new("/definitely/not/here");
        let resolved = canonicalize_path(base, Some(Path::new("../renders")));
        assert_eq!(resolved, Path::new("/definitely/not/renders"));
        assert_eq!(canonicalize_path(base, None), base);
    }

    #[test]
    fn test_expand_home() {
        if let Some(home) = dirs::home_dir() {
            assert_eq!(expand_home(Path::new("~/brdfs")), home.join("brdfs"));
        }
        assert_eq!(expand_home(Path::new("/abs/brdfs")), Path::new("/abs/brdfs"));
    }

    #[test]
    fn test_slash_path() {
        assert_eq!(
            slash_path(["ball", "images", "light_1.png"]),
            "ball/images/light_1.png"
        );
    }
}
