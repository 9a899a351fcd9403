//! Path utilities for safe file system operations.
//!
//! Archive entries are joined onto an extraction root only after these checks.

use crate::error::{NuloadError, NuloadResult};
use std::path::{Component, Path, PathBuf};

/// Normalize a path by resolving . and .. components
pub fn normalize_path(path: &Path) -> PathBuf {
    let mut components = Vec::new();

    for component in path.components() {
        match component {
            Component::CurDir => {},
            Component::ParentDir => {
                if components.is_empty() {
                    components.push(component);
                } else {
                    components.pop();
                }
            },
            other => components.push(other),
        }
    }

    components.iter().collect()
}

/// Check if a relative path stays below its base
pub fn is_safe_path(path: &Path) -> bool {
    if path.is_absolute() {
        return false;
    }

    let mut depth = 0i32;

    for component in path.components() {
        match component {
            Component::CurDir => {},
            Component::ParentDir => {
                depth -= 1;
                if depth < 0 {
                    return false;
                }
            },
            Component::Normal(_) => depth += 1,
            // RootDir and Prefix never belong in an archive entry
            _ => return false,
        }
    }

    true
}

/// Join `path` onto `base`, rejecting entries that would escape it
pub fn safe_join(base: &Path, path: &Path) -> NuloadResult<PathBuf> {
    if !is_safe_path(path) {
        return Err(NuloadError::archive(format!(
            "entry '{}' escapes the extraction directory",
            path.display()
        )));
    }

    Ok(base.join(normalize_path(path)))
}

/// Get the file extension as a lowercase string
pub fn get_extension(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_path() {
        let path = Path::new("./lib/../lib/./net5.0/Foo.dll");
        assert_eq!(normalize_path(path), Path::new("lib/net5.0/Foo.dll"));
    }

    #[test]
    fn test_is_safe_path() {
        assert!(is_safe_path(Path::new("lib/netstandard2.0/Foo.dll")));
        assert!(is_safe_path(Path::new("./Foo.nuspec")));
        assert!(!is_safe_path(Path::new("../../../etc/passwd")));
        assert!(!is_safe_path(Path::new("lib/../../outside")));
        assert!(!is_safe_path(Path::new("/absolute/path")));
    }

    #[test]
    fn test_safe_join() {
        let base = Path::new("/packages/Foo.1.0.0");

        let joined = safe_join(base, Path::new("lib/net5.0/Foo.dll")).unwrap();
        assert_eq!(joined, Path::new("/packages/Foo.1.0.0/lib/net5.0/Foo.dll"));

        let escaped = safe_join(base, Path::new("../Bar.1.0.0/evil.dll"));
        assert!(matches!(escaped, Err(NuloadError::Archive { .. })));
    }

    #[test]
    fn test_get_extension() {
        assert_eq!(get_extension(Path::new("Foo.DLL")), Some("dll".to_string()));
        assert_eq!(get_extension(Path::new("foo.tar.gz")), Some("gz".to_string()));
        assert_eq!(get_extension(Path::new("LICENSE")), None);
    }
}
