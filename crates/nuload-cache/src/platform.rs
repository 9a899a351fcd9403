//! Picks the assemblies a host should load from an extracted package.

use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

use nuload_core::error::NuloadError;
use nuload_core::utils::get_extension;
use nuload_core::TargetFramework;

use crate::CacheResult;

/// The `lib/<tfm>/` folder chosen for a host framework
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetSelection {
    pub framework: TargetFramework,
    pub directory: PathBuf,
    /// `*.dll` files in `directory`, sorted by name
    pub assemblies: Vec<PathBuf>,
}

/// Choose the nearest compatible `lib/<tfm>/` folder of an extracted package
///
/// Returns `None` for packages without a `lib/` folder (meta-packages) or
/// without a folder the host framework can use.
pub fn select_target(package_dir: &Path, framework: &TargetFramework) -> CacheResult<Option<TargetSelection>> {
    let lib_dir = package_dir.join("lib");
    let children = match fs::read_dir(&lib_dir) {
        Ok(children) => children,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(NuloadError::io(format!("Failed to list {}", lib_dir.display()), e)),
    };

    let mut folders: Vec<(TargetFramework, PathBuf)> = Vec::new();
    for child in children {
        let child = child.map_err(|e| NuloadError::io(format!("Failed to list {}", lib_dir.display()), e))?;
        let path = child.path();
        if !path.is_dir() {
            continue;
        }

        let name = child.file_name().to_string_lossy().into_owned();
        match name.parse::<TargetFramework>() {
            Ok(tfm) => folders.push((tfm, path)),
            Err(_) => debug!("Ignoring lib folder with unknown framework: {}", name),
        }
    }

    let Some(chosen) = framework.nearest(folders.iter().map(|(tfm, _)| tfm)).cloned() else {
        return Ok(None);
    };
    let Some((_, directory)) = folders.into_iter().find(|(tfm, _)| *tfm == chosen) else {
        return Ok(None);
    };

    let mut assemblies: Vec<PathBuf> = fs::read_dir(&directory)
        .map_err(|e| NuloadError::io(format!("Failed to list {}", directory.display()), e))?
        .filter_map(Result::ok)
        .map(|entry| entry.path())
        .filter(|path| path.is_file() && get_extension(path).as_deref() == Some("dll"))
        .collect();
    assemblies.sort();

    debug!("Selected {} for {} ({} assemblies)", chosen, framework, assemblies.len());
    Ok(Some(TargetSelection {
        framework: chosen,
        directory,
        assemblies,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn touch(root: &Path, relative: &str) {
        let path = root.join(relative);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, b"MZ").unwrap();
    }

    fn tfm(s: &str) -> TargetFramework {
        s.parse().unwrap()
    }

    #[test]
    fn test_prefers_same_family() {
        let dir = tempdir().unwrap();
        touch(dir.path(), "lib/net45/Foo.dll");
        touch(dir.path(), "lib/netstandard2.0/Foo.dll");
        touch(dir.path(), "lib/net5.0/Foo.dll");
        touch(dir.path(), "lib/net5.0/Foo.pdb");
        touch(dir.path(), "lib/net8.0/Foo.dll");

        let selection = select_target(dir.path(), &tfm("net6.0")).unwrap().unwrap();
        assert_eq!(selection.framework, tfm("net5.0"));
        assert_eq!(selection.assemblies, vec![dir.path().join("lib/net5.0/Foo.dll")]);
    }

    #[test]
    fn test_falls_back_to_netstandard() {
        let dir = tempdir().unwrap();
        touch(dir.path(), "lib/netstandard1.3/Bar.dll");
        touch(dir.path(), "lib/netstandard2.0/Bar.dll");
        touch(dir.path(), "lib/netstandard2.0/Bar.Extra.dll");

        let selection = select_target(dir.path(), &tfm("net5.0")).unwrap().unwrap();
        assert_eq!(selection.framework, tfm("netstandard2.0"));
        assert_eq!(selection.assemblies.len(), 2);
    }

    #[test]
    fn test_meta_package_has_no_target() {
        let dir = tempdir().unwrap();
        touch(dir.path(), "Meta.nuspec");
        assert!(select_target(dir.path(), &tfm("net5.0")).unwrap().is_none());
    }

    #[test]
    fn test_no_compatible_folder() {
        let dir = tempdir().unwrap();
        touch(dir.path(), "lib/net8.0/Foo.dll");
        touch(dir.path(), "lib/not-a-framework/Foo.dll");
        assert!(select_target(dir.path(), &tfm("net5.0")).unwrap().is_none());
    }
}
