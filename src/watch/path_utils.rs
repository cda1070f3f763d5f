// src/watch/path_utils.rs

use std::path::{Path, PathBuf};

use crate::graph::includes::normalize;

/// Map an event path onto the project: relative to `root`, `/`-separated.
///
/// Removed files can't be canonicalized, so when the direct prefix check
/// fails the parent directory is canonicalized instead and the file name is
/// re-attached (macOS reports `/private/var/...` for `/var/...`).
pub fn relative_path(root: &Path, path: &Path) -> Option<PathBuf> {
    if let Ok(rel) = path.strip_prefix(root) {
        return normalize(rel);
    }

    let root_canon = root.canonicalize().ok()?;
    let path_canon = match path.canonicalize() {
        Ok(p) => p,
        Err(_) => {
            let parent = path.parent()?.canonicalize().ok()?;
            parent.join(path.file_name()?)
        }
    };
    let rel = path_canon.strip_prefix(&root_canon).ok()?;
    normalize(rel)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_root_prefix() {
        assert_eq!(
            relative_path(Path::new("/p"), Path::new("/p/sub/a.ink")),
            Some(PathBuf::from("sub/a.ink"))
        );
        assert_eq!(relative_path(Path::new("/p"), Path::new("/p")), None);
    }

    #[test]
    fn handles_removed_files_under_canonical_root() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().canonicalize().unwrap();
        let gone = root.join("gone.ink");
        assert_eq!(relative_path(&root, &gone), Some(PathBuf::from("gone.ink")));
    }
}
