//! Path resolution for `get`.
//!
//! Resolution is purely lexical: `.` and `..` are folded without touching the
//! filesystem, so symlinks are not followed and a missing file is only
//! noticed when the loader tries to read it.

use std::path::{Component, Path, PathBuf};

/// Resolve `filename` against `dir`.
///
/// An absolute `filename` replaces `dir`. `..` at the root stays at the root.
pub fn resolve(dir: &Path, filename: &str) -> PathBuf {
    let mut resolved = PathBuf::new();
    for component in dir.join(filename).components() {
        match component {
            Component::Prefix(_) | Component::RootDir | Component::Normal(_) => {
                resolved.push(component.as_os_str())
            }
            Component::CurDir => {}
            Component::ParentDir => {
                resolved.pop();
            }
        }
    }
    resolved
}

/// Directory containing `path`; the root for a bare file name.
pub fn parent_dir(path: &Path) -> PathBuf {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from(std::path::MAIN_SEPARATOR_STR),
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[test]
    fn test_relative_to_directory() {
        assert_eq!(resolve(Path::new("/proj/src"), "util.js"), PathBuf::from("/proj/src/util.js"));
        assert_eq!(resolve(Path::new("/proj/src"), "./lib/a.js"), PathBuf::from("/proj/src/lib/a.js"));
    }

    #[test]
    fn test_parent_segments_fold() {
        assert_eq!(resolve(Path::new("/proj/src/deep"), "../../b.js"), PathBuf::from("/proj/b.js"));
        assert_eq!(resolve(Path::new("/proj"), "a/./b/../c.js"), PathBuf::from("/proj/a/c.js"));
        assert_eq!(resolve(Path::new("/"), "../../x.js"), PathBuf::from("/x.js"));
    }

    #[test]
    fn test_absolute_filename_wins() {
        assert_eq!(resolve(Path::new("/proj/src"), "/etc/m.js"), PathBuf::from("/etc/m.js"));
    }

    #[test]
    fn test_no_extension_is_added() {
        assert_eq!(resolve(Path::new("/proj"), "util"), PathBuf::from("/proj/util"));
    }

    #[test]
    fn test_parent_dir() {
        assert_eq!(parent_dir(Path::new("/proj/__main__")), PathBuf::from("/proj"));
        assert_eq!(parent_dir(Path::new("/main.js")), PathBuf::from("/"));
    }
}
