//! Executor module: materializes path specs on disk

pub mod copy;

use crate::mapper::{join_under, ExcludeMatcher};
use crate::types::{CopyStats, DemodError};
use std::fs;
use std::io::{self, ErrorKind};
use std::path::{self, Component, Path};
use tracing::trace;

pub use copy::{copy_file, copy_symlink};

/// VCS metadata never copied out of a workspace
const GIT_DIR: &str = ".git";

/// Copy a source tree into `dest_root/dest_base`, honoring exclusions
///
/// Walks `source_root` depth-first. Paths handed to `exclude` are relative to
/// `source_root`; the walk root itself is never tested. An excluded directory
/// is pruned without descending. Directories are created only as parents of
/// copied entries, so a directory left empty by exclusion never appears.
///
/// If `source_root` is a file it is copied to `dest_root/dest_base`.
///
/// # Errors
/// * `DemodError::Copy` for walk or copy failures; entries already copied stay
pub fn copy_tree(
    source_root: &Path,
    dest_base: &Path,
    dest_root: &Path,
    exclude: &ExcludeMatcher,
) -> Result<CopyStats, DemodError> {
    fs::symlink_metadata(source_root).map_err(|e| copy::copy_error(source_root, e))?;

    let target_root = join_under(dest_root, dest_base);
    let root = source_root.to_path_buf();
    let matcher = exclude.clone();

    let walker = ignore::WalkBuilder::new(source_root)
        .standard_filters(false)
        .follow_links(false)
        .sort_by_file_name(|a, b| a.cmp(b))
        .filter_entry(move |entry| {
            if entry.depth() == 0 {
                return true;
            }
            if entry.file_name() == GIT_DIR {
                return false;
            }
            match entry.path().strip_prefix(&root) {
                Ok(relative) => !matcher.is_excluded(relative),
                Err(_) => true,
            }
        })
        .build();

    let mut stats = CopyStats::default();

    for result in walker {
        let entry = result.map_err(|e| walk_error(source_root, e))?;

        let Some(file_type) = entry.file_type() else {
            continue;
        };
        if file_type.is_dir() {
            continue;
        }

        let relative = entry.path().strip_prefix(source_root).unwrap_or(Path::new(""));
        let target = join_under(&target_root, relative);

        if file_type.is_symlink() {
            copy_symlink(entry.path(), &target)?;
            stats.symlinks += 1;
        } else if file_type.is_file() {
            stats.bytes += copy_file(entry.path(), &target)?;
            stats.files += 1;
        } else {
            // Pipes, sockets, devices
            trace!(path = %entry.path().display(), "skipping special file");
            continue;
        }

        trace!(src = %entry.path().display(), dest = %target.display(), "copied");
    }

    Ok(stats)
}

/// Remove a destination tree entirely. A missing path is not an error.
///
/// # Errors
/// * `DemodError::RemoveDest` with `InvalidInput`, before anything is
///   deleted, when `path` ends in `.` or `..` or names no directory at all
///   (empty or a filesystem root)
pub fn remove_tree(path: &Path) -> Result<(), DemodError> {
    check_removable(path).map_err(|e| remove_error(path, e))?;

    match fs::symlink_metadata(path) {
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        Err(e) => Err(remove_error(path, e)),
        Ok(_) => copy::remove_path_any(path).or_else(|e| match e.kind() {
            ErrorKind::NotFound => Ok(()),
            _ => Err(remove_error(path, e)),
        }),
    }
}

/// `Path::components` drops a trailing `.`, so the last segment is read from
/// the raw path.
fn check_removable(path: &Path) -> io::Result<()> {
    let raw = path.to_string_lossy();
    let last = raw
        .trim_end_matches(path::is_separator)
        .rsplit(path::is_separator)
        .next()
        .unwrap_or("");
    let names_entry = path
        .components()
        .any(|component| matches!(component, Component::Normal(_)));

    if last == "." || last == ".." || !names_entry {
        return Err(io::Error::new(
            ErrorKind::InvalidInput,
            "refusing to remove a path ending in . or .. or a filesystem root",
        ));
    }
    Ok(())
}

fn remove_error(path: &Path, source: io::Error) -> DemodError {
    DemodError::RemoveDest {
        path: path.to_path_buf(),
        source,
    }
}

fn walk_error(source_root: &Path, error: ignore::Error) -> DemodError {
    let message = error.to_string();
    let source = error
        .into_io_error()
        .unwrap_or_else(|| io::Error::other(message));
    copy::copy_error(source_root, source)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use tempfile::TempDir;

    fn write(root: &Path, relative: &str, content: &str) {
        let path = root.join(relative);
        fs::create_dir_all(path.parent().expect("has parent")).expect("create parent");
        fs::write(path, content).expect("write fixture");
    }

    #[test]
    fn test_remove_tree_missing_is_ok() {
        let dir = TempDir::new().expect("create tempdir");
        remove_tree(&dir.path().join("never-created")).expect("missing path is fine");
    }

    #[test]
    fn test_remove_tree_removes_directory_and_file() {
        let dir = TempDir::new().expect("create tempdir");
        write(dir.path(), "dest/a/b.txt", "b");
        write(dir.path(), "single.txt", "s");

        remove_tree(&dir.path().join("dest")).expect("remove dir");
        remove_tree(&dir.path().join("single.txt")).expect("remove file");

        assert!(!dir.path().join("dest").exists());
        assert!(!dir.path().join("single.txt").exists());
    }

    #[test]
    fn test_remove_tree_refuses_dot_paths_and_roots() {
        let dir = TempDir::new().expect("create tempdir");
        write(dir.path(), "keep/a.txt", "a");

        let refused = [
            dir.path().join("."),
            dir.path().join("keep/."),
            dir.path().join("keep/./"),
            dir.path().join("keep/.."),
            PathBuf::from("."),
            PathBuf::from(""),
            PathBuf::from("/"),
        ];
        for path in &refused {
            let err = remove_tree(path).expect_err("path must be refused");
            match err {
                DemodError::RemoveDest { source, .. } => {
                    assert_eq!(source.kind(), ErrorKind::InvalidInput, "{}", path.display())
                }
                other => panic!("unexpected error for {}: {other:?}", path.display()),
            }
        }

        assert!(dir.path().join("keep/a.txt").exists());
    }

    #[test]
    fn test_copy_tree_skips_git_metadata() {
        let src = TempDir::new().expect("create src");
        let dst = TempDir::new().expect("create dst");
        write(src.path(), ".git/HEAD", "ref: refs/heads/main");
        write(src.path(), "a.txt", "a");
        write(src.path(), ".hidden", "h");

        let stats = copy_tree(src.path(), Path::new("."), dst.path(), &ExcludeMatcher::empty())
            .expect("copy tree");

        assert_eq!(stats.files, 2);
        assert!(dst.path().join("a.txt").exists());
        assert!(dst.path().join(".hidden").exists());
        assert!(!dst.path().join(".git").exists());
    }

    #[test]
    fn test_copy_tree_missing_source_fails() {
        let dst = TempDir::new().expect("create dst");
        let err = copy_tree(
            &dst.path().join("absent"),
            Path::new("lib"),
            dst.path(),
            &ExcludeMatcher::empty(),
        )
        .expect_err("missing source root");
        assert!(err.is_copy_error());
    }
}
