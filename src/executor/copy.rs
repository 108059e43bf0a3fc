//! Single-entry copy primitives

use crate::types::DemodError;
use std::fs::{self, File};
use std::io::{self, Read, Write};
use std::path::Path;

/// Prefix of the staging file a copy streams into
const PART_PREFIX: &str = ".demod-part-";

/// Copy one file byte-for-byte, never leaving a half-written destination
///
/// 1. Create parent directories
/// 2. Stream into a uniquely named hidden staging file next to `dest`
/// 3. Copy permission bits from the source
/// 4. Rename into place
///
/// The staging file is created exclusively, so it never overwrites an entry
/// already copied into the same directory. On any failure it is removed
/// before the error is returned.
///
/// # Returns
/// * `Ok(u64)` - Number of bytes copied
/// * `Err(DemodError::Copy)` - naming the destination path
///
/// # Example
/// ```no_run
/// use demod::executor::copy_file;
/// use std::path::Path;
///
/// let bytes = copy_file(Path::new("upstream/a.go"), Path::new("vendor/a.go"))?;
/// # Ok::<(), demod::DemodError>(())
/// ```
pub fn copy_file(src: &Path, dest: &Path) -> Result<u64, DemodError> {
    let parent = match dest.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::create_dir_all(parent).map_err(|e| copy_error(parent, e))?;

    let mut part = tempfile::Builder::new()
        .prefix(PART_PREFIX)
        .tempfile_in(parent)
        .map_err(|e| copy_error(dest, e))?;

    let bytes = write_part(src, part.as_file_mut()).map_err(|e| copy_error(dest, e))?;
    part.persist(dest).map_err(|e| copy_error(dest, e.error))?;

    Ok(bytes)
}

fn write_part(src: &Path, part_file: &mut File) -> io::Result<u64> {
    let mut src_file = File::open(src)?;

    let mut buffer = vec![0u8; 128 * 1024];
    let mut total_bytes = 0u64;

    loop {
        let bytes_read = src_file.read(&mut buffer)?;
        if bytes_read == 0 {
            break;
        }
        part_file.write_all(&buffer[..bytes_read])?;
        total_bytes += bytes_read as u64;
    }

    part_file.set_permissions(src_file.metadata()?.permissions())?;

    Ok(total_bytes)
}

/// Recreate a symlink at `dest` with the same target, without dereferencing it.
///
/// Anything already at `dest` is removed first.
pub fn copy_symlink(src: &Path, dest: &Path) -> Result<(), DemodError> {
    if let Some(parent) = dest.parent() {
        fs::create_dir_all(parent).map_err(|e| copy_error(parent, e))?;
    }

    if fs::symlink_metadata(dest).is_ok() {
        remove_path_any(dest).map_err(|e| copy_error(dest, e))?;
    }

    let target = fs::read_link(src).map_err(|e| copy_error(src, e))?;
    create_symlink(&target, dest).map_err(|e| copy_error(dest, e))
}

/// Remove any filesystem entry at `path`.
///
/// Directories are removed recursively; files and symlinks are removed as files.
pub(crate) fn remove_path_any(path: &Path) -> io::Result<()> {
    let metadata = fs::symlink_metadata(path)?;
    if metadata.file_type().is_dir() {
        fs::remove_dir_all(path)
    } else {
        fs::remove_file(path)
    }
}

#[cfg(unix)]
fn create_symlink(target: &Path, link_path: &Path) -> io::Result<()> {
    std::os::unix::fs::symlink(target, link_path)
}

#[cfg(windows)]
fn create_symlink(target: &Path, link_path: &Path) -> io::Result<()> {
    use std::os::windows::fs::{symlink_dir, symlink_file};

    match symlink_file(target, link_path) {
        Ok(()) => Ok(()),
        Err(file_err) => symlink_dir(target, link_path).map_err(|_| file_err),
    }
}

pub(crate) fn copy_error(path: &Path, source: io::Error) -> DemodError {
    DemodError::Copy {
        path: path.to_path_buf(),
        source,
    }
}
