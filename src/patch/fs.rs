// Blocking filesystem helpers for patches: snapshot copy, restore, atomic writes.

use std::io::Write;
use std::path::Path;

/// Recursive copy of `src` into `dst` (created if missing), file by file,
/// keeping permission bits. Symlinks are recreated, not followed.
pub(crate) fn copy_dir(src: &Path, dst: &Path) -> std::io::Result<()> {
    std::fs::create_dir_all(dst)?;
    // Directory modes are applied last so read-only dirs can still be filled.
    let mut dir_modes = vec![(dst.to_path_buf(), std::fs::metadata(src)?.permissions())];
    for entry in walkdir::WalkDir::new(src).min_depth(1).follow_links(false) {
        let entry = entry.map_err(std::io::Error::other)?;
        let rel = entry
            .path()
            .strip_prefix(src)
            .map_err(std::io::Error::other)?;
        let target = dst.join(rel);
        let file_type = entry.file_type();
        if file_type.is_dir() {
            std::fs::create_dir_all(&target)?;
            dir_modes.push((target, entry.metadata()?.permissions()));
        } else if file_type.is_symlink() {
            let link = std::fs::read_link(entry.path())?;
            #[cfg(unix)]
            std::os::unix::fs::symlink(&link, &target)?;
            #[cfg(not(unix))]
            std::fs::copy(entry.path(), &target).map(|_| ())?;
        } else {
            // fs::copy carries the permission bits over.
            std::fs::copy(entry.path(), &target)?;
        }
    }
    for (dir, perms) in dir_modes.into_iter().rev() {
        std::fs::set_permissions(&dir, perms)?;
    }
    Ok(())
}

/// Replace `live` wholesale with the contents of `snapshot`.
pub(crate) fn restore_dir(snapshot: &Path, live: &Path) -> std::io::Result<()> {
    match std::fs::remove_dir_all(live) {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => return Err(e),
    }
    copy_dir(snapshot, live)
}

pub(crate) fn write_atomic(path: &Path, contents: &str) -> std::io::Result<()> {
    let parent = path.parent().unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(parent)?;
    let mut tmp = tempfile::NamedTempFile::new_in(parent)?;
    tmp.write_all(contents.as_bytes())?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

pub(crate) fn remove_if_exists(path: &Path) -> std::io::Result<()> {
    match std::fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e),
    }
}
