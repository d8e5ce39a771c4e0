use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

use anyhow::{Context, Error};
use walkdir::WalkDir;

/// Path of the temporary sibling of `path` used for atomic replacements.
fn tmp_sibling(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".tmp");
    path.with_file_name(name)
}

/// Write `content` into `path` so that readers see either the old or the new content.
pub(crate) fn write_atomic<P: AsRef<Path>>(path: P, content: &[u8]) -> Result<(), Error> {
    let path = path.as_ref();
    let tmp = tmp_sibling(path);
    std::fs::write(&tmp, content)
        .with_context(|| format!("Failed to write {}", tmp.display()))?;
    std::fs::rename(&tmp, path)
        .with_context(|| format!("Failed to move {} -> {}", tmp.display(), path.display()))?;
    Ok(())
}

/// Make `link` a symlink pointing to `target`, replacing it atomically if it already exists.
pub(crate) fn swap_symlink<P: AsRef<Path>>(link: P, target: &Path) -> Result<(), Error> {
    let link = link.as_ref();
    let tmp = tmp_sibling(link);
    // a leftover of a previous crash
    if tmp.symlink_metadata().is_ok() {
        std::fs::remove_file(&tmp)
            .with_context(|| format!("Failed to remove {}", tmp.display()))?;
    }
    std::os::unix::fs::symlink(target, &tmp)
        .with_context(|| format!("Failed to create symlink {}", tmp.display()))?;
    std::fs::rename(&tmp, link)
        .with_context(|| format!("Failed to move {} -> {}", tmp.display(), link.display()))?;
    Ok(())
}

/// Remove a directory tree, even if the submission made some of its directories read-only.
pub(crate) fn remove_tree<P: AsRef<Path>>(path: P) -> Result<(), Error> {
    let path = path.as_ref();
    if path.symlink_metadata().is_err() {
        return Ok(());
    }
    if !path.is_dir() {
        return std::fs::remove_file(path)
            .with_context(|| format!("Failed to remove {}", path.display()));
    }
    // first pass to make everything writable
    for entry in WalkDir::new(path).into_iter().filter_map(Result::ok) {
        if entry.file_type().is_dir() {
            let mut permissions = entry.metadata()?.permissions();
            if permissions.mode() & 0o700 != 0o700 {
                permissions.set_mode(permissions.mode() | 0o700);
                std::fs::set_permissions(entry.path(), permissions)
                    .with_context(|| format!("Failed to chmod {}", entry.path().display()))?;
            }
        }
    }
    std::fs::remove_dir_all(path).with_context(|| format!("Failed to remove {}", path.display()))
}

/// Move `from` to `to`, falling back to copy-and-remove for files on another filesystem.
pub(crate) fn move_file(from: &Path, to: &Path) -> Result<(), Error> {
    if std::fs::rename(from, to).is_ok() {
        return Ok(());
    }
    let tmp = tmp_sibling(to);
    std::fs::copy(from, &tmp)
        .with_context(|| format!("Failed to copy {} -> {}", from.display(), tmp.display()))?;
    std::fs::rename(&tmp, to)
        .with_context(|| format!("Failed to move {} -> {}", tmp.display(), to.display()))?;
    std::fs::remove_file(from).with_context(|| format!("Failed to remove {}", from.display()))
}
