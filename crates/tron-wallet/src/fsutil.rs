//! Owner-only directories and atomic file replacement for wallet storage.

use eyre::Context as _;
use rand::Rng as _;
use std::{
    fs::{self, File, OpenOptions},
    io::{ErrorKind, Write as _},
    path::{Path, PathBuf},
};

#[cfg(unix)]
use std::os::unix::fs::{OpenOptionsExt as _, PermissionsExt as _};

pub const MODE_DIR_PRIVATE: u32 = 0o700;
pub const MODE_FILE_PRIVATE: u32 = 0o600;

/// Create `dir` (and parents) if needed and make sure it is a real, owner-only directory.
pub fn ensure_private_dir(dir: &Path) -> eyre::Result<()> {
    match fs::symlink_metadata(dir) {
        Ok(md) if md.file_type().is_symlink() => {
            eyre::bail!("refusing to use symlinked directory: {}", dir.display())
        }
        Ok(md) if !md.is_dir() => eyre::bail!("not a directory: {}", dir.display()),
        Ok(_) => {}
        Err(e) if e.kind() == ErrorKind::NotFound => {
            fs::create_dir_all(dir).with_context(|| format!("create dir {}", dir.display()))?;
        }
        Err(e) => return Err(eyre::Report::new(e).wrap_err(format!("stat {}", dir.display()))),
    }

    #[cfg(unix)]
    {
        let perms = fs::metadata(dir)
            .with_context(|| format!("stat {}", dir.display()))?
            .permissions();
        if perms.mode() & 0o077 != 0 {
            fs::set_permissions(dir, fs::Permissions::from_mode(MODE_DIR_PRIVATE))
                .with_context(|| format!("chmod {MODE_DIR_PRIVATE:o} {}", dir.display()))?;
        }
    }
    Ok(())
}

/// Sibling temp file: `<name>.<random>.tmp`, so it never ends in `.json` and never shows up
/// in a wallet listing.
fn temp_sibling(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .and_then(|s| s.to_str())
        .unwrap_or("wallet");
    let mut nonce = [0_u8; 6];
    rand::rng().fill_bytes(&mut nonce);
    path.with_file_name(format!("{name}.{}.tmp", hex::encode(nonce)))
}

fn create_private(path: &Path) -> std::io::Result<File> {
    let mut opts = OpenOptions::new();
    opts.write(true).create_new(true);
    #[cfg(unix)]
    opts.mode(MODE_FILE_PRIVATE);
    opts.open(path)
}

/// Replace `path` with `bytes` (owner-only) via temp file + rename; readers see either the old
/// or the new content, never a mix.
pub fn write_private_atomic(path: &Path, bytes: &[u8]) -> eyre::Result<()> {
    if fs::symlink_metadata(path).is_ok_and(|md| md.file_type().is_symlink()) {
        eyre::bail!("refusing to write through symlink: {}", path.display());
    }

    let tmp = temp_sibling(path);
    let written = create_private(&tmp).and_then(|mut f| {
        f.write_all(bytes)?;
        f.sync_all()
    });
    if let Err(e) = written {
        let _cleanup = fs::remove_file(&tmp);
        return Err(eyre::Report::new(e).wrap_err(format!("write {}", tmp.display())));
    }

    // Windows rename does not replace an existing destination.
    #[cfg(windows)]
    {
        if path.exists() {
            fs::remove_file(path).with_context(|| format!("remove {}", path.display()))?;
        }
    }

    fs::rename(&tmp, path).map_err(|e| {
        let _cleanup = fs::remove_file(&tmp);
        eyre::Report::new(e).wrap_err(format!("rename {} -> {}", tmp.display(), path.display()))
    })
}

/// Move `from` to `to` without ever replacing an existing `to`.
///
/// Returns `Ok(false)` if `to` is already taken. Uses a hard link to claim the destination,
/// falling back to check-then-rename on filesystems without link support.
pub fn rename_no_clobber(from: &Path, to: &Path) -> eyre::Result<bool> {
    match fs::hard_link(from, to) {
        Ok(()) => {
            fs::remove_file(from).with_context(|| format!("remove {}", from.display()))?;
            Ok(true)
        }
        Err(e) if e.kind() == ErrorKind::AlreadyExists => Ok(false),
        Err(_) => {
            if to.exists() {
                return Ok(false);
            }
            fs::rename(from, to)
                .with_context(|| format!("rename {} -> {}", from.display(), to.display()))?;
            Ok(true)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn atomic_write_replaces_content() -> eyre::Result<()> {
        let dir = tempfile::tempdir()?;
        let p = dir.path().join("a.json");
        write_private_atomic(&p, b"one")?;
        write_private_atomic(&p, b"two")?;
        assert_eq!(fs::read_to_string(&p)?, "two");

        let leftovers = fs::read_dir(dir.path())?
            .filter_map(Result::ok)
            .filter(|e| e.file_name().to_string_lossy().ends_with(".tmp"))
            .count();
        assert_eq!(leftovers, 0, "temp files left behind");

        #[cfg(unix)]
        {
            let mode = fs::metadata(&p)?.permissions().mode() & 0o777;
            assert_eq!(mode, MODE_FILE_PRIVATE);
        }
        Ok(())
    }

    #[test]
    fn rename_no_clobber_keeps_existing_target() -> eyre::Result<()> {
        let dir = tempfile::tempdir()?;
        let src = dir.path().join("src");
        let dst = dir.path().join("dst");
        fs::write(&src, "new")?;
        fs::write(&dst, "old")?;

        assert!(!rename_no_clobber(&src, &dst)?);
        assert_eq!(fs::read_to_string(&dst)?, "old");
        assert!(src.exists());

        let free = dir.path().join("free");
        assert!(rename_no_clobber(&src, &free)?);
        assert!(!src.exists());
        assert_eq!(fs::read_to_string(&free)?, "new");
        Ok(())
    }

    #[cfg(unix)]
    #[test]
    fn private_dir_is_created_with_owner_only_perms() -> eyre::Result<()> {
        let dir = tempfile::tempdir()?;
        let p = dir.path().join("nested").join("wallets");
        ensure_private_dir(&p)?;
        let mode = fs::metadata(&p)?.permissions().mode() & 0o777;
        assert_eq!(mode, MODE_DIR_PRIVATE);
        Ok(())
    }
}
