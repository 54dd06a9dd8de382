use eyre::Context as _;
use rand::Rng as _;
use std::{
    fs::{self, OpenOptions},
    io::Write as _,
    path::{Path, PathBuf},
};

#[cfg(unix)]
use std::os::unix::fs::{OpenOptionsExt as _, PermissionsExt as _};

pub const MODE_DIR_PRIVATE: u32 = 0o700;
pub const MODE_FILE_PRIVATE: u32 = 0o600;

fn is_symlink(p: &Path) -> eyre::Result<bool> {
    let md = fs::symlink_metadata(p).with_context(|| format!("stat {}", p.display()))?;
    Ok(md.file_type().is_symlink())
}

/// Create `dir` if needed and clamp it to owner-only permissions.
///
/// Refuses symlinked directories: everything under the config/data dirs is
/// key material or derived from it.
pub fn ensure_private_dir(dir: &Path) -> eyre::Result<()> {
    if dir.exists() {
        if is_symlink(dir)? {
            eyre::bail!("refusing to use symlinked directory: {}", dir.display());
        }
        let md = fs::metadata(dir).with_context(|| format!("stat {}", dir.display()))?;
        if !md.is_dir() {
            eyre::bail!("expected directory at {}", dir.display());
        }
    } else {
        fs::create_dir_all(dir).with_context(|| format!("create dir {}", dir.display()))?;
    }

    #[cfg(unix)]
    {
        let md = fs::metadata(dir).with_context(|| format!("stat {}", dir.display()))?;
        let mode = md.permissions().mode();
        if (mode & 0o077) != 0 {
            fs::set_permissions(dir, fs::Permissions::from_mode(MODE_DIR_PRIVATE))
                .with_context(|| format!("chmod {:o} {}", MODE_DIR_PRIVATE, dir.display()))?;
        }
    }

    Ok(())
}

fn tmp_sibling(parent: &Path, final_name: &Path) -> PathBuf {
    let base = final_name
        .file_name()
        .and_then(|s| s.to_str())
        .unwrap_or("file");
    let mut suffix = [0_u8; 8];
    rand::rng().fill_bytes(&mut suffix);
    parent.join(format!(".{base}.tmp.{}", hex::encode(suffix)))
}

/// Write `bytes` to `path` without ever exposing a partially written file.
///
/// The bytes land in a fresh temp file in the same directory (created with
/// `mode` on Unix), are fsynced, and are then renamed over the destination.
/// A crash mid-write leaves the previous file contents intact.
pub fn write_atomic(path: &Path, bytes: &[u8], mode: u32) -> eyre::Result<()> {
    let parent = path
        .parent()
        .ok_or_else(|| eyre::eyre!("missing parent for {}", path.display()))?;
    ensure_private_dir(parent)?;

    if path.exists() && is_symlink(path)? {
        eyre::bail!("refusing to write to symlink: {}", path.display());
    }

    let tmp = tmp_sibling(parent, path);

    let mut oo = OpenOptions::new();
    oo.create_new(true).write(true);
    #[cfg(unix)]
    {
        oo.mode(mode);
    }
    #[cfg(not(unix))]
    {
        let _mode = mode;
    }
    let mut f = oo
        .open(&tmp)
        .with_context(|| format!("open temp {}", tmp.display()))?;

    let write_result = f
        .write_all(bytes)
        .and_then(|()| f.flush())
        .and_then(|()| f.sync_all());
    if let Err(e) = write_result {
        drop(f);
        drop(fs::remove_file(&tmp));
        return Err(eyre::Report::new(e).wrap_err(format!("write {}", tmp.display())));
    }
    drop(f);

    // `rename` is atomic on Unix. On Windows it can fail if the destination exists.
    #[cfg(windows)]
    {
        if path.exists() {
            fs::remove_file(path).with_context(|| format!("remove existing {}", path.display()))?;
        }
    }

    if let Err(e) = fs::rename(&tmp, path) {
        drop(fs::remove_file(&tmp));
        return Err(eyre::Report::new(e)
            .wrap_err(format!("rename {} -> {}", tmp.display(), path.display())));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use eyre::ContextCompat as _;

    #[test]
    fn write_atomic_replaces_previous_contents() -> eyre::Result<()> {
        let td = tempfile::tempdir().context("create tempdir")?;
        let p = td.path().join("store").join("blob.bin");

        write_atomic(&p, b"first", MODE_FILE_PRIVATE)?;
        write_atomic(&p, b"second", MODE_FILE_PRIVATE)?;

        let got = fs::read(&p).context("read back")?;
        assert_eq!(got, b"second");

        // No temp leftovers in the parent directory.
        let names: Vec<String> = fs::read_dir(p.parent().context("parent")?)
            .context("read_dir")?
            .filter_map(|e| e.ok())
            .filter_map(|e| e.file_name().to_str().map(str::to_owned))
            .collect();
        assert_eq!(names, vec!["blob.bin".to_owned()], "unexpected files: {names:?}");
        Ok(())
    }

    #[cfg(unix)]
    #[test]
    fn write_atomic_creates_private_file() -> eyre::Result<()> {
        let td = tempfile::tempdir().context("create tempdir")?;
        let p = td.path().join("blob.bin");
        write_atomic(&p, b"x", MODE_FILE_PRIVATE)?;
        let mode = fs::metadata(&p).context("stat")?.permissions().mode();
        assert_eq!(mode & 0o777, MODE_FILE_PRIVATE, "mode was {mode:o}");
        Ok(())
    }
}
