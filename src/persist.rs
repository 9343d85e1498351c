// Durable JSON writes shared by the ledger and the config file.
// Write to a sibling temp file, fsync, rename over the target, fsync the directory.

use serde::Serialize;
use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

/// Temp path next to `path` so the final rename stays on one filesystem.
fn temp_path_for(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_else(|| "state".into());
    name.push(".tmp");
    path.with_file_name(name)
}

/// Serializes `value` as pretty JSON and atomically replaces `path`.
/// A crash at any point leaves either the previous file or the new one.
pub fn write_json_atomic<T: Serialize + ?Sized>(path: &Path, value: &T) -> io::Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent)?;
    }

    let tmp = temp_path_for(path);
    let result = (|| {
        let file = File::create(&tmp)?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer_pretty(&mut writer, value).map_err(io::Error::other)?;
        writer.write_all(b"\n")?;
        writer.flush()?;
        writer.get_ref().sync_all()?;
        fs::rename(&tmp, path)
    })();

    if let Err(e) = result {
        let _ = fs::remove_file(&tmp);
        return Err(e);
    }

    sync_parent_dir(path);
    Ok(())
}

/// Makes the rename itself durable. Best effort: not every platform allows
/// opening a directory for sync.
fn sync_parent_dir(path: &Path) {
    #[cfg(unix)]
    {
        let parent = match path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };
        if let Ok(dir) = File::open(parent)
            && let Err(e) = dir.sync_all()
        {
            tracing::debug!(error = %e, path = %parent.display(), "directory fsync failed");
        }
    }
    #[cfg(not(unix))]
    let _ = path;
}
