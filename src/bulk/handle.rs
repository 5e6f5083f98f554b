use std::fs;
use std::io::{self, Write as _};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::config;

use super::types::RunHandle;

const HANDLE_FILE: &str = "bulk-run.json";

pub fn path() -> Result<PathBuf> {
    Ok(config::global_config_dir()?.join(HANDLE_FILE))
}

/// Last run started from this machine, if any.
pub fn load() -> Result<Option<RunHandle>> {
    load_from(&path()?)
}

pub fn save(handle: &RunHandle) -> Result<()> {
    save_to(&path()?, handle)
}

pub fn load_from(path: &Path) -> Result<Option<RunHandle>> {
    let contents = match fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(err) => {
            return Err(err).with_context(|| format!("failed to read {}", path.display()));
        }
    };

    match serde_json::from_str(&contents) {
        Ok(handle) => Ok(Some(handle)),
        Err(err) => {
            tracing::warn!(path = %path.display(), error = %err, "ignoring unreadable run handle");
            Ok(None)
        }
    }
}

pub fn save_to(path: &Path, handle: &RunHandle) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }

    let json = serde_json::to_string_pretty(handle)?;
    let temp_path = path.with_extension("tmp");
    let mut file = fs::File::create(&temp_path)
        .with_context(|| format!("failed to write {}", temp_path.display()))?;
    file.write_all(json.as_bytes())?;
    file.write_all(b"\n")?;
    file.sync_all()?;
    fs::rename(&temp_path, path)
        .with_context(|| format!("failed to replace {}", path.display()))?;

    tracing::debug!(run_id = %handle.run_id, path = %path.display(), "saved run handle");
    Ok(())
}
