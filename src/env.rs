use std::collections::BTreeMap;
use std::ffi::OsString;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

/// Load `.env` files before arguments are parsed so that `GLA_*` variables
/// can back clap's `env` fallbacks. Returns the files that were applied.
pub fn bootstrap_from_args(args: &[OsString]) -> Result<Vec<PathBuf>> {
    let explicit =
        extract_env_file_arg(args).or_else(|| std::env::var_os("GLA_ENV_FILE").map(PathBuf::from));
    let cwd = std::env::current_dir().context("failed to read current directory")?;
    load_env_files(&resolve_env_files(&cwd, explicit.as_ref()), explicit.is_some())
}

fn load_env_files(files: &[PathBuf], required: bool) -> Result<Vec<PathBuf>> {
    let mut values: BTreeMap<String, String> = BTreeMap::new();
    let mut applied = Vec::new();

    for path in files {
        if !required && !path.exists() {
            continue;
        }
        let entries = dotenvy::from_path_iter(path)
            .with_context(|| format!("failed to read env file {}", path.display()))?;
        for entry in entries {
            let (key, value) =
                entry.with_context(|| format!("failed to parse env file {}", path.display()))?;
            // The process environment always wins over any file.
            if std::env::var_os(&key).is_none() {
                values.insert(key, value);
            }
        }
        applied.push(path.clone());
    }

    for (key, value) in values {
        std::env::set_var(key, value);
    }
    Ok(applied)
}

fn extract_env_file_arg(args: &[OsString]) -> Option<PathBuf> {
    let mut explicit = None;
    let mut idx = 1usize;
    while idx < args.len() {
        let Some(arg) = args[idx].to_str() else {
            idx += 1;
            continue;
        };

        if arg == "--" {
            break;
        }

        if arg == "--env-file" {
            if let Some(next) = args.get(idx + 1) {
                explicit = Some(PathBuf::from(next));
            }
            idx += 2;
            continue;
        }

        if let Some(value) = arg.strip_prefix("--env-file=") {
            explicit = Some(PathBuf::from(value));
        }

        idx += 1;
    }
    explicit
}

fn resolve_env_files(cwd: &Path, explicit_env_file: Option<&PathBuf>) -> Vec<PathBuf> {
    if let Some(path) = explicit_env_file {
        let full_path = if path.is_absolute() {
            path.clone()
        } else {
            cwd.join(path)
        };
        return vec![full_path];
    }

    let profile = std::env::var("GLA_ENV").unwrap_or_else(|_| "development".to_string());
    let mut files = vec![cwd.join(".env"), cwd.join(format!(".env.{profile}"))];
    if profile != "test" {
        files.push(cwd.join(".env.local"));
    }
    files.push(cwd.join(format!(".env.{profile}.local")));
    files
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn argv(args: &[&str]) -> Vec<OsString> {
        args.iter().map(OsString::from).collect()
    }

    #[test]
    fn env_file_flag_is_found_in_either_form() {
        assert_eq!(
            extract_env_file_arg(&argv(&["gla", "bulk", "status", "--env-file", "prod.env"])),
            Some(PathBuf::from("prod.env"))
        );
        assert_eq!(
            extract_env_file_arg(&argv(&["gla", "--env-file=dev.env", "bulk", "start"])),
            Some(PathBuf::from("dev.env"))
        );
    }

    #[test]
    fn env_file_after_separator_is_ignored() {
        assert_eq!(
            extract_env_file_arg(&argv(&["gla", "--", "--env-file", "x.env"])),
            None
        );
    }

    #[test]
    fn explicit_env_file_is_resolved_against_cwd() {
        let tmp = TempDir::new().unwrap();
        let files = resolve_env_files(tmp.path(), Some(&PathBuf::from("custom.env")));
        assert_eq!(files, vec![tmp.path().join("custom.env")]);
    }

    #[test]
    fn later_files_override_earlier_ones() {
        let tmp = TempDir::new().unwrap();
        let base = tmp.path().join(".env");
        let local = tmp.path().join(".env.local");
        std::fs::write(&base, "GLA_TEST_ENV_LAYERING=base\n").unwrap();
        std::fs::write(&local, "GLA_TEST_ENV_LAYERING=local\n").unwrap();

        let applied = load_env_files(
            &[base.clone(), tmp.path().join(".env.missing"), local.clone()],
            false,
        )
        .unwrap();
        assert_eq!(applied, vec![base, local]);
        assert_eq!(std::env::var("GLA_TEST_ENV_LAYERING").unwrap(), "local");
    }

    #[test]
    fn missing_explicit_file_is_an_error() {
        let tmp = TempDir::new().unwrap();
        assert!(load_env_files(&[tmp.path().join("absent.env")], true).is_err());
    }

    #[test]
    fn default_env_files_end_with_most_specific() {
        let tmp = TempDir::new().unwrap();
        let files = resolve_env_files(tmp.path(), None);
        assert_eq!(files.first(), Some(&tmp.path().join(".env")));
        assert!(files.last().unwrap().to_string_lossy().ends_with(".local"));
    }
}
