//! Application configuration.
//!
//! Values are layered: built-in defaults, then `config.toml` in the user's
//! config directory, then `SHELF_*` environment variables.

use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use config::{Config, Environment, File, FileFormat, Map};
use serde::Deserialize;

use crate::{codec::LoadPolicy, save::SaveFile};

/// Directory under `~/.config` holding the config file.
pub const CONFIG_DIR: &str = "shelf";
/// Config file name.
pub const CONFIG_FILE: &str = "config.toml";
/// Prefix of overriding environment variables, e.g. `SHELF_AUTOSAVE=false`.
pub const ENV_PREFIX: &str = "SHELF";

const DEFAULT_CONFIG: &str = r#"# shelf configuration

# Library file. Defaults to shelf/library.csv in the user data directory.
# data_file = "/path/to/library.csv"

# Corrupt rows on load: "abort" refuses the file, "skip" drops the bad rows.
load_policy = "abort"

# Save after every add, borrow and return.
autosave = true

# Add the sample catalog when starting with an empty library.
seed_demo = true
"#;

/// Settings read at startup.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct AppConfig {
    /// Where the library is persisted.
    pub data_file: PathBuf,
    /// How corrupt rows are handled on load.
    #[serde(default)]
    pub load_policy: LoadPolicy,
    /// Save after each successful mutation.
    pub autosave: bool,
    /// Populate an empty library with sample data.
    pub seed_demo: bool,
}

impl AppConfig {
    /// Default config file location.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(CONFIG_DIR)
            .join(CONFIG_FILE)
    }

    /// Load from the default location.
    pub fn load() -> Result<Self> {
        Self::load_from(Self::default_path())
    }

    /// Load with `path` as the file layer. A missing file just means defaults.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        Self::load_layers(path.as_ref(), None)
    }

    /// `env` replaces the process environment when given.
    fn load_layers(path: &Path, env: Option<Map<String, String>>) -> Result<Self> {
        let default_data = SaveFile::default_path().to_string_lossy().into_owned();
        let settings = Config::builder()
            .set_default("data_file", default_data)?
            .set_default("load_policy", "abort")?
            .set_default("autosave", true)?
            .set_default("seed_demo", true)?
            .add_source(File::from(path).format(FileFormat::Toml).required(false))
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .try_parsing(true)
                    .source(env),
            )
            .build()
            .with_context(|| format!("failed to read configuration {}", path.display()))?;
        settings
            .try_deserialize()
            .with_context(|| format!("invalid configuration in {}", path.display()))
    }
}

/// Write the commented default config file unless one exists.
pub fn ensure_default_config() -> Result<PathBuf> {
    ensure_config_at(AppConfig::default_path())
}

/// Same as [`ensure_default_config`] for an explicit location.
pub fn ensure_config_at(path: impl Into<PathBuf>) -> Result<PathBuf> {
    let path = path.into();
    if path.exists() {
        return Ok(path);
    }
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    fs::write(&path, DEFAULT_CONFIG)
        .with_context(|| format!("failed to write {}", path.display()))?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn load_isolated(path: &Path) -> Result<AppConfig> {
        AppConfig::load_layers(path, Some(Map::new()))
    }

    #[test]
    fn defaults_apply_without_a_file() -> Result<()> {
        let dir = tempdir()?;
        let config = load_isolated(&dir.path().join("missing.toml"))?;
        assert_eq!(config.load_policy, LoadPolicy::Abort);
        assert!(config.autosave);
        assert!(config.seed_demo);
        assert_eq!(config.data_file, SaveFile::default_path());
        Ok(())
    }

    #[test]
    fn file_values_override_defaults() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join(CONFIG_FILE);
        fs::write(
            &path,
            "data_file = \"/tmp/shelf-test.csv\"\nload_policy = \"skip\"\nautosave = false\n",
        )?;
        let config = load_isolated(&path)?;
        assert_eq!(config.data_file, PathBuf::from("/tmp/shelf-test.csv"));
        assert_eq!(config.load_policy, LoadPolicy::Skip);
        assert!(!config.autosave);
        assert!(config.seed_demo);
        Ok(())
    }

    #[test]
    fn generated_default_file_parses() -> Result<()> {
        let dir = tempdir()?;
        let path = ensure_config_at(dir.path().join("nested").join(CONFIG_FILE))?;
        assert!(path.exists());
        fs::write(
            &path,
            DEFAULT_CONFIG.replace("seed_demo = true", "seed_demo = false"),
        )?;
        let config = load_isolated(&path)?;
        assert!(!config.seed_demo);

        let again = ensure_config_at(&path)?;
        assert_eq!(again, path);
        assert!(fs::read_to_string(&path)?.contains("seed_demo = false"));
        Ok(())
    }

    #[test]
    fn unknown_policy_is_rejected() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join(CONFIG_FILE);
        fs::write(&path, "load_policy = \"ignore\"\n")?;
        assert!(load_isolated(&path).is_err());
        Ok(())
    }

    #[test]
    fn environment_overrides_file() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join(CONFIG_FILE);
        fs::write(&path, "autosave = true\nload_policy = \"abort\"\n")?;
        let env = Map::from([
            ("SHELF_AUTOSAVE".to_string(), "false".to_string()),
            ("SHELF_LOAD_POLICY".to_string(), "skip".to_string()),
            ("OTHER_AUTOSAVE".to_string(), "true".to_string()),
        ]);
        let config = AppConfig::load_layers(&path, Some(env))?;
        assert!(!config.autosave);
        assert_eq!(config.load_policy, LoadPolicy::Skip);
        Ok(())
    }
}
