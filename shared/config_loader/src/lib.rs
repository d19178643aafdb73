//! # Config Loader
//!
//! Locates and reads flat `key=value` configuration files.
//!
//! ```no_run
//! use config_loader::{find_and_load, ConfigMap};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let content = find_and_load("roommesh.conf", "ROOMMESH_CONFIG")?;
//!     let map = ConfigMap::parse(&content)?;
//!     let threshold: f32 = map.parsed("vad_threshold")?.unwrap_or(20.0);
//!     println!("threshold = {}", threshold);
//!     Ok(())
//! }
//! ```

pub mod error;

pub use error::{ConfigError, Result};

use std::collections::BTreeMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Reads a configuration file into a string without interpreting it.
pub fn load_config_file<P: AsRef<Path>>(path: P) -> Result<String> {
    let path = path.as_ref();

    if !path.exists() {
        return Err(ConfigError::FileNotFound(path.display().to_string()));
    }

    fs::read_to_string(path).map_err(|e| ConfigError::ReadError(e.to_string()))
}

/// Looks for `filename` in the usual places.
///
/// Search order:
/// 1. The path held by the environment variable `env_var` (if set and existing)
/// 2. `./config/{filename}`
/// 3. `./{filename}`
pub fn find_config_file(filename: &str, env_var: &str) -> Result<PathBuf> {
    if let Ok(path) = env::var(env_var) {
        let path_buf = PathBuf::from(&path);
        if path_buf.exists() {
            return Ok(path_buf);
        }
    }

    let config_dir = PathBuf::from("./config").join(filename);
    if config_dir.exists() {
        return Ok(config_dir);
    }

    let current_dir = PathBuf::from("./").join(filename);
    if current_dir.exists() {
        return Ok(current_dir);
    }

    Err(ConfigError::FileNotFound(format!(
        "'{}' not found. Searched: ${} , ./config/{}, ./{}",
        filename, env_var, filename, filename
    )))
}

/// [`find_config_file`] followed by [`load_config_file`].
pub fn find_and_load(filename: &str, env_var: &str) -> Result<String> {
    let path = find_config_file(filename, env_var)?;
    load_config_file(path)
}

/// Parsed `key=value` pairs.
///
/// Blank lines and lines starting with `#` are skipped. Keys and values are
/// trimmed; a repeated key keeps its last value.
#[derive(Debug, Clone, Default)]
pub struct ConfigMap {
    entries: BTreeMap<String, String>,
}

impl ConfigMap {
    pub fn parse(content: &str) -> Result<Self> {
        let mut entries = BTreeMap::new();

        for (index, raw) in content.lines().enumerate() {
            let line = raw.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            let Some((key, value)) = line.split_once('=') else {
                return Err(ConfigError::Syntax {
                    line: index + 1,
                    content: line.to_string(),
                });
            };

            let key = key.trim();
            if key.is_empty() {
                return Err(ConfigError::Syntax {
                    line: index + 1,
                    content: line.to_string(),
                });
            }
            entries.insert(key.to_string(), value.trim().to_string());
        }

        Ok(Self { entries })
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    /// Parses the value of `key`; `Ok(None)` when the key is absent.
    pub fn parsed<T: FromStr>(&self, key: &str) -> Result<Option<T>> {
        match self.get(key) {
            None => Ok(None),
            Some(value) => value
                .parse()
                .map(Some)
                .map_err(|_| ConfigError::InvalidValue {
                    key: key.to_string(),
                    value: value.to_string(),
                }),
        }
    }

    /// Accepts `true/false`, `yes/no`, `on/off` and `1/0`.
    pub fn flag(&self, key: &str) -> Result<Option<bool>> {
        match self.get(key) {
            None => Ok(None),
            Some(value) => match value.to_lowercase().as_str() {
                "true" | "yes" | "on" | "1" => Ok(Some(true)),
                "false" | "no" | "off" | "0" => Ok(Some(false)),
                _ => Err(ConfigError::InvalidValue {
                    key: key.to_string(),
                    value: value.to_string(),
                }),
            },
        }
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_load_nonexistent_file() {
        let result = load_config_file("/path/that/does/not/exist.conf");
        assert!(matches!(result, Err(ConfigError::FileNotFound(_))));
    }

    #[test]
    fn test_find_nonexistent_file() {
        let result = find_config_file(
            "file_that_definitely_does_not_exist_12345.conf",
            "CONFIG_LOADER_TEST_UNSET_VAR",
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_load_existing_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("mesh.conf");
        fs::write(&path, "log_level=debug\n").unwrap();

        assert_eq!(load_config_file(&path).unwrap(), "log_level=debug\n");
    }

    #[test]
    fn test_parse_skips_comments_and_blanks() {
        let map = ConfigMap::parse(
            "# audio\n\
             \n\
             noise_cancellation = false\n\
             vad_threshold=25.5\n\
             vad_threshold=30\n",
        )
        .unwrap();

        assert_eq!(map.flag("noise_cancellation").unwrap(), Some(false));
        assert_eq!(map.parsed::<f32>("vad_threshold").unwrap(), Some(30.0));
        assert_eq!(map.keys().count(), 2);
    }

    #[test]
    fn test_parse_rejects_line_without_equals() {
        let err = ConfigMap::parse("log_level=info\nverbose\n").unwrap_err();
        assert!(matches!(err, ConfigError::Syntax { line: 2, .. }));
    }

    #[test]
    fn test_invalid_value_reports_key() {
        let map = ConfigMap::parse("vad_interval_ms=soon\necho_cancellation=maybe").unwrap();

        assert!(matches!(
            map.parsed::<u64>("vad_interval_ms"),
            Err(ConfigError::InvalidValue { ref key, .. }) if key == "vad_interval_ms"
        ));
        assert!(map.flag("echo_cancellation").is_err());
        assert_eq!(map.parsed::<u64>("missing").unwrap(), None);
    }
}
