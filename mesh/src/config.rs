//! Mesh Configuration
//!
//! Settings read from `roommesh.conf`, a flat `key=value` file:
//!
//! ```text
//! # Logging
//! log_path=roommesh.log
//! log_level=info
//! log_console=false
//!
//! # Microphone
//! noise_cancellation=true
//! echo_cancellation=true
//! audio_quality=high
//!
//! # Voice activity detection
//! vad_threshold=20
//! vad_interval_ms=50
//! vad_fft_size=2048
//! ```

use crate::media::{AudioQuality, MediaOptions};
use crate::vad::VadSettings;
use config_loader::{ConfigError, ConfigMap};
use logging::{LogLevel, Logger};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const CONFIG_FILE_NAME: &str = "roommesh.conf";
pub const CONFIG_ENV_VAR: &str = "ROOMMESH_CONFIG";

const MIN_FFT_SIZE: usize = 32;
const MAX_FFT_SIZE: usize = 8192;

const KNOWN_KEYS: &[&str] = &[
    "log_path",
    "log_level",
    "log_console",
    "noise_cancellation",
    "echo_cancellation",
    "audio_quality",
    "vad_threshold",
    "vad_interval_ms",
    "vad_fft_size",
];

#[derive(Debug, Clone)]
pub struct MeshConfig {
    pub log_path: PathBuf,
    pub log_level: LogLevel,
    /// Mirror log records to stdout.
    pub log_console: bool,
    pub media: MediaOptions,
    pub vad: VadSettings,
    /// Keys present in the file that this version does not know.
    pub unknown_keys: Vec<String>,
}

impl Default for MeshConfig {
    fn default() -> Self {
        Self {
            log_path: PathBuf::from("roommesh.log"),
            log_level: LogLevel::Info,
            log_console: false,
            media: MediaOptions::default(),
            vad: VadSettings::default(),
            unknown_keys: Vec::new(),
        }
    }
}

impl MeshConfig {
    /// Parses configuration text. Missing keys keep their defaults.
    ///
    /// # Errors
    ///
    /// Returns error on a malformed line or a value of the wrong shape.
    pub fn from_content(content: &str) -> Result<Self, ConfigError> {
        let map = ConfigMap::parse(content)?;
        let mut config = Self::default();

        if let Some(path) = map.get("log_path") {
            config.log_path = PathBuf::from(path);
        }
        if let Some(level) = map.parsed::<LogLevel>("log_level")? {
            config.log_level = level;
        }
        if let Some(console) = map.flag("log_console")? {
            config.log_console = console;
        }

        if let Some(flag) = map.flag("noise_cancellation")? {
            config.media.noise_cancellation = flag;
        }
        if let Some(flag) = map.flag("echo_cancellation")? {
            config.media.echo_cancellation = flag;
        }
        if let Some(quality) = map.parsed::<AudioQuality>("audio_quality")? {
            config.media.audio_quality = quality;
        }

        if let Some(threshold) = map.parsed::<f32>("vad_threshold")? {
            if !(0.0..=255.0).contains(&threshold) {
                return Err(invalid("vad_threshold", &threshold.to_string()));
            }
            config.vad.threshold = threshold;
        }
        if let Some(ms) = map.parsed::<u64>("vad_interval_ms")? {
            if ms == 0 {
                return Err(invalid("vad_interval_ms", "0"));
            }
            config.vad.interval = Duration::from_millis(ms);
        }
        if let Some(size) = map.parsed::<usize>("vad_fft_size")? {
            if !size.is_power_of_two() || !(MIN_FFT_SIZE..=MAX_FFT_SIZE).contains(&size) {
                return Err(invalid("vad_fft_size", &size.to_string()));
            }
            config.vad.fft_size = size;
        }

        config.unknown_keys = map
            .keys()
            .filter(|key| !KNOWN_KEYS.contains(key))
            .map(str::to_string)
            .collect();

        Ok(config)
    }

    /// Reads and parses the file at `path`.
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = config_loader::load_config_file(path)?;
        Self::from_content(&content)
    }

    /// Locates `roommesh.conf` (`$ROOMMESH_CONFIG`, `./config/`, `./`) and
    /// loads it, falling back to defaults when it is missing or invalid.
    pub fn load() -> Self {
        let path = match config_loader::find_config_file(CONFIG_FILE_NAME, CONFIG_ENV_VAR) {
            Ok(path) => path,
            Err(_) => return Self::default(),
        };

        match Self::load_from_file(&path) {
            Ok(config) => config,
            Err(e) => {
                eprintln!(
                    "Warning: ignoring configuration '{}': {}",
                    path.display(),
                    e
                );
                Self::default()
            }
        }
    }

    /// Opens the log file and reports any unknown keys through it.
    pub fn build_logger(&self) -> logging::Result<Logger> {
        let logger = Logger::with_component(
            self.log_path.clone(),
            self.log_level,
            "Config",
            self.log_console,
        )?;
        for key in &self.unknown_keys {
            logger.warn(&format!("Unknown configuration key '{}' ignored", key));
        }
        Ok(logger)
    }

    pub fn media_options(&self) -> MediaOptions {
        self.media
    }
}

fn invalid(key: &str, value: &str) -> ConfigError {
    ConfigError::InvalidValue {
        key: key.to_string(),
        value: value.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::thread;
    use tempfile::tempdir;

    #[test]
    fn test_defaults() {
        let config = MeshConfig::default();
        assert_eq!(config.log_level, LogLevel::Info);
        assert!(config.media.noise_cancellation);
        assert!(config.media.echo_cancellation);
        assert_eq!(config.media.audio_quality, AudioQuality::High);
        assert_eq!(config.vad.threshold, 20.0);
        assert_eq!(config.vad.interval, Duration::from_millis(50));
        assert_eq!(config.vad.fft_size, 2048);
    }

    #[test]
    fn test_from_content() {
        let content = "\
            # Test config\n\
            log_path=/tmp/mesh-test.log\n\
            log_level=Debug\n\
            noise_cancellation=off\n\
            audio_quality=medium\n\
            vad_threshold=35.5\n\
            vad_interval_ms=20\n\
            vad_fft_size=1024\n\
        ";

        let config = MeshConfig::from_content(content).unwrap();
        assert_eq!(config.log_path, PathBuf::from("/tmp/mesh-test.log"));
        assert_eq!(config.log_level, LogLevel::Debug);
        assert!(!config.media.noise_cancellation);
        assert!(config.media.echo_cancellation);
        assert_eq!(config.media_options().audio_quality, AudioQuality::Medium);
        assert_eq!(config.vad.threshold, 35.5);
        assert_eq!(config.vad.interval, Duration::from_millis(20));
        assert_eq!(config.vad.fft_size, 1024);
        assert!(config.unknown_keys.is_empty());
    }

    #[test]
    fn test_rejects_bad_values() {
        for content in [
            "vad_fft_size=1000",
            "vad_fft_size=16384",
            "vad_interval_ms=0",
            "vad_threshold=300",
            "audio_quality=lossless",
            "log_level=trace",
            "echo_cancellation=maybe",
        ] {
            assert!(
                matches!(
                    MeshConfig::from_content(content),
                    Err(ConfigError::InvalidValue { .. })
                ),
                "accepted '{}'",
                content
            );
        }
    }

    #[test]
    fn test_unknown_keys_are_logged() {
        let dir = tempdir().unwrap();
        let log_path = dir.path().join("mesh.log");
        let content = format!(
            "log_path={}\nserver_address=127.0.0.1:8080\n",
            log_path.display()
        );

        let config = MeshConfig::from_content(&content).unwrap();
        assert_eq!(config.unknown_keys, vec!["server_address".to_string()]);

        let _logger = config.build_logger().unwrap();
        thread::sleep(Duration::from_millis(100));

        let written = fs::read_to_string(&log_path).unwrap();
        assert!(written.contains("WARN [component: Config]"));
        assert!(written.contains("server_address"));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        fs::write(&path, "echo_cancellation=false\n").unwrap();

        let config = MeshConfig::load_from_file(&path).unwrap();
        assert!(!config.media.echo_cancellation);

        assert!(matches!(
            MeshConfig::load_from_file(&dir.path().join("missing.conf")),
            Err(ConfigError::FileNotFound(_))
        ));
    }
}
