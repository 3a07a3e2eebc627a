//! Vessel study configuration.
//!
//! Loaded from `~/.vessel-study/config.toml`, or from the path given with
//! `--config`. A missing default file means defaults; a missing explicit
//! file is an error.

use std::path::{Path, PathBuf};
use std::{fs, io};

use serde::{Deserialize, Serialize};

use crate::sort::{Compression, DEFAULT_FAN_IN, ExternalSorter};

/// Errors raised while loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read { path: PathBuf, source: io::Error },

    #[error("invalid config at {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("invalid config at {path}: {message}")]
    Invalid { path: PathBuf, message: String },
}

pub type Result<T> = core::result::Result<T, ConfigError>;

/// Vessel study configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default, deny_unknown_fields)]
pub struct Config {
    /// Lines held in memory per sort run before spilling to disk.
    pub sort_run_lines: usize,

    /// Sort runs merged at once. More runs than this are merged in passes.
    pub merge_fan_in: usize,

    /// Where sort runs are spilled. Defaults to the system temp directory.
    pub spill_dir: Option<PathBuf>,

    /// Compress spilled runs with zstd.
    pub compress_spills: bool,

    /// zstd level for spilled runs.
    pub compression_level: i32,

    /// Rows per table in `report`.
    pub report_limit: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            sort_run_lines: 100_000,
            merge_fan_in: DEFAULT_FAN_IN,
            spill_dir: None,
            compress_spills: true,
            compression_level: 3,
            report_limit: 10,
        }
    }
}

impl Config {
    /// Load from `explicit` if given, otherwise from the default location.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::from_file(path);
        }

        let Some(path) = Self::path() else {
            return Ok(Self::default());
        };
        match Self::from_file(&path) {
            Err(ConfigError::Read { source, .. }) if source.kind() == io::ErrorKind::NotFound => {
                Ok(Self::default())
            }
            other => other,
        }
    }

    /// Load and validate a config file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        let config: Self = toml::from_str(&contents).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;

        config.validate().map_err(|message| ConfigError::Invalid {
            path: path.to_path_buf(),
            message,
        })?;

        Ok(config)
    }

    /// The default config file path: `~/.vessel-study/config.toml`.
    pub fn path() -> Option<PathBuf> {
        dirs::home_dir().map(|h| h.join(".vessel-study").join("config.toml"))
    }

    fn validate(&self) -> core::result::Result<(), String> {
        if self.sort_run_lines == 0 {
            return Err("sort-run-lines must be at least 1".to_string());
        }
        if self.merge_fan_in < 2 {
            return Err("merge-fan-in must be at least 2".to_string());
        }
        if self.report_limit == 0 {
            return Err("report-limit must be at least 1".to_string());
        }
        if self.compress_spills && !(1..=22).contains(&self.compression_level) {
            return Err(format!(
                "compression-level must be between 1 and 22, got {}",
                self.compression_level
            ));
        }
        Ok(())
    }

    /// An external sorter configured from this config.
    pub fn sorter(&self) -> ExternalSorter {
        let compression = if self.compress_spills {
            Compression::Zstd(self.compression_level)
        } else {
            Compression::None
        };
        ExternalSorter::new(self.sort_run_lines)
            .fan_in(self.merge_fan_in)
            .spill_dir(self.spill_dir.clone())
            .compression(compression)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use tempfile::TempDir;

    fn write_config(contents: &str) -> (TempDir, PathBuf) {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, contents).unwrap();
        (dir, path)
    }

    #[test]
    fn empty_file_gives_defaults() {
        let (_dir, path) = write_config("");
        assert_eq!(Config::from_file(&path).unwrap(), Config::default());
    }

    #[test]
    fn reads_kebab_case_keys() {
        let (_dir, path) = write_config(
            "sort-run-lines = 500\n\
             spill-dir = \"/var/tmp/spill\"\n\
             compress-spills = false\n\
             merge-fan-in = 16\n\
             report-limit = 5\n",
        );
        let config = Config::from_file(&path).unwrap();

        assert_eq!(config.sort_run_lines, 500);
        assert_eq!(config.spill_dir, Some(PathBuf::from("/var/tmp/spill")));
        assert!(!config.compress_spills);
        assert_eq!(config.compression_level, 3);
        assert_eq!(config.merge_fan_in, 16);
        assert_eq!(config.report_limit, 5);
    }

    #[test]
    fn zero_run_size_is_rejected() {
        let (_dir, path) = write_config("sort-run-lines = 0\n");
        let err = Config::from_file(&path).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { .. }));
    }

    #[test]
    fn fan_in_below_two_is_rejected() {
        let (_dir, path) = write_config("merge-fan-in = 1\n");
        assert!(matches!(
            Config::from_file(&path),
            Err(ConfigError::Invalid { .. })
        ));
    }

    #[test]
    fn out_of_range_compression_level_is_rejected() {
        let (_dir, path) = write_config("compression-level = 40\n");
        assert!(matches!(
            Config::from_file(&path),
            Err(ConfigError::Invalid { .. })
        ));
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let (_dir, path) = write_config("sort-lines = 10\n");
        assert!(matches!(
            Config::from_file(&path),
            Err(ConfigError::Parse { .. })
        ));
    }

    #[test]
    fn missing_explicit_file_is_an_error() {
        let dir = TempDir::new().unwrap();
        let err = Config::load(Some(dir.path().join("nope.toml").as_path())).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }
}
