//! Pipeline configuration management.
//!
//! Provides configuration loading from YAML files, a global verbose flag,
//! and the built-in defaults used when no config is present.

mod defaults;

pub use defaults::PipelineDefaults;

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Once, OnceLock};

use serde::Deserialize;

// Global verbose flag for controlling debug output
static VERBOSE: AtomicBool = AtomicBool::new(false);

/// Set the global verbose flag. When true, debug messages will be printed.
pub fn set_verbose(verbose: bool) {
    VERBOSE.store(verbose, Ordering::SeqCst);
}

/// Check if verbose mode is enabled.
pub fn is_verbose() -> bool {
    VERBOSE.load(Ordering::SeqCst)
}

/// Print a message to stderr only if verbose mode is enabled.
#[macro_export]
macro_rules! verbose_println {
    ($($arg:tt)*) => {
        if $crate::config::is_verbose() {
            eprintln!($($arg)*);
        }
    };
}

/// Canonical list of candidate config file names we search for on disk.
const CONFIG_FILENAMES: &[&str] = &["dfxm.yml", "dfxm.yaml"];

/// Public handle that stores the loaded configuration, its source path, and warnings.
pub struct AnalysisConfigHandle {
    pub config: AnalysisConfig,
    pub source: Option<PathBuf>,
    pub warnings: Vec<String>,
}

impl AnalysisConfigHandle {
    fn with_config(config: AnalysisConfig, source: Option<PathBuf>, warnings: Vec<String>) -> Self {
        Self {
            config,
            source,
            warnings,
        }
    }
}

/// Complete configuration file structure.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct AnalysisConfig {
    pub defaults: PipelineDefaults,
}

impl AnalysisConfig {
    fn sanitize(mut self) -> Self {
        self.defaults.sanitize();
        self
    }
}

/// Load configuration from disk, optionally forcing a specific path.
pub fn load_analysis_config(custom_path: Option<&Path>) -> AnalysisConfigHandle {
    let mut warnings = Vec::new();
    let candidates = get_config_candidates(custom_path);

    for candidate in candidates {
        if !candidate.exists() || !candidate.is_file() {
            continue;
        }

        match fs::read_to_string(&candidate) {
            Ok(contents) => match serde_yaml::from_str::<AnalysisConfig>(&contents) {
                Ok(config) => {
                    let sanitized = config.sanitize();
                    let source = fs::canonicalize(&candidate).unwrap_or(candidate);
                    return AnalysisConfigHandle::with_config(sanitized, Some(source), warnings);
                }
                Err(err) => warnings.push(format!(
                    "Failed to parse config {}: {}",
                    candidate.display(),
                    err
                )),
            },
            Err(err) => warnings.push(format!(
                "Failed to read config {}: {}",
                candidate.display(),
                err
            )),
        }
    }

    warnings.push("No config found; using built-in defaults.".to_string());
    AnalysisConfigHandle::with_config(AnalysisConfig::default(), None, warnings)
}

/// Get list of config file candidates to try
fn get_config_candidates(custom_path: Option<&Path>) -> Vec<PathBuf> {
    let mut candidates = Vec::new();

    if let Some(path) = custom_path {
        candidates.push(path.to_path_buf());
    }

    if let Ok(env_path) = std::env::var("DFXM_CONFIG") {
        candidates.push(PathBuf::from(env_path));
    }

    if let Ok(cwd) = std::env::current_dir() {
        for name in CONFIG_FILENAMES {
            candidates.push(cwd.join("config").join(name));
            candidates.push(cwd.join(name));
        }
    }

    if let Some(home_dir) = dirs::home_dir() {
        for name in CONFIG_FILENAMES {
            candidates.push(home_dir.join("dfxm").join(name));
        }
    }

    candidates
}

static ANALYSIS_CONFIG_HANDLE: OnceLock<AnalysisConfigHandle> = OnceLock::new();
static PRINT_CONFIG_ONCE: Once = Once::new();

/// Access the global analysis configuration (loaded once per process).
pub fn analysis_config_handle() -> &'static AnalysisConfigHandle {
    ANALYSIS_CONFIG_HANDLE.get_or_init(|| load_analysis_config(None))
}

/// Print config source and warnings the first time it is requested (only in verbose mode).
pub fn log_config_usage() {
    PRINT_CONFIG_ONCE.call_once(|| {
        if !is_verbose() {
            return;
        }
        let handle = analysis_config_handle();
        if let Some(source) = &handle.source {
            eprintln!("[dfxm] Loaded config from {}", source.display());
        } else {
            eprintln!("[dfxm] Using built-in defaults");
        }

        for warning in &handle.warnings {
            eprintln!("[dfxm] Config warning: {}", warning);
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::tempdir;

    #[test]
    fn test_load_missing_config_uses_defaults() {
        let dir = tempdir().unwrap();
        let handle = load_analysis_config(Some(&dir.path().join("nope.yml")));

        assert!(handle.source.is_none());
        assert_eq!(handle.config.defaults.chunk_rows, 128);
        assert!(!handle.warnings.is_empty());
    }

    #[test]
    fn test_load_custom_config() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("dfxm.yml");
        let mut file = fs::File::create(&path).unwrap();
        writeln!(file, "defaults:\n  chunk_rows: 64\n  smooth_maps: false").unwrap();

        let handle = load_analysis_config(Some(&path));

        assert!(handle.source.is_some());
        assert_eq!(handle.config.defaults.chunk_rows, 64);
        assert!(!handle.config.defaults.smooth_maps);
        // Unspecified fields keep their defaults
        assert_eq!(handle.config.defaults.connectivity, 26);
    }

    #[test]
    fn test_load_sanitizes_bad_values() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("dfxm.yml");
        let mut file = fs::File::create(&path).unwrap();
        writeln!(file, "defaults:\n  chunk_rows: 0\n  connectivity: 5").unwrap();

        let handle = load_analysis_config(Some(&path));

        assert_eq!(handle.config.defaults.chunk_rows, 128);
        assert_eq!(handle.config.defaults.connectivity, 26);
    }
}
