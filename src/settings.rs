use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::io::SessionConfig;

const APP_DIR_NAME: &str = "nibble-panel";
const SETTINGS_FILE_NAME: &str = "settings.json";

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct PanelSettings {
    #[serde(default = "default_device_path")]
    pub device_path: String,
    #[serde(default)]
    pub device_args: Vec<String>,
    #[serde(default)]
    pub response_timeout_ms: Option<u64>, // None = wait forever
    #[serde(default)]
    pub trace_transactions: bool,
    #[serde(default)]
    pub log_dir: Option<String>, // file logging disabled when None
}

fn default_device_path() -> String {
    "../sim/sim".to_string()
}

impl Default for PanelSettings {
    fn default() -> Self {
        Self {
            device_path: default_device_path(),
            device_args: Vec::new(),
            response_timeout_ms: None,
            trace_transactions: false,
            log_dir: None,
        }
    }
}

impl PanelSettings {
    /// Process configuration for the device session
    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            program: self.device_path.clone(),
            args: self.device_args.clone(),
            response_timeout_ms: self.response_timeout_ms,
            trace_transactions: self.trace_transactions,
        }
    }
}

/// `<config dir>/nibble-panel/settings.json`, falling back to the working directory
pub fn default_settings_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR_NAME)
        .join(SETTINGS_FILE_NAME)
}

/// Load settings, writing the defaults on first run.
pub fn load_settings(settings_path: &Path) -> Result<PanelSettings, String> {
    if settings_path.exists() {
        let content = std::fs::read_to_string(settings_path)
            .map_err(|e| format!("Failed to read settings: {}", e))?;

        serde_json::from_str(&content).map_err(|e| format!("Failed to parse settings: {}", e))
    } else {
        let settings = PanelSettings::default();
        save_settings(settings_path, &settings)?;
        tlog!("[settings] Wrote default settings to {}", settings_path.display());
        Ok(settings)
    }
}

pub fn save_settings(settings_path: &Path, settings: &PanelSettings) -> Result<(), String> {
    if let Some(parent) = settings_path.parent() {
        std::fs::create_dir_all(parent)
            .map_err(|e| format!("Failed to create settings dir: {}", e))?;
    }

    let content = serde_json::to_string_pretty(settings)
        .map_err(|e| format!("Failed to serialize settings: {}", e))?;

    std::fs::write(settings_path, content).map_err(|e| format!("Failed to write settings: {}", e))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch(name: &str) -> PathBuf {
        std::env::temp_dir()
            .join(format!("nibble-panel-settings-{}-{}", name, std::process::id()))
            .join(SETTINGS_FILE_NAME)
    }

    #[test]
    fn test_first_run_writes_defaults() {
        let path = scratch("first-run");
        let _ = std::fs::remove_file(&path);

        let settings = load_settings(&path).unwrap();
        assert_eq!(settings, PanelSettings::default());
        assert!(path.exists());

        let _ = std::fs::remove_dir_all(path.parent().unwrap());
    }

    #[test]
    fn test_save_then_load() {
        let path = scratch("roundtrip");
        let settings = PanelSettings {
            device_path: "/opt/sim/sim".to_string(),
            device_args: vec!["--trace".to_string()],
            response_timeout_ms: Some(250),
            trace_transactions: true,
            log_dir: Some("/tmp/logs".to_string()),
        };
        save_settings(&path, &settings).unwrap();
        assert_eq!(load_settings(&path).unwrap(), settings);

        let _ = std::fs::remove_dir_all(path.parent().unwrap());
    }

    #[test]
    fn test_missing_fields_use_defaults() {
        let settings: PanelSettings =
            serde_json::from_str(r#"{ "response_timeout_ms": 500 }"#).unwrap();
        assert_eq!(settings.device_path, "../sim/sim");
        assert_eq!(settings.response_timeout_ms, Some(500));
        assert!(settings.device_args.is_empty());
        assert!(!settings.trace_transactions);
    }

    #[test]
    fn test_invalid_json_is_error() {
        let path = scratch("invalid");
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, "{ not json").unwrap();
        let err = load_settings(&path).unwrap_err();
        assert!(err.starts_with("Failed to parse settings"));

        let _ = std::fs::remove_dir_all(path.parent().unwrap());
    }

    #[test]
    fn test_session_config() {
        let mut settings = PanelSettings::default();
        settings.device_args = vec!["-v".to_string()];
        settings.response_timeout_ms = Some(100);
        let config = settings.session_config();
        assert_eq!(config.program, "../sim/sim");
        assert_eq!(config.args, vec!["-v"]);
        assert_eq!(config.response_timeout_ms, Some(100));
        assert_eq!(config.device_label(), "sim(../sim/sim)");
    }
}
