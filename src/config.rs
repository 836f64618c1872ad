use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::session::TokenStore;

/// Configuration file structure for revwatch.
///
/// One file describes one watched project: where the API lives, the
/// credential to call it with, and the texts used for auto-replies.
/// Field names match the keys of the on-disk record, so an existing
/// `config.json` from a previous deployment loads as-is.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Identifier of the watched project
    pub project_id: String,

    /// Base URL of the remote API
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Model identifier passed to site generation
    #[serde(default = "default_model_id")]
    pub model_id: String,

    /// Text appended to every comment prompt before generation
    #[serde(default)]
    pub additional_note: String,

    /// Session credential sent as the `cookie` header; rewritten in place
    /// whenever a refresh succeeds
    pub cookie: String,

    /// Marker prepended to every auto-reply, and searched for when
    /// deciding whether a comment was already answered
    #[serde(default = "default_auto_response_prefix")]
    pub auto_response_prefix: String,

    /// Confirmation text posted after a successful revision
    #[serde(default = "default_auto_response_create_revision")]
    pub auto_response_create_revision: String,

    /// Seconds to sleep between polling cycles
    #[serde(default = "default_interval")]
    pub interval: u64,
}

fn default_base_url() -> String {
    "https://websim.com".to_string()
}

fn default_model_id() -> String {
    "gemini-flash".to_string()
}

fn default_auto_response_prefix() -> String {
    "[revwatch] ".to_string()
}

fn default_auto_response_create_revision() -> String {
    "Done! A new revision with your request has been published.".to_string()
}

fn default_interval() -> u64 {
    10
}

impl Config {
    /// Resolve the configuration file path.
    ///
    /// Uses the explicit path when given, otherwise searches the current
    /// directory for the first of `revwatch.toml`, `revwatch.json`,
    /// `revwatch.yaml`, `revwatch.yml`.
    pub fn locate(path: Option<&Path>) -> Result<PathBuf> {
        if let Some(path) = path {
            return Ok(path.to_path_buf());
        }

        let candidates = [
            "revwatch.toml",
            "revwatch.json",
            "revwatch.yaml",
            "revwatch.yml",
        ];

        for candidate in &candidates {
            let path = Path::new(candidate);
            if path.exists() {
                return Ok(path.to_path_buf());
            }
        }

        anyhow::bail!(
            "No configuration file found (looked for {})",
            candidates.join(", ")
        )
    }

    /// Load configuration from a specific file path, picking the format
    /// from the extension.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let extension = path.extension().and_then(|ext| ext.to_str()).unwrap_or("");

        match extension {
            "toml" => toml::from_str(&contents)
                .with_context(|| format!("Failed to parse TOML config: {}", path.display())),
            "json" => serde_json::from_str(&contents)
                .with_context(|| format!("Failed to parse JSON config: {}", path.display())),
            "yaml" | "yml" => serde_yaml::from_str(&contents)
                .with_context(|| format!("Failed to parse YAML config: {}", path.display())),
            _ => {
                // Try TOML first, then JSON, then YAML
                toml::from_str(&contents)
                    .or_else(|_| serde_json::from_str(&contents))
                    .or_else(|_| serde_yaml::from_str(&contents))
                    .with_context(|| format!("Failed to parse config file: {}", path.display()))
            }
        }
    }

    /// Save configuration to a file.
    pub fn save(&self, path: &Path) -> Result<()> {
        let contents = match path.extension().and_then(|ext| ext.to_str()) {
            Some("json") => serde_json::to_string_pretty(self)?,
            Some("yaml") | Some("yml") => serde_yaml::to_string(self)?,
            _ => toml::to_string_pretty(self)?,
        };

        std::fs::write(path, contents)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        Ok(())
    }
}

/// Writable handle on the configuration file.
///
/// The session refresher goes through this to write a renewed credential
/// back to disk, so a restart picks up the freshest cookie instead of the
/// seed value the operator originally pasted in.
pub struct ConfigStore {
    path: PathBuf,
    current: Mutex<Config>,
}

impl ConfigStore {
    pub fn new(path: PathBuf, config: Config) -> Self {
        Self {
            path,
            current: Mutex::new(config),
        }
    }
}

impl TokenStore for ConfigStore {
    fn persist_token(&self, token: &str) -> Result<()> {
        let mut config = self.current.lock().unwrap();
        config.cookie = token.to_string();
        config.save(&self.path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_load_toml_config() {
        let mut temp_file = NamedTempFile::with_suffix(".toml").unwrap();
        let toml_content = r#"
project_id = "p-123"
cookie = "session=abc"
interval = 30
auto_response_prefix = "[bot] "
"#;
        write!(temp_file, "{}", toml_content).unwrap();

        let config = Config::load(temp_file.path()).unwrap();
        assert_eq!(config.project_id, "p-123");
        assert_eq!(config.cookie, "session=abc");
        assert_eq!(config.interval, 30);
        assert_eq!(config.auto_response_prefix, "[bot] ");
        // Defaults fill everything not present in the file
        assert_eq!(config.base_url, "https://websim.com");
        assert_eq!(config.model_id, "gemini-flash");
        assert_eq!(config.additional_note, "");
    }

    #[test]
    fn test_load_json_config() {
        let mut temp_file = NamedTempFile::with_suffix(".json").unwrap();
        let json_content = r#"{
  "project_id": "p-json",
  "base_url": "https://api.example.com",
  "cookie": "token=xyz",
  "model_id": "gpt-5-mini"
}"#;
        write!(temp_file, "{}", json_content).unwrap();

        let config = Config::load(temp_file.path()).unwrap();
        assert_eq!(config.project_id, "p-json");
        assert_eq!(config.base_url, "https://api.example.com");
        assert_eq!(config.cookie, "token=xyz");
        assert_eq!(config.model_id, "gpt-5-mini");
        assert_eq!(config.interval, 10);
    }

    #[test]
    fn test_load_rejects_missing_required_fields() {
        let mut temp_file = NamedTempFile::with_suffix(".toml").unwrap();
        write!(temp_file, "base_url = \"https://api.example.com\"").unwrap();

        assert!(Config::load(temp_file.path()).is_err());
    }

    #[test]
    fn test_locate_prefers_explicit_path() {
        let path = Config::locate(Some(Path::new("somewhere/custom.toml"))).unwrap();
        assert_eq!(path, PathBuf::from("somewhere/custom.toml"));
    }

    #[test]
    fn test_locate_finds_candidate_in_cwd() {
        let temp_dir = tempfile::tempdir().unwrap();
        std::fs::write(
            temp_dir.path().join("revwatch.toml"),
            "project_id = \"p\"\ncookie = \"c\"\n",
        )
        .unwrap();

        let original_dir = std::env::current_dir().unwrap();
        std::env::set_current_dir(&temp_dir).unwrap();

        let located = Config::locate(None);

        std::env::set_current_dir(original_dir).unwrap();
        assert_eq!(located.unwrap(), PathBuf::from("revwatch.toml"));
    }

    #[test]
    fn test_persist_token_rewrites_only_cookie() {
        let temp_file = NamedTempFile::with_suffix(".toml").unwrap();
        let config = Config {
            project_id: "p-42".to_string(),
            base_url: "https://api.example.com".to_string(),
            model_id: default_model_id(),
            additional_note: " (stay safe)".to_string(),
            cookie: "stale=1".to_string(),
            auto_response_prefix: default_auto_response_prefix(),
            auto_response_create_revision: default_auto_response_create_revision(),
            interval: 60,
        };

        let store = ConfigStore::new(temp_file.path().to_path_buf(), config);
        store.persist_token("fresh=2; other=3").unwrap();

        let reloaded = Config::load(temp_file.path()).unwrap();
        assert_eq!(reloaded.cookie, "fresh=2; other=3");
        assert_eq!(reloaded.project_id, "p-42");
        assert_eq!(reloaded.additional_note, " (stay safe)");
        assert_eq!(reloaded.interval, 60);
    }
}
