//! Gateway and core configuration.
//!
//! Precedence: environment (`ZOOBAE_*`) > TOML file (`ZOOBAE_CONFIG`, default `config/zoobae`) > defaults.
//!
//! | Key | Default | Description |
//! |-----|---------|-------------|
//! | responder | auto | `auto` \| `generative` \| `deterministic`. `auto` picks generative when an API key exists. |
//! | llm_api_key | - | Falls back to `OPENROUTER_API_KEY`. Never logged. |
//! | generation_timeout_secs | 30 | Per generation call; a timeout triggers the keyword fallback. |
//! | history_limit | 50 | Turns returned by history retrieval. |
//! | responder_history_window | 10 | Turns passed to the responder as context. |
//! | summary_window | 20 | Turns fed to the personality summary. |
//! | serialize_user_turns | true | Serialize concurrent turns of the same user. |

use crate::error::{CoreError, CoreResult};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

pub const DEFAULT_LLM_API_URL: &str = "https://openrouter.ai/api/v1";
pub const DEFAULT_LLM_MODEL: &str = "google/gemini-flash-1.5";

/// Which responder variant the process runs with. Chosen once at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponderMode {
    #[default]
    Auto,
    Generative,
    Deterministic,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoreConfig {
    pub app_name: String,
    pub host: String,
    pub port: u16,
    pub storage_path: String,
    #[serde(default)]
    pub responder: ResponderMode,
    pub llm_api_url: String,
    pub llm_model: String,
    pub llm_temperature: f32,
    pub llm_max_tokens: u32,
    #[serde(default, skip_serializing)]
    pub llm_api_key: Option<String>,
    pub generation_timeout_secs: u64,
    pub history_limit: usize,
    pub responder_history_window: usize,
    pub summary_window: usize,
    pub serialize_user_turns: bool,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            app_name: "Zoobae Gateway".to_string(),
            host: "127.0.0.1".to_string(),
            port: 8001,
            storage_path: "./data/zoobae".to_string(),
            responder: ResponderMode::Auto,
            llm_api_url: DEFAULT_LLM_API_URL.to_string(),
            llm_model: DEFAULT_LLM_MODEL.to_string(),
            llm_temperature: 0.7,
            llm_max_tokens: 500,
            llm_api_key: None,
            generation_timeout_secs: 30,
            history_limit: 50,
            responder_history_window: 10,
            summary_window: 20,
            serialize_user_turns: true,
        }
    }
}

impl CoreConfig {
    /// Load config from file and environment.
    pub fn load() -> CoreResult<Self> {
        let config_path =
            std::env::var("ZOOBAE_CONFIG").unwrap_or_else(|_| "config/zoobae".to_string());
        Self::load_from(&config_path, None)
    }

    /// Defaults, then the TOML file at `config_path` (optional), then `ZOOBAE_*` variables.
    /// `env` replaces the process environment when given.
    pub fn load_from(config_path: &str, env: Option<HashMap<String, String>>) -> CoreResult<Self> {
        let defaults = Self::default();
        let builder = config::Config::builder()
            .set_default("app_name", defaults.app_name)?
            .set_default("host", defaults.host)?
            .set_default("port", defaults.port as i64)?
            .set_default("storage_path", defaults.storage_path)?
            .set_default("responder", "auto")?
            .set_default("llm_api_url", defaults.llm_api_url)?
            .set_default("llm_model", defaults.llm_model)?
            .set_default("llm_temperature", defaults.llm_temperature as f64)?
            .set_default("llm_max_tokens", defaults.llm_max_tokens as i64)?
            .set_default("generation_timeout_secs", defaults.generation_timeout_secs as i64)?
            .set_default("history_limit", defaults.history_limit as i64)?
            .set_default("responder_history_window", defaults.responder_history_window as i64)?
            .set_default("summary_window", defaults.summary_window as i64)?
            .set_default("serialize_user_turns", defaults.serialize_user_turns)?;

        // `config` resolves the extension itself, so "config/zoobae" finds "config/zoobae.toml".
        let builder = builder.add_source(config::File::with_name(config_path).required(false));

        let built = builder
            .add_source(
                config::Environment::with_prefix("ZOOBAE")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true)
                    .source(env),
            )
            .build()?;

        let cfg: Self = built.try_deserialize()?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> CoreResult<()> {
        if self.responder_history_window == 0 || self.history_limit == 0 || self.summary_window == 0
        {
            return Err(CoreError::Config(
                "history_limit, responder_history_window and summary_window must be positive"
                    .to_string(),
            ));
        }
        if self.generation_timeout_secs == 0 {
            return Err(CoreError::Config("generation_timeout_secs must be positive".to_string()));
        }
        Ok(())
    }

    /// API key for the generative responder: config value, then `OPENROUTER_API_KEY`. Blank counts as absent.
    pub fn api_key(&self) -> Option<String> {
        self.llm_api_key
            .clone()
            .or_else(|| std::env::var("OPENROUTER_API_KEY").ok())
            .map(|k| k.trim().to_string())
            .filter(|k| !k.is_empty())
    }

    pub fn generation_timeout(&self) -> Duration {
        Duration::from_secs(self.generation_timeout_secs)
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    fn no_env() -> Option<HashMap<String, String>> {
        Some(HashMap::new())
    }

    fn write_toml(dir: &tempfile::TempDir, body: &str) -> String {
        let path = dir.path().join("zoobae.toml");
        std::fs::write(&path, body).unwrap();
        path.to_string_lossy().into_owned()
    }

    #[test]
    fn defaults_match_documented_values() {
        let cfg = CoreConfig::default();
        assert_eq!(cfg.port, 8001);
        assert_eq!(cfg.responder, ResponderMode::Auto);
        assert_eq!(cfg.history_limit, 50);
        assert_eq!(cfg.responder_history_window, 10);
        assert_eq!(cfg.summary_window, 20);
        assert_eq!(cfg.generation_timeout(), Duration::from_secs(30));
        assert!(cfg.serialize_user_turns);
    }

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent");
        let cfg = CoreConfig::load_from(&path.to_string_lossy(), no_env()).unwrap();
        assert_eq!(cfg.port, 8001);
        assert_eq!(cfg.app_name, "Zoobae Gateway");
    }

    #[test]
    fn toml_file_overrides_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_toml(
            &dir,
            "port = 9100\nresponder = \"deterministic\"\ngeneration_timeout_secs = 5\n",
        );

        let cfg = CoreConfig::load_from(&path, no_env()).unwrap();
        assert_eq!(cfg.port, 9100);
        assert_eq!(cfg.responder, ResponderMode::Deterministic);
        assert_eq!(cfg.generation_timeout_secs, 5);
        assert_eq!(cfg.app_name, "Zoobae Gateway");
    }

    #[test]
    fn environment_overrides_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_toml(&dir, "port = 9100\nhistory_limit = 30\n");
        let env = HashMap::from([
            ("ZOOBAE_PORT".to_string(), "9200".to_string()),
            ("ZOOBAE_SUMMARY_WINDOW".to_string(), "5".to_string()),
        ]);

        let cfg = CoreConfig::load_from(&path, Some(env)).unwrap();
        assert_eq!(cfg.port, 9200);
        assert_eq!(cfg.summary_window, 5);
        assert_eq!(cfg.history_limit, 30);
    }

    // The only test that touches process environment variables.
    #[test]
    fn load_reads_config_path_and_prefixed_environment() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_toml(&dir, "port = 9100\nresponder = \"deterministic\"\n");
        std::env::set_var("ZOOBAE_CONFIG", &path);
        std::env::set_var("ZOOBAE_PORT", "9300");

        let loaded = CoreConfig::load();
        std::env::remove_var("ZOOBAE_CONFIG");
        std::env::remove_var("ZOOBAE_PORT");

        let cfg = loaded.unwrap();
        assert_eq!(cfg.port, 9300);
        assert_eq!(cfg.responder, ResponderMode::Deterministic);
    }

    #[test]
    fn zero_timeout_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_toml(&dir, "generation_timeout_secs = 0\n");
        assert!(matches!(
            CoreConfig::load_from(&path, no_env()),
            Err(CoreError::Config(_))
        ));
    }

    #[test]
    fn zero_windows_are_rejected() {
        for cfg in [
            CoreConfig {
                summary_window: 0,
                ..Default::default()
            },
            CoreConfig {
                history_limit: 0,
                ..Default::default()
            },
            CoreConfig {
                responder_history_window: 0,
                ..Default::default()
            },
        ] {
            assert!(matches!(cfg.validate(), Err(CoreError::Config(_))));
        }
        assert!(CoreConfig::default().validate().is_ok());
    }

    #[test]
    fn config_key_is_trimmed() {
        let cfg = CoreConfig {
            llm_api_key: Some("  sk-test  ".to_string()),
            ..Default::default()
        };
        assert_eq!(cfg.api_key().as_deref(), Some("sk-test"));
    }

    #[test]
    fn shipped_config_file_parses() {
        let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("../../config/zoobae.toml");
        let cfg = CoreConfig::load_from(&path.to_string_lossy(), no_env()).unwrap();
        assert_eq!(cfg.port, 8001);
        assert_eq!(cfg.llm_model, DEFAULT_LLM_MODEL);
        assert!(cfg.llm_api_key.is_none());
    }
}
