// src/config/mod.rs
//! Monitor configuration: `[monitor]` settings plus the `[[rules]]` list.
//!
//! Loaded from TOML or JSON (chosen by file extension). Path resolution:
//! 1) $MONITOR_CONFIG_PATH
//! 2) config/monitor.toml
//! 3) config/monitor.json

pub mod rules;

use chrono::Duration;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::alerts::{AlertRule, EngineConfig};

pub use rules::{default_rules, validate_rule, validate_rules};

pub const ENV_CONFIG_PATH: &str = "MONITOR_CONFIG_PATH";
pub const DEFAULT_CONFIG_TOML: &str = "config/monitor.toml";
pub const DEFAULT_CONFIG_JSON: &str = "config/monitor.json";
/// Upper bound for `window_secs` (one year).
pub const MAX_WINDOW_SECS: u64 = 365 * 24 * 3600;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("reading config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("parsing config: {0}")]
    Parse(String),

    #[error("rule '{rule}': {reason}")]
    InvalidRule { rule: String, reason: String },

    #[error("duplicate rule name '{0}'")]
    DuplicateRule(String),

    #[error("rule '{rule}': keyword pattern does not compile: {source}")]
    InvalidPattern {
        rule: String,
        #[source]
        source: regex::Error,
    },

    #[error("rule '{rule}': invalid recipient address '{address}'")]
    InvalidRecipient { rule: String, address: String },

    #[error("missing environment variable {0}")]
    MissingEnv(&'static str),
}

fn default_window_secs() -> u64 {
    3600
}
fn default_context_window() -> usize {
    crate::analyze::mentions::DEFAULT_CONTEXT_WINDOW
}
fn default_batch_limit() -> usize {
    100
}
fn default_interval_secs() -> u64 {
    3 * 3600
}
fn default_keyword_match_limit() -> usize {
    5
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonitorSettings {
    /// Brands the analysis pipeline looks for in every response.
    #[serde(default)]
    pub brand_keywords: Vec<String>,
    #[serde(default = "default_window_secs")]
    pub window_secs: u64,
    /// Characters of context kept on each side of a mention.
    #[serde(default = "default_context_window")]
    pub context_window: usize,
    #[serde(default = "default_batch_limit")]
    pub batch_limit: usize,
    /// Seconds between scheduler ticks.
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,
    #[serde(default = "default_keyword_match_limit")]
    pub keyword_match_limit: usize,
}

impl Default for MonitorSettings {
    fn default() -> Self {
        Self {
            brand_keywords: Vec::new(),
            window_secs: default_window_secs(),
            context_window: default_context_window(),
            batch_limit: default_batch_limit(),
            interval_secs: default_interval_secs(),
            keyword_match_limit: default_keyword_match_limit(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct MonitorConfig {
    #[serde(default)]
    pub monitor: MonitorSettings,
    #[serde(default)]
    pub rules: Vec<AlertRule>,
}

impl MonitorConfig {
    /// Explicit default: empty brand list, the documented default rule set.
    pub fn with_default_rules() -> Self {
        Self {
            monitor: MonitorSettings::default(),
            rules: default_rules(),
        }
    }

    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            window: Duration::seconds(self.monitor.window_secs.min(MAX_WINDOW_SECS) as i64),
            keyword_match_limit: self.monitor.keyword_match_limit,
        }
    }

    pub fn interval(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.monitor.interval_secs.max(1))
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.monitor.window_secs == 0 || self.monitor.window_secs > MAX_WINDOW_SECS {
            return Err(ConfigError::Parse(format!(
                "monitor.window_secs must be in 1..={MAX_WINDOW_SECS}"
            )));
        }
        if self.monitor.keyword_match_limit == 0 {
            return Err(ConfigError::Parse(
                "monitor.keyword_match_limit must be > 0".into(),
            ));
        }
        validate_rules(&self.rules)
    }

    /// Load and validate from an explicit path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let ext = path
            .extension()
            .and_then(|s| s.to_str())
            .unwrap_or_default()
            .to_ascii_lowercase();
        let cfg = Self::parse(&content, &ext)?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Env var first, then the fallbacks. No file at all means the default rule set.
    pub fn load_default() -> Result<Self, ConfigError> {
        if let Ok(p) = std::env::var(ENV_CONFIG_PATH) {
            return Self::load_from(&PathBuf::from(p));
        }
        for p in [DEFAULT_CONFIG_TOML, DEFAULT_CONFIG_JSON] {
            let pb = PathBuf::from(p);
            if pb.exists() {
                return Self::load_from(&pb);
            }
        }
        tracing::warn!(target: "alerts", "no monitor config found; using default rules");
        Ok(Self::with_default_rules())
    }

    fn parse(s: &str, ext: &str) -> Result<Self, ConfigError> {
        match ext {
            "json" => serde_json::from_str(s).map_err(|e| ConfigError::Parse(e.to_string())),
            "toml" => toml::from_str(s).map_err(|e| ConfigError::Parse(e.to_string())),
            _ => toml::from_str(s)
                .or_else(|_| serde_json::from_str(s))
                .map_err(|e: serde_json::Error| ConfigError::Parse(e.to_string())),
        }
    }
}

/// SMTP transport settings. `None` from `from_env` means email is not configured.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SmtpSettings {
    pub host: String,
    pub port: Option<u16>,
    pub credentials: Option<(String, String)>,
    pub from: String,
    pub starttls: bool,
}

impl SmtpSettings {
    pub fn from_env() -> Result<Option<Self>, ConfigError> {
        let Some(host) = env_nonempty("SMTP_HOST") else {
            return Ok(None);
        };
        let from = env_nonempty("SMTP_FROM").ok_or(ConfigError::MissingEnv("SMTP_FROM"))?;
        let port = match env_nonempty("SMTP_PORT") {
            Some(p) => Some(
                p.parse::<u16>()
                    .map_err(|e| ConfigError::Parse(format!("SMTP_PORT: {e}")))?,
            ),
            None => None,
        };
        let credentials = match (env_nonempty("SMTP_USER"), env_nonempty("SMTP_PASS")) {
            (Some(u), Some(p)) => Some((u, p)),
            (Some(_), None) => return Err(ConfigError::MissingEnv("SMTP_PASS")),
            _ => None,
        };
        Ok(Some(Self {
            host,
            port,
            credentials,
            from,
            starttls: env_flag("SMTP_STARTTLS").unwrap_or(true),
        }))
    }
}

fn env_nonempty(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// "1"/"true"/"yes"/"on" are true; "0"/"false"/"no"/"off" are false; anything else is unset.
pub fn env_flag(key: &str) -> Option<bool> {
    let v = env_nonempty(key)?.to_ascii_lowercase();
    match v.as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alerts::ConditionType;
    use std::env;

    const TOML: &str = r#"
[monitor]
brand_keywords = ["Acme", "Globex"]
window_secs = 1800

[[rules]]
name = "negative surge"
condition_type = "sentiment_threshold"
threshold = 0.7
ai_sources = ["ChatGPT", "Gemini"]
recipients = ["ops@example.com"]

[[rules]]
name = "acme mentions"
condition_type = "mention_count"
threshold = 10
brand_keywords = ["Acme"]
ai_sources = ["Gemini"]
active = false
"#;

    #[test]
    fn toml_parses_with_defaults() {
        let cfg = MonitorConfig::parse(TOML, "toml").unwrap();
        cfg.validate().unwrap();
        assert_eq!(cfg.monitor.window_secs, 1800);
        assert_eq!(cfg.monitor.context_window, 100);
        assert_eq!(cfg.monitor.batch_limit, 100);
        assert_eq!(cfg.monitor.interval_secs, 10800);
        assert_eq!(cfg.rules.len(), 2);
        assert!(cfg.rules[0].active);
        assert!(!cfg.rules[1].active);
        assert_eq!(cfg.rules[1].condition_type, ConditionType::MentionCount);
        assert_eq!(cfg.engine_config().window, Duration::minutes(30));
    }

    #[test]
    fn json_parses_and_unknown_extension_falls_back() {
        let json = r#"{"rules":[{"name":"k","condition_type":"keyword_detection","threshold":1,
            "brand_keywords":["Initech"],"ai_sources":["Claude"]}]}"#;
        let a = MonitorConfig::parse(json, "json").unwrap();
        let b = MonitorConfig::parse(json, "").unwrap();
        assert_eq!(a, b);
        assert_eq!(a.monitor, MonitorSettings::default());
    }

    #[test]
    fn garbage_is_a_parse_error() {
        assert!(matches!(
            MonitorConfig::parse("rules = 3", "toml"),
            Err(ConfigError::Parse(_))
        ));
    }

    #[serial_test::serial]
    #[test]
    fn default_uses_env_then_fallbacks() {
        let old = env::current_dir().unwrap();
        let tmp = tempfile::tempdir().unwrap();
        env::set_current_dir(tmp.path()).unwrap();
        env::remove_var(ENV_CONFIG_PATH);

        // No files: default rule set.
        let cfg = MonitorConfig::load_default().unwrap();
        assert_eq!(cfg.rules, default_rules());

        let p = tmp.path().join("custom.toml");
        fs::write(&p, TOML).unwrap();
        env::set_var(ENV_CONFIG_PATH, p.display().to_string());
        let cfg = MonitorConfig::load_default().unwrap();
        assert_eq!(cfg.rules.len(), 2);

        env::set_var(ENV_CONFIG_PATH, tmp.path().join("missing.toml").display().to_string());
        assert!(matches!(
            MonitorConfig::load_default(),
            Err(ConfigError::Io { .. })
        ));
        env::remove_var(ENV_CONFIG_PATH);

        env::set_current_dir(&old).unwrap();
    }

    #[serial_test::serial]
    #[test]
    fn smtp_settings_from_env() {
        for k in ["SMTP_HOST", "SMTP_FROM", "SMTP_PORT", "SMTP_USER", "SMTP_PASS", "SMTP_STARTTLS"] {
            env::remove_var(k);
        }
        assert_eq!(SmtpSettings::from_env().unwrap(), None);

        env::set_var("SMTP_HOST", "smtp.example.com");
        assert!(matches!(
            SmtpSettings::from_env(),
            Err(ConfigError::MissingEnv("SMTP_FROM"))
        ));

        env::set_var("SMTP_FROM", "monitor@example.com");
        env::set_var("SMTP_PORT", "2525");
        env::set_var("SMTP_STARTTLS", "0");
        let s = SmtpSettings::from_env().unwrap().unwrap();
        assert_eq!(s.port, Some(2525));
        assert!(!s.starttls);
        assert_eq!(s.credentials, None);

        env::set_var("SMTP_PORT", "nope");
        assert!(matches!(SmtpSettings::from_env(), Err(ConfigError::Parse(_))));

        for k in ["SMTP_HOST", "SMTP_FROM", "SMTP_PORT", "SMTP_STARTTLS"] {
            env::remove_var(k);
        }
    }
}
