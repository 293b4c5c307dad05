//! Settings read from the process environment.

use std::env;
use std::fmt;
use std::path::PathBuf;

const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
const DEFAULT_OPENAI_MODEL: &str = "gpt-4";
const DEFAULT_CONVERSATIONS_DIR: &str = "conversations";
const DEFAULT_CONTEXT_MAX_MESSAGES: usize = 20;
const DEFAULT_LOG_LEVEL: &str = "info";
const DEFAULT_LOG_FILE: &str = "agent.log";

/// Errors found while reading settings.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Required settings are not set, in the order they are documented.
    #[error("missing required environment variables: {}", .0.join(", "))]
    Missing(Vec<&'static str>),
    /// A setting holds a value that can not be used.
    #[error("invalid value for {name}: {value:?} ({reason})")]
    Invalid {
        /// The setting name.
        name: &'static str,
        /// The rejected value.
        value: String,
        /// What is wrong with it.
        reason: &'static str,
    },
}

/// Where and how verbosely to log.
///
/// Read separately from [`Settings`] so logging can start before the rest
/// of the configuration is validated.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LogSettings {
    /// The filter directive, e.g. `info` or `shopkeeper_core=debug`.
    pub level: String,
    /// The log file. A date suffix is appended as files roll daily.
    pub file: PathBuf,
}

impl LogSettings {
    /// Reads log settings from the process environment.
    #[inline]
    pub fn from_env() -> Self {
        Self::from_lookup(env_lookup)
    }

    /// Reads log settings through `lookup`, falling back to defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let lookup = non_empty(lookup);
        Self {
            level: lookup("LOG_LEVEL").unwrap_or_else(|| DEFAULT_LOG_LEVEL.to_owned()),
            file: lookup("LOG_FILE")
                .unwrap_or_else(|| DEFAULT_LOG_FILE.to_owned())
                .into(),
        }
    }
}

/// Everything the application needs to start.
#[derive(Clone, PartialEq, Eq)]
pub struct Settings {
    /// The model-access credential.
    pub openai_api_key: String,
    /// Base URL of an OpenAI-compatible API.
    pub openai_base_url: String,
    /// The model name.
    pub openai_model: String,
    /// Base URL of the store tool server.
    pub mcp_server_url: String,
    /// Where conversation files live.
    pub conversations_dir: PathBuf,
    /// How many trailing messages are sent to the model, `None` for all.
    pub context_max_messages: Option<usize>,
    /// Logging settings.
    pub log: LogSettings,
}

impl Settings {
    /// Reads settings from the process environment.
    #[inline]
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(env_lookup)
    }

    /// Reads settings through `lookup`.
    ///
    /// Empty values count as unset. All missing required settings are
    /// reported at once.
    pub fn from_lookup(
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        let log = LogSettings::from_lookup(&lookup);
        let lookup = non_empty(lookup);

        let openai_api_key = lookup("OPENAI_API_KEY");
        let mcp_server_url = lookup("MCP_SERVER_URL");
        let missing: Vec<_> = [
            ("OPENAI_API_KEY", openai_api_key.is_none()),
            ("MCP_SERVER_URL", mcp_server_url.is_none()),
        ]
        .into_iter()
        .filter_map(|(name, missing)| missing.then_some(name))
        .collect();
        let (Some(openai_api_key), Some(mcp_server_url)) = (openai_api_key, mcp_server_url)
        else {
            return Err(ConfigError::Missing(missing));
        };

        let context_max_messages = match lookup("CONTEXT_MAX_MESSAGES") {
            Some(value) => parse_context_limit(&value)?,
            None => Some(DEFAULT_CONTEXT_MAX_MESSAGES),
        };

        Ok(Self {
            openai_api_key,
            openai_base_url: lookup("OPENAI_BASE_URL")
                .unwrap_or_else(|| DEFAULT_OPENAI_BASE_URL.to_owned()),
            openai_model: lookup("OPENAI_MODEL")
                .unwrap_or_else(|| DEFAULT_OPENAI_MODEL.to_owned()),
            mcp_server_url,
            conversations_dir: lookup("CONVERSATIONS_DIR")
                .unwrap_or_else(|| DEFAULT_CONVERSATIONS_DIR.to_owned())
                .into(),
            context_max_messages,
            log,
        })
    }
}

impl fmt::Debug for Settings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Settings")
            .field("openai_api_key", &"<redacted>")
            .field("openai_base_url", &self.openai_base_url)
            .field("openai_model", &self.openai_model)
            .field("mcp_server_url", &self.mcp_server_url)
            .field("conversations_dir", &self.conversations_dir)
            .field("context_max_messages", &self.context_max_messages)
            .field("log", &self.log)
            .finish()
    }
}

fn env_lookup(name: &str) -> Option<String> {
    env::var(name).ok()
}

fn non_empty(
    lookup: impl Fn(&str) -> Option<String>,
) -> impl Fn(&str) -> Option<String> {
    move |name| {
        lookup(name)
            .map(|value| value.trim().to_owned())
            .filter(|value| !value.is_empty())
    }
}

fn parse_context_limit(value: &str) -> Result<Option<usize>, ConfigError> {
    if value.eq_ignore_ascii_case("all") {
        return Ok(None);
    }
    match value.parse::<usize>() {
        Ok(0) => Ok(None),
        Ok(limit) => Ok(Some(limit)),
        Err(_) => Err(ConfigError::Invalid {
            name: "CONTEXT_MAX_MESSAGES",
            value: value.to_owned(),
            reason: "expected a number or `all`",
        }),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup_from<'a>(
        pairs: &'a [(&'a str, &'a str)],
    ) -> impl Fn(&str) -> Option<String> + 'a {
        let vars: HashMap<_, _> = pairs.iter().copied().collect();
        move |name| vars.get(name).map(|value| value.to_string())
    }

    const REQUIRED: [(&str, &str); 2] = [
        ("OPENAI_API_KEY", "sk-test"),
        ("MCP_SERVER_URL", "http://localhost:3000"),
    ];

    #[test]
    fn test_defaults() {
        let settings = Settings::from_lookup(lookup_from(&REQUIRED)).unwrap();
        assert_eq!(settings.openai_api_key, "sk-test");
        assert_eq!(settings.mcp_server_url, "http://localhost:3000");
        assert_eq!(settings.openai_base_url, "https://api.openai.com/v1");
        assert_eq!(settings.openai_model, "gpt-4");
        assert_eq!(settings.conversations_dir, PathBuf::from("conversations"));
        assert_eq!(settings.context_max_messages, Some(20));
        assert_eq!(settings.log.level, "info");
        assert_eq!(settings.log.file, PathBuf::from("agent.log"));
    }

    #[test]
    fn test_overrides() {
        let mut pairs = REQUIRED.to_vec();
        pairs.extend([
            ("OPENAI_BASE_URL", "http://localhost:8080/v1"),
            ("OPENAI_MODEL", "gpt-4o-mini"),
            ("CONVERSATIONS_DIR", "/var/lib/shopkeeper"),
            ("CONTEXT_MAX_MESSAGES", "6"),
            ("LOG_LEVEL", "debug"),
            ("LOG_FILE", "logs/shop.log"),
        ]);
        let settings = Settings::from_lookup(lookup_from(&pairs)).unwrap();
        assert_eq!(settings.openai_base_url, "http://localhost:8080/v1");
        assert_eq!(settings.openai_model, "gpt-4o-mini");
        assert_eq!(
            settings.conversations_dir,
            PathBuf::from("/var/lib/shopkeeper")
        );
        assert_eq!(settings.context_max_messages, Some(6));
        assert_eq!(settings.log.level, "debug");
        assert_eq!(settings.log.file, PathBuf::from("logs/shop.log"));
    }

    #[test]
    fn test_missing_settings_in_order() {
        let err = Settings::from_lookup(lookup_from(&[])).unwrap_err();
        let ConfigError::Missing(missing) = &err else {
            panic!("unexpected error: {err}");
        };
        assert_eq!(missing, &["OPENAI_API_KEY", "MCP_SERVER_URL"]);
        assert_eq!(
            err.to_string(),
            "missing required environment variables: OPENAI_API_KEY, MCP_SERVER_URL"
        );

        // Blank values are as good as missing.
        let err = Settings::from_lookup(lookup_from(&[
            ("OPENAI_API_KEY", "  "),
            ("MCP_SERVER_URL", "http://localhost:3000"),
        ]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::Missing(m) if m == ["OPENAI_API_KEY"]));
    }

    #[test]
    fn test_unbounded_context() {
        for value in ["0", "all", "ALL"] {
            let mut pairs = REQUIRED.to_vec();
            pairs.push(("CONTEXT_MAX_MESSAGES", value));
            let settings = Settings::from_lookup(lookup_from(&pairs)).unwrap();
            assert_eq!(settings.context_max_messages, None, "{value}");
        }

        let mut pairs = REQUIRED.to_vec();
        pairs.push(("CONTEXT_MAX_MESSAGES", "lots"));
        let err = Settings::from_lookup(lookup_from(&pairs)).unwrap_err();
        assert!(
            matches!(err, ConfigError::Invalid { name: "CONTEXT_MAX_MESSAGES", .. }),
            "{err}"
        );
    }

    #[test]
    fn test_debug_redacts_api_key() {
        let settings = Settings::from_lookup(lookup_from(&REQUIRED)).unwrap();
        let debug = format!("{settings:?}");
        assert!(!debug.contains("sk-test"));
        assert!(debug.contains("<redacted>"));
    }
}
