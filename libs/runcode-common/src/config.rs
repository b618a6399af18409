// Service settings read from the environment
use std::path::PathBuf;

pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:3000";
pub const DEFAULT_LANGUAGES_PATH: &str = "config/languages.json";
pub const DEFAULT_MAX_BODY_BYTES: usize = 1024 * 1024;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceConfig {
    pub bind_addr: String,
    pub languages_path: PathBuf,
    pub max_body_bytes: usize,
    pub json_logs: bool,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            bind_addr: DEFAULT_BIND_ADDR.to_string(),
            languages_path: PathBuf::from(DEFAULT_LANGUAGES_PATH),
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
            json_logs: false,
        }
    }
}

impl ServiceConfig {
    /// Read `RUNCODE_*` variables, falling back to defaults for anything unset or unparsable
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();

        Self {
            bind_addr: lookup("RUNCODE_BIND").unwrap_or(defaults.bind_addr),
            languages_path: lookup("RUNCODE_LANGUAGES")
                .map(PathBuf::from)
                .unwrap_or(defaults.languages_path),
            max_body_bytes: lookup("RUNCODE_MAX_BODY_BYTES")
                .and_then(|value| value.parse().ok())
                .unwrap_or(defaults.max_body_bytes),
            json_logs: lookup("RUNCODE_LOG_FORMAT")
                .map(|format| format.eq_ignore_ascii_case("json"))
                .unwrap_or(defaults.json_logs),
        }
    }
}
