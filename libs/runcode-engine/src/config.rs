// Language configuration management for the grading engine
use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use tracing::info;

use crate::resolver::is_identifier;

/// Shipped configuration, used when no languages file is present on disk
const BUILTIN_LANGUAGES: &str = include_str!("../../../config/languages.json");

/// What to do when none of the candidate names is declared
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FallbackStrategy {
    #[default]
    FirstDeclaredFunction,
    None,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryPointConfig {
    /// Names tried in order before falling back
    #[serde(default)]
    pub candidate_names: Vec<String>,
    #[serde(default)]
    pub fallback: FallbackStrategy,
}

/// Embedded JavaScript sandbox settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SandboxConfig {
    #[serde(default = "default_loop_iteration_limit")]
    pub loop_iteration_limit: u64,
    #[serde(default = "default_recursion_limit")]
    pub recursion_limit: usize,
    /// Standard globals left visible to submitted code; every other removable global is deleted
    #[serde(default)]
    pub allowed_globals: Vec<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DriverKind {
    #[default]
    Python,
}

/// Spawned interpreter settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterpreterConfig {
    pub command: String,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default)]
    pub driver: DriverKind,
    #[serde(default = "default_file_extension")]
    pub file_extension: String,
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BackendConfig {
    InProcess(SandboxConfig),
    Interpreter(InterpreterConfig),
    Unsupported,
}

impl BackendConfig {
    pub fn kind(&self) -> &'static str {
        match self {
            BackendConfig::InProcess(_) => "in_process",
            BackendConfig::Interpreter(_) => "interpreter",
            BackendConfig::Unsupported => "unsupported",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LanguageConfig {
    pub name: String,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub aliases: Vec<String>,
    pub backend: BackendConfig,
    #[serde(default)]
    pub entry_point: EntryPointConfig,
}

impl LanguageConfig {
    /// Human-readable name used in synthetic result rows
    pub fn display_name(&self) -> String {
        if let Some(display) = self.display_name.as_deref().filter(|d| !d.is_empty()) {
            return display.to_string();
        }
        let mut chars = self.name.chars();
        match chars.next() {
            Some(first) => first.to_uppercase().chain(chars).collect(),
            None => String::new(),
        }
    }
}

fn default_loop_iteration_limit() -> u64 {
    10_000_000
}

fn default_recursion_limit() -> usize {
    512
}

fn default_file_extension() -> String {
    ".py".to_string()
}

fn default_timeout_ms() -> u64 {
    10_000
}

#[derive(Debug, Serialize, Deserialize)]
struct LanguagesJson {
    default_language: String,
    languages: Vec<LanguageConfig>,
}

/// Validated set of configured languages, addressable by name or alias
#[derive(Debug, Clone)]
pub struct LanguageConfigManager {
    languages: Vec<LanguageConfig>,
    index: HashMap<String, usize>,
    default_index: usize,
}

impl LanguageConfigManager {
    /// Load language configurations from a languages.json file
    pub fn load(config_path: &Path) -> Result<Self> {
        if !config_path.exists() {
            bail!("Language config file not found: {}", config_path.display());
        }

        let content = fs::read_to_string(config_path)
            .with_context(|| format!("Failed to read {}", config_path.display()))?;

        Self::from_json_str(&content)
            .with_context(|| format!("Invalid language config in {}", config_path.display()))
    }

    /// Load from `config_path` when it exists, otherwise use the shipped defaults
    pub fn load_or_builtin(config_path: &Path) -> Result<Self> {
        if config_path.exists() {
            return Self::load(config_path);
        }
        info!(
            path = %config_path.display(),
            "Language config file not found, using built-in languages"
        );
        Self::builtin()
    }

    /// The configuration compiled into the binary
    pub fn builtin() -> Result<Self> {
        Self::from_json_str(BUILTIN_LANGUAGES).context("Built-in language config is invalid")
    }

    pub fn from_json_str(content: &str) -> Result<Self> {
        let languages_json: LanguagesJson =
            serde_json::from_str(content).context("Failed to parse languages.json")?;
        Self::from_parts(languages_json.default_language, languages_json.languages)
    }

    fn from_parts(default_language: String, languages: Vec<LanguageConfig>) -> Result<Self> {
        if languages.is_empty() {
            bail!("No languages configured");
        }

        let mut index = HashMap::new();
        for (position, language) in languages.iter().enumerate() {
            validate_language(language)?;

            for key in std::iter::once(&language.name).chain(language.aliases.iter()) {
                let key = key.trim().to_lowercase();
                if key.is_empty() {
                    bail!("Language '{}' has an empty name or alias", language.name);
                }
                if index.insert(key.clone(), position).is_some() {
                    bail!("Language name or alias '{}' is configured more than once", key);
                }
            }
        }

        let default_key = default_language.trim().to_lowercase();
        let default_index = match index.get(&default_key) {
            Some(&position) => position,
            None => bail!("Default language '{}' is not configured", default_language),
        };
        if languages[default_index].backend == BackendConfig::Unsupported {
            bail!("Default language '{}' has no execution backend", default_language);
        }

        Ok(Self {
            languages,
            index,
            default_index,
        })
    }

    /// Look a language up by name or alias (case-insensitive)
    pub fn lookup(&self, name: &str) -> Option<&LanguageConfig> {
        self.index
            .get(&name.trim().to_lowercase())
            .map(|&position| &self.languages[position])
    }

    /// Get configuration for a specific language
    pub fn get_config(&self, name: &str) -> Result<&LanguageConfig> {
        self.lookup(name)
            .ok_or_else(|| anyhow::anyhow!("No configuration found for language: {}", name))
    }

    pub fn default_config(&self) -> &LanguageConfig {
        &self.languages[self.default_index]
    }

    pub fn languages(&self) -> &[LanguageConfig] {
        &self.languages
    }

    /// List all configured language names in file order
    pub fn list_languages(&self) -> Vec<String> {
        self.languages.iter().map(|l| l.name.clone()).collect()
    }
}

fn validate_language(language: &LanguageConfig) -> Result<()> {
    for name in &language.entry_point.candidate_names {
        if !is_identifier(name) {
            bail!(
                "Language '{}': candidate name '{}' is not a valid identifier",
                language.name,
                name
            );
        }
    }

    match &language.backend {
        BackendConfig::Interpreter(interpreter) => {
            if interpreter.command.trim().is_empty() {
                bail!("Language '{}': interpreter command is empty", language.name);
            }
            if interpreter.timeout_ms == 0 {
                bail!("Language '{}': timeout_ms must be greater than zero", language.name);
            }
        }
        BackendConfig::InProcess(sandbox) => {
            if sandbox.loop_iteration_limit == 0 || sandbox.recursion_limit == 0 {
                bail!("Language '{}': sandbox limits must be greater than zero", language.name);
            }
        }
        BackendConfig::Unsupported => {}
    }

    Ok(())
}
