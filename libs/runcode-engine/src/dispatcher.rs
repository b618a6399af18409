// Language dispatch: declared language → backend plan
use tracing::{debug, warn};

use crate::config::{BackendConfig, LanguageConfig, LanguageConfigManager};
use crate::resolver::Resolver;

/// Everything the runner needs to grade one submission
#[derive(Debug, Clone)]
pub struct Dispatch<'a> {
    pub language: &'a LanguageConfig,
    pub resolver: Resolver,
}

impl Dispatch<'_> {
    pub fn backend(&self) -> &BackendConfig {
        &self.language.backend
    }
}

#[derive(Debug, Clone)]
pub struct LanguageDispatcher {
    manager: LanguageConfigManager,
}

impl LanguageDispatcher {
    pub fn new(manager: LanguageConfigManager) -> Self {
        Self { manager }
    }

    pub fn config(&self) -> &LanguageConfigManager {
        &self.manager
    }

    /// Pick the language for `declared`. Missing or unknown values use the default language.
    pub fn dispatch(&self, declared: &str) -> Dispatch<'_> {
        let language = if declared.trim().is_empty() {
            debug!("No language declared, using default");
            self.manager.default_config()
        } else {
            match self.manager.lookup(declared) {
                Some(language) => language,
                None => {
                    let default = self.manager.default_config();
                    warn!(
                        declared = %declared,
                        default = %default.name,
                        "Unknown language, using default"
                    );
                    default
                }
            }
        };

        Dispatch {
            language,
            resolver: Resolver::new(&language.entry_point),
        }
    }
}
