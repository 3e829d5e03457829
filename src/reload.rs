// Rule hot reload module
// Handles SIGHUP to reload the rule file without restarting

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::modules::ModuleRegistry;
use crate::rules::{RuleError, RuleSet};

/// ReloadManager handles rule reload via SIGHUP
pub struct ReloadManager {
    rules_path: Option<PathBuf>,
    optional: bool,
    reload_requested: Arc<AtomicBool>,
}

impl ReloadManager {
    /// `rules_path` of `None` means the bundled rules are in use
    pub fn new(rules_path: Option<PathBuf>) -> Self {
        Self {
            rules_path,
            optional: false,
            reload_requested: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Fall back to the bundled rules when the file cannot be loaded
    pub fn with_optional(mut self, optional: bool) -> Self {
        self.optional = optional;
        self
    }

    /// Register SIGHUP signal handler
    #[cfg(unix)]
    pub fn register_signal_handler(&self) -> Result<(), String> {
        use signal_hook::consts::SIGHUP;
        use signal_hook::flag;

        flag::register(SIGHUP, Arc::clone(&self.reload_requested))
            .map_err(|e| format!("Failed to register SIGHUP handler: {}", e))?;

        Ok(())
    }

    /// Request a reload without a signal
    pub fn request_reload(&self) {
        self.reload_requested.store(true, Ordering::Relaxed);
    }

    pub fn is_reload_requested(&self) -> bool {
        self.reload_requested.load(Ordering::Relaxed)
    }

    pub fn clear_reload_request(&self) {
        self.reload_requested.store(false, Ordering::Relaxed);
    }

    /// Load the rule set
    ///
    /// The whole file must parse; a broken file never replaces working rules.
    pub fn reload_rules(&self, registry: &ModuleRegistry) -> Result<RuleSet, RuleError> {
        load_rules(self.rules_path.as_deref(), self.optional, registry)
    }

    pub fn rules_path(&self) -> Option<&Path> {
        self.rules_path.as_deref()
    }
}

/// Load rules from `path`; with `optional`, a missing or broken file yields the bundled rules
pub fn load_rules(
    path: Option<&Path>,
    optional: bool,
    registry: &ModuleRegistry,
) -> Result<RuleSet, RuleError> {
    match RuleSet::load(path, registry) {
        Ok(rules) => Ok(rules),
        Err(e) if optional && path.is_some() => {
            tracing::warn!(error = %e, "Rule file unusable, using bundled rules");
            RuleSet::bundled(registry)
        }
        Err(e) => Err(e),
    }
}
