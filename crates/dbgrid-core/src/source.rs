//! Configuration sources.
//!
//! Lookups of scheduler-provided state (node-file paths and the like) go
//! through [`ConfigSource`] so callers can substitute a fixed map in tests
//! instead of touching the process environment.

use std::collections::HashMap;

/// A read-only key/value source of configuration state.
pub trait ConfigSource {
    /// Look up a variable. `None` when unset.
    fn var(&self, key: &str) -> Option<String>;
}

/// The process environment.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessEnv;

impl ConfigSource for ProcessEnv {
    fn var(&self, key: &str) -> Option<String> {
        std::env::var(key).ok()
    }
}

impl ConfigSource for HashMap<String, String> {
    fn var(&self, key: &str) -> Option<String> {
        self.get(key).cloned()
    }
}

impl<T: ConfigSource + ?Sized> ConfigSource for &T {
    fn var(&self, key: &str) -> Option<String> {
        (**self).var(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn map_source_lookup() {
        let mut vars = HashMap::new();
        vars.insert("COBALT_NODEFILE".to_string(), "/tmp/nodes".to_string());
        assert_eq!(vars.var("COBALT_NODEFILE").as_deref(), Some("/tmp/nodes"));
        assert_eq!(vars.var("PBS_NODEFILE"), None);
    }

    #[test]
    fn borrowed_source_delegates() {
        let mut vars = HashMap::new();
        vars.insert("K".to_string(), "v".to_string());
        let by_ref: &dyn ConfigSource = &vars;
        assert_eq!(by_ref.var("K").as_deref(), Some("v"));
    }
}
