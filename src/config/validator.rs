//! Cross-module checks run before resolution. Per-schema checks live in the builders.

use crate::case::is_identifier;
use crate::config::types::ModuleConfig;
use crate::error::ConfigError;
use std::collections::HashSet;

/// Module keys are unique, non-empty identifiers.
pub fn validate(configs: &[ModuleConfig]) -> Result<(), ConfigError> {
    let mut keys = HashSet::new();
    for c in configs {
        if !is_identifier(&c.key) || c.key.contains('.') {
            return Err(ConfigError::InvalidIdentifier {
                kind: "module key",
                name: c.key.clone(),
            });
        }
        if !keys.insert(c.key.as_str()) {
            return Err(ConfigError::Duplicate {
                kind: "module",
                name: c.key.clone(),
            });
        }
        if let Some(scope) = &c.scope {
            if scope.trim().is_empty() {
                return Err(ConfigError::Missing {
                    kind: "scope predicate",
                    name: c.key.clone(),
                });
            }
        }
    }
    Ok(())
}
