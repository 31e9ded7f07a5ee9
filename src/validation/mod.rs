//! Validation functionality
//!
//! Consistency checks run over a registry once a build session has assembled it:
//! - Cycles in complex-type containment and in entity or complex inheritance
//! - Type-level checks (name collisions, dangling navigation, missing keys)

pub mod cycles;
pub mod types;

use tracing::{debug, warn};

use crate::config::BuildConfig;
use crate::error::BuildError;
use crate::registry::Registry;

/// Findings of one validation run
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GraphValidationResult {
    pub issues: Vec<BuildError>,
}

impl GraphValidationResult {
    pub fn is_valid(&self) -> bool {
        self.issues.is_empty()
    }

    /// `Ok` when valid, else the first finding
    pub fn into_result(self) -> Result<(), BuildError> {
        match self.issues.into_iter().next() {
            Some(issue) => Err(issue),
            None => Ok(()),
        }
    }
}

/// Validate every element in `registry`
pub fn validate_graph(registry: &Registry, config: &BuildConfig) -> GraphValidationResult {
    let mut issues = cycles::find_cycles(registry);
    issues.extend(types::check_types(registry, config));
    if issues.is_empty() {
        debug!("Validated {} registered elements", registry.len());
    } else {
        for issue in &issues {
            warn!("Validation: {}", issue);
        }
    }
    GraphValidationResult { issues }
}
