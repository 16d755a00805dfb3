//! Registry of active listener names.
//!
//! Whoever assembles a set of listeners owns one registry and hands it to
//! each builder. Registration returns a guard that frees the name on drop.

use std::collections::HashSet;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::debug;

use contracts::{ListenerError, Result};

/// Set of names currently held by live listeners
#[derive(Debug, Clone, Default)]
pub struct NameRegistry {
    names: Arc<Mutex<HashSet<String>>>,
}

impl NameRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim `name`, failing if another live listener holds it
    pub fn register(&self, name: &str) -> Result<Registration> {
        if !self.names.lock().insert(name.to_string()) {
            return Err(ListenerError::duplicate_name(name));
        }
        debug!(listener = %name, "Registered listener name");
        Ok(Registration {
            name: name.to_string(),
            registry: self.clone(),
        })
    }

    pub fn contains(&self, name: &str) -> bool {
        self.names.lock().contains(name)
    }

    pub fn len(&self) -> usize {
        self.names.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.lock().is_empty()
    }
}

/// Holds a registered name until dropped
#[derive(Debug)]
pub struct Registration {
    name: String,
    registry: NameRegistry,
}

impl Registration {
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl Drop for Registration {
    fn drop(&mut self) {
        self.registry.names.lock().remove(&self.name);
        debug!(listener = %self.name, "Released listener name");
    }
}
