//! Schema registry subsystem.
//!
//! # Data Flow
//! ```text
//! each module's ConfigModule::runtime_config()
//!     → tree.rs (ConfigNode: Leaf | Branch)
//!     → SchemaRegistryBuilder::register (flatten to module/dotted.key)
//!     → build() → SchemaRegistry (frozen, shared via Arc)
//!     → RuntimeConfig + Reconciler read it at serving time
//! ```
//!
//! # Design Decisions
//! - No ambient singleton: the registry is an explicit value built once
//! - Leaf vs branch is decided by the author, never probed at runtime
//! - Registration is additive; re-registering an id overwrites it

pub mod descriptor;
pub mod tree;

use std::collections::BTreeMap;
use std::sync::Arc;

use thiserror::Error;

pub use descriptor::{ConfigDescriptor, ValueKind};
pub use tree::{ConfigModule, ConfigNode};

/// Separator between module name and dotted key in an id.
pub const MODULE_SEPARATOR: char = '/';

/// Separator between nested key segments.
pub const KEY_SEPARATOR: char = '.';

/// Errors raised while registering declarations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("invalid module name {0:?}")]
    InvalidModule(String),

    #[error("invalid key segment {segment:?} in module {module}")]
    InvalidSegment { module: String, segment: String },
}

/// Collects descriptor contributions from every module before startup.
#[derive(Debug, Default)]
pub struct SchemaRegistryBuilder {
    descriptors: BTreeMap<String, ConfigDescriptor>,
}

impl SchemaRegistryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Flatten a declaration tree into descriptors under `module`.
    pub fn register(
        &mut self,
        module: &str,
        tree: BTreeMap<String, ConfigNode>,
    ) -> Result<&mut Self, RegistryError> {
        if module.is_empty() || module.contains(MODULE_SEPARATOR) {
            return Err(RegistryError::InvalidModule(module.to_string()));
        }

        let mut leaves = Vec::new();
        for (name, node) in tree {
            flatten(module, String::new(), name, node, &mut leaves)?;
        }

        for (key, description, default) in leaves {
            let descriptor = ConfigDescriptor::new(module, key, description, default);
            if let Some(previous) = self.descriptors.insert(descriptor.id.clone(), descriptor) {
                tracing::debug!(id = %previous.id, "Runtime config descriptor re-registered");
            }
        }

        Ok(self)
    }

    /// Register a module through its [`ConfigModule`] implementation.
    pub fn register_module<M: ConfigModule>(&mut self) -> Result<&mut Self, RegistryError> {
        self.register(M::NAME, M::runtime_config())
    }

    /// Freeze the collected declarations.
    pub fn build(self) -> SchemaRegistry {
        SchemaRegistry {
            descriptors: Arc::new(self.descriptors),
        }
    }
}

fn flatten(
    module: &str,
    parent: String,
    name: String,
    node: ConfigNode,
    out: &mut Vec<(String, String, serde_json::Value)>,
) -> Result<(), RegistryError> {
    if name.is_empty() || name.contains(KEY_SEPARATOR) || name.contains(MODULE_SEPARATOR) {
        return Err(RegistryError::InvalidSegment {
            module: module.to_string(),
            segment: name,
        });
    }

    let key = if parent.is_empty() {
        name
    } else {
        format!("{parent}{KEY_SEPARATOR}{name}")
    };

    match node {
        ConfigNode::Leaf { description, default } => {
            out.push((key, description, default));
        }
        ConfigNode::Branch(children) => {
            for (child, node) in children {
                flatten(module, key.clone(), child, node, out)?;
            }
        }
    }

    Ok(())
}

/// Immutable catalog of every declared runtime setting.
///
/// Cloning is cheap; all clones share the same descriptor map.
#[derive(Debug, Clone, Default)]
pub struct SchemaRegistry {
    descriptors: Arc<BTreeMap<String, ConfigDescriptor>>,
}

impl SchemaRegistry {
    pub fn builder() -> SchemaRegistryBuilder {
        SchemaRegistryBuilder::new()
    }

    pub fn get(&self, id: &str) -> Option<&ConfigDescriptor> {
        self.descriptors.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.descriptors.contains_key(id)
    }

    /// All declared ids in sorted order.
    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.descriptors.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ConfigDescriptor> {
        self.descriptors.values()
    }

    /// Distinct module names, sorted.
    pub fn modules(&self) -> Vec<&str> {
        let mut modules: Vec<&str> = self.iter().map(|d| d.module.as_str()).collect();
        modules.sort_unstable();
        modules.dedup();
        modules
    }

    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }
}
