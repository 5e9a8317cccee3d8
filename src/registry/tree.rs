//! Declaration trees authored by each module.

use std::collections::BTreeMap;

use serde_json::Value;

/// A node in a module's declaration tree.
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigNode {
    /// A single setting.
    Leaf { description: String, default: Value },
    /// Named children, flattened into dotted keys.
    Branch(BTreeMap<String, ConfigNode>),
}

impl ConfigNode {
    pub fn leaf(description: impl Into<String>, default: impl Into<Value>) -> Self {
        ConfigNode::Leaf {
            description: description.into(),
            default: default.into(),
        }
    }

    pub fn branch<I, K>(children: I) -> Self
    where
        I: IntoIterator<Item = (K, ConfigNode)>,
        K: Into<String>,
    {
        ConfigNode::Branch(children.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }
}

/// A server module that contributes runtime settings.
pub trait ConfigModule {
    /// Module name; becomes the id prefix.
    const NAME: &'static str;

    fn runtime_config() -> BTreeMap<String, ConfigNode>;
}
