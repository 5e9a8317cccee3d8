//! Feature flags toggled at runtime.

use std::collections::BTreeMap;

use crate::registry::{ConfigModule, ConfigNode};

pub struct FlagsModule;

impl ConfigModule for FlagsModule {
    const NAME: &'static str = "flags";

    fn runtime_config() -> BTreeMap<String, ConfigNode> {
        BTreeMap::from([
            (
                "earlyAccessControl".to_string(),
                ConfigNode::leaf("Only allow users with early access features to access the app", false),
            ),
            (
                "syncClientVersionCheck".to_string(),
                ConfigNode::leaf("Reject sync connections from outdated clients", false),
            ),
        ])
    }
}
