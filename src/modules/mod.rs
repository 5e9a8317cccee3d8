//! Runtime settings declared by the server's own modules.

pub mod auth;
pub mod flags;

use crate::registry::{RegistryError, SchemaRegistry};

pub use auth::AuthModule;
pub use flags::FlagsModule;

/// Registry holding every built-in module's declarations.
pub fn default_registry() -> Result<SchemaRegistry, RegistryError> {
    let mut builder = SchemaRegistry::builder();
    builder.register_module::<AuthModule>()?;
    builder.register_module::<FlagsModule>()?;
    Ok(builder.build())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_default_registry() {
        let registry = default_registry().unwrap();
        assert_eq!(registry.get("auth/password.min").unwrap().default, json!(8));
        assert_eq!(registry.get("auth/password.max").unwrap().default, json!(32));
        assert!(registry.contains("flags/earlyAccessControl"));
        assert_eq!(registry.modules(), vec!["auth", "flags"]);
    }
}
