//! Authentication settings.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::registry::{ConfigModule, ConfigNode};
use crate::runtime::{RuntimeConfig, RuntimeConfigError};

pub const PASSWORD_MIN: &str = "auth/password.min";
pub const PASSWORD_MAX: &str = "auth/password.max";

pub struct AuthModule;

impl ConfigModule for AuthModule {
    const NAME: &'static str = "auth";

    fn runtime_config() -> BTreeMap<String, ConfigNode> {
        BTreeMap::from([
            (
                "allowSignup".to_string(),
                ConfigNode::leaf("Whether to allow new registrations", true),
            ),
            (
                "password".to_string(),
                ConfigNode::branch([
                    ("min", ConfigNode::leaf("The minimum length of user password", 8)),
                    ("max", ConfigNode::leaf("The maximum length of user password", 32)),
                ]),
            ),
            (
                "session".to_string(),
                ConfigNode::branch([(
                    "ttlSecs",
                    ConfigNode::leaf("Lifetime of a user session in seconds", 15 * 24 * 60 * 60),
                )]),
            ),
        ])
    }
}

/// Password length limits shown to clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PasswordLimits {
    pub min_length: u32,
    pub max_length: u32,
}

impl PasswordLimits {
    /// Read both limits in one store round-trip.
    ///
    /// Falls back to the declared default for a limit whose record does not exist yet.
    pub async fn load(runtime: &RuntimeConfig) -> Result<Self, RuntimeConfigError> {
        let values = runtime.fetch_all([PASSWORD_MIN, PASSWORD_MAX]).await?;
        let limit = |id: &str| -> Result<u32, RuntimeConfigError> {
            let value = match values.get(id) {
                Some(value) => value.clone(),
                None => runtime
                    .registry()
                    .get(id)
                    .map(|d| d.default.clone())
                    .ok_or_else(|| RuntimeConfigError::NotFound(id.to_string()))?,
            };
            serde_json::from_value(value).map_err(|source| RuntimeConfigError::Decode {
                id: id.to_string(),
                source,
            })
        };

        Ok(Self {
            min_length: limit(PASSWORD_MIN)?,
            max_length: limit(PASSWORD_MAX)?,
        })
    }
}
