use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;

/// Restart policy applied when the request leaves `RestartPolicy.Name` empty.
pub const DEFAULT_RESTART_POLICY: &str = "always";

/// Tag used when the request leaves `ImageTag` empty.
pub const DEFAULT_IMAGE_TAG: &str = "latest";

/// Desired state of one deployable unit.
///
/// Field names on the wire are PascalCase (`ServiceName`, `ImageTag`, ...).
/// Unknown fields are ignored; `null` is accepted wherever a field is
/// optional.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct DeployConfig {
    /// Container name and reconciliation key.
    pub service_name: String,
    pub image_name: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub image_tag: String,
    /// `KEY=VALUE` entries.
    #[serde(default, deserialize_with = "null_as_default")]
    pub env: Vec<String>,
    /// Container port to host port.
    #[serde(default)]
    pub ports: Option<BTreeMap<String, String>>,
    /// Host path to container path.
    #[serde(default)]
    pub volume_mounts: Option<BTreeMap<String, String>>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub network_name: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub network_id: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub restart_policy: RestartPolicyConfig,
    #[serde(default)]
    pub auto_remove: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct RestartPolicyConfig {
    #[serde(default, deserialize_with = "null_as_default")]
    pub name: String,
    #[serde(default)]
    pub maximum_retry_count: u32,
}

/// Identifies an existing container to restart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct RestartConfig {
    pub service_name: String,
}

/// A deploy request that cannot be turned into a [`DeployConfig`].
#[derive(Debug, Error)]
pub enum ConfigDecodeError {
    #[error("malformed deploy config: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("deploy config is missing required field `{0}`")]
    MissingField(&'static str),

    #[error("deploy config field `{field}` is invalid: {reason}")]
    InvalidField { field: &'static str, reason: String },
}

impl DeployConfig {
    /// Minimal config for `service` running `image:tag`.
    pub fn new(
        service: impl Into<String>,
        image: impl Into<String>,
        tag: impl Into<String>,
    ) -> Self {
        Self {
            service_name: service.into(),
            image_name: image.into(),
            image_tag: tag.into(),
            env: Vec::new(),
            ports: None,
            volume_mounts: None,
            network_name: String::new(),
            network_id: String::new(),
            restart_policy: RestartPolicyConfig::default(),
            auto_remove: false,
        }
    }

    /// Decode an untyped config value and check the required fields.
    pub fn from_value(value: serde_json::Value) -> Result<Self, ConfigDecodeError> {
        let cfg: DeployConfig = serde_json::from_value(value)?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<(), ConfigDecodeError> {
        if self.service_name.trim().is_empty() {
            return Err(ConfigDecodeError::MissingField("ServiceName"));
        }
        if self.image_name.trim().is_empty() {
            return Err(ConfigDecodeError::MissingField("ImageName"));
        }
        if self
            .service_name
            .chars()
            .any(|c| c.is_whitespace() || c.is_control())
        {
            return Err(ConfigDecodeError::InvalidField {
                field: "ServiceName",
                reason: format!("{:?} contains whitespace or control characters", self.service_name),
            });
        }
        // A bare `KEY` makes the docker CLI copy the launcher's own value.
        if let Some(entry) = self
            .env
            .iter()
            .find(|kv| kv.split_once('=').is_none_or(|(key, _)| key.is_empty()))
        {
            return Err(ConfigDecodeError::InvalidField {
                field: "Env",
                reason: format!("{entry:?} is not a KEY=VALUE entry"),
            });
        }
        Ok(())
    }

    /// `ImageName:ImageTag`, with an empty tag read as [`DEFAULT_IMAGE_TAG`].
    pub fn image_reference(&self) -> String {
        let tag = if self.image_tag.is_empty() {
            DEFAULT_IMAGE_TAG
        } else {
            &self.image_tag
        };
        format!("{}:{tag}", self.image_name)
    }

    /// Restart policy name with the empty default applied.
    pub fn restart_policy_name(&self) -> &str {
        if self.restart_policy.name.is_empty() {
            DEFAULT_RESTART_POLICY
        } else {
            &self.restart_policy.name
        }
    }
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}
