use serde::{Deserialize, Serialize};

/// Envelope of a deploy request. `Config` stays untyped until dispatch
/// decodes it into a `DeployConfig`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Task {
    #[serde(rename = "Config", default)]
    pub config: serde_json::Value,
}

impl Task {
    pub fn new(config: serde_json::Value) -> Self {
        Self { config }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn parses_envelope_and_ignores_extra_keys() {
        let task: Task = serde_json::from_str(
            r#"{"Id": 17, "Config": {"ServiceName": "web", "ImageName": "nginx"}}"#,
        )
        .unwrap();
        assert_eq!(task.config["ServiceName"], "web");
    }

    #[test]
    fn missing_config_is_null() {
        let task: Task = serde_json::from_str("{}").unwrap();
        assert_eq!(task.config, json!(null));
    }
}
