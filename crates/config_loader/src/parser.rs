//! Parameter file parsing
//!
//! TOML (primary) and JSON.

use contracts::{ContractError, DriverBlueprint};

/// Parameter file format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    /// TOML (recommended)
    Toml,
    Json,
}

impl ConfigFormat {
    /// Infer format from file extension
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "toml" => Some(Self::Toml),
            "json" => Some(Self::Json),
            _ => None,
        }
    }
}

/// Parse TOML parameters
pub fn parse_toml(content: &str) -> Result<DriverBlueprint, ContractError> {
    toml::from_str(content).map_err(|e| ContractError::ConfigParse {
        message: format!("TOML parse error: {e}"),
        source: Some(Box::new(e)),
    })
}

/// Parse JSON parameters
pub fn parse_json(content: &str) -> Result<DriverBlueprint, ContractError> {
    serde_json::from_str(content).map_err(|e| ContractError::ConfigParse {
        message: format!("JSON parse error: {e}"),
        source: Some(Box::new(e)),
    })
}

/// Parse according to format
pub fn parse(content: &str, format: ConfigFormat) -> Result<DriverBlueprint, ContractError> {
    match format {
        ConfigFormat::Toml => parse_toml(content),
        ConfigFormat::Json => parse_json(content),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::{SinkType, Topic};

    #[test]
    fn test_parse_toml_defaults() {
        let content = r#"
[driver]
lidar_ip = "os1-991900123456.local"
computer_ip = "192.168.1.10"
"#;
        let result = parse_toml(content);
        assert!(result.is_ok(), "Failed: {:?}", result.err());
        let bp = result.unwrap();
        assert_eq!(bp.driver.imu_port, 7503);
        assert_eq!(bp.driver.lidar_mode, "512x10");
        assert_eq!(bp.driver.imu_frame, "imu_data_frame");
        assert!(bp.sinks.is_empty());
    }

    #[test]
    fn test_parse_json_minimal() {
        let content = r#"{
            "driver": {
                "lidar_ip": "10.5.5.86",
                "computer_ip": "10.5.5.1",
                "lidar_port": 9000,
                "laser_frame": "os1_lidar"
            },
            "sinks": [{ "name": "dump", "sink_type": "file", "topics": ["range_image"],
                        "params": { "base_path": "/tmp/os1" } }]
        }"#;
        let bp = parse_json(content).unwrap();
        assert_eq!(bp.driver.lidar_port, 9000);
        assert_eq!(bp.driver.laser_frame, "os1_lidar");
        assert_eq!(bp.sinks[0].sink_type, SinkType::File);
        assert_eq!(bp.sinks[0].topics, vec![Topic::RangeImage]);
    }

    #[test]
    fn test_parse_unknown_topic() {
        let content = r#"
[[sinks]]
name = "log"
sink_type = "log"
topics = ["pointz"]
"#;
        assert!(parse_toml(content).is_err());
    }

    #[test]
    fn test_parse_toml_syntax_error() {
        let content = "invalid toml [[[";
        let result = parse_toml(content);
        assert!(result.is_err());
        let err = result.unwrap_err();
        assert!(matches!(err, ContractError::ConfigParse { .. }));
    }

    #[test]
    fn test_format_from_extension() {
        assert_eq!(
            ConfigFormat::from_extension("toml"),
            Some(ConfigFormat::Toml)
        );
        assert_eq!(
            ConfigFormat::from_extension("TOML"),
            Some(ConfigFormat::Toml)
        );
        assert_eq!(
            ConfigFormat::from_extension("json"),
            Some(ConfigFormat::Json)
        );
        assert_eq!(ConfigFormat::from_extension("yaml"), None);
    }
}
