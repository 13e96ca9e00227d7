//! Output format value object

use serde::{Deserialize, Serialize};

/// How a swarm run is rendered
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// One line per epoch plus totals (default)
    #[default]
    Summary,
    /// Every epoch with its committed proposals and transitions
    Full,
    /// JSON output
    Json,
}

impl OutputFormat {
    pub fn as_str(&self) -> &str {
        match self {
            OutputFormat::Summary => "summary",
            OutputFormat::Full => "full",
            OutputFormat::Json => "json",
        }
    }
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "summary" => Ok(OutputFormat::Summary),
            "full" => Ok(OutputFormat::Full),
            "json" => Ok(OutputFormat::Json),
            _ => Err(format!(
                "Unknown output format: {}. Valid: summary, full, json",
                s
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_summary() {
        assert_eq!(OutputFormat::default(), OutputFormat::Summary);
    }

    #[test]
    fn test_serialize_lowercase() {
        let json = serde_json::to_string(&OutputFormat::Full).unwrap();
        assert_eq!(json, "\"full\"");
    }

    #[test]
    fn test_from_str() {
        assert_eq!("JSON".parse::<OutputFormat>().unwrap(), OutputFormat::Json);
        assert!("yaml".parse::<OutputFormat>().is_err());
    }
}
