//! Journal configuration from TOML (`[journal]` section)

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Raw journal configuration from TOML
///
/// ```toml
/// [journal]
/// enabled = true
/// path = "runs/epochs.jsonl"
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileJournalConfig {
    /// Write the JSONL epoch journal
    pub enabled: bool,
    /// Journal file; defaults to a timestamped file in the data directory
    pub path: Option<PathBuf>,
}

impl FileJournalConfig {
    /// Where the journal goes, if it is enabled at all
    pub fn resolve_path(&self) -> Option<PathBuf> {
        if !self.enabled {
            return None;
        }
        self.path.clone().or_else(Self::default_path)
    }

    /// `$XDG_DATA_HOME/liminal/journal/<timestamp>.jsonl`
    pub fn default_path() -> Option<PathBuf> {
        let stamp = chrono::Local::now().format("%Y%m%d-%H%M%S");
        dirs::data_dir().map(|d| {
            d.join("liminal")
                .join("journal")
                .join(format!("{}.jsonl", stamp))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_disabled_by_default() {
        let config = FileJournalConfig::default();
        assert!(!config.enabled);
        assert!(config.resolve_path().is_none());
    }

    #[test]
    fn test_explicit_path_wins() {
        let toml_str = r#"
[journal]
enabled = true
path = "/tmp/liminal/run.jsonl"
"#;
        let file: super::super::FileConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(
            file.journal.resolve_path(),
            Some(PathBuf::from("/tmp/liminal/run.jsonl"))
        );
    }
}
