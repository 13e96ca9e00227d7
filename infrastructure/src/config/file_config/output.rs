//! `[output]` section: how a finished swarm run is shown
//!
//! `format` picks the rendering of the run outcome:
//!
//! - `summary`: one line per epoch plus totals
//! - `full`: every epoch with its commits and phase transitions
//! - `json`: the whole outcome on stdout, with progress bars suppressed
//!
//! `--output` on the command line takes precedence. `color = false` turns
//! off ANSI colors in the progress display and the rendered outcome.

use liminal_domain::OutputFormat;
use serde::{Deserialize, Serialize};

/// Output settings as read from the config file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileOutputConfig {
    /// Rendering of the run outcome; `None` falls back to `summary`
    pub format: Option<OutputFormat>,
    /// ANSI colors in progress lines and rendered outcomes
    pub color: bool,
}

impl Default for FileOutputConfig {
    fn default() -> Self {
        Self {
            format: None,
            color: true,
        }
    }
}
