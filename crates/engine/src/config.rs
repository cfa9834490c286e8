use serde::{Deserialize, Serialize};

/// Default ceiling on pasted rows per operation.
pub const DEFAULT_MAX_PASTE_ROWS: usize = 1000;

/// Operational limits the engine enforces. Host applications own where
/// these come from (settings file, server policy); the engine only reads
/// them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EditorLimits {
    /// Largest number of rows a single paste may span.
    pub max_paste_rows: usize,
}

impl Default for EditorLimits {
    fn default() -> Self {
        Self {
            max_paste_rows: DEFAULT_MAX_PASTE_ROWS,
        }
    }
}
