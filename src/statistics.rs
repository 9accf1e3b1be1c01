//! Running totals of resized images and reclaimed storage.
//!
//! After every successful resize the resizer adds one image and the number of
//! bytes saved to a small JSON file:
//!
//! ```json
//! { "images": 42, "bytes": 183500800 }
//! ```
//!
//! The file only feeds the savings banner (`image-autoresize stats`), so it
//! is treated as disposable: a missing or malformed file reads as "no
//! statistics" and the next recorded resize starts again from zero.
//! Concurrent writers are not coordinated; the last writer wins.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::io;
use std::path::Path;

/// Cumulative resize statistics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Statistics {
    pub images: u64,
    pub bytes: u64,
}

impl Statistics {
    /// Load from `path`. Returns `None` if the file doesn't exist or can't be
    /// parsed.
    pub fn load(path: &Path) -> Option<Self> {
        let content = std::fs::read_to_string(path).ok()?;
        serde_json::from_str(&content).ok()
    }

    pub fn save(&self, path: &Path) -> io::Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)
    }

    /// Count one resized image that saved `bytes`.
    pub fn add(&mut self, bytes: u64) {
        self.images += 1;
        self.bytes = self.bytes.saturating_add(bytes);
    }
}

impl fmt::Display for Statistics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} images, {} bytes", self.images, self.bytes)
    }
}

/// Add one image saving `bytes` to the statistics file at `path`.
pub fn record(path: &Path, bytes: u64) -> io::Result<Statistics> {
    let mut stats = Statistics::load(path).unwrap_or_default();
    stats.add(bytes);
    stats.save(path)?;
    Ok(stats)
}
