//! Common types for the SEMLAB host abstraction.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identifier of a container element that a widget attaches to.
///
/// Mount ids are unique within a document. The core never creates the
/// container itself, it only populates it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MountId(String);

impl MountId {
    /// Creates a mount id from any string-like value.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for MountId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for MountId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl AsRef<str> for MountId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for MountId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Identifier of one page session (page load to page teardown).
///
/// Uses UUID v4 in production. The harness derives it from the run seed so
/// that logs of a replayed run line up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(pub Uuid);

impl SessionId {
    /// Creates a new random SessionId.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Creates a deterministic SessionId from a seed (for simulation).
    pub fn from_seed(seed: u64) -> Self {
        let mut bytes = [0u8; 16];
        bytes[0..8].copy_from_slice(&seed.to_le_bytes());
        bytes[8..16].copy_from_slice(&seed.wrapping_mul(0x517cc1b727220a95).to_le_bytes());
        Self(Uuid::from_bytes(bytes))
    }

    /// Returns the inner UUID.
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // First 8 chars are enough to tell sessions apart in logs
        write!(f, "{}", &self.0.to_string()[..8])
    }
}

/// One visibility report delivered by the host for an observed mount.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntersectionEntry {
    /// The mount point this entry describes
    pub mount: MountId,

    /// Fraction of the mount's area inside the viewport (0.0 - 1.0)
    pub ratio: f64,
}

impl IntersectionEntry {
    /// Creates a new entry; the ratio is clamped into [0, 1].
    pub fn new(mount: impl Into<MountId>, ratio: f64) -> Self {
        Self {
            mount: mount.into(),
            ratio: ratio.clamp(0.0, 1.0),
        }
    }

    /// Returns true when the visible fraction reaches `threshold`.
    ///
    /// A zero ratio never counts as intersecting, even for a zero threshold.
    pub fn is_intersecting(&self, threshold: f64) -> bool {
        self.ratio > 0.0 && self.ratio >= threshold
    }
}
