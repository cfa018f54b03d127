//! Document and visibility abstractions.

use crate::types::MountId;
use std::collections::BTreeSet;

/// Read-only view of the host document.
///
/// # Implementations
///
/// - **Static**: [`StaticDocument`], a fixed set of mount ids
/// - **Simulation**: `SimHost` in `semlab_sim`, with vertical layout
pub trait Document {
    /// Returns true if a container with this id exists.
    fn contains(&self, mount: &MountId) -> bool;
}

/// Host-side viewport intersection tracking.
///
/// Observation is requested per mount; the host later reports
/// [`IntersectionEntry`](crate::IntersectionEntry) values for observed
/// mounts only.
pub trait VisibilityObserver {
    /// Starts watching `mount`, reporting once `threshold` is crossed.
    fn observe(&mut self, mount: &MountId, threshold: f64);

    /// Stops watching `mount`. Unknown mounts are ignored.
    fn unobserve(&mut self, mount: &MountId);
}

/// A document whose mount points are known up front.
#[derive(Debug, Clone, Default)]
pub struct StaticDocument {
    mounts: BTreeSet<MountId>,
}

impl StaticDocument {
    /// Creates a document containing the given mount ids.
    pub fn new<I, M>(mounts: I) -> Self
    where
        I: IntoIterator<Item = M>,
        M: Into<MountId>,
    {
        Self {
            mounts: mounts.into_iter().map(Into::into).collect(),
        }
    }

    /// Returns all mount ids in id order.
    pub fn mounts(&self) -> impl Iterator<Item = &MountId> {
        self.mounts.iter()
    }
}

impl Document for StaticDocument {
    fn contains(&self, mount: &MountId) -> bool {
        self.mounts.contains(mount)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_static_document_contains() {
        let doc = StaticDocument::new(["quiz-data-types", "diagram-variables"]);
        assert!(doc.contains(&MountId::from("quiz-data-types")));
        assert!(!doc.contains(&MountId::from("sim-bks-model")));
        assert_eq!(doc.mounts().count(), 2);
    }
}
