//! Simulated host for deterministic testing.
//!
//! Stands in for the browser page:
//! - [`SimDocument`]: mount points laid out top to bottom with fixed heights
//! - [`SimViewport`]: a scroll position plus the observer registry
//! - [`MemorySource`]: a reference source that serves a fixed payload or
//!   rejects every fetch
//!
//! Intersection ratios are computed geometrically: the visible fraction of a
//! mount's height, whichever edge is clipped.

use async_trait::async_trait;
use semlab_env::{Document, EnvError, IntersectionEntry, MountId, ReferenceSource, VisibilityObserver};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Browser viewport height used unless a scenario overrides it.
pub const DEFAULT_VIEWPORT_HEIGHT: f64 = 800.0;

/// Lecture prose above each widget container.
pub const SECTION_GAP: f64 = 640.0;

/// Rendered container heights of the lecture page, in page order.
pub const LECTURE_LAYOUT: [(&str, f64); 9] = [
    ("diagram-variables", 300.0),
    ("quiz-data-types", 900.0),
    ("diagram-decision-tree", 420.0),
    ("quiz-latent-variables", 820.0),
    ("diagram-sem-model", 440.0),
    ("quiz-assumption-violations", 860.0),
    ("sim-fit-explorer", 380.0),
    ("quiz-model-fit", 840.0),
    ("sim-bks-model", 520.0),
];

/// Excerpt of the pipeline output served by [`MemorySource::bks_fixture`].
pub const BKS_FIXTURE: &str = include_str!("../fixtures/bks_excerpt.json");

/// Vertical placement of one mount.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Extent {
    pub mount: MountId,
    pub top: f64,
    pub height: f64,
}

impl Extent {
    pub fn bottom(&self) -> f64 {
        self.top + self.height
    }

    /// Visible fraction of this extent for a viewport `[y, y + height)`.
    pub fn ratio(&self, y: f64, height: f64) -> f64 {
        if self.height <= 0.0 {
            return 0.0;
        }
        let overlap = self.bottom().min(y + height) - self.top.max(y);
        (overlap / self.height).clamp(0.0, 1.0)
    }
}

/// Mount points stacked vertically, each preceded by a prose gap.
#[derive(Debug, Clone, Default)]
pub struct SimDocument {
    extents: Vec<Extent>,
    height: f64,
}

impl SimDocument {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `mount` below everything laid out so far.
    pub fn with_mount(mut self, mount: impl Into<MountId>, height: f64) -> Self {
        let top = self.height + SECTION_GAP;
        self.extents.push(Extent {
            mount: mount.into(),
            top,
            height,
        });
        self.height = top + height;
        self
    }

    /// The full lecture page.
    pub fn lecture() -> Self {
        LECTURE_LAYOUT
            .iter()
            .fold(Self::new(), |doc, (mount, height)| doc.with_mount(*mount, *height))
    }

    /// Drops a mount, as if the page author removed its container.
    pub fn without(mut self, mount: &str) -> Self {
        self.extents.retain(|e| e.mount.as_str() != mount);
        self
    }

    pub fn extent(&self, mount: &MountId) -> Option<&Extent> {
        self.extents.iter().find(|e| &e.mount == mount)
    }

    pub fn extents(&self) -> &[Extent] {
        &self.extents
    }

    pub fn height(&self) -> f64 {
        self.height
    }
}

impl Document for SimDocument {
    fn contains(&self, mount: &MountId) -> bool {
        self.extent(mount).is_some()
    }
}

/// Scroll position and the mounts currently under observation.
#[derive(Debug, Clone)]
pub struct SimViewport {
    height: f64,
    scroll_y: f64,
    /// Observed mount -> requested threshold
    observed: BTreeMap<MountId, f64>,
    observe_calls: usize,
}

impl SimViewport {
    pub fn new(height: f64) -> Self {
        Self {
            height,
            scroll_y: 0.0,
            observed: BTreeMap::new(),
            observe_calls: 0,
        }
    }

    pub fn height(&self) -> f64 {
        self.height
    }

    pub fn scroll_y(&self) -> f64 {
        self.scroll_y
    }

    pub fn is_observed(&self, mount: &MountId) -> bool {
        self.observed.contains_key(mount)
    }

    pub fn observed(&self) -> impl Iterator<Item = &MountId> {
        self.observed.keys()
    }

    /// Total number of `observe` calls received.
    pub fn observe_calls(&self) -> usize {
        self.observe_calls
    }
}

impl VisibilityObserver for SimViewport {
    fn observe(&mut self, mount: &MountId, threshold: f64) {
        self.observe_calls += 1;
        self.observed.insert(mount.clone(), threshold);
    }

    fn unobserve(&mut self, mount: &MountId) {
        self.observed.remove(mount);
    }
}

/// Document plus viewport.
///
/// The two halves are separate fields so a page can borrow the document
/// immutably and the observer mutably at the same time.
#[derive(Debug, Clone)]
pub struct SimHost {
    pub document: SimDocument,
    pub viewport: SimViewport,
}

impl SimHost {
    pub fn new(document: SimDocument, viewport_height: f64) -> Self {
        Self {
            document,
            viewport: SimViewport::new(viewport_height),
        }
    }

    /// The lecture page in a default-sized viewport.
    pub fn lecture() -> Self {
        Self::new(SimDocument::lecture(), DEFAULT_VIEWPORT_HEIGHT)
    }

    pub fn max_scroll(&self) -> f64 {
        (self.document.height() - self.viewport.height).max(0.0)
    }

    /// Scrolls to `y`, clamped to the page. Returns the new position.
    pub fn scroll_to(&mut self, y: f64) -> f64 {
        let y = if y.is_nan() { 0.0 } else { y };
        self.viewport.scroll_y = y.clamp(0.0, self.max_scroll());
        self.viewport.scroll_y
    }

    pub fn scroll_by(&mut self, dy: f64) -> f64 {
        self.scroll_to(self.viewport.scroll_y + dy)
    }

    /// Brings the top of `mount` to the top of the viewport (as far as the
    /// page allows). Returns false for unknown mounts.
    pub fn scroll_into_view(&mut self, mount: &MountId) -> bool {
        match self.document.extent(mount).map(|e| e.top) {
            Some(top) => {
                self.scroll_to(top);
                true
            }
            None => false,
        }
    }

    /// Visible fraction of `mount` at the current scroll position.
    pub fn ratio(&self, mount: &MountId) -> f64 {
        self.document
            .extent(mount)
            .map(|e| e.ratio(self.viewport.scroll_y, self.viewport.height))
            .unwrap_or(0.0)
    }

    /// One entry per observed mount, in page order.
    pub fn intersections(&self) -> Vec<IntersectionEntry> {
        self.document
            .extents()
            .iter()
            .filter(|e| self.viewport.is_observed(&e.mount))
            .map(|e| IntersectionEntry::new(e.mount.clone(), e.ratio(self.viewport.scroll_y, self.viewport.height)))
            .collect()
    }
}

/// In-memory reference source.
#[derive(Debug)]
pub struct MemorySource {
    body: Option<String>,
    fetches: AtomicUsize,
}

impl MemorySource {
    /// Serves `body` for every path.
    pub fn serving(body: impl Into<String>) -> Self {
        Self {
            body: Some(body.into()),
            fetches: AtomicUsize::new(0),
        }
    }

    /// Serves the bundled BKS excerpt.
    pub fn bks_fixture() -> Self {
        Self::serving(BKS_FIXTURE)
    }

    /// Rejects every fetch, as a page opened from disk would.
    pub fn offline() -> Self {
        Self {
            body: None,
            fetches: AtomicUsize::new(0),
        }
    }

    pub fn is_offline(&self) -> bool {
        self.body.is_none()
    }

    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ReferenceSource for MemorySource {
    async fn fetch(&self, path: &str) -> Result<String, EnvError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        match &self.body {
            Some(body) => Ok(body.clone()),
            None => Err(EnvError::rejected(format!("offline: {}", path))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lecture_layout_is_stacked() {
        let doc = SimDocument::lecture();
        assert_eq!(doc.extents().len(), LECTURE_LAYOUT.len());
        for pair in doc.extents().windows(2) {
            assert_eq!(pair[1].top, pair[0].bottom() + SECTION_GAP);
        }
        assert_eq!(doc.height(), doc.extents().last().unwrap().bottom());
    }

    #[test]
    fn test_ratio_partial_top_and_bottom() {
        let extent = Extent {
            mount: MountId::from("m"),
            top: 1000.0,
            height: 400.0,
        };
        // Viewport ends 100px into the mount
        assert_eq!(extent.ratio(300.0, 800.0), 0.25);
        // Mount scrolled mostly past the top
        assert_eq!(extent.ratio(1300.0, 800.0), 0.25);
        assert_eq!(extent.ratio(1000.0, 800.0), 1.0);
        assert_eq!(extent.ratio(0.0, 800.0), 0.0);
    }

    #[test]
    fn test_scroll_is_clamped() {
        let mut host = SimHost::lecture();
        assert_eq!(host.scroll_to(-50.0), 0.0);
        assert_eq!(host.scroll_to(f64::MAX), host.max_scroll());
        assert_eq!(host.scroll_to(f64::NAN), 0.0);
    }

    #[test]
    fn test_intersections_only_for_observed() {
        let mut host = SimHost::lecture();
        let first = MountId::from("diagram-variables");
        let last = MountId::from("sim-bks-model");
        host.viewport.observe(&first, 0.1);
        host.viewport.observe(&last, 0.1);
        host.viewport.unobserve(&last);

        let entries = host.intersections();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].mount, first);
        // 800px viewport, mount starts at 640 and is 300 tall
        assert!((entries[0].ratio - 160.0 / 300.0).abs() < 1e-12);
        assert_eq!(host.viewport.observe_calls(), 2);
    }

    #[test]
    fn test_scroll_into_view() {
        let mut host = SimHost::lecture();
        let mount = MountId::from("sim-fit-explorer");
        assert!(host.scroll_into_view(&mount));
        assert_eq!(host.ratio(&mount), 1.0);
        assert!(!host.scroll_into_view(&MountId::from("missing")));
    }

    #[test]
    fn test_document_without_mount() {
        let doc = SimDocument::lecture().without("sim-bks-model");
        assert!(!doc.contains(&MountId::from("sim-bks-model")));
        assert!(doc.contains(&MountId::from("sim-fit-explorer")));
    }

    #[tokio::test]
    async fn test_memory_source() {
        let online = MemorySource::bks_fixture();
        assert!(online.fetch("data/bks_excerpt.json").await.is_ok());

        let offline = MemorySource::offline();
        let err = offline.fetch("data/bks_excerpt.json").await.unwrap_err();
        assert!(matches!(err, EnvError::FetchRejected(_)));
        assert_eq!(offline.fetch_count(), 1);
    }
}
