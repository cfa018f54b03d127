//! Lazy Activation Controller
//! ==========================
//!
//! Runs each registered initializer exactly once, the first time its mount
//! point becomes visible enough. After that the mount is unobserved for the
//! rest of the session.
//!
//! ```text
//!  register(mount, init) ──► [Pending] ── entry.ratio ≥ threshold ──► [Activated]
//!        │                                                             (init ran,
//!        └─ mount missing in document: no-op                            unobserved)
//! ```
//!
//! The controller is generic over what an initializer produces, so the
//! same registry drives widgets in a `Page` and plain closures in tests.

use semlab_env::{Document, IntersectionEntry, MountId, VisibilityObserver};
use std::collections::BTreeMap;
use tracing::{debug, info};

/// Default visibility ratio that triggers activation.
pub const DEFAULT_THRESHOLD: f64 = 0.1;

/// One-time initializer for a mount point.
pub type Initializer<T> = Box<dyn FnOnce(&MountId) -> T>;

/// Registry entry for one mount point.
struct MountPoint<T> {
    /// Last reported visibility
    visible: bool,
    /// Monotonic: false → true, never reverts
    activated: bool,
    /// Taken on activation
    initializer: Option<Initializer<T>>,
}

/// Snapshot of a mount point's flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MountStatus {
    pub visible: bool,
    pub activated: bool,
}

/// Registry of lazily-initialized mount points for one page session.
pub struct ActivationController<T> {
    threshold: f64,
    registry: BTreeMap<MountId, MountPoint<T>>,
}

impl<T> ActivationController<T> {
    /// Creates a controller with the given visibility threshold.
    pub fn new(threshold: f64) -> Self {
        Self {
            threshold: threshold.clamp(0.0, 1.0),
            registry: BTreeMap::new(),
        }
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    /// Schedules `initializer` for the first time `mount` becomes visible.
    ///
    /// Returns false (and does nothing) if the mount is not in the document
    /// or is already registered.
    pub fn register<D, O, F>(
        &mut self,
        document: &D,
        observer: &mut O,
        mount: MountId,
        initializer: F,
    ) -> bool
    where
        D: Document + ?Sized,
        O: VisibilityObserver + ?Sized,
        F: FnOnce(&MountId) -> T + 'static,
    {
        if !document.contains(&mount) {
            debug!("Skipping {}: not in document", mount);
            return false;
        }
        if self.registry.contains_key(&mount) {
            debug!("Skipping {}: already registered", mount);
            return false;
        }

        observer.observe(&mount, self.threshold);
        self.registry.insert(
            mount,
            MountPoint {
                visible: false,
                activated: false,
                initializer: Some(Box::new(initializer)),
            },
        );
        true
    }

    /// Processes a batch of visibility reports from the host.
    ///
    /// Returns the products of every initializer that ran, in entry order.
    /// Entries for unknown or already-activated mounts are ignored.
    pub fn handle_intersections<O>(
        &mut self,
        entries: &[IntersectionEntry],
        observer: &mut O,
    ) -> Vec<(MountId, T)>
    where
        O: VisibilityObserver + ?Sized,
    {
        let mut activated = Vec::new();

        for entry in entries {
            let Some(point) = self.registry.get_mut(&entry.mount) else {
                continue;
            };
            if point.activated {
                continue;
            }

            point.visible = entry.is_intersecting(self.threshold);
            if !point.visible {
                continue;
            }

            point.activated = true;
            observer.unobserve(&entry.mount);

            if let Some(init) = point.initializer.take() {
                info!("Activating {} (ratio={:.2})", entry.mount, entry.ratio);
                activated.push((entry.mount.clone(), init(&entry.mount)));
            }
        }

        activated
    }

    pub fn is_registered(&self, mount: &MountId) -> bool {
        self.registry.contains_key(mount)
    }

    pub fn is_activated(&self, mount: &MountId) -> bool {
        self.registry.get(mount).map(|p| p.activated).unwrap_or(false)
    }

    /// Flags of a registered mount point.
    pub fn status(&self, mount: &MountId) -> Option<MountStatus> {
        self.registry.get(mount).map(|p| MountStatus {
            visible: p.visible,
            activated: p.activated,
        })
    }

    /// Registered mounts still waiting for visibility.
    pub fn pending(&self) -> Vec<&MountId> {
        self.registry
            .iter()
            .filter(|(_, p)| !p.activated)
            .map(|(m, _)| m)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.registry.len()
    }

    pub fn is_empty(&self) -> bool {
        self.registry.is_empty()
    }
}

impl<T> Default for ActivationController<T> {
    fn default() -> Self {
        Self::new(DEFAULT_THRESHOLD)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use semlab_env::StaticDocument;
    use std::cell::Cell;
    use std::collections::BTreeSet;
    use std::rc::Rc;

    #[derive(Default)]
    struct RecordingObserver {
        observed: BTreeSet<MountId>,
        unobserved: Vec<MountId>,
    }

    impl VisibilityObserver for RecordingObserver {
        fn observe(&mut self, mount: &MountId, _threshold: f64) {
            self.observed.insert(mount.clone());
        }

        fn unobserve(&mut self, mount: &MountId) {
            self.observed.remove(mount);
            self.unobserved.push(mount.clone());
        }
    }

    fn doc() -> StaticDocument {
        StaticDocument::new(["sim-fit-explorer", "sim-bks-model"])
    }

    #[test]
    fn test_register_missing_mount_is_noop() {
        let mut ctl: ActivationController<()> = ActivationController::default();
        let mut obs = RecordingObserver::default();

        assert!(!ctl.register(&doc(), &mut obs, MountId::from("diagram-variables"), |_| ()));
        assert!(ctl.is_empty());
        assert!(obs.observed.is_empty());
    }

    #[test]
    fn test_activates_exactly_once() {
        let calls = Rc::new(Cell::new(0));
        let mut ctl = ActivationController::default();
        let mut obs = RecordingObserver::default();

        let c = calls.clone();
        assert!(ctl.register(&doc(), &mut obs, MountId::from("sim-fit-explorer"), move |_| {
            c.set(c.get() + 1);
        }));

        let entries = vec![
            IntersectionEntry::new("sim-fit-explorer", 0.5),
            IntersectionEntry::new("sim-fit-explorer", 0.9),
        ];
        let first = ctl.handle_intersections(&entries, &mut obs);
        let second = ctl.handle_intersections(&entries, &mut obs);

        assert_eq!(first.len(), 1);
        assert!(second.is_empty());
        assert_eq!(calls.get(), 1);
        assert!(ctl.is_activated(&MountId::from("sim-fit-explorer")));
        assert_eq!(obs.unobserved, vec![MountId::from("sim-fit-explorer")]);
    }

    #[test]
    fn test_below_threshold_does_not_activate() {
        let mut ctl = ActivationController::new(0.1);
        let mut obs = RecordingObserver::default();
        ctl.register(&doc(), &mut obs, MountId::from("sim-bks-model"), |m| m.to_string());

        let out = ctl.handle_intersections(&[IntersectionEntry::new("sim-bks-model", 0.05)], &mut obs);
        assert!(out.is_empty());
        assert_eq!(
            ctl.status(&MountId::from("sim-bks-model")),
            Some(MountStatus { visible: false, activated: false })
        );

        let out = ctl.handle_intersections(&[IntersectionEntry::new("sim-bks-model", 0.1)], &mut obs);
        assert_eq!(out, vec![(MountId::from("sim-bks-model"), "#sim-bks-model".to_string())]);
    }

    #[test]
    fn test_duplicate_register_ignored() {
        let mut ctl = ActivationController::default();
        let mut obs = RecordingObserver::default();

        assert!(ctl.register(&doc(), &mut obs, MountId::from("sim-bks-model"), |_| 1));
        assert!(!ctl.register(&doc(), &mut obs, MountId::from("sim-bks-model"), |_| 2));

        let out = ctl.handle_intersections(&[IntersectionEntry::new("sim-bks-model", 1.0)], &mut obs);
        assert_eq!(out[0].1, 1);
    }

    #[test]
    fn test_independent_mounts() {
        let mut ctl = ActivationController::default();
        let mut obs = RecordingObserver::default();
        ctl.register(&doc(), &mut obs, MountId::from("sim-bks-model"), |_| "bks");
        ctl.register(&doc(), &mut obs, MountId::from("sim-fit-explorer"), |_| "fit");

        let out = ctl.handle_intersections(&[IntersectionEntry::new("sim-fit-explorer", 0.3)], &mut obs);
        assert_eq!(out.len(), 1);
        assert_eq!(ctl.pending(), vec![&MountId::from("sim-bks-model")]);
        assert!(obs.observed.contains(&MountId::from("sim-bks-model")));
    }
}
