//! Page - Owns every widget of one page session.
//!
//! The page is the integration layer between the widget engines and the
//! host abstraction.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                           Page                               │
//! │  ┌────────────────────────────────────────────────────────┐  │
//! │  │  ActivationController<Box<dyn Widget>>                 │  │
//! │  │  • register() → observe mount                          │  │
//! │  │  • on_intersections() → build widget, unobserve        │  │
//! │  └────────────────────────────────────────────────────────┘  │
//! │                              │                               │
//! │  ┌──────────┐ ┌──────────┐ ┌──────────┐ ┌────────────────┐   │
//! │  │ Variable │ │ Decision │ │   Quiz   │ │  Fit / Model   │   │
//! │  │ Diagram  │ │   Tree   │ │  (×4)    │ │   Explorers    │   │
//! │  └──────────┘ └──────────┘ └──────────┘ └────────────────┘   │
//! └──────────────────────────────────────────────────────────────┘
//!          ▲ Action                     │ reference_request()
//!          │                            ▼
//!        host                     ReferenceSource::fetch()
//! ```
//!
//! # Usage
//!
//! ```ignore
//! use semlab_core::page::{lecture_page, PageConfig};
//! use semlab_env::{FsReferenceSource, SessionId};
//!
//! let mut page = lecture_page(&doc, &mut observer, PageConfig::default(), SessionId::new())?;
//! let activated = page.on_intersections(&entries, &mut observer);
//! page.load_references(&FsReferenceSource::new("site")).await;
//! ```

use crate::activation::{ActivationController, DEFAULT_THRESHOLD};
use crate::content::{lecture, Activation};
use crate::error::ContentError;
use crate::reference::{ReferenceData, ReferenceError};
use crate::simulation::FitCoefficients;
use crate::widget::{Action, Frame, Widget};
use semlab_env::{Document, IntersectionEntry, MountId, ReferenceSource, SessionId, VisibilityObserver};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Location of the static reference file relative to the page.
pub const DEFAULT_REFERENCE_PATH: &str = "data/bks_excerpt.json";

/// Configuration for a page session.
#[derive(Debug, Clone)]
pub struct PageConfig {
    /// Visibility ratio that activates a widget (default: 0.1)
    pub activation_threshold: f64,

    /// Path passed to the reference source (default: data/bks_excerpt.json)
    pub reference_path: String,

    /// Constants of the fit heuristic
    pub fit_coefficients: FitCoefficients,
}

impl Default for PageConfig {
    fn default() -> Self {
        Self {
            activation_threshold: DEFAULT_THRESHOLD,
            reference_path: DEFAULT_REFERENCE_PATH.to_string(),
            fit_coefficients: FitCoefficients::default(),
        }
    }
}

impl PageConfig {
    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.activation_threshold = threshold;
        self
    }

    pub fn with_reference_path(mut self, path: impl Into<String>) -> Self {
        self.reference_path = path.into();
        self
    }

    pub fn with_fit_coefficients(mut self, coefficients: FitCoefficients) -> Self {
        self.fit_coefficients = coefficients;
        self
    }
}

/// All widgets of one page session.
pub struct Page {
    session: SessionId,
    config: PageConfig,
    controller: ActivationController<Box<dyn Widget>>,
    widgets: BTreeMap<MountId, Box<dyn Widget>>,
    /// Mounts in the order their widgets were built
    activation_log: Vec<MountId>,
}

impl Page {
    pub fn new(session: SessionId, config: PageConfig) -> Self {
        let controller = ActivationController::new(config.activation_threshold);
        Self {
            session,
            config,
            controller,
            widgets: BTreeMap::new(),
            activation_log: Vec::new(),
        }
    }

    pub fn session(&self) -> SessionId {
        self.session
    }

    pub fn config(&self) -> &PageConfig {
        &self.config
    }

    pub fn controller(&self) -> &ActivationController<Box<dyn Widget>> {
        &self.controller
    }

    /// Builds the widget for `mount` the first time it becomes visible.
    ///
    /// Returns false if the mount is missing from the document or already
    /// known to this page.
    pub fn register<D, O, F>(&mut self, document: &D, observer: &mut O, mount: MountId, factory: F) -> bool
    where
        D: Document + ?Sized,
        O: VisibilityObserver + ?Sized,
        F: FnOnce(&MountId) -> Box<dyn Widget> + 'static,
    {
        if self.widgets.contains_key(&mount) {
            return false;
        }
        self.controller.register(document, observer, mount, factory)
    }

    /// Builds the widget for `mount` right away.
    pub fn mount_now<D, F>(&mut self, document: &D, mount: MountId, factory: F) -> bool
    where
        D: Document + ?Sized,
        F: FnOnce(&MountId) -> Box<dyn Widget>,
    {
        if !document.contains(&mount) {
            debug!("Skipping {}: not in document", mount);
            return false;
        }
        if self.widgets.contains_key(&mount) || self.controller.is_registered(&mount) {
            return false;
        }
        let widget = factory(&mount);
        self.attach(mount, widget);
        true
    }

    /// Feeds host visibility reports. Returns the mounts activated by this
    /// batch.
    pub fn on_intersections<O>(&mut self, entries: &[IntersectionEntry], observer: &mut O) -> Vec<MountId>
    where
        O: VisibilityObserver + ?Sized,
    {
        let built = self.controller.handle_intersections(entries, observer);
        built
            .into_iter()
            .map(|(mount, widget)| {
                self.attach(mount.clone(), widget);
                mount
            })
            .collect()
    }

    fn attach(&mut self, mount: MountId, widget: Box<dyn Widget>) {
        info!("[{}] {} mounted at {}", self.session, widget.kind(), mount);
        self.activation_log.push(mount.clone());
        self.widgets.insert(mount, widget);
    }

    /// Serves every pending reference request: one fetch per widget, no
    /// retry. Failures degrade the widget and are not propagated.
    ///
    /// Returns the number of fetches performed.
    pub async fn load_references<S>(&mut self, source: &S) -> usize
    where
        S: ReferenceSource + ?Sized,
    {
        let requests: Vec<(MountId, String)> = self
            .widgets
            .iter()
            .filter_map(|(mount, w)| w.reference_request().map(|path| (mount.clone(), path.to_string())))
            .collect();

        for (mount, path) in &requests {
            let result = match source.fetch(path).await {
                Ok(body) => ReferenceData::from_json(&body).map(Arc::new),
                Err(e) => Err(ReferenceError::from(e)),
            };
            if let Err(e) = &result {
                warn!("{}: reference {} unavailable: {}", mount, path, e);
            }
            if let Some(widget) = self.widgets.get_mut(mount) {
                widget.deliver_reference(result);
            }
        }
        requests.len()
    }

    /// Routes a user action to the widget at `mount`. Returns true if its
    /// state changed. Actions for inactive mounts are dropped.
    pub fn dispatch(&mut self, mount: &MountId, action: &Action) -> bool {
        match self.widgets.get_mut(mount) {
            Some(widget) => widget.dispatch(action),
            None => {
                debug!("Dropping {:?} for inactive {}", action, mount);
                false
            }
        }
    }

    pub fn render(&self, mount: &MountId) -> Option<Frame> {
        self.widgets.get(mount).map(|w| w.render())
    }

    pub fn widget(&self, mount: &MountId) -> Option<&dyn Widget> {
        self.widgets.get(mount).map(|w| w.as_ref())
    }

    pub fn is_active(&self, mount: &MountId) -> bool {
        self.widgets.contains_key(mount)
    }

    pub fn active_mounts(&self) -> Vec<&MountId> {
        self.widgets.keys().collect()
    }

    pub fn activation_log(&self) -> &[MountId] {
        &self.activation_log
    }
}

/// Installs the lecture layout on a document.
///
/// Mounts missing from the document are skipped.
pub fn lecture_page<D, O>(
    document: &D,
    observer: &mut O,
    config: PageConfig,
    session: SessionId,
) -> Result<Page, ContentError>
where
    D: Document + ?Sized,
    O: VisibilityObserver + ?Sized,
{
    let layout = lecture(&config)?;
    let mut page = Page::new(session, config);

    for entry in layout {
        let installed = match entry.activation {
            Activation::Eager => page.mount_now(document, entry.mount, entry.factory),
            Activation::Lazy => page.register(document, observer, entry.mount, entry.factory),
        };
        if !installed {
            debug!("Layout entry {:?} not installed", entry.kind);
        }
    }
    Ok(page)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fit_explorer::{FitExplorerWidget, REFERENCE_UNAVAILABLE};
    use crate::reference::tests::SAMPLE;
    use crate::sem_model::{ModelExplorerWidget, MODEL_UNAVAILABLE};
    use crate::variables::VariableDiagramWidget;
    use crate::widget::WidgetKind;
    use async_trait::async_trait;
    use semlab_env::{EnvError, StaticDocument};
    use std::collections::BTreeSet;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct Observer {
        watched: BTreeSet<MountId>,
    }

    impl VisibilityObserver for Observer {
        fn observe(&mut self, mount: &MountId, _threshold: f64) {
            self.watched.insert(mount.clone());
        }

        fn unobserve(&mut self, mount: &MountId) {
            self.watched.remove(mount);
        }
    }

    /// Serves a fixed body, or rejects every fetch when `body` is None.
    struct FixedSource {
        body: Option<&'static str>,
        fetches: AtomicUsize,
    }

    impl FixedSource {
        fn new(body: Option<&'static str>) -> Self {
            Self {
                body,
                fetches: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl ReferenceSource for FixedSource {
        async fn fetch(&self, path: &str) -> Result<String, EnvError> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            self.body
                .map(str::to_string)
                .ok_or_else(|| EnvError::rejected(format!("offline: {}", path)))
        }
    }

    fn full_document() -> StaticDocument {
        StaticDocument::new([
            "diagram-variables",
            "quiz-data-types",
            "diagram-decision-tree",
            "quiz-latent-variables",
            "diagram-sem-model",
            "quiz-assumption-violations",
            "sim-fit-explorer",
            "quiz-model-fit",
            "sim-bks-model",
        ])
    }

    fn show(page: &mut Page, obs: &mut Observer, mounts: &[&str]) -> Vec<MountId> {
        let entries: Vec<IntersectionEntry> = mounts.iter().map(|m| IntersectionEntry::new(*m, 1.0)).collect();
        page.on_intersections(&entries, obs)
    }

    #[test]
    fn test_quizzes_eager_diagrams_lazy() {
        let mut obs = Observer::default();
        let page = lecture_page(&full_document(), &mut obs, PageConfig::default(), SessionId::from_seed(1)).unwrap();

        assert_eq!(page.active_mounts().len(), 4);
        assert!(page.is_active(&MountId::from("quiz-model-fit")));
        assert!(!page.is_active(&MountId::from("sim-fit-explorer")));
        assert_eq!(obs.watched.len(), 5);
        assert!(!obs.watched.contains(&MountId::from("quiz-data-types")));
    }

    #[test]
    fn test_missing_mounts_skipped() {
        let mut obs = Observer::default();
        let doc = StaticDocument::new(["diagram-decision-tree", "quiz-model-fit"]);
        let mut page = lecture_page(&doc, &mut obs, PageConfig::default(), SessionId::from_seed(2)).unwrap();

        assert_eq!(obs.watched.len(), 1);
        let activated = show(&mut page, &mut obs, &["diagram-decision-tree", "sim-bks-model"]);
        assert_eq!(activated, vec![MountId::from("diagram-decision-tree")]);
        assert!(page.render(&MountId::from("sim-bks-model")).is_none());
    }

    #[test]
    fn test_activation_is_once() {
        let mut obs = Observer::default();
        let mut page = lecture_page(&full_document(), &mut obs, PageConfig::default(), SessionId::from_seed(3)).unwrap();

        show(&mut page, &mut obs, &["diagram-variables"]);
        let mount = MountId::from("diagram-variables");
        assert!(page.dispatch(&mount, &Action::AddMediator));

        // A second visibility report must not rebuild (and reset) the widget
        assert!(show(&mut page, &mut obs, &["diagram-variables"]).is_empty());
        let widget = page.widget(&mount).unwrap();
        let diagram = widget.as_any().downcast_ref::<VariableDiagramWidget>().unwrap();
        assert!(diagram.has_mediator());
        assert_eq!(page.activation_log().iter().filter(|m| **m == mount).count(), 1);
    }

    #[test]
    fn test_dispatch_to_inactive_mount_dropped() {
        let mut obs = Observer::default();
        let mut page = lecture_page(&full_document(), &mut obs, PageConfig::default(), SessionId::from_seed(4)).unwrap();
        assert!(!page.dispatch(&MountId::from("diagram-sem-model"), &Action::NextStep));
    }

    #[test]
    fn test_manual_register_rejects_duplicates() {
        let mut obs = Observer::default();
        let doc = StaticDocument::new(["diagram-variables"]);
        let mut page = Page::new(SessionId::from_seed(5), PageConfig::default());

        let factory = |m: &MountId| -> Box<dyn Widget> { Box::new(VariableDiagramWidget::new(m.clone())) };
        assert!(page.mount_now(&doc, MountId::from("diagram-variables"), factory));
        assert!(!page.register(&doc, &mut obs, MountId::from("diagram-variables"), factory));
        assert!(!page.mount_now(&doc, MountId::from("diagram-variables"), factory));
        assert_eq!(page.widget(&MountId::from("diagram-variables")).unwrap().kind(), WidgetKind::VariableDiagram);
    }

    #[tokio::test]
    async fn test_reference_loaded_once_per_widget() {
        let mut obs = Observer::default();
        let mut page = lecture_page(&full_document(), &mut obs, PageConfig::default(), SessionId::from_seed(6)).unwrap();
        show(&mut page, &mut obs, &["sim-fit-explorer", "sim-bks-model"]);

        let source = FixedSource::new(Some(SAMPLE));
        assert_eq!(page.load_references(&source).await, 2);
        assert_eq!(page.load_references(&source).await, 0);
        assert_eq!(source.fetches.load(Ordering::SeqCst), 2);

        let model = page.widget(&MountId::from("sim-bks-model")).unwrap();
        assert!(model.as_any().downcast_ref::<ModelExplorerWidget>().unwrap().is_ready());
    }

    #[tokio::test]
    async fn test_rejected_fetch_degrades() {
        let mut obs = Observer::default();
        let mut page = lecture_page(&full_document(), &mut obs, PageConfig::default(), SessionId::from_seed(7)).unwrap();
        show(&mut page, &mut obs, &["sim-fit-explorer", "sim-bks-model"]);

        let source = FixedSource::new(None);
        page.load_references(&source).await;

        let fit = page.render(&MountId::from("sim-fit-explorer")).unwrap();
        assert_eq!(fit.texts("bks-reference"), vec![REFERENCE_UNAVAILABLE]);
        let model = page.render(&MountId::from("sim-bks-model")).unwrap();
        assert_eq!(model.texts("model-unavailable"), vec![MODEL_UNAVAILABLE]);

        // No retry
        page.load_references(&source).await;
        assert_eq!(source.fetches.load(Ordering::SeqCst), 2);

        let fit_widget = page.widget(&MountId::from("sim-fit-explorer")).unwrap();
        assert!(fit_widget.as_any().downcast_ref::<FitExplorerWidget>().is_some());
    }

    #[tokio::test]
    async fn test_malformed_reference_degrades() {
        let mut obs = Observer::default();
        let mut page = lecture_page(&full_document(), &mut obs, PageConfig::default(), SessionId::from_seed(8)).unwrap();
        show(&mut page, &mut obs, &["sim-bks-model"]);

        page.load_references(&FixedSource::new(Some("{\"sem_results\": 3}"))).await;
        let model = page.render(&MountId::from("sim-bks-model")).unwrap();
        assert_eq!(model.texts("model-unavailable"), vec![MODEL_UNAVAILABLE]);
    }
}
