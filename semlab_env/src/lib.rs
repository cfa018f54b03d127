//! SEMLAB Host Abstraction Layer
//!
//! This crate provides the "Sans-IO" seam between the widget engines in
//! `semlab_core` and whatever hosts them: a browser page, a headless
//! renderer, or the deterministic harness in `semlab_sim`.
//!
//! # Core Concept
//!
//! Widgets never touch a document directly. Everything they need from the
//! outside world is behind three traits:
//! - [`Document`]: which mount points exist
//! - [`VisibilityObserver`]: which mount points are being watched for
//!   viewport intersection
//! - [`ReferenceSource`]: the single asynchronous fetch of static reference
//!   data
//!
//! # Example
//!
//! ```ignore
//! use semlab_env::{Document, MountId, VisibilityObserver};
//!
//! fn wire<D: Document, O: VisibilityObserver>(doc: &D, obs: &mut O) {
//!     let mount = MountId::from("diagram-decision-tree");
//!     if doc.contains(&mount) {
//!         obs.observe(&mount, 0.1);
//!     }
//! }
//! ```

mod document;
mod error;
mod source;
mod tokio_impl;
mod types;

pub use document::{Document, StaticDocument, VisibilityObserver};
pub use error::EnvError;
pub use source::ReferenceSource;
pub use tokio_impl::FsReferenceSource;
pub use types::{IntersectionEntry, MountId, SessionId};
