//! SEMLAB Deterministic Interaction Harness
//!
//! This crate provides a simulated reader for the lecture page: a laid-out
//! document, a scrolling viewport and a reference source, all driven from a
//! single 64-bit seed.
//!
//! # Core Principle: Replayable Readers
//!
//! All sources of non-determinism are replaced:
//! - **Visibility**: intersection ratios computed from fixed mount extents
//! - **Reference data**: served from memory, or rejected on purpose
//! - **Randomness**: scroll distances and clicks drawn from ChaCha8
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      ScenarioRunner                         │
//! │  ┌──────────────────────────────────────────────────────┐   │
//! │  │ ChaCha8Rng (seed) ──► scroll / click driver          │   │
//! │  └──────────────────────────────────────────────────────┘   │
//! │       │ scroll_to                   │ dispatch(Action)      │
//! │  ┌────▼──────────────┐         ┌────▼────────────────┐      │
//! │  │     SimHost       │ entries │        Page         │      │
//! │  │ document+viewport │────────►│  (semlab_core)      │      │
//! │  └───────────────────┘         └────┬───────────┬────┘      │
//! │                                     │ fetch     │ inspect   │
//! │                          ┌──────────▼───┐  ┌────▼────────┐  │
//! │                          │ MemorySource │  │   Oracle    │  │
//! │                          └──────────────┘  └─────────────┘  │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Usage
//!
//! ```ignore
//! use semlab_sim::{ScenarioRunner, ScenarioId};
//!
//! let result = ScenarioRunner::new(42).with_steps(200).run(ScenarioId::RandomReader).await;
//! assert!(result.passed);
//! ```

mod context;
mod error;
mod exporter;
mod oracle;
mod runner;
pub mod scenarios;

pub use context::{MemorySource, SimDocument, SimHost, SimViewport, BKS_FIXTURE, LECTURE_LAYOUT};
pub use error::SimError;
pub use exporter::{SimEvent, SimExport, SimFrame};
pub use oracle::{Oracle, Violation};
pub use runner::{ScenarioMetrics, ScenarioResult, ScenarioRunner, SimConfig};
pub use scenarios::ScenarioId;
