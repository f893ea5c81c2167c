//! # OTA Update Lifecycle
//!
//! Tracks which phase an over-the-air update is in, persists it across
//! restarts and projects it onto declarative pages for a view.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐  UiEvent   ┌──────────────────────┐
//! │ buttons      │──────────► │  UiLoop (one task)   │
//! │ service      │  UiHandle  │  LifecycleController │
//! │ engine       │──────────► │   ├─ PageRegistry    │
//! │ workers      │            │   ├─ PersistedState  │
//! └──────────────┘            │   └─ RenderGateway ──┼──► View
//!        ▲                    └──────────┬───────────┘
//!        │        Work (check, timers)   │
//!        └───────────────────────────────┘
//! ```
//!
//! The download service, installers and update server are external and are
//! reached through the traits in [`orchestrator`].

pub mod config;
pub mod controller;
pub mod error;
pub mod events;
pub mod gateway;
pub mod orchestrator;
pub mod page;
pub mod phase;
pub mod record;
pub mod registry;
pub mod runtime;
pub mod store;
pub mod view;

pub use config::{CheckInterval, UpdaterConfig, DEFAULT_CONFIG_PATH};
pub use controller::{LifecycleController, Work};
pub use error::{Result, UpdaterError};
pub use events::{CheckOutcome, EngineEvent, ServiceEvent, UiEvent, UserAction};
pub use gateway::RenderGateway;
pub use orchestrator::{CheckRequest, GroundTruth, Orchestrator, Platform, UpdateChecker};
pub use page::{BackgroundAction, Button, Icon, Page, Progress, RichContent};
pub use phase::PhaseId;
pub use record::{BuildInfo, OtaType, UpdateRecord, UpdateStatus};
pub use registry::{PageInputs, PageRegistry};
pub use runtime::{UiHandle, UiLoop};
pub use store::{EarlyUpdates, FileStore, MemoryStore, PersistedState, StateStore};
pub use view::{LogView, View};
