//! Mirror a growing build output stream into a regular editor surface.
//!
//! A build process appends to a read-only output panel; this crate keeps an
//! ordinary, editable surface in sync with it by copying only what was
//! appended since the last pass. The host editor is abstracted behind
//! [`host::Host`]; [`host::MemoryHost`] implements it in memory.

pub mod config;
pub mod dispatcher;
pub mod host;
pub mod mirror;
pub mod placement;
pub mod services;
pub mod settings;

pub use config::{ConfigError, MirrorConfig};
pub use dispatcher::EventDispatcher;
pub use host::{Host, HostError, HostEvent, Location, SurfaceId};
pub use mirror::{MirrorSession, SyncOutcome};
