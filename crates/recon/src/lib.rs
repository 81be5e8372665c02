//! `tvmerge-recon` - Multi-source program-guide reconciliation engine.
//!
//! Pure engine crate: receives a lineup and parsed schedule documents through
//! [`engine::SourceFetcher`], returns accepted programs and identities.
//! No network or file IO.

pub mod config;
pub mod engine;
pub mod error;
pub mod evidence;
pub mod extract;
pub mod guide;
pub mod identity;
pub mod matcher;
pub mod model;
pub mod normalize;
pub mod timeline;

pub use config::ReconConfig;
pub use engine::{run, Reconciler, SourceFetcher};
pub use error::{ReconError, SourceError};
pub use guide::{build_listing, GuideKind, Listing};
pub use model::{LocalChannel, ReconResult, ScheduleDocument};
