//! Workspace umbrella crate.
//!
//! Host applications depend on `music-core-workspace` and pick the pieces they
//! need through features instead of wiring every workspace crate by hand:
//!
//! - `aggregation` exposes the aggregation root and the merge engine.
//! - `local-files` exposes the local-files core and the metadata scanner.

#[cfg(feature = "aggregation")]
pub use core_merge as merge;
#[cfg(feature = "aggregation")]
pub use core_service as service;

#[cfg(feature = "local-files")]
pub use core_metadata as metadata;
#[cfg(feature = "local-files")]
pub use provider_local as local;
