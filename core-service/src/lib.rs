//! # Core Service
//!
//! The aggregation root of the music core.
//!
//! [`CoreAggregator`] owns every connected [`Core`](core_contracts::Core) and
//! keeps one merged view per collection group:
//!
//! ```text
//! ┌────────────┐  fetch   ┌──────────────────┐  merge   ┌─────────────────┐
//! │ Core A     ├─────────>│                  ├─────────>│ Library view    │
//! ├────────────┤  fetch   │  CoreAggregator  │          ├─────────────────┤
//! │ Core B     ├─────────>│                  ├─────────>│ Recently played │
//! └─────┬──────┘          └────────┬─────────┘          └─────────────────┘
//!       │ CoreChange               │ CoreEvent
//!       └──────────> listener ─────┴──────────> EventBus
//! ```
//!
//! - Cores are merged in registration order. Duplicates are folded with the
//!   rules of [`core_merge`].
//! - A core that fails to initialize or later faults stays registered but
//!   drops out of the merged views until it reports `Loaded` again.
//! - Net changes are published as
//!   [`LibraryEvent::Changed`](core_runtime::events::LibraryEvent::Changed).
//! - [`search`](CoreAggregator::search) fans out to every loaded core and
//!   merges what comes back; failing cores are skipped.
//! - [`plugins`] decorates what cores return without changing the core
//!   contract.

pub mod aggregator;
pub mod error;
mod groups;
pub mod plugins;
pub mod view;

pub use aggregator::{CoreAggregator, CoreInfo, MergedSearchResults};
pub use error::{Result, ServiceError};
pub use plugins::{
    CorePlugin, FallbackImagePlugin, PluggedCore, PluginChain, PluginError, PluginResult,
    TitleCleanupPlugin,
};
pub use view::MergedGroupView;
