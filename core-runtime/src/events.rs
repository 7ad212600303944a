//! # Event Bus System
//!
//! Typed events published by the aggregation core over `tokio::sync::broadcast`.
//!
//! ```text
//! ┌──────────────┐   emit    ┌───────────┐   subscribe   ┌────────────┐
//! │ Aggregator   ├──────────>│           ├──────────────>│ UI / host  │
//! └──────────────┘           │ EventBus  │               └────────────┘
//! ┌──────────────┐   emit    │           │   subscribe   ┌────────────┐
//! │ File scanner ├──────────>│           ├──────────────>│ Logger     │
//! └──────────────┘           └───────────┘               └────────────┘
//! ```
//!
//! Three event families exist:
//! - [`LifecycleEvent`]: cores joining, loading, faulting and leaving
//! - [`LibraryEvent`]: net changes of a merged collection
//! - [`ScanEvent`]: progress of a metadata scan
//!
//! ```rust
//! use core_runtime::events::{CoreEvent, EventBus, LifecycleEvent};
//!
//! # #[tokio::main]
//! # async fn main() {
//! let bus = EventBus::new(16);
//! let mut rx = bus.subscribe();
//!
//! bus.emit(CoreEvent::Lifecycle(LifecycleEvent::CoreLoaded {
//!     instance_id: "local-1".to_string(),
//! }))
//! .ok();
//!
//! assert!(matches!(rx.recv().await.unwrap(), CoreEvent::Lifecycle(_)));
//! # }
//! ```
//!
//! Subscribers that fall more than the buffer size behind receive
//! `RecvError::Lagged` and should resynchronise by re-reading the collection.

use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::sync::broadcast;

pub use tokio::sync::broadcast::error::{RecvError, SendError};
pub use tokio::sync::broadcast::Receiver;

pub use crate::config::DEFAULT_EVENT_BUFFER_SIZE;

// ============================================================================
// Collection addressing
// ============================================================================

/// The collection groups a core may expose.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GroupKind {
    Library,
    RecentlyPlayed,
    Discoverables,
    Pins,
}

impl GroupKind {
    pub const ALL: [GroupKind; 4] = [
        GroupKind::Library,
        GroupKind::RecentlyPlayed,
        GroupKind::Discoverables,
        GroupKind::Pins,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            GroupKind::Library => "library",
            GroupKind::RecentlyPlayed => "recently_played",
            GroupKind::Discoverables => "discoverables",
            GroupKind::Pins => "pins",
        }
    }
}

impl fmt::Display for GroupKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Item collections inside a group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemKind {
    Track,
    Album,
    Artist,
    Playlist,
    Image,
}

impl ItemKind {
    pub const ALL: [ItemKind; 5] = [
        ItemKind::Track,
        ItemKind::Album,
        ItemKind::Artist,
        ItemKind::Playlist,
        ItemKind::Image,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ItemKind::Track => "track",
            ItemKind::Album => "album",
            ItemKind::Artist => "artist",
            ItemKind::Playlist => "playlist",
            ItemKind::Image => "image",
        }
    }
}

impl fmt::Display for ItemKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Core Event Types
// ============================================================================

/// Top-level event published on the [`EventBus`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", content = "payload")]
pub enum CoreEvent {
    Lifecycle(LifecycleEvent),
    Library(LibraryEvent),
    Scan(ScanEvent),
}

impl CoreEvent {
    pub fn description(&self) -> &str {
        match self {
            CoreEvent::Lifecycle(e) => e.description(),
            CoreEvent::Library(e) => e.description(),
            CoreEvent::Scan(e) => e.description(),
        }
    }

    pub fn severity(&self) -> EventSeverity {
        match self {
            CoreEvent::Lifecycle(LifecycleEvent::CoreFaulted { .. }) => EventSeverity::Error,
            CoreEvent::Library(LibraryEvent::SourceFailed { .. }) => EventSeverity::Warning,
            CoreEvent::Scan(ScanEvent::FileFailed { .. }) => EventSeverity::Warning,
            CoreEvent::Lifecycle(LifecycleEvent::CoreAdded { .. })
            | CoreEvent::Lifecycle(LifecycleEvent::CoreRemoved { .. })
            | CoreEvent::Lifecycle(LifecycleEvent::CoreLoaded { .. })
            | CoreEvent::Scan(ScanEvent::Completed { .. }) => EventSeverity::Info,
            _ => EventSeverity::Debug,
        }
    }
}

/// Event severity levels for filtering and logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EventSeverity {
    Debug,
    Info,
    Warning,
    Error,
}

// ============================================================================
// Lifecycle Events
// ============================================================================

/// Changes to the set of cores and their availability.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum LifecycleEvent {
    /// A core was registered with the aggregator.
    CoreAdded {
        instance_id: String,
        core_id: String,
        display_name: String,
    },
    /// A core finished initializing and contributes to merged views.
    CoreLoaded { instance_id: String },
    /// A core failed and is shown as unavailable.
    CoreFaulted { instance_id: String, message: String },
    /// A core was removed and disposed.
    CoreRemoved { instance_id: String },
    DisplayNameChanged {
        instance_id: String,
        display_name: String,
    },
    DevicesChanged { instance_id: String },
}

impl LifecycleEvent {
    fn description(&self) -> &str {
        match self {
            LifecycleEvent::CoreAdded { .. } => "Core added",
            LifecycleEvent::CoreLoaded { .. } => "Core loaded",
            LifecycleEvent::CoreFaulted { .. } => "Core faulted",
            LifecycleEvent::CoreRemoved { .. } => "Core removed",
            LifecycleEvent::DisplayNameChanged { .. } => "Core display name changed",
            LifecycleEvent::DevicesChanged { .. } => "Core devices changed",
        }
    }
}

// ============================================================================
// Library Events
// ============================================================================

/// Identifies a merged item inside a change notification.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ItemSummary {
    /// Key of the primary source item, `"<instance_id>:<item_id>"`.
    pub key: String,
    pub name: String,
    /// Number of cores contributing to the merged item.
    pub source_count: usize,
}

/// Net changes of merged collections.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum LibraryEvent {
    /// One merged collection changed.
    ///
    /// `removed` only lists items that lost their last source; an item that
    /// lost one of several sources shows up in `updated`.
    Changed {
        group: GroupKind,
        kind: ItemKind,
        added: Vec<ItemSummary>,
        removed: Vec<ItemSummary>,
        updated: Vec<ItemSummary>,
    },
    /// A core could not deliver a collection; the merged view keeps the
    /// items it last delivered.
    SourceFailed {
        group: GroupKind,
        kind: ItemKind,
        instance_id: String,
        message: String,
    },
}

impl LibraryEvent {
    fn description(&self) -> &str {
        match self {
            LibraryEvent::Changed { .. } => "Merged collection changed",
            LibraryEvent::SourceFailed { .. } => "Collection source failed",
        }
    }
}

// ============================================================================
// Scan Events
// ============================================================================

/// Progress of a metadata scan.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum ScanEvent {
    Started { source: String, total_files: usize },
    Progress { processed: usize, total_files: usize },
    /// A single file failed; the scan continues.
    FileFailed { file: String, message: String },
    Completed {
        scanned: usize,
        without_metadata: usize,
        failed: usize,
    },
    Cancelled { processed: usize },
}

impl ScanEvent {
    fn description(&self) -> &str {
        match self {
            ScanEvent::Started { .. } => "Scan started",
            ScanEvent::Progress { .. } => "Scan progress",
            ScanEvent::FileFailed { .. } => "File could not be scanned",
            ScanEvent::Completed { .. } => "Scan completed",
            ScanEvent::Cancelled { .. } => "Scan cancelled",
        }
    }
}

// ============================================================================
// Event Bus
// ============================================================================

/// Central broadcast channel for [`CoreEvent`]s.
///
/// Cloning is cheap; all clones publish into the same channel.
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<CoreEvent>,
}

impl EventBus {
    /// `capacity` is the number of events buffered per subscriber before it lags.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publishes an event to all subscribers.
    ///
    /// Returns the number of receivers, or an error when nobody is
    /// listening. Publishers usually ignore that error with `.ok()`.
    pub fn emit(&self, event: CoreEvent) -> Result<usize, SendError<CoreEvent>> {
        self.sender.send(event)
    }

    /// New independent receiver. Past events are not replayed.
    pub fn subscribe(&self) -> Receiver<CoreEvent> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_BUFFER_SIZE)
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("subscriber_count", &self.subscriber_count())
            .finish()
    }
}
