//! # Metadata Repositories
//!
//! Stores for scanned metadata records, queryable by offset and limit.
//!
//! Every implementation returns records ordered by disc number, then track
//! number, then first insertion. Records without a disc or track number come
//! after numbered ones. An upsert keeps a record's original insertion
//! position.
//!
//! - [`InMemoryRepository`]: copy-on-write snapshot behind a single writer
//! - [`SqliteRepository`]: persisted in one `metadata_records` table

use async_trait::async_trait;

use crate::error::Result;
use crate::models::MetadataRecord;

pub mod memory;
pub mod pagination;
pub mod sqlite;

pub use memory::InMemoryRepository;
pub use pagination::{Page, PageRequest};
pub use sqlite::SqliteRepository;

/// Store of one record family.
///
/// Writers are serialized. A reader running during a write observes either
/// the state before it or after it, never a partial batch.
#[async_trait]
pub trait MetadataRepository<R: MetadataRecord>: Send + Sync {
    /// Insert new records and replace existing ones with the same id.
    ///
    /// The batch is rejected as a whole if any id is empty. When a batch
    /// holds the same id twice, the later record wins.
    async fn add_or_update(&self, records: Vec<R>) -> Result<()>;

    /// Exactly `min(limit, count - offset)` records in repository order.
    /// An offset past the end yields an empty vector.
    async fn get_items(&self, offset: usize, limit: usize) -> Result<Vec<R>>;

    async fn get_item(&self, id: &str) -> Result<Option<R>>;

    /// Returns `false` when no record had this id.
    async fn remove(&self, id: &str) -> Result<bool>;

    async fn count(&self) -> Result<usize>;

    async fn query(&self, request: PageRequest) -> Result<Page<R>> {
        let items = self.get_items(request.offset, request.limit).await?;
        let total = self.count().await?;
        Ok(Page::new(items, total, request))
    }

    async fn all(&self) -> Result<Vec<R>> {
        let total = self.count().await?;
        self.get_items(0, total).await
    }
}

pub(crate) fn validate_batch<R: MetadataRecord>(records: &[R]) -> Result<()> {
    for record in records {
        record
            .validate()
            .map_err(|message| crate::LibraryError::InvalidInput {
                field: "id".to_string(),
                message,
            })?;
    }
    Ok(())
}
