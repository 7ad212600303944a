//! SQLite-backed repository

use async_trait::async_trait;
use chrono::Utc;
use sqlx::{FromRow, SqlitePool};
use std::marker::PhantomData;
use tokio::sync::Mutex;
use tracing::debug;

use crate::error::{LibraryError, Result};
use crate::models::MetadataRecord;
use crate::repositories::{validate_batch, MetadataRepository};

#[derive(Debug, FromRow)]
struct RecordRow {
    id: String,
    payload: String,
}

/// Repository persisting one record kind in the `metadata_records` table.
///
/// Several repositories of different kinds can share a pool. Each upsert
/// batch runs in one transaction, so readers on other connections see the
/// batch entirely or not at all.
pub struct SqliteRepository<R> {
    pool: SqlitePool,
    writer: Mutex<()>,
    _record: PhantomData<fn() -> R>,
}

impl<R: MetadataRecord> SqliteRepository<R> {
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            pool,
            writer: Mutex::new(()),
            _record: PhantomData,
        }
    }

    fn decode(row: RecordRow) -> Result<R> {
        let record: R = serde_json::from_str(&row.payload).map_err(|e| {
            LibraryError::Corruption(format!("undecodable {} payload for {}: {}", R::KIND, row.id, e))
        })?;
        if record.id() != row.id {
            return Err(LibraryError::Corruption(format!(
                "{} row {} holds record {}",
                R::KIND,
                row.id,
                record.id()
            )));
        }
        Ok(record)
    }
}

fn to_sql_limit(value: usize) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

#[async_trait]
impl<R: MetadataRecord> MetadataRepository<R> for SqliteRepository<R> {
    async fn add_or_update(&self, records: Vec<R>) -> Result<()> {
        validate_batch(&records)?;
        if records.is_empty() {
            return Ok(());
        }

        let _gate = self.writer.lock().await;
        let mut tx = self.pool.begin().await?;
        let now = Utc::now().timestamp();

        for record in &records {
            let payload = serde_json::to_string(record)?;
            sqlx::query(
                r#"
                INSERT INTO metadata_records
                    (kind, id, disc_number, track_number, seq, payload, updated_at)
                VALUES (
                    ?, ?, ?, ?,
                    (SELECT COALESCE(MAX(seq), 0) + 1 FROM metadata_records WHERE kind = ?),
                    ?, ?
                )
                ON CONFLICT(kind, id) DO UPDATE SET
                    disc_number = excluded.disc_number,
                    track_number = excluded.track_number,
                    payload = excluded.payload,
                    updated_at = excluded.updated_at
                "#,
            )
            .bind(R::KIND.as_str())
            .bind(record.id())
            .bind(record.disc_number().map(i64::from))
            .bind(record.track_number().map(i64::from))
            .bind(R::KIND.as_str())
            .bind(payload)
            .bind(now)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        debug!(kind = %R::KIND, records = records.len(), "Persisted metadata upsert");
        Ok(())
    }

    async fn get_items(&self, offset: usize, limit: usize) -> Result<Vec<R>> {
        if limit == 0 {
            return Ok(Vec::new());
        }

        let rows = sqlx::query_as::<_, RecordRow>(
            r#"
            SELECT id, payload FROM metadata_records
            WHERE kind = ?
            ORDER BY disc_number IS NULL, disc_number,
                     track_number IS NULL, track_number,
                     seq
            LIMIT ? OFFSET ?
            "#,
        )
        .bind(R::KIND.as_str())
        .bind(to_sql_limit(limit))
        .bind(to_sql_limit(offset))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Self::decode).collect()
    }

    async fn get_item(&self, id: &str) -> Result<Option<R>> {
        let row = sqlx::query_as::<_, RecordRow>(
            "SELECT id, payload FROM metadata_records WHERE kind = ? AND id = ?",
        )
        .bind(R::KIND.as_str())
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Self::decode).transpose()
    }

    async fn remove(&self, id: &str) -> Result<bool> {
        let _gate = self.writer.lock().await;
        let result = sqlx::query("DELETE FROM metadata_records WHERE kind = ? AND id = ?")
            .bind(R::KIND.as_str())
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn count(&self) -> Result<usize> {
        let (count,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM metadata_records WHERE kind = ?")
                .bind(R::KIND.as_str())
                .fetch_one(&self.pool)
                .await?;
        usize::try_from(count)
            .map_err(|_| LibraryError::Corruption(format!("negative {} count {}", R::KIND, count)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::create_test_pool;
    use crate::models::{AlbumMetadata, TrackMetadata};
    use std::sync::Arc;
    use std::time::Duration;

    fn track(id: &str, disc: Option<u32>, number: Option<u32>) -> TrackMetadata {
        TrackMetadata {
            id: id.to_string(),
            title: Some(id.to_uppercase()),
            disc_number: disc,
            track_number: number,
            duration: Some(Duration::from_secs(200)),
            ..Default::default()
        }
    }

    async fn repo() -> SqliteRepository<TrackMetadata> {
        SqliteRepository::new(create_test_pool().await.unwrap())
    }

    #[tokio::test]
    async fn test_orders_by_disc_then_track() {
        let repo = repo().await;
        repo.add_or_update(vec![
            track("d2t2", Some(2), Some(2)),
            track("d1t3", Some(1), Some(3)),
            track("d2t1", Some(2), Some(1)),
            track("d1t1", Some(1), Some(1)),
            track("loose", None, None),
            track("d1t2", Some(1), Some(2)),
        ])
        .await
        .unwrap();

        let ids: Vec<_> = repo
            .get_items(0, 10)
            .await
            .unwrap()
            .into_iter()
            .map(|t| t.id)
            .collect();
        assert_eq!(ids, vec!["d1t1", "d1t2", "d1t3", "d2t1", "d2t2", "loose"]);
    }

    #[tokio::test]
    async fn test_upsert_keeps_insertion_position() {
        let repo = repo().await;
        repo.add_or_update(vec![track("a", Some(1), Some(1)), track("b", Some(1), Some(1))])
            .await
            .unwrap();
        let mut renamed = track("a", Some(1), Some(1));
        renamed.title = Some("Renamed".to_string());
        repo.add_or_update(vec![renamed]).await.unwrap();

        let items = repo.get_items(0, 10).await.unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].id, "a");
        assert_eq!(items[0].title.as_deref(), Some("Renamed"));
        assert_eq!(items[0].duration, Some(Duration::from_secs(200)));
    }

    #[tokio::test]
    async fn test_paging_and_offsets() {
        let repo = repo().await;
        let batch = (1..=4).map(|n| track(&format!("t{n}"), Some(1), Some(n))).collect();
        repo.add_or_update(batch).await.unwrap();

        assert_eq!(repo.count().await.unwrap(), 4);
        assert_eq!(repo.get_items(2, 10).await.unwrap().len(), 2);
        assert!(repo.get_items(10, 10).await.unwrap().is_empty());
        assert_eq!(repo.get_items(0, usize::MAX).await.unwrap().len(), 4);
        assert_eq!(repo.get_items(0, 3).await.unwrap(), repo.get_items(0, 3).await.unwrap());
    }

    #[tokio::test]
    async fn test_kinds_are_isolated() {
        let pool = create_test_pool().await.unwrap();
        let tracks: SqliteRepository<TrackMetadata> = SqliteRepository::new(pool.clone());
        let albums: SqliteRepository<AlbumMetadata> = SqliteRepository::new(pool);

        tracks.add_or_update(vec![track("shared-id", None, None)]).await.unwrap();
        albums
            .add_or_update(vec![AlbumMetadata {
                id: "shared-id".to_string(),
                title: Some("Album".to_string()),
                ..Default::default()
            }])
            .await
            .unwrap();

        assert_eq!(tracks.count().await.unwrap(), 1);
        assert_eq!(albums.count().await.unwrap(), 1);
        assert!(albums.remove("shared-id").await.unwrap());
        assert!(tracks.get_item("shared-id").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_undecodable_payload_is_corruption() {
        let pool = create_test_pool().await.unwrap();
        sqlx::query(
            "INSERT INTO metadata_records (kind, id, seq, payload, updated_at) \
             VALUES ('track', 'bad', 1, '{not json', 0)",
        )
        .execute(&pool)
        .await
        .unwrap();

        let repo: SqliteRepository<TrackMetadata> = SqliteRepository::new(pool);
        assert!(matches!(
            repo.get_item("bad").await,
            Err(LibraryError::Corruption(_))
        ));
        assert!(matches!(repo.get_items(0, 10).await, Err(LibraryError::Corruption(_))));
    }

    #[tokio::test]
    async fn test_rejects_empty_id() {
        let repo = repo().await;
        let result = repo.add_or_update(vec![track("", None, None)]).await;
        assert!(matches!(result, Err(LibraryError::InvalidInput { .. })));
    }

    #[tokio::test]
    async fn test_concurrent_upserts() {
        let repo = Arc::new(repo().await);
        let handles: Vec<_> = (0..4u32)
            .map(|w| {
                let repo = repo.clone();
                tokio::spawn(async move {
                    let batch = (0..5u32)
                        .map(|n| track(&format!("w{w}-{n}"), Some(w), Some(n)))
                        .collect();
                    repo.add_or_update(batch).await.unwrap();
                })
            })
            .collect();
        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(repo.count().await.unwrap(), 20);
        let first = repo.get_items(0, 20).await.unwrap();
        assert_eq!(first[0].id, "w0-0");
        assert_eq!(first[19].id, "w3-4");
    }
}
