//! Both repository implementations honour the same ordering contract.

use core_library::db::create_test_pool;
use core_library::{
    InMemoryRepository, MetadataRepository, PlaylistMetadata, SqliteRepository, TrackMetadata,
};

fn shuffled_two_disc_album() -> Vec<TrackMetadata> {
    // Disc 1 and 2 interleaved, track numbers out of order within each disc.
    [(2, 4), (1, 3), (2, 1), (1, 1), (2, 3), (1, 4), (1, 2), (2, 2)]
        .into_iter()
        .map(|(disc, number)| TrackMetadata {
            id: format!("d{disc}t{number}"),
            title: Some(format!("Track {number}")),
            disc_number: Some(disc),
            track_number: Some(number),
            ..Default::default()
        })
        .collect()
}

async fn assert_grouped_by_disc(repo: &dyn MetadataRepository<TrackMetadata>) {
    repo.add_or_update(shuffled_two_disc_album()).await.unwrap();

    let items = repo.get_items(0, 8).await.unwrap();
    let order: Vec<(u32, u32)> = items
        .iter()
        .map(|t| (t.disc_number.unwrap(), t.track_number.unwrap()))
        .collect();
    assert_eq!(
        order,
        vec![(1, 1), (1, 2), (1, 3), (1, 4), (2, 1), (2, 2), (2, 3), (2, 4)]
    );

    // Same call without intervening writes yields the same sequence.
    assert_eq!(repo.get_items(0, 8).await.unwrap(), items);

    // Pages stitch together into the full listing.
    let mut stitched = repo.get_items(0, 3).await.unwrap();
    stitched.extend(repo.get_items(3, 3).await.unwrap());
    stitched.extend(repo.get_items(6, 3).await.unwrap());
    assert_eq!(stitched, items);

    assert!(repo.get_items(8, 5).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_in_memory_ordering_contract() {
    let repo: InMemoryRepository<TrackMetadata> = InMemoryRepository::new();
    assert_grouped_by_disc(&repo).await;
}

#[tokio::test]
async fn test_sqlite_ordering_contract() {
    let repo: SqliteRepository<TrackMetadata> =
        SqliteRepository::new(create_test_pool().await.unwrap());
    assert_grouped_by_disc(&repo).await;
}

#[tokio::test]
async fn test_unnumbered_records_keep_insertion_order() {
    let memory: InMemoryRepository<PlaylistMetadata> = InMemoryRepository::new();
    let sqlite: SqliteRepository<PlaylistMetadata> =
        SqliteRepository::new(create_test_pool().await.unwrap());
    let repos: [&dyn MetadataRepository<PlaylistMetadata>; 2] = [&memory, &sqlite];

    for repo in repos {
        for name in ["zeta", "alpha", "mid"] {
            repo.add_or_update(vec![PlaylistMetadata {
                id: name.to_string(),
                title: Some(name.to_string()),
                ..Default::default()
            }])
            .await
            .unwrap();
        }

        let page = repo
            .query(core_library::repositories::PageRequest::first(2))
            .await
            .unwrap();
        let ids: Vec<_> = page.items.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, vec!["zeta", "alpha"]);
        assert_eq!(page.total, 3);
        assert_eq!(
            page.next_request(),
            Some(core_library::repositories::PageRequest::new(2, 2))
        );
    }
}
