//! Claim exclusivity across connections sharing one database file.

use std::collections::HashSet;
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::Duration;

use tempfile::TempDir;

use snaggle_core::candidate::{MediaRef, Protocol};
use snaggle_core::import::{ImportTaskStore, NewImportTask, SqliteImportTaskStore};
use snaggle_core::job::{JobStore, NewDownloadJob, SqliteJobStore};

const WORKERS: usize = 4;
const ROWS: usize = 40;

fn new_job(i: usize) -> NewDownloadJob {
    NewDownloadJob {
        indexer_id: 1,
        guid: format!("guid-{}", i),
        candidate_title: format!("Movie.{}.2020.1080p.WEB-DL-GRP", i),
        candidate_link: format!("magnet:?xt=urn:btih:{:040x}", i),
        protocol: Protocol::Torrent,
        media: MediaRef::movie(format!("Movie {}", i), Some(2020)),
        downloader_id: "qbit".to_string(),
        library_id: "movies".to_string(),
        name_template_id: "movie-default".to_string(),
        max_attempts: 5,
    }
}

fn new_task(i: usize) -> NewImportTask {
    NewImportTask {
        download_job_id: None,
        source_path: format!("/downloads/movie-{}.mkv", i),
        media: MediaRef::movie(format!("Movie {}", i), Some(2020)),
        library_id: "movies".to_string(),
        name_template_id: "movie-default".to_string(),
        candidate_title: format!("Movie.{}.2020.1080p.WEB-DL-GRP", i),
        max_attempts: 5,
    }
}

/// Run `claim` on `WORKERS` threads until every thread sees an empty batch.
fn claim_concurrently<F>(claim: F) -> Vec<String>
where
    F: Fn(usize) -> Vec<String> + Send + Sync + 'static,
{
    let claim = Arc::new(claim);
    let barrier = Arc::new(Barrier::new(WORKERS));
    let handles: Vec<_> = (0..WORKERS)
        .map(|worker| {
            let claim = Arc::clone(&claim);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                let mut claimed = Vec::new();
                loop {
                    let batch = claim(worker);
                    if batch.is_empty() {
                        break;
                    }
                    claimed.extend(batch);
                }
                claimed
            })
        })
        .collect();

    handles
        .into_iter()
        .flat_map(|h| h.join().expect("claim thread panicked"))
        .collect()
}

fn assert_exclusive(claimed: &[String]) {
    let unique: HashSet<&String> = claimed.iter().collect();
    assert_eq!(claimed.len(), ROWS, "every row claimed exactly once");
    assert_eq!(unique.len(), ROWS, "no row claimed twice");
}

#[test]
fn test_job_claims_are_exclusive() {
    let dir = TempDir::new().expect("temp dir");
    let db_path = dir.path().join("snaggle.db");

    let setup = SqliteJobStore::new(&db_path).expect("job store");
    for i in 0..ROWS {
        assert!(setup.create_unless_active(new_job(i)).expect("create").1);
    }

    let stores: Vec<SqliteJobStore> = (0..WORKERS)
        .map(|_| SqliteJobStore::new(&db_path).expect("job store"))
        .collect();
    let stores = Arc::new(stores);
    let claimed = claim_concurrently(move |worker| {
        stores[worker]
            .claim_runnable(3, Duration::from_secs(300))
            .expect("claim")
            .into_iter()
            .map(|j| j.id)
            .collect()
    });

    assert_exclusive(&claimed);
    // Every lease is still held.
    assert!(setup
        .claim_runnable(ROWS, Duration::from_secs(300))
        .expect("claim")
        .is_empty());
}

#[test]
fn test_import_claims_are_exclusive() {
    let dir = TempDir::new().expect("temp dir");
    let db_path = dir.path().join("snaggle.db");

    let setup = SqliteImportTaskStore::new(&db_path).expect("task store");
    for i in 0..ROWS {
        setup.create(new_task(i)).expect("create");
    }

    let stores: Vec<SqliteImportTaskStore> = (0..WORKERS)
        .map(|_| SqliteImportTaskStore::new(&db_path).expect("task store"))
        .collect();
    let stores = Arc::new(stores);
    let claimed = claim_concurrently(move |worker| {
        stores[worker]
            .claim_runnable(3)
            .expect("claim")
            .into_iter()
            .map(|t| t.id)
            .collect()
    });

    assert_exclusive(&claimed);
}

#[test]
fn test_expired_lease_is_reclaimable() {
    let dir = TempDir::new().expect("temp dir");
    let db_path = dir.path().join("snaggle.db");
    let first = SqliteJobStore::new(&db_path).expect("job store");
    let second = SqliteJobStore::new(&db_path).expect("job store");
    first.create_unless_active(new_job(0)).expect("create");

    let claimed = first
        .claim_runnable(10, Duration::from_millis(0))
        .expect("claim");
    assert_eq!(claimed.len(), 1);

    thread::sleep(Duration::from_millis(5));
    let reclaimed = second
        .claim_runnable(10, Duration::from_secs(300))
        .expect("claim");
    assert_eq!(reclaimed.len(), 1);
    assert_eq!(reclaimed[0].id, claimed[0].id);
}
