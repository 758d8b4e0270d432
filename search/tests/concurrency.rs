use sift_core::index::IndexStore;
use sift_core::normalize::{Normalizer, StandardNormalizer};
use sift_core::types::{DataVersion, IndexConfig, NormalizerConfig, QueryConfig, RowSet};
use sift_search::QueryEngine;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use tempfile::tempdir;

fn normalizer() -> Arc<dyn Normalizer> {
    Arc::new(StandardNormalizer::new(&NormalizerConfig::default()).unwrap())
}

fn dataset(words: &[&str]) -> Vec<Vec<String>> {
    words.iter().map(|w| vec![w.to_string()]).collect()
}

/// Verify queries running during rebuilds always see one complete snapshot.
#[test]
fn test_queries_during_rebuild_see_consistent_snapshots() {
    let dir = tempdir().unwrap();
    let store = IndexStore::open(dir.path(), &IndexConfig::default(), normalizer()).unwrap();
    let headers = vec!["name".to_string()];

    let first = dataset(&["alpha", "beta"]);
    let second = dataset(&["beta", "gamma", "alpha"]);
    let first_version = DataVersion::of(&first);
    let second_version = DataVersion::of(&second);
    store.build(&first, &headers, first_version).unwrap();

    let done = Arc::new(AtomicBool::new(false));
    let readers: Vec<_> = (0..4)
        .map(|_| {
            let store = store.clone();
            let done = Arc::clone(&done);
            thread::spawn(move || {
                let engine = QueryEngine::new(QueryConfig::default(), normalizer());
                let mut checked = 0usize;
                while !done.load(Ordering::Acquire) || checked == 0 {
                    let snapshot = store.snapshot().expect("index stays published");
                    let expected = if snapshot.version() == first_version {
                        RowSet::from([0])
                    } else {
                        assert_eq!(snapshot.version(), second_version);
                        RowSet::from([2])
                    };
                    let variants = vec!["alpha".to_string()];
                    assert_eq!(engine.search_variants(&snapshot, &variants), expected);
                    checked += 1;
                }
                checked
            })
        })
        .collect();

    for round in 0..20 {
        if round % 2 == 0 {
            store.build(&second, &headers, second_version).unwrap();
        } else {
            store.build(&first, &headers, first_version).unwrap();
        }
    }
    done.store(true, Ordering::Release);

    for reader in readers {
        assert!(reader.join().unwrap() > 0);
    }
    assert_eq!(store.current_version(), Some(first_version));
}

/// Verify concurrent build requests serialize and leave a loadable index.
#[test]
fn test_concurrent_builds_serialize() {
    let dir = tempdir().unwrap();
    let store = IndexStore::open(dir.path(), &IndexConfig::default(), normalizer()).unwrap();

    let builders: Vec<_> = (0..4)
        .map(|i| {
            let store = store.clone();
            thread::spawn(move || {
                let name = format!("item{i}");
                let rows = dataset(&["shared", name.as_str()]);
                let headers = vec!["name".to_string()];
                store.build(&rows, &headers, DataVersion::of(&rows)).unwrap();
            })
        })
        .collect();
    for builder in builders {
        builder.join().unwrap();
    }

    let published = store.current_version().unwrap();
    let reopened = IndexStore::open(dir.path(), &IndexConfig::default(), normalizer()).unwrap();
    assert_eq!(reopened.current_version(), Some(published));
    assert_eq!(reopened.lookup_exact("shared"), Some(RowSet::from([0])));
}
