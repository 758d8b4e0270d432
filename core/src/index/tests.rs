use super::error::IndexError;
use super::*;
use crate::normalize::{Normalizer, StandardNormalizer};
use crate::types::{DataVersion, IndexConfig, NormalizerConfig, RowRef, RowSet};
use common::{headers, normalizer, open_store, sample_rows};
use proptest::prelude::*;
use std::collections::HashMap;
use std::ffi::OsStr;
use std::io;
use std::sync::Arc;
use tempfile::tempdir;

mod common {
    use super::*;

    pub(super) fn normalizer() -> Arc<dyn Normalizer> {
        Arc::new(StandardNormalizer::new(&NormalizerConfig::default()).unwrap())
    }

    pub(super) fn open_store(dir: &Path) -> IndexStore {
        IndexStore::open(dir, &IndexConfig::default(), normalizer()).unwrap()
    }

    pub(super) fn headers(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    pub(super) fn sample_rows() -> Vec<Vec<&'static str>> {
        vec![
            vec!["A-0", "Pump"],
            vec!["A-1/1", "Valve"],
            vec!["B-2", "Pump housing"],
        ]
    }

    pub(super) fn set(rows: &[RowRef]) -> RowSet {
        rows.iter().copied().collect()
    }
}

fn build_sample(store: &IndexStore) -> DataVersion {
    let rows = sample_rows();
    let version = DataVersion::of(&rows);
    store
        .build(&rows, &headers(&["Code", "Name"]), version)
        .unwrap();
    version
}

mod build {
    use super::*;
    use common::set;

    #[test]
    fn test_not_ready_before_build() {
        let dir = tempdir().unwrap();
        let store = open_store(dir.path());

        assert!(!store.is_ready());
        assert_eq!(store.current_version(), None);
        assert_eq!(store.lookup_exact("pump"), None);
        assert!(store.lookup_prefix("p").is_empty());
    }

    #[test]
    fn test_exact_lookup() {
        let dir = tempdir().unwrap();
        let store = open_store(dir.path());
        let version = build_sample(&store);

        assert!(store.is_ready());
        assert_eq!(store.current_version(), Some(version));
        assert_eq!(store.lookup_exact("a-0"), Some(set(&[0])));
        assert_eq!(store.lookup_exact("pump"), Some(set(&[0, 2])));
        assert_eq!(store.lookup_exact("a-1/1"), Some(set(&[1])));
        assert_eq!(store.lookup_exact("missing"), None);
    }

    #[test]
    fn test_prefix_lookup_in_token_order() {
        let dir = tempdir().unwrap();
        let store = open_store(dir.path());
        build_sample(&store);

        assert_eq!(store.lookup_prefix("a-"), vec![set(&[0]), set(&[1])]);
        assert_eq!(store.lookup_prefix("h"), vec![set(&[2])]);
        assert!(store.lookup_prefix("z").is_empty());
    }

    #[test]
    fn test_duplicate_tokens_in_row_are_listed_once() {
        let dir = tempdir().unwrap();
        let store = open_store(dir.path());
        let rows = vec![vec!["pump pump", "Pump"]];
        store
            .build(&rows, &headers(&["a", "b"]), DataVersion::of(&rows))
            .unwrap();

        let snapshot = store.snapshot().unwrap();
        assert_eq!(snapshot.lookup_exact("pump").unwrap().len(), 1);
    }

    #[test]
    fn test_opaque_columns_are_skipped() {
        let dir = tempdir().unwrap();
        let store = open_store(dir.path());
        let rows = vec![vec!["A-0", "manual.pdf"]];
        store
            .build(&rows, &headers(&["Code", "PDF file"]), DataVersion::of(&rows))
            .unwrap();

        assert_eq!(store.lookup_exact("a-0"), Some(set(&[0])));
        assert_eq!(store.lookup_exact("manual"), None);
    }

    #[test]
    fn test_missing_cells_are_skipped() {
        let dir = tempdir().unwrap();
        let store = open_store(dir.path());
        let rows = vec![
            vec![None, Some("pump".to_string())],
            vec![Some("valve".to_string()), None],
        ];
        store
            .build(&rows, &headers(&["a", "b"]), DataVersion::of(&rows))
            .unwrap();

        assert_eq!(store.lookup_exact("pump"), Some(set(&[0])));
        assert_eq!(store.lookup_exact("valve"), Some(set(&[1])));
    }

    #[test]
    fn test_numeric_fragments_are_indexed() {
        let dir = tempdir().unwrap();
        let store = open_store(dir.path());
        let rows = vec![vec!["M-95"]];
        store
            .build(&rows, &headers(&["Code"]), DataVersion::of(&rows))
            .unwrap();

        assert_eq!(store.lookup_exact("95"), Some(set(&[0])));
    }

    #[test]
    fn test_empty_dataset_builds_empty_index() {
        let dir = tempdir().unwrap();
        let store = open_store(dir.path());
        let rows: Vec<Vec<&str>> = Vec::new();
        store.build(&rows, &[], DataVersion::of(&rows)).unwrap();

        assert!(store.is_ready());
        assert_eq!(store.stats().tokens, 0);
        assert_eq!(store.stats().postings, 0);
    }

    #[test]
    fn test_dictionary_is_sorted() {
        let dir = tempdir().unwrap();
        let store = open_store(dir.path());
        build_sample(&store);

        let snapshot = store.snapshot().unwrap();
        let tokens: Vec<&str> = snapshot.entries().iter().map(|e| e.token.as_str()).collect();
        assert_eq!(
            tokens,
            vec!["a-0", "a-1/1", "b-2", "housing", "pump", "valve"]
        );
    }
}

mod persistence {
    use super::*;
    use common::set;

    #[test]
    fn test_reopen_loads_committed_index() {
        let dir = tempdir().unwrap();
        let version = {
            let store = open_store(dir.path());
            build_sample(&store)
        };

        let store = open_store(dir.path());
        assert!(store.is_ready());
        assert_eq!(store.current_version(), Some(version));
        assert_eq!(store.lookup_exact("pump"), Some(set(&[0, 2])));
    }

    #[test]
    fn test_meta_version_mismatch_is_not_loaded() {
        let dir = tempdir().unwrap();
        {
            let store = open_store(dir.path());
            build_sample(&store);
        }
        let files = IndexFiles::new(dir.path());
        std::fs::write(files.meta(), "42\n0\n").unwrap();

        assert!(!open_store(dir.path()).is_ready());
    }

    #[test]
    fn test_meta_without_settings_line_is_not_loaded() {
        let dir = tempdir().unwrap();
        let version = {
            let store = open_store(dir.path());
            build_sample(&store)
        };
        let files = IndexFiles::new(dir.path());
        std::fs::write(files.meta(), format!("{version}\n")).unwrap();

        assert!(!open_store(dir.path()).is_ready());
    }

    #[test]
    fn test_meta_records_stamp() {
        let dir = tempdir().unwrap();
        let store = open_store(dir.path());
        build_sample(&store);

        let stamp = format::read_meta(&store.files().meta()).unwrap();
        assert_eq!(store.current_stamp(), Some(stamp));
    }

    #[test]
    fn test_truncated_postings_are_not_loaded() {
        let dir = tempdir().unwrap();
        {
            let store = open_store(dir.path());
            build_sample(&store);
        }
        let files = IndexFiles::new(dir.path());
        let bytes = std::fs::read(files.postings()).unwrap();
        std::fs::write(files.postings(), &bytes[..bytes.len() - 4]).unwrap();

        assert!(!open_store(dir.path()).is_ready());
    }

    #[test]
    fn test_garbage_dictionary_is_not_loaded() {
        let dir = tempdir().unwrap();
        {
            let store = open_store(dir.path());
            build_sample(&store);
        }
        let files = IndexFiles::new(dir.path());
        std::fs::write(files.dictionary(), b"not an index").unwrap();

        assert!(!open_store(dir.path()).is_ready());
    }

    #[test]
    fn test_release_keeps_files() {
        let dir = tempdir().unwrap();
        let store = open_store(dir.path());
        build_sample(&store);

        store.release();

        assert!(!store.is_ready());
        assert!(store.files().dictionary().exists());
        assert!(open_store(dir.path()).is_ready());
    }
}

mod commit {
    use super::*;
    use common::set;

    fn fail_on_dictionary(from: &Path, to: &Path) -> io::Result<()> {
        if to.file_name() == Some(OsStr::new(IndexFiles::DICTIONARY)) {
            return Err(io::Error::other("injected rename failure"));
        }
        std::fs::rename(from, to)
    }

    #[test]
    fn test_failed_commit_keeps_previous_snapshot() {
        let dir = tempdir().unwrap();
        let old_version = {
            let store = open_store(dir.path());
            build_sample(&store)
        };

        let store = IndexStore::open_with_rename(
            dir.path(),
            &IndexConfig::default(),
            normalizer(),
            fail_on_dictionary,
        )
        .unwrap();
        assert_eq!(store.current_version(), Some(old_version));

        let rows = vec![vec!["C-3", "Motor"]];
        let result = store.build(&rows, &headers(&["Code", "Name"]), DataVersion::of(&rows));

        match result {
            Err(IndexError::Commit { file, .. }) => {
                assert_eq!(file, store.files().dictionary());
            }
            other => panic!("expected commit error, got {:?}", other.map(|s| s.version())),
        }
        assert_eq!(store.current_version(), Some(old_version));
        assert_eq!(store.lookup_exact("a-0"), Some(set(&[0])));
        assert_eq!(store.lookup_exact("motor"), None);
    }

    #[test]
    fn test_failed_commit_leaves_no_staged_files() {
        let dir = tempdir().unwrap();
        let store = IndexStore::open_with_rename(
            dir.path(),
            &IndexConfig::default(),
            normalizer(),
            fail_on_dictionary,
        )
        .unwrap();

        let rows = sample_rows();
        assert!(
            store
                .build(&rows, &headers(&["Code", "Name"]), DataVersion::of(&rows))
                .is_err()
        );

        let leftovers: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .filter_map(Result::ok)
            .filter(|e| {
                matches!(
                    e.path().extension().and_then(OsStr::to_str),
                    Some("tmp" | "prev")
                )
            })
            .collect();
        assert!(leftovers.is_empty());
        assert!(!store.is_ready());
        // The postings file renamed before the failure is removed again.
        assert!(!store.files().postings().exists());
        assert!(!open_store(dir.path()).is_ready());
    }

    #[test]
    fn test_failed_commit_keeps_previous_generation_on_disk() {
        let dir = tempdir().unwrap();
        let old_version = {
            let store = open_store(dir.path());
            build_sample(&store)
        };
        {
            let store = IndexStore::open_with_rename(
                dir.path(),
                &IndexConfig::default(),
                normalizer(),
                fail_on_dictionary,
            )
            .unwrap();
            let rows = vec![vec!["C-3"]];
            assert!(
                store
                    .build(&rows, &headers(&["Code"]), DataVersion::of(&rows))
                    .is_err()
            );
        }

        let store = open_store(dir.path());
        assert!(store.is_ready());
        assert_eq!(store.current_version(), Some(old_version));
        assert_eq!(store.lookup_exact("a-0"), Some(set(&[0])));
        assert_eq!(store.lookup_exact("c-3"), None);

        let leftovers: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .filter_map(Result::ok)
            .filter(|e| e.path().extension() == Some(OsStr::new("prev")))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[test]
    fn test_successful_commit_removes_backups() {
        let dir = tempdir().unwrap();
        let store = open_store(dir.path());
        build_sample(&store);
        build_sample(&store);

        assert!(!IndexFiles::backup(&store.files().postings()).exists());
        assert!(!IndexFiles::backup(&store.files().dictionary()).exists());
        assert!(!IndexFiles::backup(&store.files().meta()).exists());
    }

    #[test]
    fn test_sync_dir() {
        let dir = tempdir().unwrap();
        assert!(builder::sync_dir(dir.path()).is_ok());
        assert!(builder::sync_dir(&dir.path().join("missing")).is_err());
    }
}

mod stamps {
    use super::*;

    fn store_with(dir: &Path, config: NormalizerConfig) -> IndexStore {
        let normalizer: Arc<dyn Normalizer> = Arc::new(StandardNormalizer::new(&config).unwrap());
        IndexStore::open(dir, &IndexConfig::default(), normalizer).unwrap()
    }

    #[test]
    fn test_index_is_current_after_build() {
        let dir = tempdir().unwrap();
        let store = open_store(dir.path());
        let version = build_sample(&store);

        let other = vec![vec!["x"]];
        assert!(store.is_current(&headers(&["Code", "Name"]), version));
        assert!(!store.is_current(&headers(&["Code", "Name"]), DataVersion::of(&other)));
    }

    #[test]
    fn test_changed_normalizer_settings_are_not_current_after_reopen() {
        let dir = tempdir().unwrap();
        let version = {
            let store = open_store(dir.path());
            build_sample(&store)
        };

        let config = NormalizerConfig {
            fold_confusables: false,
            ..NormalizerConfig::default()
        };
        let store = store_with(dir.path(), config);
        assert!(store.is_ready());
        assert!(!store.is_current(&headers(&["Code", "Name"]), version));

        let store = open_store(dir.path());
        assert!(store.is_current(&headers(&["Code", "Name"]), version));
    }

    #[test]
    fn test_query_only_settings_keep_index_current() {
        let dir = tempdir().unwrap();
        let version = {
            let store = open_store(dir.path());
            build_sample(&store)
        };

        let config = NormalizerConfig {
            max_query_chars: 10,
            ..NormalizerConfig::default()
        };
        let store = store_with(dir.path(), config);
        assert!(store.is_current(&headers(&["Code", "Name"]), version));
    }

    #[test]
    fn test_opaque_columns_are_part_of_stamp() {
        let dir = tempdir().unwrap();
        let store = open_store(dir.path());
        let version = DataVersion::of(&sample_rows());

        let plain = store.stamp_for(&headers(&["Code", "Name"]), version);
        assert_eq!(store.stamp_for(&headers(&["Code", "Title"]), version), plain);
        assert_ne!(store.stamp_for(&headers(&["Code", "Name PDF"]), version), plain);
        assert_ne!(
            store.stamp_for(&headers(&["Code", "Name PDF"]), version),
            store.stamp_for(&headers(&["Code PDF", "Name"]), version)
        );
    }

    #[test]
    fn test_changed_opaque_markers_are_not_current_after_reopen() {
        let dir = tempdir().unwrap();
        let names = headers(&["Code", "Name"]);
        let rows = sample_rows();
        let version = DataVersion::of(&rows);
        {
            let config = IndexConfig {
                opaque_column_markers: vec!["name".to_string()],
            };
            let store = IndexStore::open(dir.path(), &config, normalizer()).unwrap();
            store.build(&rows, &names, version).unwrap();
            assert_eq!(store.lookup_exact("pump"), None);
        }

        let store = open_store(dir.path());
        assert!(store.is_ready());
        assert!(!store.is_current(&names, version));
    }
}

mod snapshots {
    use super::*;
    use common::set;

    #[test]
    fn test_held_snapshot_survives_rebuild() {
        let dir = tempdir().unwrap();
        let store = open_store(dir.path());
        let old_version = build_sample(&store);
        let held = store.snapshot().unwrap();

        let rows = vec![vec!["C-3", "Motor"]];
        let new_version = DataVersion::of(&rows);
        store
            .build(&rows, &headers(&["Code", "Name"]), new_version)
            .unwrap();

        assert_eq!(held.version(), old_version);
        assert_eq!(held.exact_rows("pump"), set(&[0, 2]));
        assert_eq!(store.current_version(), Some(new_version));
        assert_eq!(store.lookup_exact("pump"), None);
        assert_eq!(store.lookup_exact("motor"), Some(set(&[0])));
    }

    #[test]
    fn test_contains_token_and_stats() {
        let dir = tempdir().unwrap();
        let store = open_store(dir.path());
        let version = build_sample(&store);

        let snapshot = store.snapshot().unwrap();
        assert!(snapshot.contains_token("valve"));
        assert!(!snapshot.contains_token("valv"));

        let stats = store.stats();
        assert!(stats.ready);
        assert_eq!(stats.version, Some(version));
        assert_eq!(stats.tokens, 6);
        // a-0, a-1/1, b-2, housing, pump x2, valve
        assert_eq!(stats.postings, 7);
        assert_eq!(
            stats.to_string(),
            format!("dict=6, postings=7, version={version}, ready=true")
        );
    }

    #[test]
    fn test_stats_before_build() {
        let dir = tempdir().unwrap();
        let store = open_store(dir.path());

        assert_eq!(store.stats(), IndexStats::default());
        assert_eq!(
            store.stats().to_string(),
            "dict=0, postings=0, version=none, ready=false"
        );
    }
}

mod opaque {
    use super::*;

    #[test]
    fn test_marker_matches_case_insensitively() {
        let markers = vec!["pdf".to_string()];
        assert!(is_opaque_column("PDF", &markers));
        assert!(is_opaque_column("Drawing (Pdf)", &markers));
        assert!(!is_opaque_column("Code", &markers));
    }

    #[test]
    fn test_empty_marker_matches_nothing() {
        assert!(!is_opaque_column("Code", &[String::new()]));
    }
}

fn row_strategy() -> impl Strategy<Value = Vec<Vec<String>>> {
    prop::collection::vec(
        prop::collection::vec("[a-c]{1,3}( [a-c]-[0-9]{1,4})?", 1..3),
        0..16,
    )
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn postings_are_strictly_ascending(rows in row_strategy()) {
        let dir = tempdir().unwrap();
        let store = open_store(dir.path());
        store.build(&rows, &headers(&["x", "y"]), DataVersion::of(&rows)).unwrap();

        let snapshot = store.snapshot().unwrap();
        for pair in snapshot.entries().windows(2) {
            prop_assert!(pair[0].token < pair[1].token);
        }
        for entry in snapshot.entries() {
            let refs: Vec<RowRef> = snapshot.postings(entry).collect();
            prop_assert!(!refs.is_empty());
            prop_assert!(refs.windows(2).all(|w| w[0] < w[1]));
        }
    }

    #[test]
    fn exact_lookup_matches_brute_force(rows in row_strategy()) {
        let dir = tempdir().unwrap();
        let store = open_store(dir.path());
        store.build(&rows, &headers(&["x", "y"]), DataVersion::of(&rows)).unwrap();

        let normalizer = normalizer();
        let mut expected: HashMap<String, RowSet> = HashMap::new();
        for (index, row) in rows.iter().enumerate() {
            for cell in row {
                for token in normalizer.index_tokens(cell) {
                    expected.entry(token).or_default().insert(index as RowRef);
                }
            }
        }

        prop_assert_eq!(store.stats().tokens, expected.len());
        for (token, rows) in &expected {
            let found = store.lookup_exact(token);
            prop_assert_eq!(found.as_ref(), Some(rows));
        }
    }
}
