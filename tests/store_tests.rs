//! 存储集成测试

use annotation_relay::*;
use tempfile::TempDir;

/// 创建临时存储
fn setup_store(unique_titles: bool) -> (EntryStore, TempDir) {
    let tmp = TempDir::new().unwrap();
    let config = StoreConfig::local(tmp.path().join("entries.db")).with_unique_titles(unique_titles);
    let store = EntryStore::connect(config).unwrap();
    (store, tmp)
}

fn entry(title: &str) -> Entry {
    Entry {
        url: "https://www.foo.com".to_string(),
        title: title.to_string(),
        platform: "foo".to_string(),
        singer: "Singer".to_string(),
        model: "RVC".to_string(),
        language: "Korean".to_string(),
        label: Label::Bonafide,
        submission_time: current_time_ms(),
    }
}

// ==================== 连接测试 ====================

mod connection_tests {
    use super::*;

    #[test]
    fn test_connect_creates_db_file() {
        let tmp = TempDir::new().unwrap();
        let db_path = tmp.path().join("subdir").join("entries.db");

        assert!(!db_path.parent().unwrap().exists());

        let _store = EntryStore::connect(StoreConfig::local(&db_path)).unwrap();
        assert!(db_path.exists());
    }

    #[test]
    fn test_reconnect_keeps_entries() {
        let (store, tmp) = setup_store(true);
        store.insert_entry(&entry("Persisted")).unwrap();
        drop(store);

        let store = EntryStore::connect(StoreConfig::local(tmp.path().join("entries.db"))).unwrap();
        assert_eq!(store.count_by_title("Persisted").unwrap(), 1);
    }

    #[test]
    fn test_unique_can_be_disabled_later() {
        let (store, tmp) = setup_store(true);
        store.insert_entry(&entry("A")).unwrap();
        drop(store);

        let path = tmp.path().join("entries.db");
        let store = EntryStore::connect(StoreConfig::local(&path).with_unique_titles(false)).unwrap();
        store.insert_entry(&entry("A")).unwrap();
        assert_eq!(store.count_by_title("A").unwrap(), 2);
    }
}

// ==================== 去重查询 ====================

mod duplicate_tests {
    use super::*;

    #[test]
    fn test_no_match_counts_zero() {
        let (store, _tmp) = setup_store(true);
        store.insert_entry(&entry("Song A")).unwrap();

        assert_eq!(store.count_by_title("Song B").unwrap(), 0);
        // 等值匹配，不做大小写 / 前缀匹配
        assert_eq!(store.count_by_title("song a").unwrap(), 0);
        assert_eq!(store.count_by_title("Song").unwrap(), 0);
    }

    #[test]
    fn test_many_matches_without_unique_index() {
        let (store, _tmp) = setup_store(false);
        for _ in 0..100 {
            store.insert_entry(&entry("Hot Song")).unwrap();
        }
        store.insert_entry(&entry("Cold Song")).unwrap();

        assert_eq!(store.count_by_title("Hot Song").unwrap(), 100);
        assert_eq!(store.count_by_title("Cold Song").unwrap(), 1);
    }
}

// ==================== 写入 ====================

mod insert_tests {
    use super::*;

    #[test]
    fn test_insert_returns_distinct_ids() {
        let (store, _tmp) = setup_store(false);

        let first = store.insert_entry(&entry("Same")).unwrap();
        let second = store.insert_entry(&entry("Same")).unwrap();

        assert!(!first.is_empty());
        assert_ne!(first, second);
        assert_eq!(store.count_entries().unwrap(), 2);
    }

    #[test]
    fn test_insert_touches_only_new_document() {
        let (store, _tmp) = setup_store(true);
        let first_id = store.insert_entry(&entry("First")).unwrap();
        let before = store.get_entry(&first_id).unwrap().unwrap();

        store.insert_entry(&entry("Second")).unwrap();

        let after = store.get_entry(&first_id).unwrap().unwrap();
        assert_eq!(before.entry, after.entry);
        assert_eq!(before.created_at, after.created_at);
        assert_eq!(store.count_entries().unwrap(), 2);
    }

    #[test]
    fn test_unique_violation_is_duplicate_title() {
        let (store, _tmp) = setup_store(true);
        store.insert_entry(&entry("Only Once")).unwrap();

        match store.insert_entry(&entry("Only Once")) {
            Err(Error::DuplicateTitle(title)) => assert_eq!(title, "Only Once"),
            other => panic!("Expected DuplicateTitle, got {:?}", other),
        }
        assert_eq!(store.count_entries().unwrap(), 1);
    }

    #[test]
    fn test_list_entries_newest_first() {
        let (store, _tmp) = setup_store(true);
        let mut old = entry("Old");
        old.submission_time = 1_000;
        let mut new = entry("New");
        new.submission_time = 2_000;
        new.label = Label::Deepfake;

        store.insert_entry(&old).unwrap();
        store.insert_entry(&new).unwrap();

        let entries = store.list_entries().unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].entry.title, "New");
        assert_eq!(entries[0].entry.label, Label::Deepfake);
        assert_eq!(entries[1].entry.title, "Old");
    }
}

// ==================== message 集合 ====================

mod message_tests {
    use super::*;

    #[test]
    fn test_messages_returned_verbatim() {
        let (store, _tmp) = setup_store(true);
        assert!(store.get_all_messages().unwrap().is_empty());

        let doc = serde_json::json!({"text": "hello", "nested": {"n": [1, 2, 3]}});
        store.insert_message(&doc).unwrap();
        store.insert_message(&serde_json::json!("plain string")).unwrap();

        let messages = store.get_all_messages().unwrap();
        assert_eq!(messages.len(), 2);
        assert!(messages.contains(&doc));
        assert!(messages.contains(&serde_json::json!("plain string")));
    }

    #[test]
    fn test_messages_independent_of_entries() {
        let (store, _tmp) = setup_store(true);
        store.insert_entry(&entry("Song")).unwrap();
        assert!(store.get_all_messages().unwrap().is_empty());
    }
}
