#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use fitlab::db::HistoryStore;
    use fitlab::models::HistoryEntry;

    fn temp_db(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("fitlab-test-{}-{}.db", std::process::id(), name))
    }

    fn entry(id: i64, filename: &str) -> HistoryEntry {
        HistoryEntry {
            id,
            person_preview: "person.jpg".to_string(),
            garment_preview: "garment.jpg".to_string(),
            result_filename: filename.to_string(),
            result_url: format!("https://api.test/results/image/{}", filename),
            created_at: "2026-02-01T10:00:00Z".to_string(),
        }
    }

    #[test]
    fn test_history_survives_a_reopen() {
        let path = temp_db("reopen");
        let _ = std::fs::remove_file(&path);

        // 1. Write two entries and drop the store
        {
            let store = HistoryStore::open(&path).unwrap();
            store.insert(&entry(1, "a.png")).unwrap();
            store.insert(&entry(2, "b.png")).unwrap();
        }

        // 2. A fresh store sees them, newest first
        {
            let store = HistoryStore::open(&path).unwrap();
            let loaded = store.load().unwrap();
            assert_eq!(loaded.len(), 2);
            assert_eq!(loaded[0].result_filename, "b.png");
            assert_eq!(loaded[1].result_filename, "a.png");
            assert_eq!(loaded[0], entry(2, "b.png"));
        }

        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn test_deletions_survive_a_reopen() {
        let path = temp_db("delete");
        let _ = std::fs::remove_file(&path);

        {
            let store = HistoryStore::open(&path).unwrap();
            store.insert(&entry(1, "a.png")).unwrap();
            store.insert(&entry(2, "b.png")).unwrap();
            store.delete(1).unwrap();
        }

        {
            let store = HistoryStore::open(&path).unwrap();
            let loaded = store.load().unwrap();
            assert_eq!(loaded.len(), 1);
            assert_eq!(loaded[0].id, 2);
        }

        let _ = std::fs::remove_file(&path);
    }
}
