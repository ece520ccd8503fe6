use std::path::PathBuf;

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;

use tokio::sync::Mutex;

use super::HistoryError;
use super::bounded::BoundedHistory;
use crate::analysis::model::AnalysisRecord;

/// 以 JSON 文件保存每个会话的历史记录
///
/// 文件缺失、无法读取或内容损坏时按空历史处理。
pub struct FileHistoryStore {
    dir: PathBuf,
    // 读-改-写必须串行
    write_lock: Mutex<()>,
}

impl FileHistoryStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            write_lock: Mutex::new(()),
        }
    }

    // 会话 ID 用 URL 安全的 base64 编码作文件名，不同 ID 不会落到同一个文件
    fn path_for(&self, session_id: &str) -> PathBuf {
        let name = URL_SAFE_NO_PAD.encode(session_id.as_bytes());
        self.dir.join(format!("{name}.json"))
    }

    pub async fn load(&self, session_id: &str) -> BoundedHistory {
        let path = self.path_for(session_id);
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return BoundedHistory::new(),
            Err(e) => {
                tracing::warn!("Failed to read history file {}: {}", path.display(), e);
                return BoundedHistory::new();
            }
        };

        match serde_json::from_slice::<Vec<AnalysisRecord>>(&bytes) {
            Ok(records) => BoundedHistory::from_records(records),
            Err(e) => {
                tracing::warn!("Discarding corrupted history file {}: {}", path.display(), e);
                BoundedHistory::new()
            }
        }
    }

    async fn save(&self, session_id: &str, history: &BoundedHistory) -> Result<(), HistoryError> {
        tokio::fs::create_dir_all(&self.dir).await?;

        let path = self.path_for(session_id);
        let tmp = path.with_extension("json.tmp");
        let json = serde_json::to_vec(history)?;

        tokio::fs::write(&tmp, json).await?;
        tokio::fs::rename(&tmp, &path).await?;
        Ok(())
    }

    pub async fn append(&self, session_id: &str, record: AnalysisRecord) -> Result<(), HistoryError> {
        let _guard = self.write_lock.lock().await;
        let mut history = self.load(session_id).await;
        history.append(record);
        self.save(session_id, &history).await
    }

    pub async fn remove(&self, session_id: &str, id: &str) -> Result<bool, HistoryError> {
        let _guard = self.write_lock.lock().await;
        let mut history = self.load(session_id).await;
        if !history.remove(id) {
            return Ok(false);
        }
        self.save(session_id, &history).await?;
        Ok(true)
    }

    pub async fn clear(&self, session_id: &str) -> Result<(), HistoryError> {
        let _guard = self.write_lock.lock().await;
        match tokio::fs::remove_file(self.path_for(session_id)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::history::bounded::tests::record;

    #[tokio::test]
    async fn history_survives_a_new_store_instance() {
        let dir = tempfile::tempdir().unwrap();

        let store = FileHistoryStore::new(dir.path());
        store.append("session-1", record("a", 6)).await.unwrap();
        store.append("session-1", record("b", 7)).await.unwrap();

        let reopened = FileHistoryStore::new(dir.path());
        let ids: Vec<String> = reopened
            .load("session-1")
            .await
            .list()
            .into_iter()
            .map(|r| r.id)
            .collect();
        assert_eq!(ids, vec!["b".to_string(), "a".to_string()]);
    }

    #[tokio::test]
    async fn corrupted_file_loads_as_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileHistoryStore::new(dir.path());
        std::fs::write(store.path_for("broken"), b"{ not valid json").unwrap();

        assert!(store.load("broken").await.is_empty());

        // 损坏的文件会在下一次写入时被覆盖
        store.append("broken", record("fresh", 4)).await.unwrap();
        assert_eq!(store.load("broken").await.len(), 1);
    }

    #[tokio::test]
    async fn sessions_are_isolated_and_clear_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileHistoryStore::new(dir.path());

        store.append("one", record("a", 9)).await.unwrap();
        store.append("two", record("b", 9)).await.unwrap();
        store.clear("one").await.unwrap();
        store.clear("one").await.unwrap();

        assert!(store.load("one").await.is_empty());
        assert_eq!(store.load("two").await.len(), 1);
    }

    #[tokio::test]
    async fn session_ids_cannot_escape_the_directory() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileHistoryStore::new(dir.path());

        store.append("../../etc/passwd", record("a", 5)).await.unwrap();

        let entries: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|entry| entry.unwrap().file_name().into_string().unwrap())
            .collect();
        assert_eq!(entries, vec!["Li4vLi4vZXRjL3Bhc3N3ZA.json".to_string()]);
    }

    #[tokio::test]
    async fn similar_session_ids_keep_separate_histories() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileHistoryStore::new(dir.path());

        store.append("a.b", record("dot", 5)).await.unwrap();
        store.append("a/b", record("slash", 6)).await.unwrap();
        store.append("a_b", record("underscore", 7)).await.unwrap();

        for (session, id) in [("a.b", "dot"), ("a/b", "slash"), ("a_b", "underscore")] {
            let history = store.load(session).await;
            assert_eq!(history.len(), 1);
            assert!(history.find_by_id(id).is_some());
        }
    }

    #[tokio::test]
    async fn remove_reports_whether_anything_changed() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileHistoryStore::new(dir.path());

        store.append("s", record("a", 5)).await.unwrap();
        assert!(store.remove("s", "a").await.unwrap());
        assert!(!store.remove("s", "a").await.unwrap());
    }
}
