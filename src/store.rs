//! 文档存储
//!
//! `entries` / `message` 两个集合，落在本地 SQLite。
//! Relay 只通过 [`DocumentStore`] 访问存储，便于替换实现。

use crate::config::StoreConfig;
use crate::error::{Error, Result};
use crate::schema;
use crate::types::{current_time_ms, Entry, EntryRecord, Label};
use parking_lot::Mutex;
use rusqlite::{params, Connection, ErrorCode, OptionalExtension};
use std::sync::Arc;

/// 文档存储原语：等值查询、全量读取、单文档插入
pub trait DocumentStore: Send + Sync {
    /// `entries` 中 title 等于给定值的文档数
    fn count_by_title(&self, title: &str) -> Result<usize>;

    /// 插入一条 entry，返回新文档 ID
    fn insert_entry(&self, entry: &Entry) -> Result<String>;

    /// 读取 `message` 集合的全部文档（原样返回）
    fn get_all_messages(&self) -> Result<Vec<serde_json::Value>>;
}

/// SQLite 文档存储
pub struct EntryStore {
    conn: Arc<Mutex<Connection>>,
    config: StoreConfig,
}

impl EntryStore {
    /// 连接存储（建目录、建表、按配置切换 title 唯一索引）
    pub fn connect(config: StoreConfig) -> Result<Self> {
        if let Some(parent) = config.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(&config.path)?;

        // 已有重复标题时无法建唯一索引
        if config.unique_titles {
            conn.execute_batch(schema::SCHEMA_SQL)?;
            if let Some(title) = first_duplicate_title(&conn)? {
                return Err(Error::Config(format!(
                    "entries 中已存在重复标题 {:?}，无法启用唯一约束（设置 ANNOTATION_UNIQUE_TITLES=0）",
                    title
                )));
            }
        }
        conn.execute_batch(&schema::full_schema(config.unique_titles))?;

        tracing::info!(
            "存储已连接: {:?} (unique_titles={})",
            config.path,
            config.unique_titles
        );

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            config,
        })
    }

    /// 当前配置
    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// 获取底层连接 (用于测试)
    #[doc(hidden)]
    pub fn connection(&self) -> &Arc<Mutex<Connection>> {
        &self.conn
    }

    /// 写入一条 message 文档
    pub fn insert_message(&self, body: &serde_json::Value) -> Result<String> {
        let id = new_document_id();
        let body = serde_json::to_string(body)?;
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO message (id, body, created_at) VALUES (?1, ?2, ?3)",
            params![id, body, current_time_ms()],
        )?;
        Ok(id)
    }

    /// 按 ID 获取 entry
    pub fn get_entry(&self, id: &str) -> Result<Option<EntryRecord>> {
        let conn = self.conn.lock();
        conn.query_row(
            &format!("SELECT {} FROM entries WHERE id = ?1", ENTRY_COLUMNS),
            params![id],
            row_to_record,
        )
        .optional()
        .map_err(Into::into)
    }

    /// 列出全部 entry（按提交时间倒序）
    pub fn list_entries(&self) -> Result<Vec<EntryRecord>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM entries ORDER BY submission_time DESC, created_at DESC",
            ENTRY_COLUMNS
        ))?;

        let rows = stmt.query_map([], row_to_record)?;

        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Into::into)
    }

    /// entry 总数
    pub fn count_entries(&self) -> Result<usize> {
        let conn = self.conn.lock();
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM entries", [], |row| row.get(0))?;
        Ok(count as usize)
    }
}

impl DocumentStore for EntryStore {
    fn count_by_title(&self, title: &str) -> Result<usize> {
        let conn = self.conn.lock();
        let count: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM entries WHERE title = ?1",
                params![title],
                |row| row.get(0),
            )
            .map_err(|e| Error::StoreQuery(e.to_string()))?;
        Ok(count as usize)
    }

    fn insert_entry(&self, entry: &Entry) -> Result<String> {
        let id = new_document_id();
        let conn = self.conn.lock();
        conn.execute(
            r#"
            INSERT INTO entries (
                id, url, title, platform, singer, model, language,
                bonafide_or_deepfake, submission_time, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            "#,
            params![
                id,
                entry.url,
                entry.title,
                entry.platform,
                entry.singer,
                entry.model,
                entry.language,
                entry.label.to_string(),
                entry.submission_time,
                current_time_ms(),
            ],
        )
        .map_err(|e| match e {
            rusqlite::Error::SqliteFailure(ref f, _) if f.code == ErrorCode::ConstraintViolation => {
                Error::DuplicateTitle(entry.title.clone())
            }
            other => Error::StoreInsert(other.to_string()),
        })?;

        Ok(id)
    }

    fn get_all_messages(&self) -> Result<Vec<serde_json::Value>> {
        let conn = self.conn.lock();
        let mut stmt = conn
            .prepare("SELECT body FROM message")
            .map_err(|e| Error::StoreQuery(e.to_string()))?;

        let bodies = stmt
            .query_map([], |row| row.get::<_, String>(0))
            .and_then(|rows| rows.collect::<std::result::Result<Vec<_>, _>>())
            .map_err(|e| Error::StoreQuery(e.to_string()))?;

        bodies
            .iter()
            .map(|body| {
                serde_json::from_str(body)
                    .map_err(|e| Error::StoreQuery(format!("message 文档损坏: {}", e)))
            })
            .collect()
    }
}

const ENTRY_COLUMNS: &str = "id, url, title, platform, singer, model, language, bonafide_or_deepfake, submission_time, created_at";

fn row_to_record(row: &rusqlite::Row<'_>) -> rusqlite::Result<EntryRecord> {
    let label: String = row.get(7)?;
    Ok(EntryRecord {
        id: row.get(0)?,
        entry: Entry {
            url: row.get(1)?,
            title: row.get(2)?,
            platform: row.get(3)?,
            singer: row.get(4)?,
            model: row.get(5)?,
            language: row.get(6)?,
            label: label.parse().unwrap_or(Label::Bonafide),
            submission_time: row.get(8)?,
        },
        created_at: row.get(9)?,
    })
}

fn first_duplicate_title(conn: &Connection) -> rusqlite::Result<Option<String>> {
    conn.query_row(
        "SELECT title FROM entries GROUP BY title HAVING COUNT(*) > 1 LIMIT 1",
        [],
        |row| row.get(0),
    )
    .optional()
}

/// 新文档 ID（UUID v4，去掉连字符）
fn new_document_id() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}
