//! 数据库 Schema 定义

/// 核心 Schema SQL
pub const SCHEMA_SQL: &str = r#"
-- Entries 表（一条标注 = 一个文档）
CREATE TABLE IF NOT EXISTS entries (
    id TEXT PRIMARY KEY,            -- 文档 ID (UUID v4)
    url TEXT NOT NULL,
    title TEXT NOT NULL,            -- 去重键
    platform TEXT NOT NULL,
    singer TEXT NOT NULL DEFAULT '',
    model TEXT NOT NULL DEFAULT '',
    language TEXT NOT NULL DEFAULT '',
    bonafide_or_deepfake TEXT NOT NULL,  -- "bonafide" | "deepfake"
    submission_time INTEGER NOT NULL,    -- 毫秒时间戳
    created_at INTEGER NOT NULL DEFAULT (strftime('%s', 'now') * 1000)
);

-- Message 表（与 entries 无关的不透明记录，只读）
CREATE TABLE IF NOT EXISTS message (
    id TEXT PRIMARY KEY,
    body TEXT NOT NULL,             -- 原始 JSON 文档
    created_at INTEGER NOT NULL DEFAULT (strftime('%s', 'now') * 1000)
);

-- 索引
CREATE INDEX IF NOT EXISTS idx_entries_title ON entries(title);
CREATE INDEX IF NOT EXISTS idx_entries_submission_time ON entries(submission_time DESC);
"#;

/// title 唯一索引（存储层保证"每个 title 至多一条"）
pub const UNIQUE_TITLE_SQL: &str = r#"
CREATE UNIQUE INDEX IF NOT EXISTS idx_entries_title_unique ON entries(title);
"#;

/// 关闭唯一约束时移除索引
pub const DROP_UNIQUE_TITLE_SQL: &str = r#"
DROP INDEX IF EXISTS idx_entries_title_unique;
"#;

/// 获取完整 Schema
pub fn full_schema(unique_titles: bool) -> String {
    let mut sql = SCHEMA_SQL.to_string();

    if unique_titles {
        sql.push_str(UNIQUE_TITLE_SQL);
    } else {
        sql.push_str(DROP_UNIQUE_TITLE_SQL);
    }

    sql
}
