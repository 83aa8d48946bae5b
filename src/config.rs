//! 存储配置

use std::path::PathBuf;

/// 存储连接配置
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// SQLite 文件路径
    pub path: PathBuf,

    /// 是否在存储层强制 title 唯一
    ///
    /// 开启时 `entries.title` 带唯一索引，重复写入直接失败；
    /// 关闭时 addData 为无条件插入，去重只依赖 checkDuplicate 预检。
    pub unique_titles: bool,
}

impl StoreConfig {
    /// 创建本地 SQLite 配置（默认强制唯一）
    pub fn local<P: Into<PathBuf>>(path: P) -> Self {
        Self {
            path: path.into(),
            unique_titles: true,
        }
    }

    /// 设置唯一性策略
    pub fn with_unique_titles(mut self, unique: bool) -> Self {
        self.unique_titles = unique;
        self
    }

    /// 从环境变量或默认路径创建配置
    pub fn from_env() -> Self {
        let unique_titles = std::env::var("ANNOTATION_UNIQUE_TITLES")
            .map(|v| parse_flag(&v))
            .unwrap_or(true);

        if let Ok(url) = std::env::var("ANNOTATION_STORE_URL") {
            let path = url.strip_prefix("sqlite://").unwrap_or(&url).to_string();
            return Self::local(path).with_unique_titles(unique_titles);
        }

        // 默认路径: <数据目录>/db/entries.db
        Self::local(default_data_dir().join("db").join("entries.db")).with_unique_titles(unique_titles)
    }
}

/// 数据目录：`ANNOTATION_RELAY_DIR` 或 ~/.annotation-relay
///
/// Relay 与 Client 共用，二者据此定位 socket / PID / 数据库文件。
pub fn default_data_dir() -> PathBuf {
    if let Ok(dir) = std::env::var("ANNOTATION_RELAY_DIR") {
        if !dir.is_empty() {
            return PathBuf::from(dir);
        }
    }

    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".annotation-relay")
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self::from_env()
    }
}

/// "0" / "false" / "off" / "no" 视为关闭
fn parse_flag(value: &str) -> bool {
    !matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "0" | "false" | "off" | "no"
    )
}
