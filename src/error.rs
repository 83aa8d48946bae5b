//! 错误类型定义

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// 库错误类型
#[derive(Error, Debug)]
pub enum Error {
    /// 数据库错误
    #[error("数据库错误: {0}")]
    Database(#[from] rusqlite::Error),

    /// IO 错误
    #[error("IO 错误: {0}")]
    Io(#[from] std::io::Error),

    /// 序列化错误
    #[error("序列化错误: {0}")]
    Serialization(#[from] serde_json::Error),

    /// 查询失败（checkDuplicate / fetchData）
    #[error("查询失败: {0}")]
    StoreQuery(String),

    /// 写入失败（addData）
    #[error("写入失败: {0}")]
    StoreInsert(String),

    /// 标题已存在（唯一索引冲突）
    #[error("Entry already exists: {0}")]
    DuplicateTitle(String),

    /// 通道错误（连接断开 / 未收到响应）
    #[error("通道错误: {0}")]
    Channel(String),

    /// 超时
    #[error("操作超时 ({0}ms)")]
    Timeout(u64),

    /// 配置错误
    #[error("配置错误: {0}")]
    Config(String),

    /// Relay 下发的错误（消息原样保留，不再加前缀）
    #[error("{message}")]
    Relay { kind: ErrorKind, message: String },

    /// 其他错误
    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

impl Error {
    /// 对应的协议错误类别
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::StoreInsert(_) => ErrorKind::StoreInsert,
            Error::DuplicateTitle(_) => ErrorKind::DuplicateTitle,
            Error::Channel(_) | Error::Serialization(_) => ErrorKind::Channel,
            Error::Timeout(_) => ErrorKind::Timeout,
            Error::Relay { kind, .. } => *kind,
            _ => ErrorKind::StoreQuery,
        }
    }

    /// 由协议错误还原（Client 侧）
    ///
    /// 不带 kind 的错误按查询失败处理。
    pub fn from_wire(kind: Option<ErrorKind>, message: String) -> Self {
        Error::Relay {
            kind: kind.unwrap_or(ErrorKind::StoreQuery),
            message,
        }
    }

    /// 是否为标题冲突（本地或 Relay 下发）
    pub fn is_duplicate_title(&self) -> bool {
        self.kind() == ErrorKind::DuplicateTitle
    }
}

/// 协议层错误类别（随 `{ error }` 一起下发）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    StoreQuery,
    StoreInsert,
    DuplicateTitle,
    Channel,
    Timeout,
}

/// Result 类型别名
pub type Result<T> = std::result::Result<T, Error>;
