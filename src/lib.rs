//! annotation-relay - 页面标注提交中继
//!
//! 浏览器扩展的伴随进程：前台把当前页面的标注（平台、标题、歌手、模型、语言、
//! bonafide/deepfake 标签）打包成 entry，经后台 Relay 写入文档存储，
//! 同一标题至多一条。
//!
//! # 核心功能
//!
//! - **Relay**: 唯一持有存储连接，处理 `fetchData` / `addData` / `checkDuplicate`
//! - **去重**: 打开页面先 checkDuplicate；存储层 title 唯一索引兜底
//! - **草稿**: 提交时把分类字段缓存到本地，下次预填
//!
//! # Feature Flags
//!
//! - `relay`: 后台 Relay 服务
//! - `client`: Relay Client + 前台编排
//!
//! # 架构
//!
//! 所有写入统一经过 Relay，前台只通过 Unix Socket 上的 JSONL 消息与之通信。

pub mod config;
pub mod error;
pub mod protocol;
pub mod schema;
pub mod store;
pub mod types;

#[cfg(any(feature = "relay", feature = "client"))]
mod pidfile;

#[cfg(feature = "relay")]
pub mod relay;

#[cfg(feature = "client")]
pub mod client;

// Re-exports
pub use config::StoreConfig;
pub use error::{Error, ErrorKind, Result};
pub use protocol::{ErrorBody, FetchedData, Request, Response};
pub use store::{DocumentStore, EntryStore};
pub use types::*;

#[cfg(feature = "relay")]
pub use relay::{cleanup_stale_relay, is_relay_running, Relay, RelayConfig};

#[cfg(feature = "client")]
pub use client::{connect_or_start_relay, ClientConfig, Foreground, PageState, RelayClient};
