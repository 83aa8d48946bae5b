//! Relay 模块 - 存储连接的唯一持有者
//!
//! Relay 负责：
//! - 持有进程内唯一的存储连接
//! - 通过 Unix Socket 接收 fetchData / addData / checkDuplicate
//! - 将所有存储失败转成结构化错误响应

mod handler;
mod server;

// Re-export protocol types from crate root
pub use crate::protocol::{Request, Response};
pub use handler::Handler;
pub use server::{cleanup_stale_relay, is_relay_running, Relay, RelayConfig};
