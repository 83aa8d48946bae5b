//! Relay Client 模块
//!
//! 提供连接 Relay 的客户端，以及前台的去重编排

mod connect;
pub mod foreground;

pub use connect::{connect_or_start_relay, ClientConfig, RelayClient};
pub use foreground::{
    DraftStore, FileDraftStore, Foreground, Form, MemoryDraftStore, PageState, RelayApi,
    TabInspector,
};
