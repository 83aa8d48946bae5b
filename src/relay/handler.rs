//! 请求处理器
//!
//! 按 action 分发请求。所有存储调用在 blocking 线程池执行并受超时约束，
//! 任何失败都转成 `{ error }` 响应，不会让请求无应答。

use std::sync::Arc;
use std::time::Duration;

use crate::error::{Error, Result};
use crate::protocol::{FetchedData, Request, Response};
use crate::store::DocumentStore;
use crate::types::Entry;

/// 请求处理器
pub struct Handler {
    /// 存储（进程内唯一，启动时创建）
    store: Arc<dyn DocumentStore>,
    /// 单次存储调用超时
    store_timeout: Duration,
}

impl Handler {
    /// 创建处理器
    pub fn new(store: Arc<dyn DocumentStore>, store_timeout: Duration) -> Self {
        Self {
            store,
            store_timeout,
        }
    }

    /// 处理请求
    pub async fn handle(&self, request: Request) -> Response {
        match request {
            Request::CheckDuplicate { title } => self.handle_check_duplicate(title).await,
            Request::AddData { data } => self.handle_add(data).await,
            Request::FetchData => self.handle_fetch().await,
        }
    }

    /// 处理 checkDuplicate：查询 + 计数完成后才响应
    async fn handle_check_duplicate(&self, title: String) -> Response {
        tracing::debug!("🔎 checkDuplicate: title={:?}", title);

        let lookup = title.clone();
        match self
            .run_store(move |store| store.count_by_title(&lookup))
            .await
        {
            Ok(count) => {
                tracing::debug!("checkDuplicate: title={:?}, matches={}", title, count);
                Response::Duplicate(count > 0)
            }
            Err(e) => {
                tracing::error!("❌ checkDuplicate 失败: {}", e);
                Response::error(&e)
            }
        }
    }

    /// 处理 addData：无条件插入（唯一约束由存储层负责）
    async fn handle_add(&self, entry: Entry) -> Response {
        tracing::debug!("📝 addData: title={:?}, platform={}", entry.title, entry.platform);

        let result = self
            .run_store(move |store| store.insert_entry(&entry))
            .await
            .map_err(|e| match e {
                Error::StoreInsert(_) | Error::DuplicateTitle(_) | Error::Timeout(_) => e,
                other => Error::StoreInsert(other.to_string()),
            });

        match result {
            Ok(id) => {
                tracing::info!("✅ Entry 已写入: id={}", id);
                Response::Added { id }
            }
            Err(e) => {
                tracing::error!("❌ addData 失败: {}", e);
                Response::error(&e)
            }
        }
    }

    /// 处理 fetchData：原样返回 message 集合
    async fn handle_fetch(&self) -> Response {
        tracing::debug!("📥 fetchData");

        match self.run_store(|store| store.get_all_messages()).await {
            Ok(messages) => Response::Fetched {
                data: FetchedData { messages },
            },
            Err(e) => {
                tracing::error!("❌ fetchData 失败: {}", e);
                Response::error(&e)
            }
        }
    }

    /// 在 blocking 线程池执行存储调用，超时返回 [`Error::Timeout`]
    async fn run_store<T, F>(&self, op: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&dyn DocumentStore) -> Result<T> + Send + 'static,
    {
        let store = self.store.clone();
        let task = tokio::task::spawn_blocking(move || op(store.as_ref()));

        match tokio::time::timeout(self.store_timeout, task).await {
            Ok(Ok(result)) => result,
            Ok(Err(join_err)) => Err(Error::Other(anyhow::anyhow!(
                "存储任务异常退出: {}",
                join_err
            ))),
            Err(_) => Err(Error::Timeout(self.store_timeout.as_millis() as u64)),
        }
    }
}
