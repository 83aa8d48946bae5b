//! Relay 服务器
//!
//! Unix Socket 服务，处理前台连接和请求

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::Notify;
use tokio::time::interval;

use super::handler::Handler;
use crate::protocol::{Request, Response};
use crate::store::{DocumentStore, EntryStore};
use crate::config::{default_data_dir, StoreConfig};

/// Relay 配置
#[derive(Debug, Clone)]
pub struct RelayConfig {
    /// 数据目录（默认 ~/.annotation-relay）
    pub data_dir: PathBuf,
    /// 空闲超时（秒），0 表示不自动退出
    pub idle_timeout_secs: u64,
    /// 单次存储调用超时（毫秒）
    pub store_timeout_ms: u64,
    /// 存储层是否强制 title 唯一
    pub unique_titles: bool,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            idle_timeout_secs: 300,
            store_timeout_ms: 10_000,
            unique_titles: true,
        }
    }
}

impl RelayConfig {
    /// 从环境变量创建配置
    ///
    /// - `ANNOTATION_RELAY_DIR`: 数据目录
    /// - `ANNOTATION_IDLE_TIMEOUT_SECS`: 空闲超时
    /// - `ANNOTATION_STORE_TIMEOUT_MS`: 存储调用超时
    /// - `ANNOTATION_UNIQUE_TITLES`: 唯一约束开关
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let env_u64 = |key: &str, default: u64| {
            std::env::var(key)
                .ok()
                .and_then(|v| v.trim().parse().ok())
                .unwrap_or(default)
        };

        Self {
            idle_timeout_secs: env_u64("ANNOTATION_IDLE_TIMEOUT_SECS", defaults.idle_timeout_secs),
            store_timeout_ms: env_u64("ANNOTATION_STORE_TIMEOUT_MS", defaults.store_timeout_ms),
            unique_titles: StoreConfig::from_env().unique_titles,
            ..defaults
        }
    }

    /// Socket 路径
    pub fn socket_path(&self) -> PathBuf {
        self.data_dir.join("relay.sock")
    }

    /// PID 文件路径
    pub fn pid_path(&self) -> PathBuf {
        self.data_dir.join("relay.pid")
    }

    /// 数据库路径
    pub fn db_path(&self) -> PathBuf {
        self.data_dir.join("db").join("entries.db")
    }

    /// 存储配置
    pub fn store_config(&self) -> StoreConfig {
        StoreConfig::local(self.db_path()).with_unique_titles(self.unique_titles)
    }
}

/// Relay 服务
pub struct Relay {
    config: RelayConfig,
    handler: Arc<Handler>,
    connections: AtomicUsize,
    shutdown: Notify,
}

impl Relay {
    /// 创建 Relay（连接默认 SQLite 存储）
    pub fn new(config: RelayConfig) -> Result<Self> {
        fs::create_dir_all(&config.data_dir).context("创建数据目录失败")?;

        let store = EntryStore::connect(config.store_config()).context("连接存储失败")?;
        Ok(Self::with_store(config, Arc::new(store)))
    }

    /// 使用指定存储创建 Relay
    pub fn with_store(config: RelayConfig, store: Arc<dyn DocumentStore>) -> Self {
        let handler = Arc::new(Handler::new(
            store,
            Duration::from_millis(config.store_timeout_ms),
        ));

        Self {
            config,
            handler,
            connections: AtomicUsize::new(0),
            shutdown: Notify::new(),
        }
    }

    /// 当前连接数
    pub fn connection_count(&self) -> usize {
        self.connections.load(Ordering::Relaxed)
    }

    /// 运行 Relay
    pub async fn run(self: Arc<Self>) -> Result<()> {
        fs::create_dir_all(&self.config.data_dir).context("创建数据目录失败")?;
        self.write_pid_file()?;

        // 清理旧的 socket 文件
        let socket_path = self.config.socket_path();
        if socket_path.exists() {
            fs::remove_file(&socket_path)?;
        }

        let listener = UnixListener::bind(&socket_path).context("绑定 socket 失败")?;
        fs::set_permissions(&socket_path, fs::Permissions::from_mode(0o600))?;

        tracing::info!("🚀 Relay 启动: {:?}", socket_path);

        if self.config.idle_timeout_secs > 0 {
            let relay = self.clone();
            tokio::spawn(async move {
                relay.idle_checker().await;
            });
        }

        loop {
            tokio::select! {
                result = listener.accept() => {
                    match result {
                        Ok((stream, _)) => {
                            let relay = self.clone();
                            tokio::spawn(async move {
                                if let Err(e) = relay.handle_connection(stream).await {
                                    tracing::error!("处理连接失败: {}", e);
                                }
                            });
                        }
                        Err(e) => {
                            tracing::error!("接受连接失败: {}", e);
                        }
                    }
                }
                _ = self.shutdown.notified() => {
                    // 通知发出后可能又有新连接进来
                    if self.connection_count() == 0 {
                        tracing::info!(
                            "⏰ 空闲超时 ({}s)，退出",
                            self.config.idle_timeout_secs
                        );
                        break;
                    }
                }
                _ = tokio::signal::ctrl_c() => {
                    tracing::info!("收到中断信号，准备退出...");
                    break;
                }
            }
        }

        self.cleanup();
        Ok(())
    }

    /// 处理单个连接（同一连接内按到达顺序逐条处理）
    async fn handle_connection(&self, stream: UnixStream) -> Result<()> {
        let (reader, mut writer) = stream.into_split();
        let mut reader = BufReader::new(reader);

        let conn_id = self.connections.fetch_add(1, Ordering::Relaxed) + 1;
        tracing::debug!("📥 新连接: active={}", conn_id);

        let mut line = String::new();
        let result: Result<()> = loop {
            line.clear();
            match reader.read_line(&mut line).await {
                Ok(0) => break Ok(()),
                Ok(_) => {
                    if line.trim().is_empty() {
                        continue;
                    }

                    let response = match serde_json::from_str::<Request>(&line) {
                        Ok(request) => {
                            let action = request.action();
                            let response = self.handler.handle(request).await;
                            tracing::debug!("↩️ {} 已响应", action);
                            response
                        }
                        Err(e) => {
                            tracing::warn!("解析请求失败: {}", e);
                            Response::channel_error(format!("Invalid request: {}", e))
                        }
                    };

                    let resp_json = match serde_json::to_string(&response) {
                        Ok(json) => json,
                        Err(e) => break Err(e.into()),
                    };
                    if let Err(e) = writer.write_all(format!("{}\n", resp_json).as_bytes()).await {
                        tracing::debug!("写回响应失败: {}", e);
                        break Ok(());
                    }
                }
                Err(e) => {
                    tracing::error!("读取失败: {}", e);
                    break Ok(());
                }
            }
        };

        let remaining = self.connections.fetch_sub(1, Ordering::Relaxed) - 1;
        tracing::debug!("📤 连接关闭: active={}", remaining);

        result
    }

    /// 空闲检测
    async fn idle_checker(&self) {
        let mut check_interval = interval(Duration::from_secs(5));
        let mut idle_count = 0u64;
        let idle_threshold = (self.config.idle_timeout_secs / 5).max(1);

        loop {
            check_interval.tick().await;

            if self.connection_count() > 0 {
                idle_count = 0;
            } else {
                idle_count += 1;
                if idle_count >= idle_threshold {
                    self.shutdown.notify_one();
                }
            }
        }
    }

    /// 写入 PID 文件
    fn write_pid_file(&self) -> Result<()> {
        let pid = std::process::id();
        let pid_path = self.config.pid_path();
        fs::write(&pid_path, pid.to_string())?;
        fs::set_permissions(&pid_path, fs::Permissions::from_mode(0o600))?;
        tracing::debug!("📝 写入 PID 文件: {} (pid={})", pid_path.display(), pid);
        Ok(())
    }

    /// 清理资源
    fn cleanup(&self) {
        let socket_path = self.config.socket_path();
        if socket_path.exists() {
            let _ = fs::remove_file(&socket_path);
        }

        let pid_path = self.config.pid_path();
        if pid_path.exists() {
            let _ = fs::remove_file(&pid_path);
        }

        tracing::info!("🧹 Relay 清理完成");
    }
}

/// 检查 Relay 是否正在运行
pub fn is_relay_running(config: &RelayConfig) -> bool {
    crate::pidfile::pid_alive(&config.pid_path()).is_some()
}

/// 清理残留的 Relay 状态
pub fn cleanup_stale_relay(config: &RelayConfig) -> Result<()> {
    let socket_path = config.socket_path();
    let pid_path = config.pid_path();

    if socket_path.exists() {
        fs::remove_file(&socket_path)?;
        tracing::debug!("🧹 删除残留 socket: {:?}", socket_path);
    }

    if pid_path.exists() {
        fs::remove_file(&pid_path)?;
        tracing::debug!("🧹 删除残留 PID 文件: {:?}", pid_path);
    }

    Ok(())
}
