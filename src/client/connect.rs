//! Relay Client 连接逻辑
//!
//! 实现连接或启动 Relay 的逻辑

use std::fs;
use std::path::PathBuf;
use std::process::{Command, Stdio};
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::unix::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::UnixStream;
use tokio::time::{sleep, timeout};

use crate::config::default_data_dir;
use crate::error::{Error, Result};
use crate::protocol::{Request, Response};
use crate::types::Entry;

/// Client 配置
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// 数据目录（默认 ~/.annotation-relay）
    pub data_dir: PathBuf,
    /// 组件名称（日志用）
    pub component: String,
    /// 连接重试次数
    pub connect_retries: u32,
    /// 重试间隔（毫秒）
    pub retry_interval_ms: u64,
    /// 等待单个响应的超时（毫秒）
    pub request_timeout_ms: u64,
    /// Relay 二进制路径覆盖（优先于默认路径）
    pub relay_binary_override: Option<PathBuf>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            component: "unknown".to_string(),
            connect_retries: 3,
            retry_interval_ms: 500,
            request_timeout_ms: 15_000,
            relay_binary_override: None,
        }
    }
}

impl ClientConfig {
    /// 创建新的配置
    pub fn new(component: &str) -> Self {
        Self {
            component: component.to_string(),
            ..Default::default()
        }
    }

    /// 设置 Relay 二进制路径
    pub fn with_relay_binary(mut self, path: PathBuf) -> Self {
        self.relay_binary_override = Some(path);
        self
    }

    /// Socket 路径
    pub fn socket_path(&self) -> PathBuf {
        self.data_dir.join("relay.sock")
    }

    /// PID 文件路径
    pub fn pid_path(&self) -> PathBuf {
        self.data_dir.join("relay.pid")
    }

    /// 草稿文件路径
    pub fn drafts_path(&self) -> PathBuf {
        self.data_dir.join("storage.json")
    }

    /// 查找 Relay 二进制
    ///
    /// 查找顺序：
    /// 1. relay_binary_override（配置覆盖）
    /// 2. RELAY_BINARY_PATH 环境变量
    /// 3. 当前可执行文件同目录
    /// 4. Cargo target 目录（开发阶段）
    pub fn find_relay_binary(&self) -> Option<PathBuf> {
        if let Some(ref path) = self.relay_binary_override {
            if path.exists() {
                return Some(path.clone());
            }
        }

        if let Ok(path) = std::env::var("RELAY_BINARY_PATH") {
            let path = PathBuf::from(path);
            if path.exists() {
                return Some(path);
            }
        }

        if let Ok(exe_path) = std::env::current_exe() {
            if let Some(dir) = exe_path.parent() {
                let sibling = dir.join("annotation-relay");
                if sibling.exists() {
                    return Some(sibling);
                }
            }
        }

        for profile in ["release", "debug"] {
            let cargo_path = PathBuf::from(format!("target/{}/annotation-relay", profile));
            if cargo_path.exists() {
                return Some(cargo_path);
            }
        }

        None
    }
}

/// Relay Client
///
/// 一个连接上的请求严格一问一答。响应超时后连接作废，
/// 之后的请求直接返回 [`Error::Channel`]，避免读到上一个请求的迟到响应。
pub struct RelayClient {
    config: ClientConfig,
    reader: BufReader<OwnedReadHalf>,
    writer: OwnedWriteHalf,
    broken: bool,
}

impl RelayClient {
    /// 连接已在运行的 Relay（按配置重试）
    pub async fn connect(config: ClientConfig) -> Result<Self> {
        let socket_path = config.socket_path();
        let mut last_err = None;

        for attempt in 1..=config.connect_retries.max(1) {
            match UnixStream::connect(&socket_path).await {
                Ok(stream) => {
                    tracing::debug!(
                        "连接 Relay 成功 (component={}, attempt={})",
                        config.component,
                        attempt
                    );
                    return Ok(Self::from_stream(config, stream));
                }
                Err(e) => {
                    tracing::debug!("连接 Relay 失败 (attempt={}): {}", attempt, e);
                    last_err = Some(e);
                    if attempt < config.connect_retries {
                        sleep(Duration::from_millis(config.retry_interval_ms)).await;
                    }
                }
            }
        }

        Err(Error::Channel(format!(
            "无法连接 Relay {:?}: {}",
            socket_path,
            last_err.map(|e| e.to_string()).unwrap_or_default()
        )))
    }

    fn from_stream(config: ClientConfig, stream: UnixStream) -> Self {
        let (reader, writer) = stream.into_split();
        Self {
            config,
            reader: BufReader::new(reader),
            writer,
            broken: false,
        }
    }

    /// 发送请求并等待响应
    pub async fn request(&mut self, request: &Request) -> Result<Response> {
        if self.broken {
            return Err(Error::Channel("连接已失效，请重新连接".into()));
        }

        let request_line = format!("{}\n", serde_json::to_string(request)?);
        let timeout_ms = self.config.request_timeout_ms;

        let exchange = async {
            self.writer
                .write_all(request_line.as_bytes())
                .await
                .map_err(|e| Error::Channel(format!("发送请求失败: {}", e)))?;

            let mut line = String::new();
            let n = self
                .reader
                .read_line(&mut line)
                .await
                .map_err(|e| Error::Channel(format!("读取响应失败: {}", e)))?;
            if n == 0 {
                return Err(Error::Channel("Relay 关闭了连接，未收到响应".into()));
            }

            serde_json::from_str::<Response>(line.trim())
                .map_err(|e| Error::Channel(format!("响应无法解析: {}", e)))
        };

        let result = match timeout(Duration::from_millis(timeout_ms), exchange).await {
            Ok(result) => result,
            Err(_) => Err(Error::Timeout(timeout_ms)),
        };

        if matches!(result, Err(Error::Channel(_)) | Err(Error::Timeout(_))) {
            self.broken = true;
        }

        tracing::debug!("{} → {:?}", request.action(), result.as_ref().map(|_| "ok"));
        result
    }

    /// 检查标题是否已存在
    pub async fn check_duplicate(&mut self, title: &str) -> Result<bool> {
        self.request(&Request::CheckDuplicate {
            title: title.to_string(),
        })
        .await?
        .into_duplicate()
    }

    /// 写入 entry，返回新文档 ID
    pub async fn add_data(&mut self, entry: &Entry) -> Result<String> {
        self.request(&Request::AddData {
            data: entry.clone(),
        })
        .await?
        .into_added_id()
    }

    /// 读取 message 集合
    pub async fn fetch_data(&mut self) -> Result<Vec<serde_json::Value>> {
        self.request(&Request::FetchData).await?.into_messages()
    }
}

/// 连接或启动 Relay
///
/// 连接流程：
/// 1. 尝试连接 socket（按配置重试）
/// 2. 连接失败 → 清理残留状态
/// 3. 启动 Relay
/// 4. 等待 Relay ready → 连接
pub async fn connect_or_start_relay(config: ClientConfig) -> Result<RelayClient> {
    let socket_path = config.socket_path();

    // 1. 尝试连接
    match RelayClient::connect(config.clone()).await {
        Ok(client) => return Ok(client),
        Err(e) => tracing::debug!("{}", e),
    }

    // 2. 进程在但 socket 不在，认为卡死
    if is_relay_stuck(&config) {
        tracing::warn!("检测到 Relay 卡死，清理残留状态...");
        cleanup_stale(&config)?;
    }

    // 3. 启动 Relay
    start_relay(&config)?;

    // 4. 等待 ready
    for attempt in 1..=10 {
        sleep(Duration::from_millis(200)).await;

        if let Ok(stream) = UnixStream::connect(&socket_path).await {
            tracing::info!("Relay 启动成功，已连接");
            return Ok(RelayClient::from_stream(config, stream));
        }

        tracing::debug!("等待 Relay ready (attempt={})", attempt);
    }

    Err(Error::Channel("启动 Relay 超时".into()))
}

/// 检查 Relay 是否卡死
fn is_relay_stuck(config: &ClientConfig) -> bool {
    crate::pidfile::pid_alive(&config.pid_path()).is_some() && !config.socket_path().exists()
}

/// 清理残留状态
fn cleanup_stale(config: &ClientConfig) -> Result<()> {
    let socket_path = config.socket_path();
    let pid_path = config.pid_path();

    if let Some(pid) = crate::pidfile::read_pid(&pid_path) {
        unsafe {
            libc::kill(pid, libc::SIGKILL);
        }
        tracing::debug!("杀死残留 Relay 进程: pid={}", pid);
    }

    if socket_path.exists() {
        fs::remove_file(&socket_path)?;
    }

    if pid_path.exists() {
        fs::remove_file(&pid_path)?;
    }

    Ok(())
}

/// 启动 Relay
fn start_relay(config: &ClientConfig) -> Result<()> {
    let relay_path = config.find_relay_binary().ok_or_else(|| {
        Error::Config(format!(
            "找不到 Relay 二进制。\n\
             尝试过的路径：\n\
             - 配置覆盖: {:?}\n\
             - 环境变量 RELAY_BINARY_PATH: {:?}\n\
             - 当前可执行文件同目录\n\
             - Cargo target 目录",
            config.relay_binary_override,
            std::env::var("RELAY_BINARY_PATH").ok(),
        ))
    })?;

    tracing::info!("启动 Relay: {:?}", relay_path);

    Command::new(&relay_path)
        .env("ANNOTATION_RELAY_DIR", &config.data_dir)
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()?;

    Ok(())
}
