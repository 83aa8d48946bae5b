//! 前台去重编排
//!
//! 打开页面时先 checkDuplicate，已存在则直接进入终态；
//! 否则用缓存草稿预填表单。提交时先落本地草稿，再 addData。

use std::fs;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;

use super::connect::RelayClient;
use crate::error::Result;
use crate::types::{
    current_time_ms, derive_platform, title_forces_deepfake, ActiveTab, Draft, Entry, Label,
};

/// 草稿在本地存储中的键
pub const DRAFT_KEY: &str = "datum";

/// 活动标签页检查器
pub trait TabInspector {
    fn active_tab(&self) -> Result<ActiveTab>;
}

impl TabInspector for ActiveTab {
    fn active_tab(&self) -> Result<ActiveTab> {
        Ok(self.clone())
    }
}

/// 本地草稿存储（只有前台读写）
pub trait DraftStore {
    fn load(&self) -> Result<Option<Draft>>;
    fn save(&self, draft: &Draft) -> Result<()>;
}

/// Relay 访问接口
#[allow(async_fn_in_trait)]
pub trait RelayApi {
    async fn check_duplicate(&mut self, title: &str) -> Result<bool>;
    async fn add_data(&mut self, entry: &Entry) -> Result<String>;
}

impl RelayApi for RelayClient {
    async fn check_duplicate(&mut self, title: &str) -> Result<bool> {
        RelayClient::check_duplicate(self, title).await
    }

    async fn add_data(&mut self, entry: &Entry) -> Result<String> {
        RelayClient::add_data(self, entry).await
    }
}

/// JSON 文件草稿存储
///
/// 文件内容是一个键值对象，草稿放在 `datum` 键下，其他键原样保留。
pub struct FileDraftStore {
    path: PathBuf,
}

impl FileDraftStore {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_all(&self) -> Result<serde_json::Map<String, serde_json::Value>> {
        match fs::read_to_string(&self.path) {
            Ok(content) if content.trim().is_empty() => Ok(serde_json::Map::new()),
            Ok(content) => Ok(serde_json::from_str(&content)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(serde_json::Map::new()),
            Err(e) => Err(e.into()),
        }
    }
}

impl DraftStore for FileDraftStore {
    fn load(&self) -> Result<Option<Draft>> {
        let mut all = self.read_all()?;
        match all.remove(DRAFT_KEY) {
            Some(value) => Ok(Some(serde_json::from_value(value)?)),
            None => Ok(None),
        }
    }

    fn save(&self, draft: &Draft) -> Result<()> {
        let mut all = self.read_all()?;
        all.insert(DRAFT_KEY.to_string(), serde_json::to_value(draft)?);

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        // 先写临时文件再 rename
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, serde_json::to_vec_pretty(&all)?)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

/// 内存草稿存储
#[derive(Default)]
pub struct MemoryDraftStore {
    draft: Mutex<Option<Draft>>,
}

impl DraftStore for MemoryDraftStore {
    fn load(&self) -> Result<Option<Draft>> {
        Ok(self.draft.lock().clone())
    }

    fn save(&self, draft: &Draft) -> Result<()> {
        *self.draft.lock() = Some(draft.clone());
        Ok(())
    }
}

/// 表单
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Form {
    pub url: String,
    pub title: String,
    pub platform: String,
    pub singer: String,
    pub model: String,
    pub language: String,
    /// bonafide_or_deepfake 勾选框
    pub deepfake: bool,
}

impl Form {
    /// 按标签页和草稿预填
    pub fn prefill(tab: &ActiveTab, draft: Option<&Draft>) -> Self {
        let mut form = Self {
            url: tab.url.clone(),
            title: tab.title.clone(),
            platform: derive_platform(&tab.url),
            singer: String::new(),
            model: String::new(),
            language: String::new(),
            deepfake: title_forces_deepfake(&tab.title),
        };

        if let Some(draft) = draft {
            form.singer = draft.singer.clone();
            form.model = draft.model.clone();
            form.language = draft.language.clone();
            form.deepfake = form.deepfake || draft.label.is_deepfake();
        }

        form
    }

    /// 构造 Entry（submission_time 取当前时刻）
    pub fn to_entry(&self) -> Entry {
        Entry {
            url: self.url.clone(),
            title: self.title.clone(),
            platform: self.platform.clone(),
            singer: self.singer.clone(),
            model: self.model.clone(),
            language: self.language.clone(),
            label: Label::derive(self.deepfake, &self.title),
            submission_time: current_time_ms(),
        }
    }
}

/// 页面状态
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageState {
    /// 标题已有 entry（终态，不提供表单）
    AlreadyExists,
    /// 可编辑；`error` 为上一次提交失败的原因
    Editing { form: Form, error: Option<String> },
    /// 本次提交已写入（终态）
    Created { id: String },
}

impl PageState {
    /// 是否为终态
    pub fn is_terminal(&self) -> bool {
        !matches!(self, PageState::Editing { .. })
    }
}

/// 前台编排器
///
/// 记住当前页面状态：只有处于同一标题的 `Editing` 时才会真正 addData，
/// 进入终态后本次页面加载不再写入。
pub struct Foreground<R, D> {
    relay: R,
    drafts: D,
    state: Option<PageState>,
}

impl<R: RelayApi, D: DraftStore> Foreground<R, D> {
    pub fn new(relay: R, drafts: D) -> Self {
        Self {
            relay,
            drafts,
            state: None,
        }
    }

    pub fn relay_mut(&mut self) -> &mut R {
        &mut self.relay
    }

    pub fn drafts(&self) -> &D {
        &self.drafts
    }

    /// 当前页面状态（尚未打开页面时为 None）
    pub fn state(&self) -> Option<&PageState> {
        self.state.as_ref()
    }

    /// 打开当前活动标签页
    pub async fn open_active<T: TabInspector>(&mut self, inspector: &T) -> Result<PageState> {
        let tab = inspector.active_tab()?;
        self.open(&tab).await
    }

    /// 打开页面：去重检查 → 终态或预填表单
    ///
    /// checkDuplicate 失败时返回错误，不提供表单。
    pub async fn open(&mut self, tab: &ActiveTab) -> Result<PageState> {
        self.state = None;

        if self.relay.check_duplicate(&tab.title).await? {
            tracing::info!("📌 Entry 已存在: title={:?}", tab.title);
            return Ok(self.enter(PageState::AlreadyExists));
        }

        // 草稿读不出来不影响录入
        let draft = match self.drafts.load() {
            Ok(draft) => draft,
            Err(e) => {
                tracing::warn!("读取草稿失败: {}", e);
                None
            }
        };

        Ok(self.enter(PageState::Editing {
            form: Form::prefill(tab, draft.as_ref()),
            error: None,
        }))
    }

    /// 提交表单：先保存草稿，再 addData
    ///
    /// 失败时保持可编辑状态并带上错误信息，表单内容原样保留。
    /// 页面已在终态时原样返回终态；未打开页面或标题不符时拒绝提交。
    pub async fn submit(&mut self, form: Form) -> PageState {
        match &self.state {
            Some(PageState::Editing { form: current, .. }) if current.title == form.title => {}
            Some(state) if state.is_terminal() => {
                tracing::debug!("页面已在终态，忽略提交: title={:?}", form.title);
                return state.clone();
            }
            _ => {
                tracing::warn!("⚠️ 页面未打开，拒绝提交: title={:?}", form.title);
                return PageState::Editing {
                    form,
                    error: Some("页面未打开或标题不一致，请重新打开页面".to_string()),
                };
            }
        }

        let entry = form.to_entry();

        if let Err(e) = self.drafts.save(&entry.draft()) {
            tracing::warn!("保存草稿失败: {}", e);
        }

        let next = match self.relay.add_data(&entry).await {
            Ok(id) => {
                tracing::info!("✅ Entry 已提交: id={}", id);
                PageState::Created { id }
            }
            Err(e) if e.is_duplicate_title() => {
                tracing::info!("📌 Entry 已存在 (存储冲突): title={:?}", entry.title);
                PageState::AlreadyExists
            }
            Err(e) => {
                tracing::error!("❌ 提交失败: {}", e);
                PageState::Editing {
                    form,
                    error: Some(e.to_string()),
                }
            }
        };

        self.enter(next)
    }

    fn enter(&mut self, state: PageState) -> PageState {
        self.state = Some(state.clone());
        state
    }
}
