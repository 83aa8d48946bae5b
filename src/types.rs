//! 数据类型定义

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// 真伪标签
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Label {
    #[default]
    Bonafide,
    Deepfake,
}

impl Label {
    /// 由勾选框推导标签
    pub fn from_checked(checked: bool) -> Self {
        if checked {
            Label::Deepfake
        } else {
            Label::Bonafide
        }
    }

    /// 推导标签：标题含 "AI" 时强制为 deepfake
    pub fn derive(checked: bool, title: &str) -> Self {
        if title_forces_deepfake(title) {
            Label::Deepfake
        } else {
            Label::from_checked(checked)
        }
    }

    pub fn is_deepfake(self) -> bool {
        self == Label::Deepfake
    }
}

impl FromStr for Label {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "bonafide" => Ok(Label::Bonafide),
            "deepfake" => Ok(Label::Deepfake),
            _ => Err(format!("Invalid label: {}", s)),
        }
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Label::Bonafide => write!(f, "bonafide"),
            Label::Deepfake => write!(f, "deepfake"),
        }
    }
}

/// 标题是否强制 deepfake（大小写敏感，只认 "AI"）
pub fn title_forces_deepfake(title: &str) -> bool {
    title.contains("AI")
}

/// 从 URL 推导平台名
///
/// 去掉 scheme 和 `www.` 后取第一个 `.` 之前的部分：
/// `https://www.example.com/page` → `example`，`http://sub.example.com` → `sub`。
/// 每个前缀只去掉第一次出现。
pub fn derive_platform(url: &str) -> String {
    let mut rest = url.replacen("http://", "", 1);
    rest = rest.replacen("https://", "", 1);
    rest = rest.replacen("www.", "", 1);
    rest.split('.').next().unwrap_or_default().to_string()
}

/// 当前毫秒时间戳
pub fn current_time_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// 活动标签页（由前台的标签页检查器提供）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActiveTab {
    pub url: String,
    pub title: String,
}

/// 标注条目（持久化单元）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entry {
    pub url: String,
    /// 去重键
    pub title: String,
    pub platform: String,
    pub singer: String,
    pub model: String,
    pub language: String,
    #[serde(rename = "bonafide_or_deepfake")]
    pub label: Label,
    /// 提交时刻的毫秒时间戳
    pub submission_time: i64,
}

impl Entry {
    /// 提取草稿部分（不含 url / title / submission_time）
    pub fn draft(&self) -> Draft {
        Draft {
            singer: self.singer.clone(),
            model: self.model.clone(),
            language: self.language.clone(),
            label: self.label,
        }
    }
}

/// 草稿：上一次提交的分类字段，本地缓存用于预填
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Draft {
    #[serde(default)]
    pub singer: String,
    #[serde(default)]
    pub model: String,
    #[serde(default)]
    pub language: String,
    #[serde(rename = "bonafide_or_deepfake", default)]
    pub label: Label,
}

/// 已存储的条目
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntryRecord {
    pub id: String,
    #[serde(flatten)]
    pub entry: Entry,
    pub created_at: i64,
}
