//! IPC 协议定义
//!
//! 通信方式：Unix Socket + JSONL（每条消息一行 JSON + '\n'）
//!
//! | action           | 请求                | 响应                                   |
//! |------------------|---------------------|----------------------------------------|
//! | `fetchData`      | -                   | `{ data: { messages } }` / `{ error }` |
//! | `addData`        | `{ data: Entry }`   | `{ id }` / `{ error }`                 |
//! | `checkDuplicate` | `{ title }`         | `true` / `false` / `{ error }`         |

use serde::{Deserialize, Serialize};

use crate::error::{Error, ErrorKind, Result};
use crate::types::Entry;

/// 请求类型（前台 → Relay）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action")]
pub enum Request {
    /// 读取 message 集合
    #[serde(rename = "fetchData")]
    FetchData,

    /// 写入一条 entry（不做去重）
    #[serde(rename = "addData")]
    AddData { data: Entry },

    /// 检查标题是否已存在
    #[serde(rename = "checkDuplicate")]
    CheckDuplicate { title: String },
}

impl Request {
    /// action 名称（日志用）
    pub fn action(&self) -> &'static str {
        match self {
            Request::FetchData => "fetchData",
            Request::AddData { .. } => "addData",
            Request::CheckDuplicate { .. } => "checkDuplicate",
        }
    }
}

/// 响应类型（Relay → 前台）
///
/// 各 action 的响应形状不同，无外层 tag。
/// 反序列化按声明顺序尝试，`Error` 必须在最前。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Response {
    /// 错误
    Error(ErrorBody),

    /// fetchData 结果
    Fetched { data: FetchedData },

    /// addData 结果
    Added { id: String },

    /// checkDuplicate 结果
    Duplicate(bool),
}

/// 错误响应体
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
    /// 错误类别（老版本 Relay 不下发）
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<ErrorKind>,
}

/// fetchData 数据
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FetchedData {
    pub messages: Vec<serde_json::Value>,
}

impl Response {
    /// 由库错误构造错误响应
    pub fn error(err: &Error) -> Self {
        Response::Error(ErrorBody {
            error: err.to_string(),
            kind: Some(err.kind()),
        })
    }

    /// 通道层错误（请求无法解析等）
    pub fn channel_error(message: impl Into<String>) -> Self {
        Response::Error(ErrorBody {
            error: message.into(),
            kind: Some(ErrorKind::Channel),
        })
    }

    /// 解析 checkDuplicate 响应
    pub fn into_duplicate(self) -> Result<bool> {
        match self {
            Response::Duplicate(found) => Ok(found),
            other => Err(other.unexpected("checkDuplicate")),
        }
    }

    /// 解析 addData 响应
    pub fn into_added_id(self) -> Result<String> {
        match self {
            Response::Added { id } if !id.is_empty() => Ok(id),
            Response::Added { .. } => Err(Error::StoreInsert("Relay 返回了空 ID".into())),
            other => Err(other.unexpected("addData")),
        }
    }

    /// 解析 fetchData 响应
    pub fn into_messages(self) -> Result<Vec<serde_json::Value>> {
        match self {
            Response::Fetched { data } => Ok(data.messages),
            other => Err(other.unexpected("fetchData")),
        }
    }

    fn unexpected(self, action: &str) -> Error {
        match self {
            Response::Error(ErrorBody { error, kind }) => Error::from_wire(kind, error),
            other => Error::Channel(format!("{} 响应异常: {:?}", action, other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Label;

    fn entry() -> Entry {
        Entry {
            url: "https://www.foo.com".to_string(),
            title: "Song X".to_string(),
            platform: "foo".to_string(),
            singer: "A".to_string(),
            model: "B".to_string(),
            language: "English".to_string(),
            label: Label::Bonafide,
            submission_time: 1,
        }
    }

    #[test]
    fn test_request_action_tag() {
        let json = serde_json::to_value(Request::FetchData).unwrap();
        assert_eq!(json, serde_json::json!({"action": "fetchData"}));

        let json = serde_json::to_value(Request::CheckDuplicate {
            title: "Song X".to_string(),
        })
        .unwrap();
        assert_eq!(json, serde_json::json!({"action": "checkDuplicate", "title": "Song X"}));

        let json = serde_json::to_value(Request::AddData { data: entry() }).unwrap();
        assert_eq!(json["action"], "addData");
        assert_eq!(json["data"]["title"], "Song X");
        assert_eq!(json["data"]["bonafide_or_deepfake"], "bonafide");
    }

    #[test]
    fn test_request_from_extension_json() {
        // 扩展发送的原始消息
        let json = r#"{"action":"addData","data":{"url":"https://www.foo.com","title":"Song X","platform":"foo","singer":"A","model":"B","language":"English","bonafide_or_deepfake":"deepfake","submission_time":1700000000000}}"#;
        let request: Request = serde_json::from_str(json).unwrap();
        match request {
            Request::AddData { data } => {
                assert_eq!(data.label, Label::Deepfake);
                assert_eq!(data.submission_time, 1700000000000);
            }
            _ => panic!("Expected AddData"),
        }

        let unknown = serde_json::from_str::<Request>(r#"{"action":"deleteData"}"#);
        assert!(unknown.is_err());
    }

    #[test]
    fn test_response_shapes() {
        assert_eq!(serde_json::to_string(&Response::Duplicate(true)).unwrap(), "true");
        assert_eq!(
            serde_json::to_value(Response::Added { id: "abc123".into() }).unwrap(),
            serde_json::json!({"id": "abc123"})
        );
        assert_eq!(
            serde_json::to_value(Response::Fetched { data: FetchedData::default() }).unwrap(),
            serde_json::json!({"data": {"messages": []}})
        );

        let err = Response::error(&Error::StoreInsert("quota exceeded".into()));
        let json = serde_json::to_value(&err).unwrap();
        assert_eq!(json["kind"], "store_insert");
        assert!(json["error"].as_str().unwrap().contains("quota exceeded"));
    }

    #[test]
    fn test_response_parse() {
        let r: Response = serde_json::from_str("false").unwrap();
        assert_eq!(r.into_duplicate().unwrap(), false);

        let r: Response = serde_json::from_str(r#"{"id":"abc123"}"#).unwrap();
        assert_eq!(r.into_added_id().unwrap(), "abc123");

        let r: Response = serde_json::from_str(r#"{"data":{"messages":[{"text":"hi"}]}}"#).unwrap();
        let messages = r.into_messages().unwrap();
        assert_eq!(messages[0]["text"], "hi");

        // 不带 kind 的错误
        let r: Response = serde_json::from_str(r#"{"error":"permission-denied"}"#).unwrap();
        let err = r.into_duplicate().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::StoreQuery);
        assert_eq!(err.to_string(), "permission-denied");
    }

    #[test]
    fn test_mismatched_response_is_channel_error() {
        let err = Response::Duplicate(true).into_added_id().unwrap_err();
        assert!(matches!(err, Error::Channel(_)));

        let err = Response::Added { id: String::new() }.into_added_id().unwrap_err();
        assert!(matches!(err, Error::StoreInsert(_)));
    }
}
