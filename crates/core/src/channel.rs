//! Wire types of the request/response method channel

use crate::dispatcher::Command;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::str::FromStr;

/// A single request from the UI layer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MethodCall {
    /// Opaque correlation id echoed back in the response
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<Value>,
    pub method: String,
}

impl MethodCall {
    pub fn new(method: impl Into<String>) -> Self {
        Self {
            id: None,
            method: method.into(),
        }
    }

    pub fn with_id(mut self, id: impl Into<Value>) -> Self {
        self.id = Some(id.into());
        self
    }
}

/// Methods the bridge recognizes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    CheckPermission,
    OpenPermissionSettings,
    GetStatus,
    GetMetadata,
    GetPosition,
    IsPlaying,
    ListSessions,
    Command(Command),
}

impl Method {
    pub fn name(&self) -> &'static str {
        match self {
            Method::CheckPermission => "checkPermission",
            Method::OpenPermissionSettings => "openPermissionSettings",
            Method::GetStatus => "getStatus",
            Method::GetMetadata => "getMetadata",
            Method::GetPosition => "getPosition",
            Method::IsPlaying => "isPlaying",
            Method::ListSessions => "listSessions",
            Method::Command(command) => command.method_name(),
        }
    }

    /// The "nothing to report" answer for this method, used when a call
    /// cannot complete in time.
    pub fn fallback_reply(&self) -> MethodReply {
        let value = match self {
            Method::GetStatus | Method::GetMetadata => Value::Null,
            Method::CheckPermission | Method::IsPlaying | Method::Command(_) => Value::Bool(false),
            Method::OpenPermissionSettings => Value::Bool(true),
            Method::GetPosition => Value::from(0u64),
            Method::ListSessions => Value::Array(Vec::new()),
        };
        MethodReply::Success(value)
    }
}

/// Error type for method names the bridge does not implement
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UnknownMethod(pub String);

impl std::fmt::Display for UnknownMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "method not implemented: {}", self.0)
    }
}

impl std::error::Error for UnknownMethod {}

impl FromStr for Method {
    type Err = UnknownMethod;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "checkPermission" => Ok(Method::CheckPermission),
            "openPermissionSettings" => Ok(Method::OpenPermissionSettings),
            "getStatus" => Ok(Method::GetStatus),
            "getMetadata" => Ok(Method::GetMetadata),
            "getPosition" => Ok(Method::GetPosition),
            "isPlaying" => Ok(Method::IsPlaying),
            "listSessions" => Ok(Method::ListSessions),
            other => other
                .parse::<Command>()
                .map(Method::Command)
                .map_err(|_| UnknownMethod(other.to_string())),
        }
    }
}

/// Outcome of a handled call, before it is put on the wire
#[derive(Debug, Clone, PartialEq)]
pub enum MethodReply {
    Success(Value),
    NotImplemented,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ResponseBody {
    Result(Value),
    NotImplemented(bool),
    Error(ErrorBody),
}

/// One line written back to the UI layer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MethodResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<Value>,
    #[serde(flatten)]
    pub body: ResponseBody,
}

impl MethodResponse {
    pub fn from_reply(id: Option<Value>, reply: MethodReply) -> Self {
        let body = match reply {
            MethodReply::Success(value) => ResponseBody::Result(value),
            MethodReply::NotImplemented => ResponseBody::NotImplemented(true),
        };
        Self { id, body }
    }

    pub fn error(id: Option<Value>, code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            id,
            body: ResponseBody::Error(ErrorBody {
                code: code.into(),
                message: message.into(),
            }),
        }
    }
}

/// Parse one request line. Malformed input yields the response to send back.
pub fn parse_request(line: &str) -> Result<MethodCall, MethodResponse> {
    serde_json::from_str(line.trim())
        .map_err(|e| MethodResponse::error(None, "bad_request", e.to_string()))
}
