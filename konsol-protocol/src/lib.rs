// Copyright 2024 Google LLC
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use std::fmt;

use serde_derive::{Deserialize, Serialize};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// The fixed envelope version. Every message carries it and the
/// server refuses envelopes that don't.
pub const PROTOCOL_VERSION: &str = "2.0";

/// The name the server reports for itself during the initialize
/// handshake.
pub const SERVER_NAME: &str = "konsol";

/// A correlation identifier for a request/response pair.
///
/// The wire allows both integers and strings and the server must
/// echo whichever representation the client picked, so we keep the
/// two representations distinct rather than normalizing.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Hash)]
#[serde(transparent)]
pub struct RequestId(IdRepr);

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Hash)]
#[serde(untagged)]
enum IdRepr {
    Int(i64),
    Text(String),
}

impl From<i64> for RequestId {
    fn from(id: i64) -> RequestId {
        RequestId(IdRepr::Int(id))
    }
}

impl From<String> for RequestId {
    fn from(id: String) -> RequestId {
        RequestId(IdRepr::Text(id))
    }
}

impl From<&str> for RequestId {
    fn from(id: &str) -> RequestId {
        RequestId(IdRepr::Text(String::from(id)))
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.0 {
            IdRepr::Int(id) => fmt::Display::fmt(id, f),
            // Debug formatting so that `92` and `"92"` read differently
            // in logs.
            IdRepr::Text(id) => fmt::Debug::fmt(id, f),
        }
    }
}

/// The raw shape of one inbound message, before the server has decided
/// what to make of it. Every field is optional at this stage so that a
/// malformed envelope can be rejected with a structured error instead
/// of a deserialization failure.
///
/// Presence of `id` is what distinguishes a request (gets a response)
/// from a notification (does not).
#[derive(Deserialize, Debug, Clone)]
pub struct Envelope {
    #[serde(default)]
    pub jsonrpc: Option<String>,
    #[serde(default)]
    pub id: Option<RequestId>,
    #[serde(default)]
    pub method: Option<String>,
    #[serde(default)]
    pub params: Option<serde_json::Value>,
}

/// One outbound response. Exactly one of `result` and `error` is set.
///
/// A `result` of JSON null is a real result (the shutdown request
/// returns one), so `result` stays `Some(Value::Null)` in that case
/// rather than being skipped.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Response {
    pub jsonrpc: String,
    /// Echoes the request id verbatim. None serializes as null, which
    /// is what goes out when no id could be recovered from the input.
    pub id: Option<RequestId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ResponseError>,
}

impl Response {
    pub fn ok(id: RequestId, result: serde_json::Value) -> Response {
        Response {
            jsonrpc: String::from(PROTOCOL_VERSION),
            id: Some(id),
            result: Some(result),
            error: None,
        }
    }

    pub fn fail(id: Option<RequestId>, error: ResponseError) -> Response {
        Response {
            jsonrpc: String::from(PROTOCOL_VERSION),
            id,
            result: None,
            error: Some(error),
        }
    }
}

/// One outbound server->client notification. Reserved for the stream
/// methods (`konsol/stdout`, `konsol/stderr`, `konsol/status`); the
/// current server buffers output instead of streaming it, so nothing
/// emits these yet.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Notification {
    pub jsonrpc: String,
    pub method: String,
    pub params: serde_json::Value,
}

impl Notification {
    pub fn new(method: Method, params: serde_json::Value) -> Notification {
        Notification {
            jsonrpc: String::from(PROTOCOL_VERSION),
            method: String::from(method.name()),
            params,
        }
    }
}

/// The error value attached to a failed response.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ResponseError {
    pub code: i64,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

impl ResponseError {
    /// Builds an error value from a kind, falling back to the kind's
    /// canonical message when the caller has nothing better to say.
    pub fn new(kind: ErrorCode, message: Option<String>) -> ResponseError {
        ResponseError {
            code: kind.code(),
            message: message.unwrap_or_else(|| String::from(kind.default_message())),
            data: None,
        }
    }
}

/// The closed set of error kinds the protocol can report. This enum is
/// the single source of truth for both the numeric code and the default
/// message of each kind; adding a member is a protocol change.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorCode {
    /// The payload is not valid JSON.
    Parse,
    /// The JSON is valid but does not form a recognized envelope.
    InvalidRequest,
    /// The envelope names an unknown method.
    MethodNotFound,
    /// A known method was called with parameters that fail validation.
    InvalidParams,
    /// An unexpected server-side error during dispatch.
    Internal,
    /// The given session id does not identify a live session.
    SessionNotFound,
    /// The target session is currently evaluating.
    SessionBusy,
    /// The host runtime raised while booting. The numeric code is
    /// inherited from the system this protocol replaced.
    BootFailed,
    /// Reserved. No evaluation timeout is enforced yet.
    EvalTimeout,
    /// The request arrived after a shutdown request.
    ShuttingDown,
}

impl ErrorCode {
    pub fn code(self) -> i64 {
        match self {
            ErrorCode::Parse => -32700,
            ErrorCode::InvalidRequest => -32600,
            ErrorCode::MethodNotFound => -32601,
            ErrorCode::InvalidParams => -32602,
            ErrorCode::Internal => -32603,
            ErrorCode::SessionNotFound => -32001,
            ErrorCode::SessionBusy => -32002,
            ErrorCode::BootFailed => -32003,
            ErrorCode::EvalTimeout => -32004,
            ErrorCode::ShuttingDown => -32005,
        }
    }

    pub fn default_message(self) -> &'static str {
        match self {
            ErrorCode::Parse => "payload is not valid JSON",
            ErrorCode::InvalidRequest => "message is not a valid request envelope",
            ErrorCode::MethodNotFound => "method not found",
            ErrorCode::InvalidParams => "invalid parameters",
            ErrorCode::Internal => "internal error",
            ErrorCode::SessionNotFound => "session not found",
            ErrorCode::SessionBusy => "session is busy",
            ErrorCode::BootFailed => "host runtime boot failed",
            ErrorCode::EvalTimeout => "evaluation timed out",
            ErrorCode::ShuttingDown => "server is shutting down",
        }
    }
}

/// The closed set of method names the protocol recognizes. The server's
/// dispatcher matches exhaustively on this enum so a new method can't be
/// added without the compiler pointing at every place that must learn
/// about it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Method {
    Initialize,
    Shutdown,
    Exit,
    CancelRequest,
    SessionCreate,
    Eval,
    Interrupt,
    /// Server->client stream notification, reserved.
    StdoutChunk,
    /// Server->client stream notification, reserved.
    StderrChunk,
    /// Server->client status notification, reserved.
    Status,
}

impl Method {
    pub fn from_name(name: &str) -> Option<Method> {
        match name {
            "initialize" => Some(Method::Initialize),
            "shutdown" => Some(Method::Shutdown),
            "exit" => Some(Method::Exit),
            "$/cancelRequest" => Some(Method::CancelRequest),
            "konsol/session.create" => Some(Method::SessionCreate),
            "konsol/eval" => Some(Method::Eval),
            "konsol/interrupt" => Some(Method::Interrupt),
            "konsol/stdout" => Some(Method::StdoutChunk),
            "konsol/stderr" => Some(Method::StderrChunk),
            "konsol/status" => Some(Method::Status),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Method::Initialize => "initialize",
            Method::Shutdown => "shutdown",
            Method::Exit => "exit",
            Method::CancelRequest => "$/cancelRequest",
            Method::SessionCreate => "konsol/session.create",
            Method::Eval => "konsol/eval",
            Method::Interrupt => "konsol/interrupt",
            Method::StdoutChunk => "konsol/stdout",
            Method::StderrChunk => "konsol/stderr",
            Method::Status => "konsol/status",
        }
    }

    /// Notifications never produce a response. `exit` and the three
    /// stream methods are the only members of the set.
    pub fn is_notification(self) -> bool {
        matches!(
            self,
            Method::Exit | Method::StdoutChunk | Method::StderrChunk | Method::Status
        )
    }
}

/// Parameters of the `initialize` request. Everything is optional.
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct InitializeParams {
    #[serde(default)]
    pub process_id: Option<i64>,
    #[serde(default)]
    pub client_info: Option<ClientInfo>,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct ClientInfo {
    pub name: String,
    #[serde(default)]
    pub version: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct InitializeResult {
    pub server_info: ServerInfo,
    pub capabilities: Capabilities,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct ServerInfo {
    pub name: String,
    pub version: String,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Capabilities {
    /// False until interrupts actually abort an in-flight evaluation.
    pub supports_interrupt: bool,
}

/// Parameters of the `$/cancelRequest` request.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct CancelParams {
    pub id: RequestId,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct CreateSessionResult {
    pub session_id: String,
}

/// Parameters of the `konsol/eval` request.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct EvalParams {
    pub session_id: String,
    pub code: String,
}

/// The outcome of one evaluation. `exception` is present exactly when
/// the evaluated code raised; `stdout` and `stderr` are always present,
/// possibly empty.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct EvalResult {
    /// Printable rendering of the resulting value. Empty when an
    /// exception was raised.
    pub value: String,
    /// Name of the resulting value's dynamic type. Omitted when an
    /// exception was raised.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value_type: Option<String>,
    pub stdout: String,
    pub stderr: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exception: Option<ExceptionInfo>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ExceptionInfo {
    /// Short printable class name of the exception.
    #[serde(rename = "class")]
    pub class_name: String,
    pub message: String,
    /// Captured at catch time. May be empty.
    #[serde(default)]
    pub backtrace: Vec<String>,
}

/// Parameters of the `konsol/interrupt` request.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct InterruptParams {
    pub session_id: String,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct InterruptResult {
    pub success: bool,
}

/// Parameters of the reserved `konsol/stdout` and `konsol/stderr`
/// stream notifications.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct StreamChunkParams {
    pub session_id: String,
    pub chunk: String,
}

/// Parameters of the reserved `konsol/status` notification.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct StatusParams {
    pub session_id: String,
    pub busy: bool,
}
