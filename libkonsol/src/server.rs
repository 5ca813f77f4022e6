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

use std::{
    io::{BufRead, Write},
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
};

use anyhow::Context;
use konsol_protocol::{
    CancelParams, Capabilities, CreateSessionResult, Envelope, ErrorCode, EvalParams,
    InitializeParams, InitializeResult, InterruptParams, InterruptResult, Method, RequestId,
    Response, ResponseError, ServerInfo, PROTOCOL_VERSION, SERVER_NAME,
};
use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, info, instrument, warn};

use crate::{
    casing, config,
    framing,
    hooks::HostRuntime,
    session::{SessionError, SessionState, SessionStore},
};

/// Everything a handler can fail with. The loop is the single place
/// that converts these into structured error responses; below it,
/// handlers just return the typed failure.
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("{0}")]
    InvalidParams(String),
    #[error(transparent)]
    Session(#[from] SessionError),
    #[error("server is shutting down")]
    ShuttingDown,
    #[error("{0}")]
    Internal(String),
}

impl DispatchError {
    fn code(&self) -> ErrorCode {
        match self {
            DispatchError::InvalidParams(_) => ErrorCode::InvalidParams,
            DispatchError::Session(SessionError::NotFound(_)) => ErrorCode::SessionNotFound,
            DispatchError::Session(SessionError::Busy(_)) => ErrorCode::SessionBusy,
            DispatchError::Session(SessionError::BootFailed(_)) => ErrorCode::BootFailed,
            DispatchError::ShuttingDown => ErrorCode::ShuttingDown,
            DispatchError::Internal(_) => ErrorCode::Internal,
        }
    }
}

impl From<anyhow::Error> for DispatchError {
    fn from(err: anyhow::Error) -> DispatchError {
        DispatchError::Internal(format!("{err:#}"))
    }
}

enum Flow {
    Continue,
    Exit(i32),
}

pub struct Server {
    config: config::Config,
    runtime: Box<dyn HostRuntime>,
    store: SessionStore,
    initialized: bool,
    shutdown_requested: bool,
    /// Flipped by the signal handler; equivalent to a shutdown request
    /// when deriving the exit code.
    term: Arc<AtomicBool>,
}

impl Server {
    pub fn new(
        config: config::Config,
        runtime: Box<dyn HostRuntime>,
        term: Arc<AtomicBool>,
    ) -> Server {
        Server {
            config,
            runtime,
            store: SessionStore::new(),
            initialized: false,
            shutdown_requested: false,
            term,
        }
    }

    /// Drives the read -> dispatch -> write cycle until the client
    /// hangs up or sends `exit`. One message at a time, to completion,
    /// on this thread; that keeps response ordering deterministic and
    /// leaves nothing to lock.
    ///
    /// A termination signal is equivalent to a shutdown request: the
    /// loop keeps reading so a client already completing the
    /// shutdown-then-exit handshake still gets its responses and its
    /// clean exit, and the flag feeds the exit-code derivation once
    /// `exit` or end-of-stream arrives.
    ///
    /// The returned value is the process exit code: 0 for the explicit
    /// shutdown-then-exit handshake, 1 for everything else.
    #[instrument(skip_all)]
    pub fn serve(
        &mut self,
        reader: &mut dyn BufRead,
        writer: &mut dyn Write,
    ) -> anyhow::Result<i32> {
        info!("serving on the paired byte stream");
        loop {
            let payload = match framing::read_frame(reader) {
                Ok(Some(payload)) => payload,
                Ok(None) => {
                    info!("client closed the input stream");
                    return Ok(1);
                }
                Err(err) => return Err(err).context("reading frame"),
            };

            match self.handle_frame(&payload, writer)? {
                Flow::Continue => {}
                Flow::Exit(code) => {
                    info!("exit notification observed, leaving the loop with code {}", code);
                    return Ok(code);
                }
            }
        }
    }

    fn shutdown_requested(&self) -> bool {
        self.shutdown_requested || self.term.load(Ordering::Relaxed)
    }

    /// Processes one frame payload: parse, translate, classify,
    /// dispatch, respond. All protocol failures funnel through here
    /// into structured error responses; only I/O failures propagate.
    fn handle_frame(&mut self, payload: &[u8], writer: &mut dyn Write) -> anyhow::Result<Flow> {
        let raw: Value = match serde_json::from_slice(payload) {
            Ok(raw) => raw,
            Err(err) => {
                warn!("frame payload is not JSON: {}", err);
                let error = ResponseError::new(ErrorCode::Parse, Some(err.to_string()));
                write_message(writer, &Response::fail(None, error))?;
                return Ok(Flow::Continue);
            }
        };

        let raw = casing::keys_to_snake(raw);
        // Hang on to whatever id we can recover so a rejected envelope
        // still correlates; only a hopeless one gets a null id.
        let recovered_id: Option<RequestId> =
            raw.get("id").and_then(|id| serde_json::from_value(id.clone()).ok());
        let envelope: Envelope = match serde_json::from_value(raw) {
            Ok(envelope) => envelope,
            Err(err) => {
                warn!("frame is not a protocol envelope: {}", err);
                let error = ResponseError::new(ErrorCode::InvalidRequest, Some(err.to_string()));
                write_message(writer, &Response::fail(recovered_id, error))?;
                return Ok(Flow::Continue);
            }
        };

        let id = envelope.id.clone();
        if envelope.jsonrpc.as_deref() != Some(PROTOCOL_VERSION) {
            let error = ResponseError::new(
                ErrorCode::InvalidRequest,
                Some(String::from("envelope version must be \"2.0\"")),
            );
            write_message(writer, &Response::fail(id, error))?;
            return Ok(Flow::Continue);
        }

        let method_name = match &envelope.method {
            Some(name) => name.clone(),
            None => {
                let error = ResponseError::new(
                    ErrorCode::InvalidRequest,
                    Some(String::from("envelope has no method")),
                );
                write_message(writer, &Response::fail(id, error))?;
                return Ok(Flow::Continue);
            }
        };

        let method = match Method::from_name(&method_name) {
            Some(method) => method,
            None => {
                if let Some(id) = id {
                    let error = ResponseError::new(
                        ErrorCode::MethodNotFound,
                        Some(format!("unknown method '{method_name}'")),
                    );
                    write_message(writer, &Response::fail(Some(id), error))?;
                } else {
                    warn!("dropping notification for unknown method '{}'", method_name);
                }
                return Ok(Flow::Continue);
            }
        };

        if method == Method::Exit {
            let code = if self.shutdown_requested() { 0 } else { 1 };
            return Ok(Flow::Exit(code));
        }

        if method.is_notification() {
            // The remaining members of the notification set are the
            // server->client stream methods. A client has no business
            // sending them, and a notification never gets a response,
            // even from a misbehaving client that attached an id.
            warn!("ignoring inbound {} notification", method.name());
            return Ok(Flow::Continue);
        }

        debug!("dispatching {} (id={:?})", method.name(), id);
        match self.dispatch(method, envelope.params) {
            Ok(result) => {
                if let Some(id) = id {
                    write_message(writer, &Response::ok(id, result))?;
                }
            }
            Err(err) => {
                if let Some(id) = id {
                    let error = ResponseError::new(err.code(), Some(err.to_string()));
                    write_message(writer, &Response::fail(Some(id), error))?;
                } else {
                    // Notifications have no response channel.
                    warn!("dropping failed {} notification: {}", method.name(), err);
                }
            }
        }

        Ok(Flow::Continue)
    }

    /// Exhaustive dispatch over the closed set of request methods.
    /// The notification methods never reach this point.
    fn dispatch(
        &mut self,
        method: Method,
        params: Option<Value>,
    ) -> Result<Value, DispatchError> {
        if self.shutdown_requested {
            // Sessions are already gone; refuse everything but exit
            // with one consistent code.
            return Err(DispatchError::ShuttingDown);
        }
        if !self.initialized && !matches!(method, Method::Initialize | Method::Shutdown) {
            // Advisory gate only. A conformant client initializes
            // first, but we serve early traffic anyway.
            debug!("serving {} before initialize", method.name());
        }

        match method {
            Method::Initialize => self.handle_initialize(params),
            Method::Shutdown => self.handle_shutdown(),
            Method::CancelRequest => self.handle_cancel(params),
            Method::SessionCreate => self.handle_session_create(),
            Method::Eval => self.handle_eval(params),
            Method::Interrupt => self.handle_interrupt(params),
            Method::Exit | Method::StdoutChunk | Method::StderrChunk | Method::Status => {
                unreachable!("notifications are handled at the loop level")
            }
        }
    }

    fn handle_initialize(&mut self, params: Option<Value>) -> Result<Value, DispatchError> {
        let params: InitializeParams = optional_params(params)?;
        if let Some(client) = &params.client_info {
            info!(
                "client introduced itself: {} {}",
                client.name,
                client.version.as_deref().unwrap_or("(no version)")
            );
        }

        self.initialized = true;
        let result = InitializeResult {
            server_info: ServerInfo {
                name: String::from(SERVER_NAME),
                version: String::from(konsol_protocol::VERSION),
            },
            capabilities: Capabilities { supports_interrupt: false },
        };
        Ok(serde_json::to_value(result).context("serializing initialize result")?)
    }

    fn handle_shutdown(&mut self) -> Result<Value, DispatchError> {
        info!("shutdown requested, invalidating {} sessions", self.store.count());
        self.shutdown_requested = true;
        self.store.invalidate_all();
        Ok(Value::Null)
    }

    fn handle_cancel(&mut self, params: Option<Value>) -> Result<Value, DispatchError> {
        let params: CancelParams = required_params(params)?;
        // Accepted and tracked, not enforced. Nothing to abort in a
        // single-threaded loop anyway: if we got here, no evaluation is
        // in flight.
        info!("cancel requested for id {}", params.id);
        Ok(Value::Null)
    }

    fn handle_session_create(&mut self) -> Result<Value, DispatchError> {
        let profile = self.config.env_profile();
        let session_id = self.store.create_session(self.runtime.as_ref(), &profile)?;
        let result = CreateSessionResult { session_id };
        Ok(serde_json::to_value(result).context("serializing session.create result")?)
    }

    fn handle_eval(&mut self, params: Option<Value>) -> Result<Value, DispatchError> {
        let params: EvalParams = required_params(params)?;

        let runtime = self.runtime.as_ref();
        let session = self.store.require_mut(&params.session_id)?;
        if session.state != SessionState::Idle {
            return Err(SessionError::Busy(params.session_id).into());
        }

        session.state = SessionState::Busy;
        debug!("evaluating {} bytes of code on session {}", params.code.len(), params.session_id);
        let result = session.interpreter.eval(&params.code, runtime);
        // eval never fails, so this is the one exit path and the busy
        // flag always clears. An interrupt registered mid-flight
        // transitions through Interrupted on its way back to Idle.
        if session.state == SessionState::Interrupted {
            debug!("session {} was interrupted during evaluation", params.session_id);
        }
        session.state = SessionState::Idle;

        Ok(serde_json::to_value(result).context("serializing eval result")?)
    }

    fn handle_interrupt(&mut self, params: Option<Value>) -> Result<Value, DispatchError> {
        let params: InterruptParams = required_params(params)?;
        let session = self.store.require_mut(&params.session_id)?;

        if session.state == SessionState::Busy {
            info!("marking busy session {} interrupted", params.session_id);
            session.state = SessionState::Interrupted;
        }

        // TODO(interrupt): abort the in-flight evaluation once the
        // engine runs somewhere we can actually preempt it.
        let result = InterruptResult { success: true };
        Ok(serde_json::to_value(result).context("serializing interrupt result")?)
    }
}

/// Parses a parameter shape whose fields are all optional; an absent or
/// null params object means "all defaults".
fn optional_params<T>(params: Option<Value>) -> Result<T, DispatchError>
where
    T: DeserializeOwned + Default,
{
    match params {
        None => Ok(T::default()),
        Some(Value::Null) => Ok(T::default()),
        Some(value) => {
            serde_json::from_value(value).map_err(|e| DispatchError::InvalidParams(e.to_string()))
        }
    }
}

/// Parses a parameter shape with required fields; absent params fail
/// validation like any other missing field.
fn required_params<T>(params: Option<Value>) -> Result<T, DispatchError>
where
    T: DeserializeOwned,
{
    serde_json::from_value(params.unwrap_or(Value::Null))
        .map_err(|e| DispatchError::InvalidParams(e.to_string()))
}

/// The single write site. Serializes, translates keys to the wire
/// convention, frames, flushes.
fn write_message(writer: &mut dyn Write, response: &Response) -> anyhow::Result<()> {
    let value = serde_json::to_value(response).context("serializing response")?;
    let value = casing::keys_to_camel(value);
    let payload = serde_json::to_vec(&value).context("encoding response")?;
    framing::write_frame(writer, &payload).context("writing response frame")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use serde_json::json;

    use super::*;
    use crate::hooks::NoopRuntime;

    fn test_server() -> Server {
        Server::new(
            config::Config::default(),
            Box::new(NoopRuntime),
            Arc::new(AtomicBool::new(false)),
        )
    }

    /// Frames the given bodies, runs the loop over them, and returns
    /// the decoded responses plus the loop's exit code.
    fn drive(server: &mut Server, bodies: &[Value]) -> (Vec<Value>, i32) {
        let mut input: Vec<u8> = Vec::new();
        for body in bodies {
            let payload = serde_json::to_vec(body).unwrap();
            framing::write_frame(&mut input, &payload).unwrap();
        }

        let mut reader = Cursor::new(input);
        let mut output: Vec<u8> = Vec::new();
        let code = server.serve(&mut reader, &mut output).unwrap();

        let mut responses = Vec::new();
        let mut cursor = Cursor::new(output);
        while let Some(payload) = framing::read_frame(&mut cursor).unwrap() {
            responses.push(serde_json::from_slice(&payload).unwrap());
        }
        (responses, code)
    }

    fn request(id: i64, method: &str, params: Value) -> Value {
        json!({"jsonrpc": "2.0", "id": id, "method": method, "params": params})
    }

    #[test]
    fn initialize_reports_capabilities() {
        let mut server = test_server();
        let (responses, code) = drive(
            &mut server,
            &[request(1, "initialize", json!({"clientInfo": {"name": "test"}}))],
        );

        assert_eq!(code, 1); // stream closed without the handshake
        let result = &responses[0]["result"];
        assert_eq!(result["serverInfo"]["name"], "konsol");
        assert_eq!(result["capabilities"]["supportsInterrupt"], false);
        assert_eq!(responses[0]["id"], 1);
    }

    #[test]
    fn eval_persists_state_across_requests() {
        let mut server = test_server();
        let (responses, _) = drive(
            &mut server,
            &[
                json!({"jsonrpc": "2.0", "id": 1, "method": "konsol/session.create"}),
            ],
        );
        let session_id = responses[0]["result"]["sessionId"].as_str().unwrap().to_string();

        let (responses, _) = drive(
            &mut server,
            &[
                request(2, "konsol/eval", json!({"sessionId": session_id, "code": "let x = 123;"})),
                request(3, "konsol/eval", json!({"sessionId": session_id, "code": "x + 1"})),
            ],
        );

        assert_eq!(responses[0]["result"]["value"], "()");
        assert_eq!(responses[1]["result"]["value"], "124");
        assert_eq!(responses[1]["result"]["valueType"], "i64");
        assert_eq!(responses[1]["result"]["stdout"], "");
        assert_eq!(responses[1]["result"]["stderr"], "");
    }

    #[test]
    fn unknown_session_gets_the_session_not_found_code() {
        let mut server = test_server();
        let (responses, _) = drive(
            &mut server,
            &[request(
                1,
                "konsol/eval",
                json!({"sessionId": "00000000-0000-0000-0000-000000000000", "code": "1"}),
            )],
        );
        assert_eq!(responses[0]["error"]["code"], -32001);
    }

    #[test]
    fn busy_session_gets_the_session_busy_code() {
        let mut server = test_server();
        let (responses, _) = drive(
            &mut server,
            &[json!({"jsonrpc": "2.0", "id": 1, "method": "konsol/session.create"})],
        );
        let session_id = responses[0]["result"]["sessionId"].as_str().unwrap().to_string();

        // The single-threaded loop can't race itself, so pin the state
        // by hand the way a blocked evaluation would hold it.
        server.store.get_mut(&session_id).unwrap().state = SessionState::Busy;

        let (responses, _) = drive(
            &mut server,
            &[request(2, "konsol/eval", json!({"sessionId": session_id, "code": "1"}))],
        );
        assert_eq!(responses[0]["error"]["code"], -32002);
    }

    #[test]
    fn interrupt_marks_a_busy_session() {
        let mut server = test_server();
        let (responses, _) = drive(
            &mut server,
            &[json!({"jsonrpc": "2.0", "id": 1, "method": "konsol/session.create"})],
        );
        let session_id = responses[0]["result"]["sessionId"].as_str().unwrap().to_string();
        server.store.get_mut(&session_id).unwrap().state = SessionState::Busy;

        let (responses, _) = drive(
            &mut server,
            &[request(2, "konsol/interrupt", json!({"sessionId": session_id}))],
        );
        assert_eq!(responses[0]["result"]["success"], true);
        assert_eq!(
            server.store.get_mut(&session_id).unwrap().state,
            SessionState::Interrupted
        );
    }

    #[test]
    fn interrupt_on_an_idle_session_still_succeeds() {
        let mut server = test_server();
        let (responses, _) = drive(
            &mut server,
            &[json!({"jsonrpc": "2.0", "id": 1, "method": "konsol/session.create"})],
        );
        let session_id = responses[0]["result"]["sessionId"].as_str().unwrap().to_string();

        let (responses, _) = drive(
            &mut server,
            &[request(2, "konsol/interrupt", json!({"sessionId": session_id}))],
        );
        assert_eq!(responses[0]["result"]["success"], true);
        assert_eq!(server.store.get_mut(&session_id).unwrap().state, SessionState::Idle);
    }

    #[test]
    fn unknown_method_gets_method_not_found() {
        let mut server = test_server();
        let (responses, _) =
            drive(&mut server, &[request(1, "konsol/bogus", json!({}))]);
        assert_eq!(responses[0]["error"]["code"], -32601);
        assert_eq!(responses[0]["id"], 1);
    }

    #[test]
    fn unknown_method_notification_is_dropped() {
        let mut server = test_server();
        let (responses, _) = drive(
            &mut server,
            &[json!({"jsonrpc": "2.0", "method": "konsol/bogus"})],
        );
        assert!(responses.is_empty());
    }

    #[test]
    fn missing_params_fail_validation() {
        let mut server = test_server();
        let (responses, _) = drive(&mut server, &[request(1, "konsol/eval", json!({}))]);
        assert_eq!(responses[0]["error"]["code"], -32602);
    }

    #[test]
    fn malformed_json_gets_a_parse_error_with_null_id() {
        let mut server = test_server();
        let mut input: Vec<u8> = Vec::new();
        framing::write_frame(&mut input, b"{not json").unwrap();

        let mut reader = Cursor::new(input);
        let mut output: Vec<u8> = Vec::new();
        server.serve(&mut reader, &mut output).unwrap();

        let payload = framing::read_frame(&mut Cursor::new(output)).unwrap().unwrap();
        let response: Value = serde_json::from_slice(&payload).unwrap();
        assert_eq!(response["error"]["code"], -32700);
        assert_eq!(response["id"], Value::Null);
    }

    #[test]
    fn wrong_envelope_version_is_invalid_request() {
        let mut server = test_server();
        let (responses, _) = drive(
            &mut server,
            &[json!({"jsonrpc": "1.0", "id": 4, "method": "initialize"})],
        );
        assert_eq!(responses[0]["error"]["code"], -32600);
        assert_eq!(responses[0]["id"], 4);
    }

    #[test]
    fn rejected_envelope_still_echoes_a_recoverable_id() {
        let mut server = test_server();
        // A numeric method is not a valid envelope, but the id is
        // perfectly recoverable and must come back.
        let (responses, _) = drive(
            &mut server,
            &[json!({"jsonrpc": "2.0", "id": 11, "method": 5})],
        );
        assert_eq!(responses[0]["error"]["code"], -32600);
        assert_eq!(responses[0]["id"], 11);
    }

    #[test]
    fn missing_method_is_invalid_request() {
        let mut server = test_server();
        let (responses, _) = drive(&mut server, &[json!({"jsonrpc": "2.0", "id": 9})]);
        assert_eq!(responses[0]["error"]["code"], -32600);
        assert_eq!(responses[0]["id"], 9);
    }

    #[test]
    fn string_ids_echo_as_strings() {
        let mut server = test_server();
        let (responses, _) = drive(
            &mut server,
            &[json!({"jsonrpc": "2.0", "id": "abc-1", "method": "shutdown"})],
        );
        assert_eq!(responses[0]["id"], "abc-1");
        assert_eq!(responses[0]["result"], Value::Null);
    }

    #[test]
    fn shutdown_then_exit_is_a_clean_exit() {
        let mut server = test_server();
        let (responses, code) = drive(
            &mut server,
            &[
                request(6, "shutdown", json!({})),
                json!({"jsonrpc": "2.0", "method": "exit"}),
            ],
        );
        assert_eq!(responses[0]["result"], Value::Null);
        assert_eq!(code, 0);
    }

    #[test]
    fn exit_without_shutdown_is_not_clean() {
        let mut server = test_server();
        let (responses, code) =
            drive(&mut server, &[json!({"jsonrpc": "2.0", "method": "exit"})]);
        assert!(responses.is_empty());
        assert_eq!(code, 1);
    }

    #[test]
    fn requests_after_shutdown_are_refused() {
        let mut server = test_server();
        let (responses, code) = drive(
            &mut server,
            &[
                json!({"jsonrpc": "2.0", "id": 1, "method": "konsol/session.create"}),
                request(2, "shutdown", json!({})),
                json!({"jsonrpc": "2.0", "id": 3, "method": "konsol/session.create"}),
                json!({"jsonrpc": "2.0", "method": "exit"}),
            ],
        );

        assert!(responses[0]["result"]["sessionId"].is_string());
        assert_eq!(responses[1]["result"], Value::Null);
        assert_eq!(responses[2]["error"]["code"], -32005);
        assert_eq!(code, 0);
        assert_eq!(server.store.count(), 0);
    }

    #[test]
    fn stream_closure_without_exit_returns_one() {
        let mut server = test_server();
        let (_, code) = drive(&mut server, &[]);
        assert_eq!(code, 1);
    }

    fn signalled_server() -> Server {
        Server::new(
            config::Config::default(),
            Box::new(NoopRuntime),
            Arc::new(AtomicBool::new(true)),
        )
    }

    #[test]
    fn handshake_after_a_signal_still_exits_zero() {
        // The signal fired before these frames were read; the client
        // completing the shutdown-then-exit handshake still wins.
        let mut server = signalled_server();
        let (responses, code) = drive(
            &mut server,
            &[
                request(1, "shutdown", json!({})),
                json!({"jsonrpc": "2.0", "method": "exit"}),
            ],
        );
        assert_eq!(responses[0]["result"], Value::Null);
        assert_eq!(code, 0);
    }

    #[test]
    fn exit_after_a_signal_exits_zero_without_shutdown() {
        // A signal is equivalent to shutdown_requested becoming true,
        // so a bare exit notification after one is a clean exit.
        let mut server = signalled_server();
        let (responses, code) =
            drive(&mut server, &[json!({"jsonrpc": "2.0", "method": "exit"})]);
        assert!(responses.is_empty());
        assert_eq!(code, 0);
    }

    #[test]
    fn signal_then_stream_closure_exits_one() {
        let mut server = signalled_server();
        let (responses, code) = drive(&mut server, &[]);
        assert!(responses.is_empty());
        assert_eq!(code, 1);
    }

    #[test]
    fn exception_payload_reaches_the_wire() {
        let mut server = test_server();
        let (responses, _) = drive(
            &mut server,
            &[json!({"jsonrpc": "2.0", "id": 1, "method": "konsol/session.create"})],
        );
        let session_id = responses[0]["result"]["sessionId"].as_str().unwrap().to_string();

        let (responses, _) = drive(
            &mut server,
            &[request(
                2,
                "konsol/eval",
                json!({"sessionId": session_id, "code": "throw \"boom\""}),
            )],
        );

        let exception = &responses[0]["result"]["exception"];
        assert_eq!(exception["class"], "RuntimeError");
        assert_eq!(exception["message"], "boom");
        assert!(!exception["backtrace"].as_array().unwrap().is_empty());
    }

    #[test]
    fn inbound_stream_methods_never_get_responses() {
        let mut server = test_server();
        // Even with an id attached, the stream methods classify as
        // notifications and produce nothing.
        let (responses, _) = drive(
            &mut server,
            &[
                json!({"jsonrpc": "2.0", "id": 5, "method": "konsol/stdout",
                       "params": {"sessionId": "s", "chunk": "x"}}),
                json!({"jsonrpc": "2.0", "id": 6, "method": "konsol/status",
                       "params": {"sessionId": "s", "busy": true}}),
                request(7, "shutdown", json!({})),
            ],
        );
        // Only the shutdown request got a response.
        assert_eq!(responses.len(), 1);
        assert_eq!(responses[0]["id"], 7);
    }

    #[test]
    fn cancel_request_is_acknowledged() {
        let mut server = test_server();
        let (responses, _) =
            drive(&mut server, &[request(1, "$/cancelRequest", json!({"id": 7}))]);
        assert_eq!(responses[0]["result"], Value::Null);
    }
}
