// This module is used from the integration test binary; not every
// test uses everything here.
#![allow(dead_code)]

use std::{
    io::{BufRead, BufReader, Read, Write},
    process::{Child, ChildStdin, ChildStdout, Command, Stdio},
};

use anyhow::{anyhow, Context};

/// A konsol server child process with its stdio wired up for speaking
/// the framed protocol.
pub struct Server {
    child: Child,
    stdin: Option<ChildStdin>,
    stdout: BufReader<ChildStdout>,
}

impl Server {
    pub fn spawn() -> anyhow::Result<Server> {
        let mut child = Command::new(env!("CARGO_BIN_EXE_konsol"))
            .arg("--stdio")
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .context("spawning konsol server")?;

        let stdin = child.stdin.take().context("missing child stdin")?;
        let stdout = BufReader::new(child.stdout.take().context("missing child stdout")?);
        Ok(Server { child, stdin: Some(stdin), stdout })
    }

    /// Writes one framed message to the server.
    pub fn send(&mut self, body: &serde_json::Value) -> anyhow::Result<()> {
        let payload = serde_json::to_vec(body).context("encoding request body")?;
        self.send_raw(&payload)
    }

    /// Writes one frame with an arbitrary payload, valid JSON or not.
    pub fn send_raw(&mut self, payload: &[u8]) -> anyhow::Result<()> {
        let stdin = self.stdin.as_mut().context("stdin already closed")?;
        write!(stdin, "Content-Length: {}\r\n\r\n", payload.len())
            .context("writing frame header")?;
        stdin.write_all(payload).context("writing frame payload")?;
        stdin.flush().context("flushing frame")?;
        Ok(())
    }

    /// Reads one framed response off the server's stdout.
    pub fn recv(&mut self) -> anyhow::Result<serde_json::Value> {
        let mut length = None;
        loop {
            let mut line = String::new();
            if self.stdout.read_line(&mut line).context("reading header line")? == 0 {
                return Err(anyhow!("server closed its stdout"));
            }
            let line = line.trim_end_matches("\r\n");
            if line.is_empty() {
                break;
            }
            if let Some((name, value)) = line.split_once(':') {
                if name.eq_ignore_ascii_case("content-length") {
                    length = Some(value.trim().parse::<usize>().context("parsing length")?);
                }
            }
        }

        let length = length.ok_or_else(|| anyhow!("response frame has no content-length"))?;
        let mut payload = vec![0u8; length];
        self.stdout.read_exact(&mut payload).context("reading payload")?;
        serde_json::from_slice(&payload).context("parsing response payload")
    }

    pub fn roundtrip(&mut self, body: serde_json::Value) -> anyhow::Result<serde_json::Value> {
        self.send(&body)?;
        self.recv()
    }

    /// Creates a session and returns its id.
    pub fn create_session(&mut self) -> anyhow::Result<String> {
        let response = self.roundtrip(serde_json::json!({
            "jsonrpc": "2.0", "id": 1000, "method": "konsol/session.create",
        }))?;
        response["result"]["sessionId"]
            .as_str()
            .map(String::from)
            .ok_or_else(|| anyhow!("no sessionId in {response}"))
    }

    /// Evaluates code on the given session and returns the result
    /// object from the response.
    pub fn eval(&mut self, session_id: &str, code: &str) -> anyhow::Result<serde_json::Value> {
        let response = self.roundtrip(serde_json::json!({
            "jsonrpc": "2.0", "id": 1001, "method": "konsol/eval",
            "params": {"sessionId": session_id, "code": code},
        }))?;
        Ok(response["result"].clone())
    }

    /// Closes the server's stdin so it sees end-of-stream.
    pub fn close_stdin(&mut self) {
        self.stdin = None;
    }

    /// Waits for the server to exit and returns its exit code.
    pub fn wait_exit_code(&mut self) -> anyhow::Result<i32> {
        let status = self.child.wait().context("waiting for server exit")?;
        status.code().ok_or_else(|| anyhow!("server was killed by a signal"))
    }
}

impl Drop for Server {
    fn drop(&mut self) {
        // Reap the child if a test bailed early; killing an already
        // exited process is fine to ignore.
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}
