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

use std::sync::{Arc, Mutex};

use konsol_protocol::{EvalResult, ExceptionInfo};
use rhai::{Dynamic, Engine, EvalAltResult, Position, Scope};

use crate::hooks::HostRuntime;

/// One session's persistent interpreter: an engine wired up to capture
/// sinks plus the scope that carries top-level bindings from one
/// evaluation to the next.
///
/// `eval` never fails to its caller. Everything the evaluated code can
/// do wrong is folded into the `exception` field of the result.
#[derive(Debug)]
pub struct Interpreter {
    engine: Engine,
    scope: Scope<'static>,
    stdout: Arc<Mutex<String>>,
    stderr: Arc<Mutex<String>>,
}

impl Interpreter {
    pub fn new() -> Interpreter {
        let stdout = Arc::new(Mutex::new(String::new()));
        let stderr = Arc::new(Mutex::new(String::new()));

        let mut engine = Engine::new();

        // print() is the script's stdout. The engine hands us the text
        // without a trailing newline, so we add the one print implies.
        let sink = Arc::clone(&stdout);
        engine.on_print(move |text| {
            // unwrap to propagate the poison as an unwind
            let mut buf = sink.lock().unwrap();
            buf.push_str(text);
            buf.push('\n');
        });

        // debug() and eprint() are the script's stderr.
        let sink = Arc::clone(&stderr);
        engine.on_debug(move |text, _source, _pos| {
            let mut buf = sink.lock().unwrap();
            buf.push_str(text);
            buf.push('\n');
        });
        let sink = Arc::clone(&stderr);
        engine.register_fn("eprint", move |text: &str| {
            let mut buf = sink.lock().unwrap();
            buf.push_str(text);
            buf.push('\n');
        });

        Interpreter { engine, scope: Scope::new(), stdout, stderr }
    }

    /// Evaluates one code string against the persistent scope, wrapped
    /// in the host runtime's combinators. Top-level `let` bindings
    /// survive into the next call.
    pub fn eval(&mut self, code: &str, runtime: &dyn HostRuntime) -> EvalResult {
        // unwrap to propagate the poison as an unwind
        self.stdout.lock().unwrap().clear();
        self.stderr.lock().unwrap().clear();

        let mut outcome: Option<Result<Dynamic, Box<EvalAltResult>>> = None;
        {
            let engine = &self.engine;
            let scope = &mut self.scope;
            let mut body = || {
                outcome = Some(engine.eval_with_scope::<Dynamic>(scope, code));
            };
            runtime.wrap_execute(&mut || runtime.wrap_reload(&mut body));
        }

        let stdout = std::mem::take(&mut *self.stdout.lock().unwrap());
        let stderr = std::mem::take(&mut *self.stderr.lock().unwrap());

        match outcome {
            Some(Ok(value)) => EvalResult {
                value: render_value(&value),
                value_type: Some(String::from(value.type_name())),
                stdout,
                stderr,
                exception: None,
            },
            Some(Err(err)) => EvalResult {
                value: String::new(),
                value_type: None,
                stdout,
                stderr,
                exception: Some(describe_exception(&err)),
            },
            // A host runtime that swallows the body instead of calling
            // it breaks the wrap contract; report it like a raise so
            // the client at least sees what happened.
            None => EvalResult {
                value: String::new(),
                value_type: None,
                stdout,
                stderr,
                exception: Some(ExceptionInfo {
                    class_name: String::from("HostRuntimeError"),
                    message: String::from("host runtime did not invoke the evaluation"),
                    backtrace: Vec::new(),
                }),
            },
        }
    }
}

/// REPL inspect convention: debug formatting, so strings come back
/// quoted and the unit value reads as "()".
fn render_value(value: &Dynamic) -> String {
    if value.is::<()>() {
        String::from("()")
    } else {
        format!("{value:?}")
    }
}

/// The closed mapping from engine errors to the short printable class
/// names the protocol reports.
fn exception_class(err: &EvalAltResult) -> &'static str {
    match err {
        EvalAltResult::ErrorParsing(..) => "SyntaxError",
        EvalAltResult::ErrorRuntime(..) => "RuntimeError",
        EvalAltResult::ErrorVariableNotFound(..) => "VariableNotFound",
        EvalAltResult::ErrorFunctionNotFound(..) => "FunctionNotFound",
        EvalAltResult::ErrorArithmetic(..) => "ArithmeticError",
        EvalAltResult::ErrorArrayBounds(..) => "IndexError",
        EvalAltResult::ErrorStringBounds(..) => "IndexError",
        EvalAltResult::ErrorMismatchDataType(..) => "TypeError",
        EvalAltResult::ErrorMismatchOutputType(..) => "TypeError",
        _ => "EvalError",
    }
}

fn describe_exception(err: &EvalAltResult) -> ExceptionInfo {
    let message = match err {
        // A `throw` surfaces the thrown value itself; display it bare
        // so `throw "boom"` reports exactly "boom".
        EvalAltResult::ErrorRuntime(value, _) => value.to_string(),
        other => other.to_string(),
    };

    ExceptionInfo {
        class_name: String::from(exception_class(err)),
        message,
        backtrace: backtrace_from(err.position()),
    }
}

/// A single synthetic frame carrying the source position the engine
/// reported at catch time.
fn backtrace_from(pos: Position) -> Vec<String> {
    match (pos.line(), pos.position()) {
        (Some(line), Some(col)) => vec![format!("eval:{line}:{col}")],
        (Some(line), None) => vec![format!("eval:{line}")],
        _ => vec![String::from("eval")],
    }
}
