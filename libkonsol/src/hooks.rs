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

/// Callbacks that the wrapping binary can implement in order to hitch
/// a real application environment to the server. The plain `konsol`
/// binary runs with the no-op implementation; an embedding binary
/// passes its own through `run(args, runtime)`.
///
/// `boot` runs at most once per process, triggered by the first
/// successful session creation. The two wrap combinators run around
/// every single evaluation as `wrap_execute { wrap_reload { eval } }`,
/// which gives the host a place to manage connection checkouts, code
/// reloading, and other per-request state. Both MUST invoke the body
/// exactly once on the current thread.
///
/// All hooks do nothing by default.
pub trait HostRuntime {
    /// Boots the host application environment for the given profile
    /// (for example "development" or "test"). Errors surface to the
    /// session-create caller as a boot-failed response; a later
    /// session-create will retry.
    fn boot(&self, _profile: &str) -> anyhow::Result<()> {
        Ok(())
    }

    /// Wraps one evaluation in the host's executor.
    fn wrap_execute(&self, body: &mut dyn FnMut()) {
        body()
    }

    /// Wraps one evaluation in the host's reloader.
    fn wrap_reload(&self, body: &mut dyn FnMut()) {
        body()
    }
}

pub struct NoopRuntime;
impl HostRuntime for NoopRuntime {}
