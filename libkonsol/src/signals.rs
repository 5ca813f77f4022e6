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

use std::sync::{atomic::AtomicBool, Arc};

use anyhow::Context;
use signal_hook::{consts::TERM_SIGNALS, flag};
use tracing::info;

/// Registers the TERM signal set to flip the shared shutdown flag. To
/// the server loop the flag is equivalent to a shutdown request: it
/// keeps serving until the client sends `exit` or closes the stream,
/// and an in-flight evaluation is allowed to complete.
///
/// A second term signal while the flag is already set exits immediately
/// with code 1, so mashing ^C doesn't leave us stuck behind a wedged
/// evaluation.
pub fn register(term: Arc<AtomicBool>) -> anyhow::Result<()> {
    for sig in TERM_SIGNALS {
        // The conditional shutdown fires only once the flag is already
        // set, i.e. on the second signal. Registration order matters:
        // the plain flag registration below arms it.
        flag::register_conditional_shutdown(*sig, 1, Arc::clone(&term))
            .context("registering conditional shutdown")?;
        flag::register(*sig, Arc::clone(&term)).context("registering term flag")?;
    }

    info!("registered {} term signal handlers", TERM_SIGNALS.len());
    Ok(())
}
