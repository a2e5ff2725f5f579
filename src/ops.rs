//! Native ops backing the emulated window: console capture, timers and
//! base64 helpers, plus the `extension!` definition that ships the DOM shim.

use anyhow::{anyhow, Error};
use deno_core::{op2, CancelFuture, CancelHandle, OpState, RcRef, Resource, ResourceId};
use std::borrow::Cow;
use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;

// ============================================================================
// Console Output Capture
// ============================================================================

/// Console lines written by scripts, split by stream.
#[derive(Debug, Default, Clone)]
pub struct ConsoleOutput {
    pub logs: Vec<String>,
    pub warns: Vec<String>,
    pub errors: Vec<String>,
}

impl ConsoleOutput {
    pub fn is_empty(&self) -> bool {
        self.logs.is_empty() && self.warns.is_empty() && self.errors.is_empty()
    }

    fn stream_mut(&mut self, stream: &str) -> &mut Vec<String> {
        match stream {
            "warn" => &mut self.warns,
            "error" => &mut self.errors,
            _ => &mut self.logs,
        }
    }
}

fn capture(state: &mut OpState, stream: &'static str, msg: &str) {
    tracing::debug!(target: "angular_context::console", stream, "{}", msg);
    if let Some(output) = state.try_borrow_mut::<ConsoleOutput>() {
        output.stream_mut(stream).push(msg.to_string());
    }
}

#[op2(fast)]
pub fn op_console_log(state: &mut OpState, #[string] msg: &str) {
    capture(state, "log", msg);
}

#[op2(fast)]
pub fn op_console_warn(state: &mut OpState, #[string] msg: &str) {
    capture(state, "warn", msg);
}

#[op2(fast)]
pub fn op_console_error(state: &mut OpState, #[string] msg: &str) {
    capture(state, "error", msg);
}

// ============================================================================
// Timers
// ============================================================================

/// Cancellation for one `setTimeout`/`setInterval`. Closing the resource
/// wakes any sleep still pending on it.
struct TimerResource {
    cancel: CancelHandle,
}

impl Resource for TimerResource {
    fn name(&self) -> Cow<str> {
        "timer".into()
    }

    fn close(self: Rc<Self>) {
        self.cancel.cancel();
    }
}

#[op2(fast)]
#[smi]
pub fn op_timer_start(state: &mut OpState) -> ResourceId {
    state.resource_table.add(TimerResource {
        cancel: CancelHandle::new(),
    })
}

/// Resolves to `true` after `millis`, or to `false` as soon as the timer is
/// cancelled.
#[op2(async)]
pub async fn op_timer_sleep(
    state: Rc<RefCell<OpState>>,
    #[smi] rid: ResourceId,
    #[number] millis: u64,
) -> Result<bool, Error> {
    let timer = state.borrow().resource_table.get::<TimerResource>(rid)?;
    let cancel = RcRef::map(&timer, |t| &t.cancel);
    let slept = tokio::time::sleep(Duration::from_millis(millis))
        .or_cancel(cancel)
        .await;
    Ok(slept.is_ok())
}

/// Release a timer; pending sleeps on it resolve immediately. Unknown ids
/// are ignored so clearing twice is harmless.
#[op2(fast)]
pub fn op_timer_cancel(state: &mut OpState, #[smi] rid: ResourceId) {
    if state.resource_table.close(rid).is_err() {
        tracing::trace!(rid, "timer already released");
    }
}

// ============================================================================
// Encoding Ops
// ============================================================================

fn encode_base64(data: &str) -> String {
    use base64::Engine;
    // UTF-8 accepted, not just Latin-1
    base64::engine::general_purpose::STANDARD.encode(data.as_bytes())
}

fn decode_base64(data: &str) -> Result<String, Error> {
    use base64::Engine;
    let bytes = base64::engine::general_purpose::STANDARD
        .decode(data)
        .map_err(|e| anyhow!("Invalid base64: {}", e))?;
    String::from_utf8(bytes).map_err(|e| anyhow!("Invalid UTF-8 in decoded data: {}", e))
}

#[op2]
#[string]
pub fn op_btoa(#[string] data: &str) -> Result<String, Error> {
    Ok(encode_base64(data))
}

#[op2]
#[string]
pub fn op_atob(#[string] data: &str) -> Result<String, Error> {
    decode_base64(data)
}

// ============================================================================
// Extension Definition
// ============================================================================

deno_core::extension!(
    angular_context,
    ops = [
        op_console_log,
        op_console_warn,
        op_console_error,
        op_timer_start,
        op_timer_sleep,
        op_timer_cancel,
        op_btoa,
        op_atob,
    ],
    esm_entry_point = "ext:angular_context/bootstrap.js",
    esm = [
        "ext:angular_context/dom.js" = "src/js/dom.js",
        "ext:angular_context/bootstrap.js" = "src/js/bootstrap.js",
    ],
);
