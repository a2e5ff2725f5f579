//! Execution environment - one V8 isolate with the emulated window installed.
//!
//! Provides only what headless framework code needs:
//! - console.log/warn/error (captured, not printed)
//! - document/window/location/navigator from the DOM shim
//! - setTimeout/setInterval backed by an async sleep op
//! - atob, btoa

use crate::error::{ContextError, Result, ROOT_ELEMENT_NOT_READY};
use crate::ops::{angular_context, ConsoleOutput};
use deno_core::{serde_v8, v8, JsRuntime, PollEventLoopOptions, RuntimeOptions};
use serde::de::DeserializeOwned;
use std::path::PathBuf;

/// Script name used for the glue calls the context issues itself.
pub(crate) const INTERNAL_LABEL: &str = "<angular-context>";

/// Configuration for a sandbox context
#[derive(Debug, Clone)]
pub struct ContextConfig {
    /// HTML the document is built from (None = empty document)
    pub template: Option<String>,
    /// Document location reported by `window.location`
    pub url: String,
    /// When set, script references resolve inside this directory and may not escape it
    pub script_root: Option<PathBuf>,
    /// Maximum heap size in bytes (default: 64MB, None = unlimited)
    pub max_heap_size: Option<usize>,
    pub user_agent: String,
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            template: None,
            url: String::from("about:blank"),
            script_root: None,
            max_heap_size: Some(64 * 1024 * 1024), // 64MB default
            user_agent: format!("angular-context/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

/// The sandboxed global scope. Owned by exactly one `Context`.
pub struct Environment {
    runtime: JsRuntime,
}

impl Environment {
    pub(crate) fn create(config: &ContextConfig) -> Result<Self> {
        // Configure V8 heap limits if specified
        let create_params = config
            .max_heap_size
            .map(|max_bytes| v8::Isolate::create_params().heap_limits(0, max_bytes));

        let mut runtime = JsRuntime::new(RuntimeOptions {
            extensions: vec![angular_context::init_ops_and_esm()],
            create_params,
            ..Default::default()
        });

        if config.max_heap_size.is_some() {
            runtime.add_near_heap_limit_callback(|current, initial| {
                // Don't raise the limit - let V8 terminate with an OOM error
                tracing::warn!(
                    current_mb = current / (1024 * 1024),
                    initial_mb = initial / (1024 * 1024),
                    "near heap limit"
                );
                current
            });
        }

        runtime.op_state().borrow_mut().put(ConsoleOutput::default());

        let options = serde_json::json!({
            "url": config.url,
            "userAgent": config.user_agent,
            "rootElementNotReady": ROOT_ELEMENT_NOT_READY,
        });
        let install = format!(
            "__angularContext__.install({}, {});",
            json_literal(config.template.as_deref().unwrap_or("")),
            options
        );
        runtime
            .execute_script(INTERNAL_LABEL, install)
            .map_err(|e| ContextError::Runtime(format!("document installation failed: {}", e)))?;

        Ok(Self { runtime })
    }

    /// Execute `source` as a classic script. `execute_script` only takes a
    /// static name, so `label` reaches V8 stack traces via `sourceURL`.
    pub(crate) fn execute(&mut self, label: &str, source: String) -> Result<v8::Global<v8::Value>> {
        let named = with_source_url(source, label);
        self.runtime
            .execute_script(INTERNAL_LABEL, named)
            .map_err(|e| ContextError::execution(label, e))
    }

    /// Execute `source` and convert its completion value.
    pub(crate) fn eval<T: DeserializeOwned>(&mut self, label: &str, source: String) -> Result<T> {
        let value = self.execute(label, source)?;
        let scope = &mut self.runtime.handle_scope();
        let local = v8::Local::new(scope, value);
        serde_v8::from_v8(scope, local).map_err(|e| ContextError::Conversion {
            label: label.to_string(),
            message: e.to_string(),
        })
    }

    /// Drive timers and other pending ops until none remain.
    pub(crate) async fn run_event_loop(&mut self) -> Result<()> {
        self.runtime
            .run_event_loop(PollEventLoopOptions::default())
            .await
            .map_err(|e| ContextError::execution("<event-loop>", e))
    }

    pub(crate) fn console(&mut self) -> ConsoleOutput {
        self.runtime
            .op_state()
            .borrow()
            .borrow::<ConsoleOutput>()
            .clone()
    }

    pub(crate) fn take_console(&mut self) -> ConsoleOutput {
        let state = self.runtime.op_state();
        let mut state = state.borrow_mut();
        std::mem::take(state.borrow_mut::<ConsoleOutput>())
    }
}

/// Append a `sourceURL` pragma naming the script. Line breaks in the label
/// would end the comment early, so they are replaced.
pub(crate) fn with_source_url(mut source: String, label: &str) -> String {
    let label: String = label
        .chars()
        .map(|c| if c == '\n' || c == '\r' { ' ' } else { c })
        .collect();
    source.push_str("\n//# sourceURL=");
    source.push_str(&label);
    source
}

/// Quote a string as a JS literal.
pub(crate) fn json_literal(value: &str) -> String {
    serde_json::Value::String(value.to_string()).to_string()
}
