//! The sandbox context: one environment, ordered script loading, framework
//! accessors and the dispose lifecycle.

use crate::batch::LoadBatch;
use crate::error::{ContextError, Result};
use crate::injector::{modules_literal, BootstrappedInjector, Injector, Module};
use crate::loader::{FileLoader, SourceItem, SourceLoader};
use crate::ops::ConsoleOutput;
use crate::runtime::{json_literal, ContextConfig, Environment, INTERNAL_LABEL};
use serde::de::DeserializeOwned;
use uuid::Uuid;

/// A value retained inside one context's environment.
///
/// Handles are only meaningful to the context that issued them; passing one
/// to another context yields `ContextError::ForeignHandle`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JsHandle {
    context: Uuid,
    id: u64,
}

type DisposeCallback = Box<dyn FnOnce(&mut Context)>;

/// Headless sandbox hosting a document and, once loaded, the framework.
///
/// Dropping a context (or calling [`Context::dispose`]) runs the registered
/// dispose callbacks in registration order and then tears down the isolate.
pub struct Context {
    id: Uuid,
    env: Environment,
    loader: Box<dyn SourceLoader>,
    dispose_callbacks: Vec<DisposeCallback>,
}

impl Context {
    /// Create a context whose document is built from `template`.
    pub fn new(template: Option<&str>) -> Result<Self> {
        Self::with_config(ContextConfig {
            template: template.map(str::to_string),
            ..Default::default()
        })
    }

    pub fn with_config(config: ContextConfig) -> Result<Self> {
        let loader: Box<dyn SourceLoader> = match &config.script_root {
            Some(root) => Box::new(FileLoader::sandboxed(root).map_err(|source| {
                ContextError::ScriptRoot {
                    root: root.clone(),
                    source,
                }
            })?),
            None => Box::new(FileLoader::unrestricted()),
        };
        Self::with_loader(config, loader)
    }

    /// Create a context that resolves references through a custom loader.
    pub fn with_loader(config: ContextConfig, loader: Box<dyn SourceLoader>) -> Result<Self> {
        let env = Environment::create(&config)?;
        let id = Uuid::new_v4();
        tracing::info!(context = %id, url = %config.url, "context created");
        Ok(Self {
            id,
            env,
            loader,
            dispose_callbacks: Vec::new(),
        })
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    // ========================================================================
    // Script execution
    // ========================================================================

    /// Execute `source` synchronously; errors propagate to the caller.
    pub fn run(&mut self, source: &str, label: &str) -> Result<()> {
        self.env.execute(label, source.to_string())?;
        Ok(())
    }

    pub async fn run_file(&mut self, path: &str) -> Result<()> {
        self.run_multi([SourceItem::reference(path)]).await
    }

    /// Load every item concurrently, then execute them in input order.
    ///
    /// Nothing executes if any load fails. Execution stops at the first
    /// script that throws; the scripts before it have already run.
    pub async fn run_multi<I>(&mut self, items: I) -> Result<()>
    where
        I: IntoIterator,
        I::Item: Into<SourceItem>,
    {
        let items: Vec<SourceItem> = items.into_iter().map(Into::into).collect();
        let count = items.len();

        let scripts = LoadBatch::new(items).load(&*self.loader).await?;

        for (index, script) in scripts.into_iter().enumerate() {
            tracing::debug!(context = %self.id, index, label = %script.label, "executing script");
            self.env.execute(&script.label, script.source)?;
        }

        tracing::debug!(context = %self.id, count, "batch complete");
        Ok(())
    }

    /// Callback flavour of [`Context::run_multi`]; `done` runs exactly once.
    pub async fn run_multi_with<I, F>(&mut self, items: I, done: F)
    where
        I: IntoIterator,
        I::Item: Into<SourceItem>,
        F: FnOnce(Result<()>),
    {
        let outcome = self.run_multi(items).await;
        done(outcome);
    }

    /// Evaluate `source` and convert its completion value.
    pub fn evaluate<T: DeserializeOwned>(&mut self, source: &str) -> Result<T> {
        self.env.eval(INTERNAL_LABEL, source.to_string())
    }

    /// Drive pending timers until none remain.
    pub async fn run_event_loop(&mut self) -> Result<()> {
        self.env.run_event_loop().await
    }

    pub fn pending_timers(&mut self) -> Result<usize> {
        self.eval_internal("__angularContext__.pendingTimers()".to_string())
    }

    pub fn console(&mut self) -> ConsoleOutput {
        self.env.console()
    }

    pub fn take_console(&mut self) -> ConsoleOutput {
        self.env.take_console()
    }

    // ========================================================================
    // Document and handles
    // ========================================================================

    pub fn document(&mut self) -> Result<JsHandle> {
        self.retain("document")
    }

    pub fn document_html(&mut self) -> Result<String> {
        self.eval_internal("document.documentElement.outerHTML".to_string())
    }

    /// Evaluate `expression` and keep the result alive behind a handle.
    pub fn retain(&mut self, expression: &str) -> Result<JsHandle> {
        let id: u64 = self.eval_internal(format!("__angularContext__.retain(({}))", expression))?;
        Ok(JsHandle {
            context: self.id,
            id,
        })
    }

    pub fn release(&mut self, handle: JsHandle) -> Result<()> {
        let target = self.check_handle(&handle)?;
        self.execute_internal(format!("__angularContext__.release({});", target))
    }

    /// Number of values currently retained by handles.
    pub fn retained_handles(&mut self) -> Result<usize> {
        self.eval_internal("__angularContext__.handleCount()".to_string())
    }

    /// Convert the value behind `handle`. Meant for JSON-like values; DOM
    /// nodes and scopes are cyclic and will not convert.
    pub fn value_of<T: DeserializeOwned>(&mut self, handle: &JsHandle) -> Result<T> {
        let target = self.handle_expr(handle)?;
        self.eval_internal(target)
    }

    /// `Object.is` on the values behind two handles.
    pub fn same_value(&mut self, a: &JsHandle, b: &JsHandle) -> Result<bool> {
        let left = self.handle_expr(a)?;
        let right = self.handle_expr(b)?;
        self.eval_internal(format!("Object.is({}, {})", left, right))
    }

    /// JS expression that resolves to the value behind `handle`.
    pub(crate) fn handle_expr(&self, handle: &JsHandle) -> Result<String> {
        let id = self.check_handle(handle)?;
        Ok(format!("__angularContext__.resolve({})", id))
    }

    fn check_handle(&self, handle: &JsHandle) -> Result<u64> {
        if handle.context != self.id {
            return Err(ContextError::ForeignHandle);
        }
        Ok(handle.id)
    }

    pub(crate) fn eval_internal<T: DeserializeOwned>(&mut self, source: String) -> Result<T> {
        self.env.eval(INTERNAL_LABEL, source)
    }

    pub(crate) fn execute_internal(&mut self, source: String) -> Result<()> {
        self.env.execute(INTERNAL_LABEL, source)?;
        Ok(())
    }

    // ========================================================================
    // Framework accessors
    // ========================================================================

    pub fn has_angular(&mut self) -> bool {
        self.probe("typeof angular === 'object' && angular !== null")
    }

    pub fn has_require(&mut self) -> bool {
        self.probe("typeof require === 'function'")
    }

    fn probe(&mut self, condition: &str) -> bool {
        self.eval_internal::<bool>(condition.to_string())
            .unwrap_or(false)
    }

    fn require_angular(&mut self) -> Result<()> {
        if self.has_angular() {
            Ok(())
        } else {
            Err(ContextError::FrameworkMissing { global: "angular" })
        }
    }

    pub fn get_angular(&mut self) -> Result<JsHandle> {
        self.require_angular()?;
        self.retain("angular")
    }

    /// `angular.module(name)` when `requires` is None, otherwise defines the
    /// module with the given dependencies.
    pub fn module(&mut self, name: &str, requires: Option<&[&str]>) -> Result<JsHandle> {
        self.require_angular()?;
        let call = match requires {
            Some(requires) => format!(
                "angular.module({}, {})",
                json_literal(name),
                serde_json::json!(requires)
            ),
            None => format!("angular.module({})", json_literal(name)),
        };
        self.retain(&call)
    }

    /// Create an injector for `modules`. Its `$rootElement` is unavailable
    /// until the injector is bootstrapped.
    pub fn injector<I>(&mut self, modules: I) -> Result<Injector>
    where
        I: IntoIterator,
        I::Item: Into<Module>,
    {
        self.require_angular()?;
        let list = modules_literal(modules.into_iter().map(Into::into));
        let handle = self.retain(&format!("__angularContext__.createInjector({})", list))?;
        Ok(Injector::new(handle))
    }

    /// Build an injector for `ng` plus `modules` and bootstrap it on
    /// `element` (the document when None).
    pub fn bootstrap<I>(&mut self, element: Option<&JsHandle>, modules: I) -> Result<BootstrappedInjector>
    where
        I: IntoIterator,
        I::Item: Into<Module>,
    {
        let mut all = vec![Module::named("ng")];
        all.extend(modules.into_iter().map(Into::into));
        let injector = self.injector(all)?;
        injector.bootstrap(self, element)
    }

    // ========================================================================
    // Lifecycle
    // ========================================================================

    /// Register a callback to run, with this context, before teardown.
    pub fn on_dispose<F>(&mut self, callback: F)
    where
        F: FnOnce(&mut Context) + 'static,
    {
        self.dispose_callbacks.push(Box::new(callback));
    }

    /// Run the dispose callbacks in registration order, then tear down the
    /// environment.
    pub fn dispose(self) {
        drop(self);
    }
}

impl Drop for Context {
    fn drop(&mut self) {
        let mut invoked = 0usize;
        // Callbacks registered while disposing run after the current round.
        while !self.dispose_callbacks.is_empty() {
            for callback in std::mem::take(&mut self.dispose_callbacks) {
                callback(self);
                invoked += 1;
            }
        }
        tracing::info!(context = %self.id, callbacks = invoked, "context disposed");
    }
}
