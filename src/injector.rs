//! Injector handles in two states: plain and bootstrapped.
//!
//! A plain [`Injector`] cannot hand out `$rootElement`; elevating it with
//! [`Injector::bootstrap`] consumes it and yields a [`BootstrappedInjector`],
//! the only type that exposes the root element.

use crate::context::{Context, JsHandle};
use crate::error::Result;
use crate::runtime::json_literal;
use crate::sanitize::sanitize_scope_values;
use serde::de::DeserializeOwned;
use std::ops::Deref;

/// Module descriptor passed to the framework's injector.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Module {
    /// A module registered with `angular.module(name, ...)`.
    Named(String),
    /// Source of a config function, e.g. `['$provide', function ($provide) { ... }]`.
    Config(String),
}

impl Module {
    pub fn named(name: impl Into<String>) -> Self {
        Module::Named(name.into())
    }

    pub fn config(source: impl Into<String>) -> Self {
        Module::Config(source.into())
    }

    fn to_js(&self) -> String {
        match self {
            Module::Named(name) => json_literal(name),
            Module::Config(source) => format!("({})", source),
        }
    }
}

impl From<&str> for Module {
    fn from(name: &str) -> Self {
        Module::named(name)
    }
}

impl From<String> for Module {
    fn from(name: String) -> Self {
        Module::Named(name)
    }
}

/// JS array literal for a module list.
pub(crate) fn modules_literal(modules: impl IntoIterator<Item = Module>) -> String {
    let entries: Vec<String> = modules.into_iter().map(|module| module.to_js()).collect();
    format!("[{}]", entries.join(", "))
}

#[derive(Debug)]
pub struct Injector {
    handle: JsHandle,
}

impl Injector {
    pub(crate) fn new(handle: JsHandle) -> Self {
        Self { handle }
    }

    pub fn handle(&self) -> &JsHandle {
        &self.handle
    }

    /// Drop the context's reference to the injector. Handles obtained from
    /// it with `get`/`invoke` are separate and stay valid.
    pub fn release(self, ctx: &mut Context) -> Result<()> {
        ctx.release(self.handle)
    }

    /// `injector.get(name)`. Resolving `$rootElement` before bootstrap fails
    /// with `ContextError::RootElementNotReady`.
    pub fn get(&self, ctx: &mut Context, name: &str) -> Result<JsHandle> {
        let target = ctx.handle_expr(&self.handle)?;
        ctx.retain(&format!("{}.get({})", target, json_literal(name)))
    }

    /// `injector.get(name)` converted to a Rust value.
    pub fn get_value<T: DeserializeOwned>(&self, ctx: &mut Context, name: &str) -> Result<T> {
        let target = ctx.handle_expr(&self.handle)?;
        ctx.eval_internal(format!("{}.get({})", target, json_literal(name)))
    }

    pub fn has(&self, ctx: &mut Context, name: &str) -> Result<bool> {
        let target = ctx.handle_expr(&self.handle)?;
        ctx.eval_internal(format!("{}.has({})", target, json_literal(name)))
    }

    /// `injector.invoke(fn)` where `function` is JS source of an annotated
    /// or plain function.
    pub fn invoke(&self, ctx: &mut Context, function: &str) -> Result<JsHandle> {
        let target = ctx.handle_expr(&self.handle)?;
        ctx.retain(&format!("{}.invoke(({}))", target, function))
    }

    /// Compile `template` and link it against a new child of `$rootScope`.
    pub fn compile(&self, ctx: &mut Context, template: &str) -> Result<LinkedTemplate> {
        let target = ctx.handle_expr(&self.handle)?;
        let handle = ctx.retain(&format!(
            "__angularContext__.compileTemplate({}, {})",
            target,
            json_literal(template)
        ))?;
        Ok(LinkedTemplate { handle })
    }

    /// Elevate to a bootstrapped injector rooted at `element` (the document
    /// when None). The root element is set and compiled inside `$apply`.
    pub fn bootstrap(self, ctx: &mut Context, element: Option<&JsHandle>) -> Result<BootstrappedInjector> {
        let (root_element, owns_root) = match element {
            Some(element) => (element.clone(), false),
            None => (ctx.document()?, true),
        };
        let injector = ctx.handle_expr(&self.handle)?;
        let element = ctx.handle_expr(&root_element)?;
        ctx.execute_internal(format!(
            "__angularContext__.bootstrapInjector({}, {});",
            injector, element
        ))?;
        tracing::debug!(context = %ctx.id(), "injector bootstrapped");

        Ok(BootstrappedInjector {
            injector: self,
            root_element,
            owns_root,
        })
    }
}

/// An injector whose `$rootElement` is available.
#[derive(Debug)]
pub struct BootstrappedInjector {
    injector: Injector,
    root_element: JsHandle,
    // true when the root is the document handle retained by `bootstrap`
    owns_root: bool,
}

impl BootstrappedInjector {
    pub fn root_element(&self) -> &JsHandle {
        &self.root_element
    }

    /// Release the injector, and the root element too when it was the
    /// document picked by `bootstrap`. A caller-supplied root stays retained.
    pub fn release(self, ctx: &mut Context) -> Result<()> {
        if self.owns_root {
            ctx.release(self.root_element)?;
        }
        self.injector.release(ctx)
    }
}

impl Deref for BootstrappedInjector {
    type Target = Injector;

    fn deref(&self) -> &Injector {
        &self.injector
    }
}

/// A compiled template linked to its own scope.
#[derive(Debug)]
pub struct LinkedTemplate {
    handle: JsHandle,
}

impl LinkedTemplate {
    /// Assign `values` (a JSON object) onto the scope inside `$apply`.
    pub fn apply(&self, ctx: &mut Context, values: serde_json::Value) -> Result<()> {
        let values = sanitize_scope_values(values)?;
        let target = ctx.handle_expr(&self.handle)?;
        ctx.execute_internal(format!(
            "__angularContext__.applyToScope({}, {});",
            target, values
        ))
    }

    /// Current markup of the linked element.
    pub fn html(&self, ctx: &mut Context) -> Result<String> {
        let target = ctx.handle_expr(&self.handle)?;
        ctx.eval_internal(format!("__angularContext__.templateHtml({})", target))
    }

    pub fn element(&self, ctx: &mut Context) -> Result<JsHandle> {
        let target = ctx.handle_expr(&self.handle)?;
        ctx.retain(&format!("{}.element", target))
    }

    pub fn scope(&self, ctx: &mut Context) -> Result<JsHandle> {
        let target = ctx.handle_expr(&self.handle)?;
        ctx.retain(&format!("{}.scope", target))
    }

    pub fn release(self, ctx: &mut Context) -> Result<()> {
        ctx.release(self.handle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_modules_literal() {
        let literal = modules_literal(vec![
            Module::from("ng"),
            Module::named("app\"quoted"),
            Module::config("['$provide', function ($provide) {}]"),
        ]);
        assert_eq!(
            literal,
            "[\"ng\", \"app\\\"quoted\", (['$provide', function ($provide) {}])]"
        );
    }

    #[test]
    fn test_empty_modules_literal() {
        assert_eq!(modules_literal(Vec::new()), "[]");
    }
}
