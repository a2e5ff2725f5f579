//! # Angular Context
//!
//! A headless sandbox for exercising AngularJS-style framework code outside a
//! browser, built on deno_core.
//!
//! ## What a context provides
//!
//! - **A document**: built from an optional HTML template, with `window`,
//!   `document`, `location`, timers and a captured `console`
//! - **Ordered loading**: `run_multi` reads script files concurrently but
//!   executes them strictly in the order given, stopping at the first error
//! - **Framework accessors**: injectors, bootstrap and template compilation
//!   delegate to the `angular` global once its source has been run
//! - **Dispose callbacks**: run in registration order before the isolate is
//!   torn down
//!
//! ## Usage
//!
//! ```rust,ignore
//! use angular_context::{Context, SourceItem};
//!
//! #[tokio::main]
//! async fn main() -> angular_context::Result<()> {
//!     let mut context = Context::new(Some("<div id=\"app\"></div>"))?;
//!     context
//!         .run_multi([
//!             SourceItem::reference("node_modules/angular/angular.js"),
//!             SourceItem::inline("angular.module('app', []);", "app-module"),
//!         ])
//!         .await?;
//!
//!     let injector = context.injector(["ng", "app"])?;
//!     let linked = injector.compile(&mut context, "<div>{{ greeting }}</div>")?;
//!     linked.apply(&mut context, serde_json::json!({ "greeting": "hello" }))?;
//!     println!("{}", linked.html(&mut context)?);
//!
//!     context.dispose();
//!     Ok(())
//! }
//! ```

mod batch;
mod context;
mod error;
mod injector;
mod loader;
pub mod logging;
mod ops;
mod runtime;
mod sanitize;

pub use context::{Context, JsHandle};
pub use error::{ContextError, Result};
pub use injector::{BootstrappedInjector, Injector, LinkedTemplate, Module};
pub use loader::{FileLoader, LoadFuture, SourceItem, SourceLoader};
pub use ops::ConsoleOutput;
pub use runtime::ContextConfig;
pub use sanitize::sanitize_scope_values;
