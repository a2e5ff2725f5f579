//! Angular Context CLI
//!
//! Builds a document, runs scripts in order and prints the result:
//!   angular-context [--template page.html] [--root dir] [--eval expr] <script>...
//!
//! Without `--eval` the serialized document is printed to stdout. With it,
//! the expression's value is printed as JSON. Captured console output goes
//! to stderr.

use angular_context::logging::init_logging;
use angular_context::{Context, ContextConfig, SourceItem};
use anyhow::{anyhow, Result};
use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(author, version, about = "Run framework scripts against a headless document")]
struct Args {
    /// Scripts to run, in order. Loaded concurrently, executed sequentially.
    #[arg(required = true)]
    scripts: Vec<String>,

    /// HTML file the document is built from
    #[arg(long)]
    template: Option<PathBuf>,

    /// Confine script paths to this directory
    #[arg(long)]
    root: Option<PathBuf>,

    /// Document URL reported by window.location
    #[arg(long, default_value = "about:blank")]
    url: String,

    /// Expression to evaluate after the scripts; printed as JSON
    #[arg(long)]
    eval: Option<String>,

    /// Wait for pending timers before evaluating
    #[arg(long)]
    settle: bool,

    /// Default log filter when ANGULAR_CONTEXT_LOG is unset
    #[arg(long, default_value = "warn")]
    log_level: String,
}

fn print_console(context: &mut Context) {
    let console = context.take_console();
    for log in &console.logs {
        eprintln!("[LOG] {}", log);
    }
    for warn in &console.warns {
        eprintln!("[WARN] {}", warn);
    }
    for err in &console.errors {
        eprintln!("[ERROR] {}", err);
    }
}

async fn run(args: Args) -> Result<()> {
    let template = match &args.template {
        Some(path) => Some(
            tokio::fs::read_to_string(path)
                .await
                .map_err(|e| anyhow!("Failed to read template '{}': {}", path.display(), e))?,
        ),
        None => None,
    };

    let config = ContextConfig {
        template,
        url: args.url.clone(),
        script_root: args.root.clone(),
        ..Default::default()
    };

    let mut context = Context::with_config(config)?;
    let items: Vec<SourceItem> = args.scripts.iter().map(SourceItem::reference).collect();

    let outcome = context.run_multi(items).await;
    print_console(&mut context);
    outcome?;

    if args.settle {
        context.run_event_loop().await?;
        print_console(&mut context);
    }

    let output = match &args.eval {
        Some(expression) => {
            let value: serde_json::Value = context.evaluate(expression)?;
            serde_json::to_string_pretty(&value)?
        }
        None => context.document_html()?,
    };
    print_console(&mut context);
    println!("{}", output);

    context.dispose();
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(&args.log_level)?;
    run(args).await
}
