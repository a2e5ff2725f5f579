use angular_context::{Context, ContextConfig, ContextError, LoadFuture, SourceItem, SourceLoader};
use anyhow::anyhow;
use std::collections::HashMap;
use std::fs;
use std::time::Duration;
use tempfile::tempdir;

/// Serves fixed sources after a per-reference delay.
struct DelayedLoader {
    sources: HashMap<&'static str, (u64, &'static str)>,
}

impl DelayedLoader {
    fn new(entries: &[(&'static str, u64, &'static str)]) -> Box<Self> {
        let sources = entries
            .iter()
            .map(|(name, delay, source)| (*name, (*delay, *source)))
            .collect();
        Box::new(Self { sources })
    }
}

impl SourceLoader for DelayedLoader {
    fn load(&self, reference: &str) -> LoadFuture {
        let entry = self.sources.get(reference).copied();
        let reference = reference.to_string();
        Box::pin(async move {
            let (delay, source) = entry.ok_or_else(|| anyhow!("no such script: {}", reference))?;
            tokio::time::sleep(Duration::from_millis(delay)).await;
            Ok(source.to_string())
        })
    }
}

#[tokio::test]
async fn test_slow_first_script_still_runs_first() {
    let loader = DelayedLoader::new(&[
        ("slow.js", 40, "trail.push('slow');"),
        ("fast.js", 0, "trail.push('fast');"),
    ]);
    let mut context = Context::with_loader(ContextConfig::default(), loader).unwrap();
    context.run("globalThis.trail = [];", "setup").unwrap();

    context
        .run_multi([
            SourceItem::reference("slow.js"),
            SourceItem::inline("trail.push('inline');", "inline"),
            SourceItem::reference("fast.js"),
        ])
        .await
        .unwrap();

    let trail: Vec<String> = context.evaluate("trail").unwrap();
    assert_eq!(trail, vec!["slow", "inline", "fast"]);
}

#[tokio::test]
async fn test_load_failure_runs_nothing() {
    let loader = DelayedLoader::new(&[("ok.js", 0, "ran = true;")]);
    let mut context = Context::with_loader(ContextConfig::default(), loader).unwrap();

    let err = context
        .run_multi([SourceItem::reference("ok.js"), SourceItem::reference("missing.js")])
        .await
        .unwrap_err();

    assert!(err.is_load());
    assert!(err.to_string().contains("missing.js"));
    let ran: bool = context.evaluate("typeof ran !== 'undefined'").unwrap();
    assert!(!ran);
}

#[tokio::test]
async fn test_done_callback_reports_execution_error() {
    let mut context = Context::new(None).unwrap();
    let mut outcome = None;

    context
        .run_multi_with(
            [("step = 1;", "one"), ("throw new Error('boom');", "two"), ("step = 3;", "three")],
            |result| outcome = Some(result),
        )
        .await;

    match outcome {
        Some(Err(ContextError::Execution { label, .. })) => assert_eq!(label, "two"),
        other => panic!("unexpected outcome: {:?}", other),
    }
    let step: i32 = context.evaluate("step").unwrap();
    assert_eq!(step, 1);
}

#[tokio::test]
async fn test_file_scripts_share_globals() {
    let dir = tempdir().unwrap();
    let first = dir.path().join("first.js");
    let second = dir.path().join("second.js");
    fs::write(&first, "var greeting = 'hello';").unwrap();
    fs::write(&second, "document.body.textContent = greeting + ' world';").unwrap();

    let config = ContextConfig {
        template: Some("<p>placeholder</p>".to_string()),
        script_root: Some(dir.path().to_path_buf()),
        ..Default::default()
    };
    let mut context = Context::with_config(config).unwrap();
    context
        .run_multi([
            SourceItem::reference(first.to_str().unwrap()),
            SourceItem::reference(second.to_str().unwrap()),
        ])
        .await
        .unwrap();

    let text: String = context.evaluate("document.body.textContent").unwrap();
    assert_eq!(text, "hello world");
}

#[tokio::test]
async fn test_sandboxed_root_rejects_outside_paths() {
    let dir = tempdir().unwrap();
    let outside = tempdir().unwrap();
    let script = outside.path().join("escape.js");
    fs::write(&script, "escaped = true;").unwrap();

    let config = ContextConfig {
        script_root: Some(dir.path().to_path_buf()),
        ..Default::default()
    };
    let mut context = Context::with_config(config).unwrap();
    let err = context.run_file(script.to_str().unwrap()).await.unwrap_err();
    assert!(err.is_load());
}
