use std::fs;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use sluice_core::{BuildConfig, BuildContext, Dispatcher, TaskEvent, TaskRunner};
use tempfile::TempDir;
use tokio::sync::oneshot;
use tokio::time::{sleep, Instant};

const PROJECT: &str = r#"
[settings]
debounce_ms = 50

[tasks.build]
pipeline = { src = ["src/**/*.js"], dest = "out", steps = ["minify-js"] }

[tasks.watch]
watch = { globs = ["src/**/*"], tasks = ["build"] }
"#;

async fn wait_for<F: Fn() -> bool>(what: &str, condition: F) {
    let deadline = Instant::now() + Duration::from_secs(10);
    while !condition() {
        assert!(Instant::now() < deadline, "timed out waiting for {}", what);
        sleep(Duration::from_millis(25)).await;
    }
}

#[tokio::test]
async fn test_failed_rebuild_keeps_watching() {
    let temp = TempDir::new().unwrap();
    let root = temp.path().canonicalize().unwrap();
    fs::create_dir_all(root.join("src")).unwrap();

    let failures: Arc<Mutex<Vec<String>>> = Arc::default();
    let recorded = Arc::clone(&failures);
    let config = BuildConfig::from_toml_str(PROJECT).unwrap();
    let graph = config.to_graph_at(&root).unwrap();
    let runner = TaskRunner::new(Arc::new(graph), Arc::new(BuildContext::new(&root)))
        .with_observer(Arc::new(move |event: &TaskEvent| {
            if let TaskEvent::Failed { task, .. } = event {
                recorded.lock().unwrap().push(task.clone());
            }
        }));
    let runner = Arc::new(runner);
    runner.run(&["watch"]).await.unwrap();
    assert!(runner.context().is_persistent());

    let dispatcher = Dispatcher::new(Arc::clone(&runner), config.settings.debounce_ms);
    let (stop, stopped) = oneshot::channel::<()>();
    let output = root.join("out/a.js");

    let edits = async {
        // Let the watcher settle before the first edit.
        sleep(Duration::from_millis(300)).await;

        fs::write(root.join("src/a.js"), "var a = 'oops;\n").unwrap();
        wait_for("the broken rebuild", || !failures.lock().unwrap().is_empty()).await;
        assert!(!output.exists());

        fs::write(root.join("src/a.js"), "var a = 2; // fixed\n").unwrap();
        wait_for("the fixed rebuild", || {
            fs::read_to_string(&output).map(|s| s == "var a = 2;\n").unwrap_or(false)
        })
        .await;

        let _ = stop.send(());
    };

    let shutdown = async {
        let _ = stopped.await;
    };
    let (outcome, ()) = tokio::join!(dispatcher.run_until(shutdown), edits);
    outcome.unwrap();

    assert_eq!(failures.lock().unwrap().first().map(String::as_str), Some("build"));
    assert_eq!(fs::read_to_string(&output).unwrap(), "var a = 2;\n");
}
