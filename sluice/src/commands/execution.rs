//! Task execution command.

use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use anyhow::Result;
use indicatif::ProgressBar;
use sluice_core::{BuildContext, Dispatcher, RunReport, TaskEvent, TaskRunner};
use sluice_serve::AxumDevServer;
use tracing::info;

use crate::formatting::{
    create_progress_bar, format_duration, print_results_table, print_section_header,
    print_separator_with_spacing, print_success, print_summary_box, SectionStyle,
};

use super::load_config;

const DEFAULT_TASK: &str = "default";

fn progress_observer(pb: ProgressBar) -> sluice_core::TaskObserver {
    Arc::new(move |event: &TaskEvent| {
        if pb.is_finished() {
            return;
        }
        match event {
            TaskEvent::Planned { tasks } => pb.set_length(tasks.len() as u64),
            TaskEvent::Started { task } => pb.set_message(task.clone()),
            TaskEvent::Finished { .. } => pb.inc(1),
            TaskEvent::Failed { .. } => pb.abandon(),
        }
    })
}

fn print_report(report: &RunReport) {
    print_section_header("Task Results", SectionStyle::Primary);
    print_results_table(&report.results);
    println!();
    print_success(&format!("{} tasks completed", report.results.len()));
    print_separator_with_spacing();
    print_summary_box(
        "Summary",
        &[
            ("Duration", &format_duration(report.duration.as_secs_f64())),
            ("Tasks", &report.results.len().to_string()),
        ],
    );
    println!();
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to install Ctrl+C handler: {}", e);
        std::future::pending::<()>().await;
    }
}

/// Runs `tasks` (or `default`), then keeps dispatching watch-triggered runs
/// while servers or watchers are alive.
pub fn cmd_run(config_path: &Path, tasks: Vec<String>) -> Result<()> {
    let start = Instant::now();
    let config = load_config(config_path)?;
    let graph = Arc::new(config.to_graph()?);
    let targets = if tasks.is_empty() {
        vec![DEFAULT_TASK.to_string()]
    } else {
        tasks
    };

    print_section_header(&format!("Running {}", targets.join(", ")), SectionStyle::Primary);

    let pb = create_progress_bar(0);
    let ctx = BuildContext::new(config.root()).with_dev_server(Arc::new(AxumDevServer::new()));
    let runner = Arc::new(
        TaskRunner::new(graph, Arc::new(ctx)).with_observer(progress_observer(pb.clone())),
    );

    let rt = tokio::runtime::Runtime::new()
        .map_err(|e| anyhow::anyhow!("Failed to create tokio runtime: {}", e))?;

    rt.block_on(async {
        let outcome = runner.run(&targets).await;
        pb.finish_and_clear();

        print_report(&outcome?);

        if runner.context().is_persistent() {
            info!(
                startup = %format_duration(start.elapsed().as_secs_f64()),
                "Services running; press Ctrl+C to stop"
            );
            Dispatcher::new(Arc::clone(&runner), config.settings.debounce_ms)
                .run_until(shutdown_signal())
                .await?;
        }
        Ok::<(), anyhow::Error>(())
    })
}
