//! Table formatting utilities using comfy-table.

use comfy_table::{Cell, Table};
use owo_colors::OwoColorize;
use sluice_core::TaskResult;

use super::output::format_duration;
use super::status::Status;

fn styled_table(headers: &[&str]) -> Table {
    let mut table = Table::new();
    table
        .set_header(
            headers
                .iter()
                .map(|h| Cell::new(*h).add_attribute(comfy_table::Attribute::Bold))
                .collect::<Vec<_>>(),
        )
        .load_preset(comfy_table::presets::UTF8_FULL)
        .apply_modifier(comfy_table::modifiers::UTF8_ROUND_CORNERS)
        .set_content_arrangement(comfy_table::ContentArrangement::Dynamic);
    table
}

/// Prints the task listing: name, prerequisites, action kind, description.
pub fn print_task_table(tasks: &[(String, Vec<String>, String, String)]) {
    let mut table = styled_table(&["Task", "Depends on", "Action", "Description"]);

    for (name, deps, kind, description) in tasks {
        let deps_str = if deps.is_empty() {
            "-".bright_black().to_string()
        } else {
            deps.join(", ")
        };
        table.add_row(vec![
            Cell::new(name).fg(comfy_table::Color::White),
            Cell::new(deps_str),
            Cell::new(kind).fg(comfy_table::Color::Cyan),
            Cell::new(description).fg(comfy_table::Color::DarkGrey),
        ]);
    }

    println!("{}", table);
}

/// Prints the tasks executed by one run, in execution order.
pub fn print_results_table(results: &[TaskResult]) {
    let mut table = styled_table(&["Status", "Task", "Action", "Duration"]);

    for result in results {
        table.add_row(vec![
            Cell::new(Status::Success.symbol()).fg(comfy_table::Color::Green),
            Cell::new(&result.task_name).fg(comfy_table::Color::White),
            Cell::new(result.kind).fg(comfy_table::Color::Cyan),
            Cell::new(format_duration(result.duration.as_secs_f64())),
        ]);
    }

    println!("{}", table);
}
