//! Information commands.

use std::path::Path;

use anyhow::Result;
use owo_colors::OwoColorize;

use crate::formatting::{
    print_error, print_key_value, print_section_header, print_success, print_task_table,
    SectionStyle,
};

use super::load_config;

pub fn cmd_list(config_path: &Path, json: bool) -> Result<()> {
    let config = load_config(config_path)?;
    let graph = config.to_graph()?;

    if json {
        let tasks: Vec<_> = graph
            .tasks()
            .map(|task| {
                serde_json::json!({
                    "name": task.name,
                    "depends_on": task.depends_on,
                    "kind": task.action().kind(),
                    "description": task.description,
                })
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&tasks)?);
        return Ok(());
    }

    print_section_header("Tasks", SectionStyle::Primary);
    if graph.is_empty() {
        println!("  {} No tasks defined", "WARNING:".yellow());
        println!();
        return Ok(());
    }

    let rows: Vec<_> = graph
        .tasks()
        .map(|task| {
            (
                task.name.clone(),
                task.depends_on.clone(),
                task.action().kind().to_string(),
                task.description.clone().unwrap_or_default(),
            )
        })
        .collect();
    print_task_table(&rows);
    println!();
    Ok(())
}

pub fn cmd_check(config_path: &Path) -> Result<()> {
    let config = load_config(config_path)?;
    let graph = config.to_graph()?;

    print_section_header("Checking task graph", SectionStyle::Primary);
    print_key_value("Config", &config_path.display().to_string());
    print_key_value("Tasks", &graph.len().to_string());
    println!();

    match graph.validate() {
        Ok(order) => {
            print_success(&format!("{} tasks, no unknown prerequisites or cycles", order.len()));
            println!();
            Ok(())
        }
        Err(e) => {
            print_error(&e.to_string());
            println!();
            std::process::exit(1);
        }
    }
}
