//! CLI formatting utilities.
//!
//! Colors, section headers, tables and progress bars share one style across
//! commands.

mod headers;
mod output;
mod progress;
mod status;
mod tables;

pub use headers::{print_section_header, SectionStyle};
pub use output::{format_duration, print_key_value, print_separator_with_spacing, print_summary_box};
pub use progress::create_progress_bar;
pub use status::{print_error, print_success};
pub use tables::{print_results_table, print_task_table};
