//! Styled terminal output.
//!
//! Every user-facing line goes through [`Message`] and the `show_message!`
//! macro so output keeps a consistent two-column shape: a colored action
//! word in a fixed-width gutter, then the details.

use comfy_table::{presets::UTF8_FULL_CONDENSED, Cell, ContentArrangement, Table};
use crossterm::style::Stylize;

use crate::core::assertions::EvaluationReport;
use crate::core::resource_map::ResourceChange;
use crate::utilities::truncate_for_display;

/// Width of the action column in terminal output
const ACTION_WIDTH: usize = 10;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub action: String,
    pub details: String,
}

impl Message {
    pub fn new(action: String, details: String) -> Self {
        Self { action, details }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageType {
    Info,
    Success,
    Error,
    Highlight,
}

pub fn show_message_wrapper(message_type: MessageType, message: Message) {
    let action = format!("{:<ACTION_WIDTH$}", message.action);
    let styled = match message_type {
        MessageType::Info => action.cyan(),
        MessageType::Success => action.green(),
        MessageType::Error => action.red(),
        MessageType::Highlight => action.yellow().bold(),
    };
    if matches!(message_type, MessageType::Error) {
        eprintln!("{} {}", styled, message.details);
    } else {
        println!("{} {}", styled, message.details);
    }
}

macro_rules! show_message {
    ($message_type:expr, $message:expr) => {
        $crate::cli::display::show_message_wrapper($message_type, $message)
    };
}
pub(crate) use show_message;

/// Renders the plan's changes as a table: one row per change.
pub fn render_change_table(changes: &[ResourceChange]) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL_CONDENSED)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec!["action", "kind", "name", "detail"]);
    for change in changes {
        let (action, kind, name, detail) = change.describe();
        table.add_row(vec![
            Cell::new(action),
            Cell::new(kind),
            Cell::new(name),
            Cell::new(truncate_for_display(&detail, 60)),
        ]);
    }
    table
}

/// Renders verification results: one row per object, with pass/fail counts.
pub fn render_verification_table(reports: &[EvaluationReport]) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL_CONDENSED)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec!["object", "checks", "failures"]);
    for report in reports {
        table.add_row(vec![
            Cell::new(report.object().to_string()),
            Cell::new(report.checks_run().to_string()),
            Cell::new(report.violations().len().to_string()),
        ]);
    }
    table
}
