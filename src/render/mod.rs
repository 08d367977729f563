//! Renderer module.
//!
//! Projections of matched rules: a text table for the terminal, and HTML
//! and CSV reports over a fixed field list.

mod csv;
mod html;
mod table;

pub use csv::to_csv;
pub use html::HtmlReport;
pub use table::MatchTable;

use crate::compile::EnrichedRule;

/// Columns of the HTML and CSV reports
pub const REPORT_FIELDS: [&str; 11] = [
    "tracker",
    "action",
    "floating",
    "interface",
    "protocol",
    "source",
    "destination",
    "gateway",
    "description",
    "created",
    "updated",
];

/// Change marker of a report row
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RowState {
    Added,
    Removed,
    /// Previous version of a changed rule
    ChangedOld,
    /// Current version of a changed rule
    ChangedNew,
}

impl RowState {
    /// CSS class of the row
    pub fn class(&self) -> &'static str {
        match self {
            RowState::Added => "add",
            RowState::Removed => "del",
            RowState::ChangedOld => "chg_old",
            RowState::ChangedNew => "chg_new",
        }
    }
}

/// One report row
#[derive(Debug, Clone, Copy)]
pub struct ReportRow<'a> {
    pub rule: &'a EnrichedRule,
    pub state: Option<RowState>,
}

impl<'a> ReportRow<'a> {
    pub fn with_state(mut self, state: RowState) -> Self {
        self.state = Some(state);
        self
    }
}

impl<'a> From<&'a EnrichedRule> for ReportRow<'a> {
    fn from(rule: &'a EnrichedRule) -> Self {
        Self { rule, state: None }
    }
}

/// Plain-text values of [`REPORT_FIELDS`] for one rule
pub(crate) fn report_values(rule: &EnrichedRule) -> [String; 11] {
    let display = &rule.display;
    [
        rule.rule.tracker.clone(),
        display.action.clone(),
        display.floating.clone(),
        display.interfaces.join(", "),
        rule.rule.protocol.clone(),
        display.source.to_string(),
        display.destination.to_string(),
        rule.rule.gateway.clone(),
        rule.rule.description.clone(),
        display.created.clone(),
        display.updated.clone(),
    ]
}
