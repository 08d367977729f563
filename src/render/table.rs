use std::fmt;

use crate::engine::MatchedRule;
use crate::types::ResolvedDirection;

const HEADERS: [&str; 11] = [
    "PF Name",
    "Num",
    "Tracker",
    "Action",
    "Floating",
    "Interface",
    "Source",
    "Destination",
    "Ports",
    "Gateway",
    "Description",
];

const DESCRIPTION_WIDTH: usize = 30;

/// Text table of matched rules, one bordered row per rule.
#[derive(Debug, Clone, Default)]
pub struct MatchTable {
    rows: Vec<[String; 11]>,
}

impl MatchTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_matches(matches: &[MatchedRule<'_>]) -> Self {
        let mut table = Self::new();
        for matched in matches {
            table.push(matched);
        }
        table
    }

    pub fn push(&mut self, matched: &MatchedRule<'_>) {
        let rule = matched.rule;
        self.rows.push([
            matched.device.to_string(),
            matched.sequence.to_string(),
            rule.rule.tracker.clone(),
            rule.display.action.clone(),
            rule.display.floating.clone(),
            rule.display.interfaces.join("\n"),
            member_lines(&rule.source),
            member_lines(&rule.destination),
            rule.destination_ports.join("\n"),
            rule.rule.gateway.clone(),
            wrap(&rule.rule.description, DESCRIPTION_WIDTH),
        ]);
    }

    /// Dashed row separating devices
    pub fn push_separator(&mut self) {
        self.rows.push(HEADERS.map(|header| "-".repeat(header.len())));
    }

    /// Number of rows, separators included
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    fn widths(&self) -> [usize; 11] {
        let mut widths = HEADERS.map(|header| header.chars().count());
        for row in &self.rows {
            for (width, cell) in widths.iter_mut().zip(row) {
                let longest = cell.lines().map(|l| l.chars().count()).max().unwrap_or(0);
                *width = (*width).max(longest);
            }
        }
        widths
    }
}

impl fmt::Display for MatchTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let widths = self.widths();
        let border: String = widths
            .iter()
            .map(|w| format!("+{}", "-".repeat(w + 2)))
            .collect::<String>()
            + "+";

        writeln!(f, "{border}")?;
        write_line(f, &widths, &HEADERS.map(String::from))?;
        writeln!(f, "{border}")?;
        for row in &self.rows {
            write_line(f, &widths, row)?;
            writeln!(f, "{border}")?;
        }
        Ok(())
    }
}

fn write_line(f: &mut fmt::Formatter<'_>, widths: &[usize; 11], cells: &[String; 11]) -> fmt::Result {
    let lines: Vec<Vec<&str>> = cells.iter().map(|c| c.lines().collect()).collect();
    let height = lines.iter().map(Vec::len).max().unwrap_or(0).max(1);

    for i in 0..height {
        for (width, cell) in widths.iter().zip(&lines) {
            let text = cell.get(i).copied().unwrap_or("");
            let pad = width - text.chars().count();
            write!(f, "| {}{} ", text, " ".repeat(pad))?;
        }
        writeln!(f, "|")?;
    }
    Ok(())
}

/// Members one per line, `!`-prefixed when the direction is inverted
fn member_lines(direction: &ResolvedDirection) -> String {
    let marker = if direction.inverse { "!" } else { "" };
    direction
        .members
        .iter()
        .map(|member| format!("{marker}{member}"))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Greedy word wrap; words longer than `width` keep their own line.
fn wrap(text: &str, width: usize) -> String {
    let mut lines: Vec<String> = Vec::new();
    let mut current = String::new();
    for word in text.split_whitespace() {
        if !current.is_empty() && current.chars().count() + 1 + word.chars().count() > width {
            lines.push(std::mem::take(&mut current));
        }
        if !current.is_empty() {
            current.push(' ');
        }
        current.push_str(word);
    }
    if !current.is_empty() {
        lines.push(current);
    }
    lines.join("\n")
}
