use super::{report_values, REPORT_FIELDS};
use crate::compile::EnrichedRule;

const DELIMITER: char = ';';

/// Render rules as `;`-delimited CSV, header first.
pub fn to_csv<'a>(rules: impl IntoIterator<Item = &'a EnrichedRule>) -> String {
    let mut out = REPORT_FIELDS.join(&DELIMITER.to_string());
    out.push('\n');

    for rule in rules {
        let cells: Vec<String> = report_values(rule).iter().map(|v| quote(v)).collect();
        out.push_str(&cells.join(&DELIMITER.to_string()));
        out.push('\n');
    }
    out
}

fn quote(value: &str) -> String {
    if value.contains([DELIMITER, '"', '\n', '\r']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}
