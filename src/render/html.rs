use std::fmt;

use super::{ReportRow, REPORT_FIELDS};
use crate::compile::{DirectionLabel, EnrichedRule};

const STYLE: &str = r#"    <style>
    table{width:100%;margin:0 auto;clear:both;border-collapse:separate;border-spacing:0;border:1px solid #ababab;
    font-size:12px}
    table thead td,table thead th{padding:10px;border-bottom:1px solid rgba(0,0,0,.3)}
    tbody tr:first-child td{border-top:none}tbody td{border-top:1px solid rgba(0,0,0,.15)}td,th{border-style:solid;
    text-align:center!important}
    tr:hover{background:#ffeb0052!important}
    .disabled{background:repeating-linear-gradient(45deg,transparent 0 5px,#00000014 0 10px);color:#a7a7a7}
    .disabled:hover{background:repeating-linear-gradient(45deg,transparent 0 5px,#00000014 0 10px)!important;color:#000}
    .not{color:red;font-weight:700}th{text-transform:capitalize;border-color:#00000026;border-width:0 1 1 0}
    body{margin:0}table thead th{padding:4px}thead th{font-size:15px;background-color:#bdbdbd}
    td{padding:0 0 0 3px!important;border-width:0 1px 0 0;border-right-color:#00000026}html{font-family:sans-serif}
    .add{background-color:#00ff0820!important}.del{background-color:#ff000020!important}
    .chg_old{background:repeating-linear-gradient(45deg,transparent 0 5px,#0089ff20 0 10px)!important}
    .chg_new{background-color:#0089ff20!important}.add:hover{background-color:#00ff0850!important}
    .del:hover{background-color:#ff000050!important}
    .chg_old:hover{background:repeating-linear-gradient(45deg,transparent 0 5px,#0089ff50 0 10px)!important}
    .chg_new:hover{background-color:#0089ff50!important}
    </style>
"#;

const DATATABLES_ASSETS: &str = r#"    <link rel="stylesheet" type="text/css" href="DataTables/datatables.min.css"/>
    <link rel="stylesheet" type="text/css" href="DataTables/main.css"/>
    <script type="text/javascript" src="DataTables/jquery.min.js"></script>
    <script type="text/javascript" src="DataTables/datatables.min.js"></script>
"#;

const DATATABLES_SCRIPT: &str =
    "\t<script type=\"text/javascript\" src=\"DataTables/main.js\"></script>\n";

/// HTML report writer.
///
/// Standalone reports inline their stylesheet; interactive reports link
/// the DataTables assets next to the report instead.
#[derive(Debug, Clone, Copy, Default)]
pub struct HtmlReport {
    interactive: bool,
}

impl HtmlReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_interactive(mut self, interactive: bool) -> Self {
        self.interactive = interactive;
        self
    }

    /// Render a full HTML document with one body row per rule.
    pub fn render<'a>(&self, rows: impl IntoIterator<Item = ReportRow<'a>>) -> String {
        Document {
            interactive: self.interactive,
            rows: rows.into_iter().collect(),
        }
        .to_string()
    }
}

struct Document<'a> {
    interactive: bool,
    rows: Vec<ReportRow<'a>>,
}

impl fmt::Display for Document<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("<html><head>\n    <meta charset=\"utf-8\">\n")?;
        if self.interactive {
            f.write_str(DATATABLES_ASSETS)?;
            f.write_str("</head>\n<body>\n")?;
        } else {
            f.write_str("</head>\n<body>\n")?;
            f.write_str(STYLE)?;
        }
        f.write_str("    <table id='main_tbl' class='display'>\n")?;

        let sections: &[&str] = if self.interactive {
            &["thead", "tfoot"]
        } else {
            &["thead"]
        };
        for section in sections {
            writeln!(f, "\t\t<{section}>\n\t\t<tr>")?;
            for name in REPORT_FIELDS {
                writeln!(f, "\t\t\t<th>{name}</th>")?;
            }
            writeln!(f, "\t\t</tr>\n\t\t</{section}>")?;
        }

        f.write_str("\t\t<tbody>\n")?;
        for row in &self.rows {
            write!(f, "{}", HtmlRow(row))?;
        }
        f.write_str("\t\t</tbody>\n\t</table>\n")?;

        if self.interactive {
            f.write_str(DATATABLES_SCRIPT)?;
        }
        f.write_str("</body>\n</html>")
    }
}

struct HtmlRow<'r, 'a>(&'r ReportRow<'a>);

impl fmt::Display for HtmlRow<'_, '_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let row = self.0;
        let mut classes = Vec::new();
        if row.rule.rule.is_disabled() {
            classes.push("disabled");
        }
        if let Some(state) = row.state {
            classes.push(state.class());
        }

        if classes.is_empty() {
            f.write_str("\t\t<tr>\n")?;
        } else {
            writeln!(f, "\t\t<tr class=\"{}\">", classes.join(" "))?;
        }
        for cell in cells(row.rule) {
            writeln!(f, "\t\t\t<td>{cell}</td>")?;
        }
        f.write_str("\t\t</tr>\n")
    }
}

fn cells(rule: &EnrichedRule) -> [String; 11] {
    let display = &rule.display;
    let action = if rule.is_blocking() {
        format!("<span class=\"not\">{}</span>", escape(&display.action))
    } else {
        escape(&display.action)
    };
    let interfaces: Vec<String> = display.interfaces.iter().map(|i| escape(i)).collect();

    [
        escape(&rule.rule.tracker),
        action,
        escape(&display.floating),
        interfaces.join("<br>"),
        escape(&rule.rule.protocol),
        direction(&display.source),
        direction(&display.destination),
        escape(&rule.rule.gateway),
        escape(&rule.rule.description),
        escape(&display.created),
        escape(&display.updated),
    ]
}

fn direction(label: &DirectionLabel) -> String {
    let mut out = String::new();
    if label.inverse {
        out.push_str("<span class=\"not\">NOT </span>");
    }
    out.push_str(&with_tooltip(&label.address, &label.address_leaves));
    if !label.address.is_empty() && !label.port.is_empty() {
        out.push_str(" &#8594; ");
    }
    out.push_str(&with_tooltip(&label.port, &label.port_leaves));
    out
}

/// Alias names carry their resolved leaves as a `title`
fn with_tooltip(name: &str, leaves: &[String]) -> String {
    if leaves.is_empty() {
        return escape(name);
    }
    let title: Vec<String> = leaves.iter().map(|leaf| escape(leaf)).collect();
    format!(
        "<span title=\"{}\">{}</span>",
        title.join("&#10;"),
        escape(name)
    )
}

fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compile::RuleSet;
    use crate::render::RowState;

    const DOCUMENT: &str = r#"<pfsense>
  <aliases>
    <alias><name>dns_servers</name><address>10.20.0.53 10.20.0.54</address></alias>
  </aliases>
  <filter>
    <rule>
      <tracker>1</tracker><type>reject</type><interface>lan</interface>
      <source><any/></source>
      <destination><not/><address>dns_servers</address><port>53</port></destination>
    </rule>
    <rule>
      <tracker>2</tracker><type>pass</type><interface>lan</interface><disabled/>
      <source><any/></source><destination><any/></destination>
    </rule>
  </filter>
</pfsense>"#;

    #[test]
    fn test_escape() {
        assert_eq!(escape("a<b & 'c'"), "a&lt;b &amp; &#39;c&#39;");
    }

    #[test]
    fn test_standalone_document() {
        let set = RuleSet::parse("fw", DOCUMENT).unwrap();
        let html = HtmlReport::new().render(set.rules().iter().map(ReportRow::from));

        assert!(html.starts_with("<html><head>"));
        assert!(html.contains("<style>"));
        assert!(html.contains("<table id='main_tbl' class='display'>"));
        assert!(html.contains("<th>description</th>"));
        assert!(!html.contains("<tfoot>"));
        assert!(!html.contains("DataTables/"));
        assert!(html.contains("<span class=\"not\">REJECT</span>"));
        assert!(html.contains(
            "<span class=\"not\">NOT </span><span title=\"10.20.0.53&#10;10.20.0.54\">dns_servers</span> &#8594; 53"
        ));
        assert!(html.contains("<tr class=\"disabled\">"));
        assert!(html.ends_with("</html>"));
    }

    #[test]
    fn test_interactive_document() {
        let set = RuleSet::parse("fw", DOCUMENT).unwrap();
        let html = HtmlReport::new()
            .with_interactive(true)
            .render(set.rules().iter().map(ReportRow::from));

        assert!(!html.contains("<style>"));
        assert!(html.contains("DataTables/datatables.min.css"));
        assert!(html.contains("DataTables/main.js"));
        assert!(html.contains("<tfoot>"));
    }

    #[test]
    fn test_row_has_one_cell_per_field() {
        let set = RuleSet::parse("fw", DOCUMENT).unwrap();
        let row = ReportRow::from(&set.rules()[0]);
        let html = HtmlRow(&row).to_string();

        assert!(html.starts_with("\t\t<tr>\n"));
        assert!(html.ends_with("\t\t</tr>\n"));
        assert_eq!(html.matches("<td>").count(), REPORT_FIELDS.len());
    }

    #[test]
    fn test_row_state_class() {
        let set = RuleSet::parse("fw", DOCUMENT).unwrap();
        let rows = set
            .rules()
            .iter()
            .map(ReportRow::from)
            .map(|row| row.with_state(RowState::ChangedNew));
        let html = HtmlReport::new().render(rows);

        assert!(html.contains("<tr class=\"chg_new\">"));
        assert!(html.contains("<tr class=\"disabled chg_new\">"));
    }
}
