//! Tracker module.
//!
//! Loads every device of an inventory and answers queries across all of
//! them.

use std::collections::HashSet;
use std::fs;
use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::compile::RuleSet;
use crate::device::{
    CachedFetcher, ConfigFetcher, InventoryProvider, DEFAULT_CACHE_SIZE, DEFAULT_CACHE_TTL,
};
use crate::engine::{MatchEngine, MatchedRule};
use crate::error::{Result, TrackerError};
use crate::query::{ParsedQuery, QueryParser, DEFAULT_FIELDS};
use crate::render::{HtmlReport, MatchTable, ReportRow};

const PROMPT: &str = "Enter query: ";

/// Tracker options.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerOptions {
    /// Query fields accepted by the parser
    pub fields: Vec<String>,
    /// Freshness window of cached documents, in seconds
    pub cache_ttl_secs: u64,
    /// On-disk document cache; memory only when unset
    pub cache_dir: Option<PathBuf>,
    pub cache_size: usize,
    /// Where per-device HTML reports are written; no reports when unset
    pub report_dir: Option<PathBuf>,
    /// Link DataTables assets instead of inlining CSS in reports
    pub interactive_reports: bool,
}

impl Default for TrackerOptions {
    fn default() -> Self {
        Self {
            fields: DEFAULT_FIELDS.iter().map(|f| f.to_string()).collect(),
            cache_ttl_secs: DEFAULT_CACHE_TTL.as_secs(),
            cache_dir: None,
            cache_size: DEFAULT_CACHE_SIZE,
            report_dir: None,
            interactive_reports: false,
        }
    }
}

impl TrackerOptions {
    /// Create new tracker options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Load options from a JSON file. Missing keys keep their defaults.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)
            .map_err(|e| TrackerError::OptionsError(format!("{}: {}", path.display(), e)))?;
        let options: Self = serde_json::from_str(&text)?;
        options.validate()?;
        Ok(options)
    }

    fn validate(&self) -> Result<()> {
        if self.fields.is_empty() {
            return Err(TrackerError::OptionsError("no query fields".to_string()));
        }
        if let Some(bad) = self
            .fields
            .iter()
            .find(|f| f.is_empty() || !f.chars().all(|c| c.is_alphanumeric() || c == '_'))
        {
            return Err(TrackerError::OptionsError(format!("invalid query field '{}'", bad)));
        }
        Ok(())
    }

    pub fn with_fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.fields = fields.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache_ttl_secs = ttl.as_secs();
        self
    }

    pub fn with_cache_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.cache_dir = Some(dir.as_ref().to_path_buf());
        self
    }

    pub fn with_cache_size(mut self, size: usize) -> Self {
        self.cache_size = size;
        self
    }

    pub fn with_report_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.report_dir = Some(dir.as_ref().to_path_buf());
        self
    }

    pub fn with_interactive_reports(mut self, interactive: bool) -> Self {
        self.interactive_reports = interactive;
        self
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    pub fn query_parser(&self) -> QueryParser {
        QueryParser::new(self.fields.iter().cloned())
    }

    /// Wrap `fetcher` in a cache configured from these options.
    pub fn cached<F: ConfigFetcher>(&self, fetcher: F) -> CachedFetcher<F> {
        let cached = CachedFetcher::new(fetcher)
            .with_ttl(self.cache_ttl())
            .with_capacity(self.cache_size);
        match self.cache_dir.as_ref() {
            Some(dir) => cached.with_disk_dir(dir),
            None => cached,
        }
    }
}

/// Rule sets of every reachable device, queried together.
#[derive(Debug, Clone)]
pub struct Tracker {
    rule_sets: Vec<RuleSet>,
    parser: QueryParser,
    options: TrackerOptions,
}

impl Tracker {
    /// Fetch and parse every inventory device, in inventory order.
    ///
    /// Devices whose document cannot be fetched or parsed are left out
    /// with a warning; only an inventory failure is an error. Device names
    /// are unique: a repeated name is skipped without fetching.
    pub fn load<I, F>(inventory: &I, fetcher: &F, options: TrackerOptions) -> Result<Self>
    where
        I: InventoryProvider + ?Sized,
        F: ConfigFetcher + ?Sized,
    {
        let devices = inventory.devices()?;
        let mut rule_sets = Vec::with_capacity(devices.len());

        for device in devices {
            if rule_sets.iter().any(|set: &RuleSet| set.name() == device.name) {
                warn!(device = %device.name, "duplicate device name skipped");
                continue;
            }
            let loaded = fetcher
                .fetch(&device)
                .and_then(|text| RuleSet::parse(device.name.clone(), &text));
            match loaded {
                Ok(rule_set) => {
                    info!(device = %device.name, rules = rule_set.rule_count(), "device loaded");
                    rule_sets.push(rule_set);
                }
                Err(e) => warn!(device = %device.name, error = %e, "device excluded"),
            }
        }

        Ok(Self::from_rule_sets(rule_sets, options))
    }

    /// Build from parsed rule sets. Of several sets sharing a name only
    /// the first is kept, so report files and table blocks stay one per
    /// device.
    pub fn from_rule_sets(mut rule_sets: Vec<RuleSet>, options: TrackerOptions) -> Self {
        let mut seen = HashSet::new();
        rule_sets.retain(|set| {
            let first = seen.insert(set.name().to_string());
            if !first {
                warn!(device = set.name(), "duplicate device name skipped");
            }
            first
        });
        Self {
            rule_sets,
            parser: options.query_parser(),
            options,
        }
    }

    pub fn rule_sets(&self) -> &[RuleSet] {
        &self.rule_sets
    }

    pub fn parser(&self) -> &QueryParser {
        &self.parser
    }

    pub fn options(&self) -> &TrackerOptions {
        &self.options
    }

    /// Scan every device in order. Sequence numbers restart per device.
    pub fn search(&self, query: &ParsedQuery) -> Vec<MatchedRule<'_>> {
        self.rule_sets
            .iter()
            .flat_map(|rule_set| MatchEngine::new(rule_set).scan(query))
            .collect()
    }

    /// Parse and run a query line.
    pub fn search_line(&self, line: &str) -> Result<Vec<MatchedRule<'_>>> {
        let query = self.parser.parse(line).into_result()?;
        Ok(self.search(&query))
    }

    /// Text table with a separator row opening each device's block.
    pub fn table(&self, matches: &[MatchedRule<'_>]) -> MatchTable {
        let mut table = MatchTable::new();
        for rule_set in &self.rule_sets {
            table.push_separator();
            for matched in matches.iter().filter(|m| m.device == rule_set.name()) {
                table.push(matched);
            }
        }
        table
    }

    /// Write `<device>.html` for every device with matches and remove
    /// stale reports of devices without. No-op without a report directory.
    pub fn write_reports(&self, matches: &[MatchedRule<'_>]) -> Result<()> {
        let Some(dir) = self.options.report_dir.as_ref() else {
            return Ok(());
        };
        let report = HtmlReport::new().with_interactive(self.options.interactive_reports);

        for rule_set in &self.rule_sets {
            let path = dir.join(format!("{}.html", rule_set.name()));
            let rows: Vec<ReportRow<'_>> = matches
                .iter()
                .filter(|m| m.device == rule_set.name())
                .map(|m| ReportRow::from(m.rule))
                .collect();

            if rows.is_empty() {
                if path.exists() {
                    fs::remove_file(&path)?;
                    debug!(path = %path.display(), "stale report removed");
                }
                continue;
            }

            fs::create_dir_all(dir)?;
            fs::write(&path, report.render(rows))?;
            info!(device = rule_set.name(), path = %path.display(), "report saved");
        }
        Ok(())
    }

    /// Prompt for queries on `output`, read them from `input`, and answer
    /// each with a table until the input ends.
    pub fn run_query_loop<R: BufRead, W: Write>(&self, mut input: R, mut output: W) -> Result<()> {
        loop {
            write!(output, "{PROMPT}")?;
            output.flush()?;

            let mut line = String::new();
            if input.read_line(&mut line)? == 0 {
                writeln!(output)?;
                return Ok(());
            }
            let line = line.trim();
            if line.is_empty() {
                continue;
            }

            let query = self.parser.parse(line);
            if !query.is_success() {
                for key in &query.invalid {
                    writeln!(output, "Invalid key: {}", key)?;
                }
                continue;
            }

            let matches = self.search(&query);
            debug!(query = %query, matches = matches.len(), "query answered");
            write!(output, "{}", self.table(&matches))?;

            if let Err(e) = self.write_reports(&matches) {
                warn!(error = %e, "failed to save reports");
            }
        }
    }
}
