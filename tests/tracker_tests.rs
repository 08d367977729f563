//! Integration tests against a saved firewall configuration in testdata/

use std::fs;
use std::path::PathBuf;

use pf_rule_tracker::{
    parse_document_from_file, to_csv, Device, DirectoryFetcher, MatchEngine, QueryParser, RuleSet,
    StaticInventory, Tracker, TrackerOptions,
};

fn testdata() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("testdata")
}

fn rule_set() -> RuleSet {
    let text = fs::read_to_string(testdata().join("pfsense-config.xml")).unwrap();
    RuleSet::parse("fw-edge", &text).unwrap()
}

fn trackers(rule_set: &RuleSet, line: &str) -> Vec<String> {
    let query = QueryParser::default().parse(line);
    assert!(query.is_success(), "query '{}' should parse", line);
    MatchEngine::new(rule_set)
        .scan(&query)
        .iter()
        .map(|m| m.rule.rule.tracker.clone())
        .collect()
}

#[test]
fn test_document_sections() {
    let doc = parse_document_from_file(testdata().join("pfsense-config.xml")).unwrap();
    assert_eq!(doc.interfaces.len(), 4);
    assert_eq!(doc.aliases.len(), 9);
    assert_eq!(doc.filter.len(), 9);

    let wan = doc.interfaces.get("wan").unwrap();
    assert!(wan.enabled);
    assert_eq!(wan.ifname, "igb0");
    assert_eq!(wan.gateway, "WAN_GW");
    assert!(!doc.interfaces.get("opt2").unwrap().enabled);
    assert!(doc.interfaces.get("opt2").unwrap().cidr.is_none());

    let admins = doc.aliases.get("admin_hosts").unwrap();
    assert_eq!(admins.members, vec!["10.10.0.10", "10.10.0.11"]);
    assert_eq!(admins.description, "Admin workstations");
}

#[test]
fn test_duplicate_tracker_keeps_position_takes_last_content() {
    let set = rule_set();
    let order: Vec<&str> = set.rules().iter().map(|r| r.rule.tracker.as_str()).collect();
    assert_eq!(order[1], "1000000102");
    assert_eq!(
        set.get("1000000102").unwrap().rule.description,
        "Admins to firewall (ssh+web)"
    );
}

#[test]
fn test_precedence_order() {
    let set = rule_set();
    let order: Vec<&str> = set
        .in_precedence_order()
        .iter()
        .map(|r| r.rule.tracker.as_str())
        .collect();
    assert_eq!(
        order,
        vec![
            "1000000103",
            "1000000101",
            "1000000102",
            "1000000104",
            "1000000105",
            "1000000106",
            "1000000109",
            "1000000110",
            "1000000107",
        ]
    );
}

#[test]
fn test_resolution() {
    let set = rule_set();

    let admin = set.get("1000000102").unwrap();
    assert_eq!(admin.destination_ports, vec!["22", "80", "443"]);
    assert_eq!(admin.destination.members[0].to_string(), "10.10.0.1/32");

    let guest = set.get("1000000109").unwrap();
    let source: Vec<String> = guest.source.members.iter().map(|m| m.to_string()).collect();
    assert_eq!(source, vec!["interface-opt2"]);
    let destination: Vec<String> = guest.destination.members.iter().map(|m| m.to_string()).collect();
    assert_eq!(destination, vec!["loop_a", "192.0.2.99/32"]);

    let dmz = set.get("1000000105").unwrap();
    assert!(dmz.destination.inverse);
    let source: Vec<String> = dmz.source.members.iter().map(|m| m.to_string()).collect();
    assert_eq!(source, vec!["172.16.5.1/24"]);
}

#[test]
fn test_display_labels() {
    let set = rule_set();
    let web = &set.get("1000000101").unwrap().display;
    assert_eq!(web.action, "pass");
    assert_eq!(web.floating, "no");
    assert_eq!(web.interfaces, vec!["LAN (10.10.0.1/24)"]);
    assert_eq!(web.source.to_string(), "LAN (10.10.0.1/24)");
    assert_eq!(web.destination.to_string(), "dmz_servers → web_ports");
    assert_eq!(web.created, "14.11.2023 22:13 by admin@10.10.0.10");
    assert_eq!(web.updated, "14.11.2023 23:13 by jdoe");

    let blocked = &set.get("1000000103").unwrap().display;
    assert_eq!(blocked.action, "BLOCK");
    assert_eq!(blocked.floating, "yes (quick)");
    assert_eq!(blocked.source.address_leaves, vec!["203.0.113.66", "203.0.113.67"]);

    assert_eq!(set.get("1000000104").unwrap().display.action, "REJECT");
    assert_eq!(
        set.get("1000000105").unwrap().display.destination.to_string(),
        "NOT internal_nets"
    );
}

#[test]
fn test_blocklisted_host() {
    let set = rule_set();
    let query = QueryParser::default().parse("203.0.113.66 act=block");
    let matches = MatchEngine::new(&set).scan(&query);
    assert_eq!(matches.len(), 1);
    assert_eq!(matches[0].sequence, 1);
    assert_eq!(matches[0].rule.display.action, "BLOCK");
}

#[test]
fn test_raw_ip_walks_every_slot() {
    let set = rule_set();
    assert_eq!(
        trackers(&set, "203.0.113.66"),
        vec!["1000000103", "1000000105", "1000000110", "1000000107"]
    );
}

#[test]
fn test_home_source_includes_universal_rules() {
    let set = rule_set();
    assert_eq!(
        trackers(&set, "src+=10.10.0.10"),
        vec!["1000000101", "1000000102", "1000000110", "1000000107"]
    );
    assert!(trackers(&set, "src+=8.8.8.8").is_empty());
}

#[test]
fn test_destination_and_port() {
    let set = rule_set();
    assert_eq!(trackers(&set, "dst=172.16.5.20 port=443"), vec!["1000000101"]);
    assert_eq!(trackers(&set, "port=22"), vec!["1000000102"]);
    assert_eq!(trackers(&set, "dst+=172.16.5.99 act=reject"), vec!["1000000104"]);
}

#[test]
fn test_text_fields() {
    let set = rule_set();
    assert_eq!(trackers(&set, "desc+=dmz"), vec!["1000000101", "1000000104", "1000000105"]);
    let split = QueryParser::default().parse("pf=fw-edge desc=icmp everywhere");
    assert_eq!(split.invalid, vec!["everywhere".to_string()]);
    assert_eq!(trackers(&set, "desc=drop_blocklisted").len(), 0);
    assert!(trackers(&set, "pf=fw-core").is_empty());
}

#[test]
fn test_disabled_rule_never_matches() {
    let set = rule_set();
    assert!(!trackers(&set, "").contains(&"1000000106".to_string()));
    assert_eq!(trackers(&set, "").len(), 8);
}

#[test]
fn test_tracker_over_directory() {
    let inventory: StaticInventory = [
        Device::new("pfsense-config", "192.0.2.1/24"),
        Device::new("fw-missing", "192.0.2.2"),
    ]
    .into_iter()
    .collect();
    let fetcher = DirectoryFetcher::new(testdata());
    let tracker = Tracker::load(&inventory, &fetcher, TrackerOptions::default()).unwrap();

    assert_eq!(tracker.rule_sets().len(), 1);
    let matches = tracker.search_line("pf=pfsense-config act=block").unwrap();
    assert_eq!(matches.len(), 1);
    assert_eq!(matches[0].device, "pfsense-config");
}

#[test]
fn test_query_loop_writes_reports() {
    let dir = std::env::temp_dir().join("pf_rule_tracker_test_query_loop");
    let _ = fs::remove_dir_all(&dir);

    let options = TrackerOptions::default().with_report_dir(&dir);
    let tracker = Tracker::from_rule_sets(vec![rule_set()], options);

    let mut output = Vec::new();
    tracker
        .run_query_loop("203.0.113.66 act=block\n".as_bytes(), &mut output)
        .unwrap();
    let text = String::from_utf8(output).unwrap();
    assert!(text.contains("| 1000000103 "));

    let report = fs::read_to_string(dir.join("fw-edge.html")).unwrap();
    assert!(report.contains("<table id='main_tbl' class='display'>"));
    assert!(report.contains("<span class=\"not\">BLOCK</span>"));
    assert!(report.contains("title=\"203.0.113.66&#10;203.0.113.67\""));

    let mut output = Vec::new();
    tracker
        .run_query_loop("act=nothing\n".as_bytes(), &mut output)
        .unwrap();
    assert!(!dir.join("fw-edge.html").exists());

    fs::remove_dir_all(&dir).ok();
}

#[test]
fn test_csv_report() {
    let set = rule_set();
    let csv = to_csv(set.in_precedence_order());
    let lines: Vec<&str> = csv.lines().collect();
    assert_eq!(lines.len(), 10);
    assert!(lines[1].starts_with("1000000103;BLOCK;yes (quick);WAN (198.51.100.2/28);any;"));
}
