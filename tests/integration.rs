use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

fn hdi_binary() -> PathBuf {
    let mut path = std::env::current_exe().unwrap();
    path.pop(); // remove test binary name
    path.pop(); // remove deps/
    path.push("hdi");
    path
}

const UPLOAD: &str = r#"[
  {"Ticket": "N1", "Description": "VPN connection timeout from home office", "category": "Network", "priority": "High", "solution": "Reset the VPN profile", "status": "Open", "due_date": "2024-06-01 10:00"},
  {"Ticket": "N2", "Description": "vpn login fails after password change", "category": "Network", "priority": "High", "status": "Closed", "due_date": "2024-06-01 08:00"},
  {"Ticket": "N3", "Description": "wifi drops every hour in meeting room", "category": "Network", "priority": "Medium"},
  {"Ticket": "N4", "Description": "router firewall blocks port 443", "category": "Network", "priority": "Low"},
  {"Ticket": "H1", "Description": "printer jammed on floor two", "category": "Hardware", "priority": "Low", "solution": "Clear the paper tray", "due_date": "2024-06-01T07:00:00Z"},
  {"Ticket": "H2", "Description": "laptop screen flickers when docked", "category": "Hardware", "priority": "Medium"},
  {"Ticket": "H3", "Description": "keyboard keys stuck after spill", "category": "Hardware", "priority": "Low"},
  {"Ticket": "H4", "Description": "monitor shows no signal", "category": "Hardware", "priority": "Medium"},
  {"Ticket": "E1", "Description": "outlook email not syncing on phone", "category": "Email", "priority": "High"},
  {"Ticket": "E2", "Description": "mailbox full cannot send email", "category": "Email", "priority": "Medium"},
  {"Ticket": "E3", "Description": "spam filter hides vendor invoices", "category": "Email", "priority": "Low"},
  {"Ticket": "E4", "Description": "shared calendar invite missing", "category": "Email", "priority": "Medium"},
  {"Ticket": "X1", "Description": "", "category": "Email", "priority": "Low"}
]"#;

fn setup_test_env() -> (TempDir, PathBuf, PathBuf) {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().to_path_buf();

    let config_dir = root.join("config");
    fs::create_dir_all(&config_dir).unwrap();

    let config_content = r#"[engine]
seed = 11

[oracle]
provider = "disabled"

[ingest.columns]
ticket_id = "Ticket"
problem_description = "Description"
"#;
    let config_path = config_dir.join("hdi.toml");
    fs::write(&config_path, config_content).unwrap();

    let upload_path = root.join("tickets.json");
    fs::write(&upload_path, UPLOAD).unwrap();

    (tmp, config_path, upload_path)
}

fn run_hdi(config_path: &Path, args: &[&str]) -> (String, String, bool) {
    let binary = hdi_binary();
    let output = Command::new(&binary)
        .arg("--config")
        .arg(config_path.to_str().unwrap())
        .args(args)
        .output()
        .unwrap_or_else(|e| panic!("Failed to run hdi binary at {:?}: {}", binary, e));

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    let success = output.status.success();
    (stdout, stderr, success)
}

#[test]
fn test_train_prints_summary() {
    let (_tmp, config_path, upload) = setup_test_env();

    let (stdout, stderr, success) = run_hdi(&config_path, &["train", upload.to_str().unwrap()]);
    assert!(success, "train failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("Training cycle 1"));
    assert!(stdout.contains("Tickets:      12"));
    assert!(stdout.contains("Rejected:     1"));
    assert!(stdout.contains("Accuracy: overall"));
}

#[test]
fn test_search_ranks_best_match_first() {
    let (_tmp, config_path, upload) = setup_test_env();

    let (stdout, stderr, success) = run_hdi(
        &config_path,
        &["search", upload.to_str().unwrap(), "vpn timeout", "--limit", "3"],
    );
    assert!(success, "search failed: stderr={}", stderr);
    let first = stdout.lines().next().unwrap_or("");
    assert!(first.starts_with("1. "), "unexpected output: {}", stdout);
    assert!(first.contains("N1"), "expected N1 first: {}", stdout);
    assert!(!stdout.contains("4. "));
}

#[test]
fn test_search_no_results() {
    let (_tmp, config_path, upload) = setup_test_env();

    let (stdout, _, success) =
        run_hdi(&config_path, &["search", upload.to_str().unwrap(), "the and of"]);
    assert!(success);
    assert!(stdout.contains("No results."));
}

#[test]
fn test_report_sections() {
    let (_tmp, config_path, upload) = setup_test_env();

    let (stdout, stderr, success) = run_hdi(&config_path, &["report", upload.to_str().unwrap()]);
    assert!(success, "report failed: stderr={}", stderr);
    assert!(stdout.contains("Root causes"));
    assert!(stdout.contains("Network"));
    assert!(stdout.contains("Heatmap"));
    assert!(stdout.contains("Keywords"));
}

#[test]
fn test_sla_lists_open_tickets_only() {
    let (_tmp, config_path, upload) = setup_test_env();

    let (stdout, stderr, success) = run_hdi(
        &config_path,
        &[
            "sla",
            upload.to_str().unwrap(),
            "--now",
            "2024-06-01T09:00:00Z",
        ],
    );
    assert!(success, "sla failed: stderr={}", stderr);
    assert!(stdout.contains("N1"));
    assert!(stdout.contains("H1"));
    assert!(stdout.contains("-2h 0m"));
    assert!(!stdout.contains("N2"), "closed ticket listed: {}", stdout);
}

#[test]
fn test_suggest_falls_back_to_history() {
    let (_tmp, config_path, upload) = setup_test_env();

    let (stdout, stderr, success) = run_hdi(
        &config_path,
        &["suggest", upload.to_str().unwrap(), "vpn timeout at home"],
    );
    assert!(success, "suggest failed: stderr={}", stderr);
    assert!(stdout.contains("from ticket N1"));
    assert!(stdout.contains("Reset the VPN profile"));
}

#[test]
fn test_missing_description_column_fails() {
    let (tmp, config_path, _) = setup_test_env();
    let bad = tmp.path().join("bad.json");
    fs::write(&bad, r#"[{"Summary": "printer broken"}]"#).unwrap();

    let (_, stderr, success) = run_hdi(&config_path, &["train", bad.to_str().unwrap()]);
    assert!(!success);
    assert!(stderr.contains("Description"), "stderr={}", stderr);
}

#[test]
fn test_empty_upload_fails() {
    let (tmp, config_path, _) = setup_test_env();
    let empty = tmp.path().join("empty.json");
    fs::write(&empty, "").unwrap();

    let (_, stderr, success) = run_hdi(&config_path, &["train", empty.to_str().unwrap()]);
    assert!(!success);
    assert!(stderr.contains("upload is empty"), "stderr={}", stderr);
}

#[test]
fn test_explicit_missing_config_fails() {
    let (tmp, _, upload) = setup_test_env();
    let missing = tmp.path().join("nope.toml");

    let (_, stderr, success) = run_hdi(&missing, &["train", upload.to_str().unwrap()]);
    assert!(!success);
    assert!(stderr.contains("Failed to read config file"));
}
