//! Integration tests for aws-fail2ban.
//!
//! These drive the compiled binary through paths that fail or finish before
//! any AWS call is made, so they need neither credentials nor the AWS CLI.

use std::io::Write;
use std::process::{Command, Output};
use tempfile::NamedTempFile;

const NO_CONFIG: &str = "/nonexistent/aws-fail2ban/config.yaml";

/// Run aws-fail2ban and return its output
fn run_aws_fail2ban(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_aws-fail2ban"))
        .args(args)
        .output()
        .expect("Failed to execute aws-fail2ban")
}

fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).to_string()
}

#[test]
fn test_version_command() {
    let output = run_aws_fail2ban(&["version"]);
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("aws-fail2ban"));
    assert!(stdout.contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn test_help_command() {
    let output = run_aws_fail2ban(&["--help"]);
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    for action in ["ban", "unban", "list", "flush"] {
        assert!(stdout.contains(action), "help is missing {}", action);
    }
}

#[test]
fn test_no_action_is_usage_error() {
    let output = run_aws_fail2ban(&[]);
    assert!(!output.status.success());
}

#[test]
fn test_ban_invalid_address() {
    let output = run_aws_fail2ban(&["-c", NO_CONFIG, "-i", "ipset-1", "ban", "not-an-ip"]);
    assert_eq!(output.status.code(), Some(1));
    assert!(stderr(&output).contains("Invalid IP address"));
}

#[test]
fn test_unban_invalid_address() {
    let output = run_aws_fail2ban(&["-c", NO_CONFIG, "-i", "ipset-1", "unban", "example.com"]);
    assert_eq!(output.status.code(), Some(1));
    assert!(stderr(&output).contains("Invalid IP address"));
}

#[test]
fn test_missing_ip_set_id() {
    let output = run_aws_fail2ban(&["-c", NO_CONFIG, "list"]);
    assert_eq!(output.status.code(), Some(1));
    assert!(stderr(&output).contains("IP set id"));
}

#[test]
fn test_wafv2_requires_name() {
    let output = run_aws_fail2ban(&[
        "-c",
        NO_CONFIG,
        "-i",
        "ipset-1",
        "--firewall",
        "wafv2",
        "flush",
    ]);
    assert_eq!(output.status.code(), Some(1));
    assert!(stderr(&output).contains("wafv2 requires an IP set name"));
}

#[test]
fn test_cloudfront_scope_needs_wafv2() {
    let output = run_aws_fail2ban(&[
        "-c",
        NO_CONFIG,
        "-i",
        "ipset-1",
        "--scope",
        "cloudfront",
        "list",
    ]);
    assert_eq!(output.status.code(), Some(1));
    assert!(stderr(&output).contains("cloudfront"));
}

#[test]
fn test_invalid_config_file() {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(file, "ip_set_id: ipset-1\nbatch_size: 5000").unwrap();
    let path = file.path().to_str().unwrap();

    let output = run_aws_fail2ban(&["-c", path, "list"]);
    assert_eq!(output.status.code(), Some(1));
    assert!(stderr(&output).contains("batch_size"));
}

#[test]
fn test_unknown_config_key() {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(file, "ip_set_id: ipset-1\nbackend: nftables").unwrap();
    let path = file.path().to_str().unwrap();

    let output = run_aws_fail2ban(&["-c", path, "list"]);
    assert_eq!(output.status.code(), Some(1));
    assert!(stderr(&output).contains("Failed to parse config file"));
}

#[test]
fn test_quiet_still_reports_errors() {
    let output = run_aws_fail2ban(&["-q", "-c", NO_CONFIG, "list"]);
    assert_eq!(output.status.code(), Some(1));
    assert!(!stderr(&output).is_empty());
    assert!(output.stdout.is_empty());
}
