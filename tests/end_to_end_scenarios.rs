//! Crate-level integration tests for the end-to-end scenarios that cross a
//! component boundary no single library crate's unit tests exercise on their
//! own: a scan report turned into a lockfile and diffed back against a fresh
//! scan (S1), and resource-template matching end to end (S9). The proxy wire
//! scenarios (S2-S6) and the provenance/network scenarios (S7-S8) already
//! live as `#[cfg(test)]` modules inside `mcptrust-proxy`, `mcptrust-network`,
//! and `mcptrust-model` respectively, next to the code they exercise.

use chrono::Utc;
use mcptrust_canon::{hash_value, normalize_text, CanonVersion};
use mcptrust_enforcer::Enforcer;
use mcptrust_model::{
    Lockfile, LockfileMeta, Prompts, Resources, ResourceTemplate, ScanReport, ScannedTool, ServerInfo,
    ToolEntry, LOCK_FILE_VERSION,
};
use serde_json::{json, Value};

fn description_hash(description: Option<&str>) -> String {
    let value = match description {
        Some(text) => Value::String(normalize_text(text)),
        None => Value::Null,
    };
    hash_value(&value, CanonVersion::V2).expect("hashing a string or null never fails")
}

fn scan_report(tools: Vec<ScannedTool>) -> ScanReport {
    ScanReport {
        timestamp: Utc::now(),
        command: "npx -y example-server".to_string(),
        server_info: None,
        tools,
        resources: vec![],
        prompts: vec![],
        resource_templates: vec![],
        error: None,
    }
}

fn lock_from_report(report: &ScanReport) -> Lockfile {
    let tools = report
        .tools
        .iter()
        .map(|tool| {
            let entry = ToolEntry {
                description_hash: description_hash(tool.description.as_deref()),
                input_schema_hash: hash_value(&tool.input_schema, CanonVersion::V2).unwrap(),
                risk_level: "unknown".to_string(),
            };
            (tool.name.clone(), entry)
        })
        .collect();

    Lockfile {
        lock_file_version: LOCK_FILE_VERSION.to_string(),
        meta: LockfileMeta {
            generator: "mcptrust-test".to_string(),
            updated_at: Utc::now(),
        },
        server: ServerInfo { name: report.command.clone(), artifact: None },
        prompts: Prompts::default(),
        resources: Resources::default(),
        tools,
        extra: Default::default(),
    }
}

/// S1: lock a clean scan, then re-scan the identical server and diff — no drift.
#[test]
fn s1_lock_then_verify_with_no_changes_yields_no_drift() {
    let tool = ScannedTool {
        name: "read_file".to_string(),
        description: Some("Read file".to_string()),
        input_schema: json!({"type": "object"}),
    };
    let first_scan = scan_report(vec![tool.clone()]);
    let lockfile = lock_from_report(&first_scan);

    let second_scan = scan_report(vec![tool]);
    let drift = mcptrust_differ::diff(&lockfile, &second_scan).unwrap();

    assert!(!drift.has_drift);
    assert!(drift.items.is_empty());
}

/// A description change between lock time and verify time is moderate drift,
/// not critical — the tool itself is still present and callable.
#[test]
fn description_drift_is_reported_as_moderate_severity() {
    let locked = ScannedTool {
        name: "read_file".to_string(),
        description: Some("Read file".to_string()),
        input_schema: json!({"type": "object"}),
    };
    let lockfile = lock_from_report(&scan_report(vec![locked]));

    let drifted = ScannedTool {
        name: "read_file".to_string(),
        description: Some("Read file from disk".to_string()),
        input_schema: json!({"type": "object"}),
    };
    let drift = mcptrust_differ::diff(&lockfile, &scan_report(vec![drifted])).unwrap();

    assert!(drift.has_drift);
    assert_eq!(drift.max_severity(), Some(mcptrust_model::Severity::Moderate));
}

/// A newly observed tool absent from the lockfile is always critical drift.
#[test]
fn an_unlocked_new_tool_is_critical_drift() {
    let lockfile = lock_from_report(&scan_report(vec![]));
    let new_tool = ScannedTool {
        name: "debug_exec".to_string(),
        description: None,
        input_schema: json!({"type": "object"}),
    };
    let drift = mcptrust_differ::diff(&lockfile, &scan_report(vec![new_tool])).unwrap();

    assert!(drift.has_drift);
    assert_eq!(drift.max_severity(), Some(mcptrust_model::Severity::Critical));
}

fn lockfile_with_templates(templates: Vec<&str>) -> Lockfile {
    Lockfile {
        lock_file_version: LOCK_FILE_VERSION.to_string(),
        meta: LockfileMeta { generator: "mcptrust-test".to_string(), updated_at: Utc::now() },
        server: ServerInfo { name: "example-server".to_string(), artifact: None },
        prompts: Prompts::default(),
        resources: Resources {
            templates: templates
                .into_iter()
                .map(|uri_template| ResourceTemplate {
                    uri_template: uri_template.to_string(),
                    template_hash: mcptrust_canon::template_hash(uri_template, None).unwrap(),
                    name_hash: None,
                    description_hash: None,
                    mime_type: None,
                })
                .collect(),
        },
        tools: Default::default(),
        extra: Default::default(),
    }
}

/// S9: enforcer built from `["db://{id}", "file:///{path}"]` matches only
/// URIs shaped like the locked templates.
#[test]
fn s9_enforcer_matches_locked_resource_templates() {
    let lockfile = lockfile_with_templates(vec!["db://{id}", "file:///{path}"]);
    let enforcer = Enforcer::from_lockfile(&lockfile).unwrap();

    assert!(enforcer.allow_resource_uri("db://12345"));
    assert!(enforcer.allow_resource_uri("file:///a/b/c"));
    assert!(!enforcer.allow_resource_uri("http://evil/"));
}
