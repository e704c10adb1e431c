use mcptrust_model::{DriftReport, Lockfile};
use serde_json::{json, Value};

/// Builds the read-only `input` document every rule expression evaluates
/// against (§6). Shape is fixed by spec; this function is the single place
/// that assembles it from the lockfile and the differ's output.
pub fn build_input(lockfile: &Lockfile, drift: &DriftReport) -> Value {
    let mut prompt_names: Vec<&String> = lockfile.prompts.definitions.keys().collect();
    prompt_names.sort();

    let prompt_definitions: serde_json::Map<String, Value> = lockfile
        .prompts
        .definitions
        .iter()
        .map(|(name, def)| {
            (
                name.clone(),
                json!({"argumentsHash": def.arguments_hash}),
            )
        })
        .collect();

    let templates: Vec<Value> = lockfile
        .resources
        .templates
        .iter()
        .map(|t| {
            json!({
                "uriTemplate": t.uri_template,
                "mimeType": t.mime_type,
                "templateHash": t.template_hash,
            })
        })
        .collect();

    let mut schemes: Vec<String> = lockfile
        .resources
        .templates
        .iter()
        .filter_map(|t| t.uri_template.split_once("://").map(|(scheme, _)| scheme.to_lowercase()))
        .collect();
    schemes.sort();
    schemes.dedup();

    let tools: Vec<Value> = lockfile
        .tools
        .iter()
        .map(|(name, entry)| {
            json!({
                "name": name,
                "description": entry.description_hash,
                "input_schema": entry.input_schema_hash,
                "risk_level": entry.risk_level,
            })
        })
        .collect();

    let drift_items: Vec<Value> = drift
        .items
        .iter()
        .map(|item| {
            json!({
                "type": item.kind,
                "severity": item.severity,
                "id": item.identifier,
                "oldHash": item.old_hash,
                "newHash": item.new_hash,
                "message": item.message,
            })
        })
        .collect();

    json!({
        "input": {
            "lockfileVersion": lockfile.lock_file_version,
            "server": {
                "name": lockfile.server.name,
                "artifact": lockfile.server.artifact,
            },
            "prompts": {
                "names": prompt_names,
                "definitions": prompt_definitions,
            },
            "resources": {
                "templates": templates,
                "schemes": schemes,
            },
            "drift": {
                "hasDrift": drift.has_drift,
                "items": drift_items,
            },
            "tools": tools,
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use mcptrust_model::{LockfileMeta, Prompts, Resources, ServerInfo, LOCK_FILE_VERSION};
    use std::collections::BTreeMap;

    fn empty_lockfile() -> Lockfile {
        Lockfile {
            lock_file_version: LOCK_FILE_VERSION.to_string(),
            meta: LockfileMeta {
                generator: "test".into(),
                updated_at: Utc::now(),
            },
            server: ServerInfo {
                name: "example".into(),
                artifact: None,
            },
            prompts: Prompts::default(),
            resources: Resources::default(),
            tools: BTreeMap::new(),
            extra: serde_json::Map::new(),
        }
    }

    #[test]
    fn schemes_are_sorted_unique_and_lowercase() {
        let mut lockfile = empty_lockfile();
        lockfile.resources.templates.push(mcptrust_model::ResourceTemplate {
            uri_template: "FILE:///{path}".into(),
            template_hash: "sha256:aa".into(),
            name_hash: None,
            description_hash: None,
            mime_type: None,
        });
        lockfile.resources.templates.push(mcptrust_model::ResourceTemplate {
            uri_template: "db://{id}".into(),
            template_hash: "sha256:bb".into(),
            name_hash: None,
            description_hash: None,
            mime_type: None,
        });
        lockfile.resources.templates.push(mcptrust_model::ResourceTemplate {
            uri_template: "file:///{other}".into(),
            template_hash: "sha256:cc".into(),
            name_hash: None,
            description_hash: None,
            mime_type: None,
        });

        let input = build_input(&lockfile, &DriftReport::default());
        let schemes = input["input"]["resources"]["schemes"].as_array().unwrap();
        assert_eq!(schemes, &[json!("db"), json!("file")]);
    }

    #[test]
    fn empty_drift_report_yields_no_drift_input() {
        let lockfile = empty_lockfile();
        let input = build_input(&lockfile, &DriftReport::default());
        assert_eq!(input["input"]["drift"]["hasDrift"], json!(false));
        assert_eq!(input["input"]["drift"]["items"], json!([]));
    }
}
