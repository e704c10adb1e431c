use std::collections::BTreeSet;

use mcptrust_canon::{hash_value, normalize_text, prompt_arguments_hash, template_hash, CanonVersion, PromptArgumentRef};
use mcptrust_model::{DriftItem, DriftReport, DriftType, Lockfile, ScanReport, Severity};
use serde_json::Value;

use crate::error::DifferError;

fn normalized_description_hash(description: Option<&str>) -> Result<String, DifferError> {
    let value = match description {
        Some(text) => Value::String(normalize_text(text)),
        None => Value::Null,
    };
    Ok(hash_value(&value, CanonVersion::V2)?)
}

/// Compares a v3 lockfile against a fresh scan and emits the typed,
/// severity-tagged drift items (§4.4). Output is stable-sorted by
/// `(type, identifier)`.
pub fn diff(lockfile: &Lockfile, report: &ScanReport) -> Result<DriftReport, DifferError> {
    let mut items = Vec::new();
    diff_prompts(lockfile, report, &mut items)?;
    diff_templates(lockfile, report, &mut items)?;
    diff_tools(lockfile, report, &mut items)?;
    Ok(DriftReport::from_items(items))
}

fn diff_prompts(
    lockfile: &Lockfile,
    report: &ScanReport,
    items: &mut Vec<DriftItem>,
) -> Result<(), DifferError> {
    let locked_names: BTreeSet<&String> = lockfile.prompts.definitions.keys().collect();
    let scanned_names: BTreeSet<&String> = report.prompts.iter().map(|p| &p.name).collect();

    for name in locked_names.difference(&scanned_names) {
        items.push(DriftItem {
            kind: DriftType::PromptRemoved,
            severity: Severity::Critical,
            identifier: (*name).clone(),
            old_hash: None,
            new_hash: None,
            message: format!("prompt \"{name}\" is no longer advertised by the server"),
        });
    }
    for name in scanned_names.difference(&locked_names) {
        items.push(DriftItem {
            kind: DriftType::PromptAdded,
            severity: Severity::Critical,
            identifier: (*name).clone(),
            old_hash: None,
            new_hash: None,
            message: format!("prompt \"{name}\" is newly advertised and not in the lockfile"),
        });
    }

    for prompt in &report.prompts {
        let Some(locked) = lockfile.prompts.definitions.get(&prompt.name) else {
            continue;
        };

        let arg_refs: Vec<PromptArgumentRef<'_>> = prompt
            .arguments
            .iter()
            .map(|a| PromptArgumentRef {
                name: &a.name,
                description: a.description.as_deref(),
                required: a.required,
            })
            .collect();
        let fresh_args_hash = prompt_arguments_hash(&arg_refs)?;
        if fresh_args_hash != locked.arguments_hash {
            items.push(DriftItem {
                kind: DriftType::PromptArgsChanged,
                severity: Severity::Critical,
                identifier: prompt.name.clone(),
                old_hash: Some(locked.arguments_hash.clone()),
                new_hash: Some(fresh_args_hash),
                message: format!("prompt \"{}\" arguments changed", prompt.name),
            });
        }

        if let Some(old_desc_hash) = &locked.description_hash {
            let fresh_desc_hash = normalized_description_hash(prompt.description.as_deref())?;
            if &fresh_desc_hash != old_desc_hash {
                items.push(DriftItem {
                    kind: DriftType::PromptDescChanged,
                    severity: Severity::Moderate,
                    identifier: prompt.name.clone(),
                    old_hash: Some(old_desc_hash.clone()),
                    new_hash: Some(fresh_desc_hash),
                    message: format!("prompt \"{}\" description changed", prompt.name),
                });
            }
        }
    }

    Ok(())
}

fn diff_templates(
    lockfile: &Lockfile,
    report: &ScanReport,
    items: &mut Vec<DriftItem>,
) -> Result<(), DifferError> {
    let locked_uris: BTreeSet<&String> = lockfile
        .resources
        .templates
        .iter()
        .map(|t| &t.uri_template)
        .collect();
    let scanned_uris: BTreeSet<&String> = report
        .resource_templates
        .iter()
        .map(|t| &t.uri_template)
        .collect();

    for uri in locked_uris.difference(&scanned_uris) {
        items.push(DriftItem {
            kind: DriftType::TemplateRemoved,
            severity: Severity::Critical,
            identifier: (*uri).clone(),
            old_hash: None,
            new_hash: None,
            message: format!("resource template \"{uri}\" is no longer advertised"),
        });
    }
    for uri in scanned_uris.difference(&locked_uris) {
        items.push(DriftItem {
            kind: DriftType::TemplateAdded,
            severity: Severity::Critical,
            identifier: (*uri).clone(),
            old_hash: None,
            new_hash: None,
            message: format!("resource template \"{uri}\" is newly advertised"),
        });
    }

    for template in &report.resource_templates {
        let Some(locked) = lockfile
            .resources
            .templates
            .iter()
            .find(|t| t.uri_template == template.uri_template)
        else {
            continue;
        };
        let fresh_hash = template_hash(&template.uri_template, template.mime_type.as_deref())?;
        if fresh_hash != locked.template_hash {
            items.push(DriftItem {
                kind: DriftType::TemplateChanged,
                severity: Severity::Critical,
                identifier: template.uri_template.clone(),
                old_hash: Some(locked.template_hash.clone()),
                new_hash: Some(fresh_hash),
                message: format!(
                    "resource template \"{}\" changed (mime type or shape)",
                    template.uri_template
                ),
            });
        }
    }

    Ok(())
}

fn diff_tools(
    lockfile: &Lockfile,
    report: &ScanReport,
    items: &mut Vec<DriftItem>,
) -> Result<(), DifferError> {
    let locked_names: BTreeSet<&String> = lockfile.tools.keys().collect();
    let scanned_names: BTreeSet<&String> = report.tools.iter().map(|t| &t.name).collect();

    for name in locked_names.difference(&scanned_names) {
        items.push(DriftItem {
            kind: DriftType::ToolRemoved,
            severity: Severity::Critical,
            identifier: (*name).clone(),
            old_hash: None,
            new_hash: None,
            message: format!("tool \"{name}\" is no longer advertised by the server"),
        });
    }
    for name in scanned_names.difference(&locked_names) {
        items.push(DriftItem {
            kind: DriftType::ToolAdded,
            severity: Severity::Critical,
            identifier: (*name).clone(),
            old_hash: None,
            new_hash: None,
            message: format!("tool \"{name}\" is newly advertised and not in the lockfile"),
        });
    }

    for tool in &report.tools {
        let Some(locked) = lockfile.tools.get(&tool.name) else {
            continue;
        };

        let fresh_desc_hash = normalized_description_hash(tool.description.as_deref())?;
        if fresh_desc_hash != locked.description_hash {
            items.push(DriftItem {
                kind: DriftType::ToolChanged,
                severity: Severity::Moderate,
                identifier: tool.name.clone(),
                old_hash: Some(locked.description_hash.clone()),
                new_hash: Some(fresh_desc_hash),
                message: format!("tool \"{}\" description changed", tool.name),
            });
        }

        let fresh_schema_hash = hash_value(&tool.input_schema, CanonVersion::V2)?;
        if fresh_schema_hash != locked.input_schema_hash {
            items.push(DriftItem {
                kind: DriftType::ToolChanged,
                severity: Severity::Critical,
                identifier: tool.name.clone(),
                old_hash: Some(locked.input_schema_hash.clone()),
                new_hash: Some(fresh_schema_hash),
                message: format!("tool \"{}\" input schema changed", tool.name),
            });
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use mcptrust_model::{
        LockfileMeta, PromptDefinition, Prompts, ResourceTemplate, Resources, ScannedPrompt,
        ScannedPromptArgument, ScannedTool, ServerInfo, ToolEntry, LOCK_FILE_VERSION,
    };
    use std::collections::BTreeMap;

    fn base_lockfile() -> Lockfile {
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

    fn base_report() -> ScanReport {
        ScanReport {
            timestamp: Utc::now(),
            command: "npx foo".into(),
            server_info: None,
            tools: vec![],
            resources: vec![],
            prompts: vec![],
            resource_templates: vec![],
            error: None,
        }
    }

    #[test]
    fn s1_clean_lock_then_verify_yields_no_drift() {
        let mut lockfile = base_lockfile();
        let schema = serde_json::json!({"type": "object"});
        let description_hash = normalized_description_hash(Some("Read file")).unwrap();
        let input_schema_hash = hash_value(&schema, CanonVersion::V2).unwrap();
        lockfile.tools.insert(
            "read_file".to_string(),
            ToolEntry {
                description_hash,
                input_schema_hash,
                risk_level: "low".to_string(),
            },
        );

        let mut report = base_report();
        report.tools.push(ScannedTool {
            name: "read_file".to_string(),
            description: Some("Read file".to_string()),
            input_schema: schema,
        });

        let drift = diff(&lockfile, &report).unwrap();
        assert!(!drift.has_drift);
        assert!(drift.items.is_empty());
    }

    #[test]
    fn tool_removed_from_server_is_critical() {
        let mut lockfile = base_lockfile();
        lockfile.tools.insert(
            "gone".to_string(),
            ToolEntry {
                description_hash: String::new(),
                input_schema_hash: String::new(),
                risk_level: "low".to_string(),
            },
        );
        let report = base_report();

        let drift = diff(&lockfile, &report).unwrap();
        assert!(drift.has_drift);
        assert_eq!(drift.items[0].kind, DriftType::ToolRemoved);
        assert_eq!(drift.items[0].severity, Severity::Critical);
    }

    #[test]
    fn tool_description_change_is_moderate_schema_change_is_critical() {
        let schema = serde_json::json!({"type": "object"});
        let old_schema = serde_json::json!({"type": "string"});
        let mut lockfile = base_lockfile();
        lockfile.tools.insert(
            "t".to_string(),
            ToolEntry {
                description_hash: normalized_description_hash(Some("old")).unwrap(),
                input_schema_hash: hash_value(&old_schema, CanonVersion::V2).unwrap(),
                risk_level: "low".to_string(),
            },
        );
        let mut report = base_report();
        report.tools.push(ScannedTool {
            name: "t".to_string(),
            description: Some("new".to_string()),
            input_schema: schema,
        });

        let drift = diff(&lockfile, &report).unwrap();
        assert_eq!(drift.items.len(), 2);
        let severities: BTreeSet<Severity> = drift.items.iter().map(|i| i.severity).collect();
        assert!(severities.contains(&Severity::Moderate));
        assert!(severities.contains(&Severity::Critical));
    }

    #[test]
    fn prompt_args_change_is_critical_and_desc_change_is_moderate() {
        let mut lockfile = base_lockfile();
        lockfile.prompts.definitions.insert(
            "greet".to_string(),
            PromptDefinition {
                arguments_hash: prompt_arguments_hash(&[PromptArgumentRef {
                    name: "name",
                    description: None,
                    required: true,
                }])
                .unwrap(),
                title_hash: None,
                description_hash: Some(normalized_description_hash(Some("Say hi")).unwrap()),
            },
        );
        let mut report = base_report();
        report.prompts.push(ScannedPrompt {
            name: "greet".to_string(),
            description: Some("Say hello".to_string()),
            arguments: vec![ScannedPromptArgument {
                name: "name".to_string(),
                description: None,
                required: false,
            }],
        });

        let drift = diff(&lockfile, &report).unwrap();
        let kinds: BTreeSet<DriftType> = drift.items.iter().map(|i| i.kind).collect();
        assert!(kinds.contains(&DriftType::PromptArgsChanged));
        assert!(kinds.contains(&DriftType::PromptDescChanged));
        for item in &drift.items {
            match item.kind {
                DriftType::PromptArgsChanged => assert_eq!(item.severity, Severity::Critical),
                DriftType::PromptDescChanged => assert_eq!(item.severity, Severity::Moderate),
                other => panic!("unexpected drift kind {other:?}"),
            }
        }
    }

    #[test]
    fn template_change_is_critical() {
        let mut lockfile = base_lockfile();
        lockfile.resources.templates.push(ResourceTemplate {
            uri_template: "file:///{path}".to_string(),
            template_hash: template_hash("file:///{path}", None).unwrap(),
            name_hash: None,
            description_hash: None,
            mime_type: None,
        });
        let mut report = base_report();
        report.resource_templates.push(mcptrust_model::ScannedTemplate {
            uri_template: "file:///{path}".to_string(),
            name: None,
            description: None,
            mime_type: Some("text/plain".to_string()),
        });

        let drift = diff(&lockfile, &report).unwrap();
        assert_eq!(drift.items.len(), 1);
        assert_eq!(drift.items[0].kind, DriftType::TemplateChanged);
        assert_eq!(drift.items[0].severity, Severity::Critical);
    }
}
