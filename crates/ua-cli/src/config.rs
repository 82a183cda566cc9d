use std::fs;
use std::path::Path;

use serde_json::{Map, Value};
use ua_core::config::{
    ConfigSnapshot, ExportDocument, ACTIVE_ID_KEY, PERMANENT_SPOOFS_KEY, SETTINGS_KEY,
    USER_AGENTS_KEY,
};
use ua_core::rule::HeaderRule;
use ua_sync::coordinator::Coordinator;
use ua_sync::memory::{MemoryEngine, MemoryStore};
use ua_sync::synchronizer::SyncReport;

/// Read an exported configuration file. Malformed sections are dropped
/// with a warning rather than rejected.
pub fn read_export(path: &Path) -> Result<ExportDocument, String> {
    let content = fs::read_to_string(path)
        .map_err(|e| format!("Failed to read '{}': {}", path.display(), e))?;
    let value: Value = serde_json::from_str(&content)
        .map_err(|e| format!("Failed to parse '{}': {}", path.display(), e))?;
    match value {
        Value::Object(map) => Ok(ExportDocument::from_map(&map)),
        _ => Err(format!("'{}' is not a JSON object", path.display())),
    }
}

/// Store holding `snapshot` under the keys the extension uses.
pub fn store_for(snapshot: &ConfigSnapshot) -> Result<MemoryStore, String> {
    let mut values = Map::new();
    let encode = |e: serde_json::Error| format!("Failed to encode configuration: {}", e);
    values.insert(USER_AGENTS_KEY.to_string(), serde_json::to_value(&snapshot.profiles).map_err(encode)?);
    values.insert(ACTIVE_ID_KEY.to_string(), Value::String(snapshot.active_id.clone()));
    values.insert(PERMANENT_SPOOFS_KEY.to_string(), serde_json::to_value(&snapshot.spoofs).map_err(encode)?);
    values.insert(SETTINGS_KEY.to_string(), serde_json::to_value(&snapshot.settings).map_err(encode)?);
    Ok(MemoryStore::with_values(values))
}

/// Rule table the extension would install for `snapshot`, starting from an
/// empty engine.
pub fn plan_rule_table(snapshot: &ConfigSnapshot) -> Result<(Vec<HeaderRule>, Vec<SyncReport>), String> {
    let store = store_for(snapshot)?;
    let engine = MemoryEngine::new();
    let coordinator = Coordinator::new(store, engine.clone());

    let runtime = tokio::runtime::Builder::new_current_thread()
        .build()
        .map_err(|e| format!("Failed to start runtime: {}", e))?;

    runtime.block_on(async {
        let reports = coordinator
            .resync_all()
            .await
            .map_err(|e| format!("Failed to build rules: {}", e))?;
        Ok::<_, String>((engine.rules().await, reports))
    })
}

#[cfg(test)]
mod tests {
    use ua_core::types::{default_user_agents, PermanentSpoofEntry, Settings};

    use super::*;

    fn snapshot(active_id: &str, permanent_override: bool) -> ConfigSnapshot {
        ConfigSnapshot {
            profiles: default_user_agents(),
            active_id: active_id.to_string(),
            spoofs: vec![PermanentSpoofEntry {
                id: "1".to_string(),
                domain: "example.com".to_string(),
                user_agent_id: "android".to_string(),
                enabled: true,
            }],
            settings: Settings {
                permanent_override,
                ..Settings::default()
            },
        }
    }

    #[test]
    fn test_plan_rule_table_with_manual_selection() {
        let (rules, reports) = plan_rule_table(&snapshot("iphone", false)).unwrap();

        let ids: Vec<(i32, u32)> = rules.iter().map(|r| (r.id, r.priority)).collect();
        assert_eq!(ids, vec![(1, 2), (1000, 1), (1001, 1)]);
        assert_eq!(reports.len(), 2);
    }

    #[test]
    fn test_plan_rule_table_with_override() {
        let (rules, _) = plan_rule_table(&snapshot("default", true)).unwrap();

        let ids: Vec<(i32, u32)> = rules.iter().map(|r| (r.id, r.priority)).collect();
        assert_eq!(ids, vec![(1000, 3), (1001, 3)]);
    }

    #[test]
    fn test_read_export_rejects_non_object() {
        let path = std::env::temp_dir().join(format!("ua-cli-export-{}.json", std::process::id()));
        fs::write(&path, "[1, 2, 3]").unwrap();
        let result = read_export(&path);
        fs::remove_file(&path).unwrap();
        assert!(result.is_err());
    }
}
