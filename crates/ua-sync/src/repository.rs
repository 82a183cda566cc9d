//! Configuration writes performed by the popup and options page.
//!
//! Every operation reads the current snapshot, checks its preconditions and
//! writes back only the keys it changed. The resulting store notification
//! is what drives rule synchronization.

use serde::Serialize;
use serde_json::{Map, Value};
use ua_core::config::{
    ConfigSnapshot, ExportDocument, ACTIVE_ID_KEY, PERMANENT_SPOOFS_KEY, SETTINGS_KEY,
    USER_AGENTS_KEY,
};
use ua_core::pattern::{DomainPattern, PatternError};
use ua_core::types::{default_user_agents, PermanentSpoofEntry, UserAgentProfile, DEFAULT_PROFILE_ID};

use crate::store::{load_snapshot, ConfigStore, StoreError};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RepositoryError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("The default profile cannot be modified or deleted")]
    ReservedProfile,
    #[error("A profile with id {0} already exists")]
    DuplicateProfile(String),
    #[error("No profile with id {0}")]
    UnknownProfile(String),
    #[error("Missing required field: {0}")]
    MissingField(&'static str),
    #[error("A spoof for {0} already exists")]
    DuplicateDomain(String),
    #[error("No spoof with id {0}")]
    UnknownSpoof(String),
    #[error("Invalid domain pattern: {0}")]
    InvalidPattern(#[from] PatternError),
}

/// Seed the default profiles on first run. Returns whether anything was written.
pub async fn initialize_defaults<S: ConfigStore + ?Sized>(store: &S) -> Result<bool, RepositoryError> {
    let existing = store.get(&[USER_AGENTS_KEY]).await?;
    if existing.get(USER_AGENTS_KEY).is_some_and(|v| !v.is_null()) {
        return Ok(false);
    }

    let mut values = Map::new();
    put(&mut values, USER_AGENTS_KEY, &default_user_agents())?;
    put(&mut values, ACTIVE_ID_KEY, &DEFAULT_PROFILE_ID)?;
    store.set(values).await?;
    log::info!("Seeded default user-agent profiles");
    Ok(true)
}

/// Append a profile to the list.
pub async fn add_profile<S: ConfigStore + ?Sized>(
    store: &S,
    profile: UserAgentProfile,
) -> Result<(), RepositoryError> {
    if profile.is_default() {
        return Err(RepositoryError::ReservedProfile);
    }
    if profile.alias.trim().is_empty() {
        return Err(RepositoryError::MissingField("alias"));
    }
    if profile.name.trim().is_empty() {
        return Err(RepositoryError::MissingField("name"));
    }
    if profile.user_agent.trim().is_empty() {
        return Err(RepositoryError::MissingField("userAgent"));
    }

    let mut snapshot = load_snapshot(store).await?;
    if snapshot.profile(&profile.id).is_some() {
        return Err(RepositoryError::DuplicateProfile(profile.id));
    }
    snapshot.profiles.push(profile);

    let mut values = Map::new();
    put(&mut values, USER_AGENTS_KEY, &snapshot.profiles)?;
    store.set(values).await?;
    Ok(())
}

/// Remove a profile. Deleting the active one falls back to the default.
pub async fn delete_profile<S: ConfigStore + ?Sized>(store: &S, id: &str) -> Result<(), RepositoryError> {
    if id == DEFAULT_PROFILE_ID {
        return Err(RepositoryError::ReservedProfile);
    }

    let mut snapshot = load_snapshot(store).await?;
    let before = snapshot.profiles.len();
    snapshot.profiles.retain(|p| p.id != id);
    if snapshot.profiles.len() == before {
        return Err(RepositoryError::UnknownProfile(id.to_string()));
    }

    let mut values = Map::new();
    put(&mut values, USER_AGENTS_KEY, &snapshot.profiles)?;
    if snapshot.active_id == id {
        put(&mut values, ACTIVE_ID_KEY, &DEFAULT_PROFILE_ID)?;
    }
    store.set(values).await?;
    Ok(())
}

/// Make `id` the manual selection. Returns the profile for the
/// `setUserAgent` message.
pub async fn activate_profile<S: ConfigStore + ?Sized>(
    store: &S,
    id: &str,
) -> Result<UserAgentProfile, RepositoryError> {
    let snapshot = load_snapshot(store).await?;
    let profile = snapshot
        .profile(id)
        .cloned()
        .ok_or_else(|| RepositoryError::UnknownProfile(id.to_string()))?;

    let mut values = Map::new();
    put(&mut values, ACTIVE_ID_KEY, &id)?;
    store.set(values).await?;
    Ok(profile)
}

/// Append a spoof entry after validating its pattern and reference.
pub async fn add_spoof<S: ConfigStore + ?Sized>(
    store: &S,
    mut entry: PermanentSpoofEntry,
) -> Result<(), RepositoryError> {
    entry.domain = entry.domain.trim().to_string();
    DomainPattern::parse(&entry.domain)?;

    let mut snapshot = load_snapshot(store).await?;
    if snapshot.profile(&entry.user_agent_id).is_none() {
        return Err(RepositoryError::UnknownProfile(entry.user_agent_id));
    }
    if snapshot
        .spoofs
        .iter()
        .any(|s| s.domain.eq_ignore_ascii_case(&entry.domain))
    {
        return Err(RepositoryError::DuplicateDomain(entry.domain));
    }
    snapshot.spoofs.push(entry);

    write_spoofs(store, &snapshot).await
}

pub async fn remove_spoof<S: ConfigStore + ?Sized>(store: &S, entry_id: &str) -> Result<(), RepositoryError> {
    let mut snapshot = load_snapshot(store).await?;
    let before = snapshot.spoofs.len();
    snapshot.spoofs.retain(|s| s.id != entry_id);
    if snapshot.spoofs.len() == before {
        return Err(RepositoryError::UnknownSpoof(entry_id.to_string()));
    }
    write_spoofs(store, &snapshot).await
}

pub async fn set_spoof_enabled<S: ConfigStore + ?Sized>(
    store: &S,
    entry_id: &str,
    enabled: bool,
) -> Result<(), RepositoryError> {
    let mut snapshot = load_snapshot(store).await?;
    let entry = snapshot
        .spoofs
        .iter_mut()
        .find(|s| s.id == entry_id)
        .ok_or_else(|| RepositoryError::UnknownSpoof(entry_id.to_string()))?;
    if entry.enabled == enabled {
        return Ok(());
    }
    entry.enabled = enabled;
    write_spoofs(store, &snapshot).await
}

pub async fn set_override_priority<S: ConfigStore + ?Sized>(
    store: &S,
    permanent_override: bool,
) -> Result<(), RepositoryError> {
    let mut snapshot = load_snapshot(store).await?;
    if snapshot.settings.permanent_override == permanent_override {
        return Ok(());
    }
    snapshot.settings.permanent_override = permanent_override;

    let mut values = Map::new();
    put(&mut values, SETTINGS_KEY, &snapshot.settings)?;
    store.set(values).await?;
    Ok(())
}

pub async fn export_document<S: ConfigStore + ?Sized>(
    store: &S,
    export_date: &str,
) -> Result<ExportDocument, RepositoryError> {
    Ok(load_snapshot(store).await?.to_export(export_date))
}

/// Replace the sections present in `document`, leaving the others alone.
pub async fn import_document<S: ConfigStore + ?Sized>(
    store: &S,
    document: &ExportDocument,
) -> Result<(), RepositoryError> {
    let current = load_snapshot(store).await?;
    let merged = ConfigSnapshot {
        profiles: document.user_agents.clone().unwrap_or(current.profiles),
        active_id: current.active_id.clone(),
        spoofs: document.permanent_spoofs.clone().unwrap_or(current.spoofs),
        settings: document.settings.clone().unwrap_or(current.settings),
    };

    let mut values = Map::new();
    if document.user_agents.is_some() {
        put(&mut values, USER_AGENTS_KEY, &merged.profiles)?;
        if merged.active_profile().is_none() && merged.active_id != DEFAULT_PROFILE_ID {
            put(&mut values, ACTIVE_ID_KEY, &DEFAULT_PROFILE_ID)?;
        }
    }
    if document.permanent_spoofs.is_some() {
        put(&mut values, PERMANENT_SPOOFS_KEY, &merged.spoofs)?;
    }
    if document.settings.is_some() {
        put(&mut values, SETTINGS_KEY, &merged.settings)?;
    }

    for issue in merged.validate() {
        log::warn!("Imported configuration: {}", issue);
    }

    store.set(values).await?;
    Ok(())
}

async fn write_spoofs<S: ConfigStore + ?Sized>(
    store: &S,
    snapshot: &ConfigSnapshot,
) -> Result<(), RepositoryError> {
    let mut values = Map::new();
    put(&mut values, PERMANENT_SPOOFS_KEY, &snapshot.spoofs)?;
    store.set(values).await?;
    Ok(())
}

fn put<T: Serialize + ?Sized>(
    values: &mut Map<String, Value>,
    key: &str,
    value: &T,
) -> Result<(), StoreError> {
    let encoded = serde_json::to_value(value).map_err(|e| StoreError::Encode {
        key: key.to_string(),
        reason: e.to_string(),
    })?;
    values.insert(key.to_string(), encoded);
    Ok(())
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use ua_core::types::{Settings, UaMode};

    use super::*;
    use crate::memory::MemoryStore;
    use crate::store::StorageChange;

    fn profile(id: &str) -> UserAgentProfile {
        UserAgentProfile {
            id: id.to_string(),
            name: format!("Profile {}", id),
            alias: id.to_uppercase(),
            user_agent: format!("{}Bot/1.0", id),
            mode: UaMode::Replace,
            badge_text_color: "#ffffff".to_string(),
            badge_bg_color: "#1a73e8".to_string(),
        }
    }

    fn spoof(id: &str, domain: &str, user_agent_id: &str) -> PermanentSpoofEntry {
        PermanentSpoofEntry {
            id: id.to_string(),
            domain: domain.to_string(),
            user_agent_id: user_agent_id.to_string(),
            enabled: true,
        }
    }

    async fn seeded() -> MemoryStore {
        let store = MemoryStore::new();
        assert!(initialize_defaults(&store).await.unwrap());
        store
    }

    #[tokio::test]
    async fn initialize_only_seeds_once() {
        let store = seeded().await;
        assert!(!initialize_defaults(&store).await.unwrap());

        let snapshot = load_snapshot(&store).await.unwrap();
        assert_eq!(snapshot.profiles, default_user_agents());
        assert_eq!(snapshot.active_id, DEFAULT_PROFILE_ID);
    }

    #[tokio::test]
    async fn add_profile_validates() {
        let store = seeded().await;
        add_profile(&store, profile("x")).await.unwrap();

        assert_eq!(
            add_profile(&store, profile("x")).await,
            Err(RepositoryError::DuplicateProfile("x".to_string()))
        );
        assert_eq!(
            add_profile(&store, profile(DEFAULT_PROFILE_ID)).await,
            Err(RepositoryError::ReservedProfile)
        );

        let mut blank = profile("y");
        blank.user_agent = "  ".to_string();
        assert_eq!(
            add_profile(&store, blank).await,
            Err(RepositoryError::MissingField("userAgent"))
        );

        let snapshot = load_snapshot(&store).await.unwrap();
        assert_eq!(snapshot.profiles.last().map(|p| p.id.as_str()), Some("x"));
    }

    #[tokio::test]
    async fn deleting_active_profile_resets_selection() {
        let store = seeded().await;
        add_profile(&store, profile("x")).await.unwrap();
        activate_profile(&store, "x").await.unwrap();

        let mut changes = store.subscribe();
        delete_profile(&store, "x").await.unwrap();

        let snapshot = load_snapshot(&store).await.unwrap();
        assert_eq!(snapshot.active_id, DEFAULT_PROFILE_ID);
        assert!(snapshot.profile("x").is_none());

        let change = changes.recv().await.unwrap();
        assert!(change.touches(USER_AGENTS_KEY));
        assert!(change.touches(ACTIVE_ID_KEY));
    }

    #[tokio::test]
    async fn default_profile_is_not_deletable() {
        let store = seeded().await;
        assert_eq!(
            delete_profile(&store, DEFAULT_PROFILE_ID).await,
            Err(RepositoryError::ReservedProfile)
        );
        assert_eq!(
            delete_profile(&store, "nope").await,
            Err(RepositoryError::UnknownProfile("nope".to_string()))
        );
    }

    #[tokio::test]
    async fn add_spoof_rejects_duplicates_and_bad_patterns() {
        let store = seeded().await;
        add_spoof(&store, spoof("1", " Example.com ", "iphone")).await.unwrap();

        assert_eq!(
            add_spoof(&store, spoof("2", "example.COM", "iphone")).await,
            Err(RepositoryError::DuplicateDomain("example.COM".to_string()))
        );
        assert_eq!(
            add_spoof(&store, spoof("3", "*", "iphone")).await,
            Err(RepositoryError::InvalidPattern(PatternError::BareWildcard))
        );
        assert_eq!(
            add_spoof(&store, spoof("4", "other.com", "ghost")).await,
            Err(RepositoryError::UnknownProfile("ghost".to_string()))
        );

        let snapshot = load_snapshot(&store).await.unwrap();
        assert_eq!(snapshot.spoofs.len(), 1);
        assert_eq!(snapshot.spoofs[0].domain, "Example.com");
    }

    #[tokio::test]
    async fn toggling_and_removing_spoofs() {
        let store = seeded().await;
        add_spoof(&store, spoof("1", "a.com", "iphone")).await.unwrap();
        add_spoof(&store, spoof("2", "b.com", "android")).await.unwrap();

        set_spoof_enabled(&store, "1", false).await.unwrap();
        remove_spoof(&store, "2").await.unwrap();

        let snapshot = load_snapshot(&store).await.unwrap();
        assert_eq!(snapshot.spoofs.len(), 1);
        assert!(!snapshot.spoofs[0].enabled);
        assert_eq!(
            remove_spoof(&store, "2").await,
            Err(RepositoryError::UnknownSpoof("2".to_string()))
        );
    }

    #[tokio::test]
    async fn override_priority_write_is_skipped_when_unchanged() {
        let store = seeded().await;
        let mut changes = store.subscribe();

        set_override_priority(&store, false).await.unwrap();
        set_override_priority(&store, true).await.unwrap();

        assert_eq!(changes.recv().await.unwrap(), StorageChange::local([SETTINGS_KEY]));
        assert!(changes.try_recv().is_err());
        assert!(load_snapshot(&store).await.unwrap().override_priority());
    }

    #[tokio::test]
    async fn import_replaces_present_sections_only() {
        let store = seeded().await;
        add_profile(&store, profile("x")).await.unwrap();
        activate_profile(&store, "x").await.unwrap();
        add_spoof(&store, spoof("1", "a.com", "x")).await.unwrap();

        let document = ExportDocument {
            user_agents: Some(default_user_agents()),
            settings: Some(Settings {
                permanent_override: true,
                per_tab_spoof: true,
                active_section: Some("spoofs".to_string()),
            }),
            ..ExportDocument::default()
        };
        import_document(&store, &document).await.unwrap();

        let snapshot = load_snapshot(&store).await.unwrap();
        assert_eq!(snapshot.profiles, default_user_agents());
        assert_eq!(snapshot.active_id, DEFAULT_PROFILE_ID);
        assert_eq!(snapshot.spoofs.len(), 1);
        assert!(snapshot.settings.per_tab_spoof);

        let exported = export_document(&store, "2024-05-01").await.unwrap();
        assert_eq!(exported.export_date.as_deref(), Some("2024-05-01"));
        assert_eq!(
            serde_json::to_value(&exported).unwrap()["settings"],
            json!({ "permanentOverride": true, "perTabSpoof": true, "activeSection": "spoofs" })
        );
    }
}
