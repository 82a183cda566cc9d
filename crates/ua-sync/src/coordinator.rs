//! Reactive Coordinator
//!
//! Bridges host events (storage changes, runtime messages, install/startup)
//! to the synchronizer. Work on one namespace is serialized by that
//! namespace's gate, held from the configuration read through the engine
//! mutation, so two rebuilds of the same namespace never interleave their
//! remove and add halves. Rebuilds of different namespaces may interleave.
//!
//! Handlers never fail: engine and store errors are logged and the rule
//! table is left as the engine reports it until the next event.

use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use ts_rs::TS;
use ua_core::config::{
    ConfigSnapshot, ACTIVE_ID_KEY, PERMANENT_SPOOFS_KEY, SETTINGS_KEY, USER_AGENTS_KEY,
};
use ua_core::rule::Namespace;
use ua_core::types::UserAgentProfile;

use crate::engine::RuleEngine;
use crate::store::{load_snapshot, ConfigStore, StorageChange, LOCAL_AREA};
use crate::synchronizer::{RuleSynchronizer, SyncError, SyncReport};

/// Runtime message sent by the popup and options page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(tag = "action")]
#[ts(export)]
pub enum Message {
    /// Apply `user_agent` as the manual selection. Missing means the default.
    #[serde(rename = "setUserAgent")]
    SetUserAgent {
        #[serde(rename = "userAgent", default)]
        user_agent: Option<UserAgentProfile>,
    },
}

/// When a manual rebuild triggered by an event should actually run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ManualTrigger {
    Always,
    /// Only while a profile other than the default is selected
    WhenSelected,
    /// Only while the manual selection outranks permanent spoofs
    WhenManualWins,
}

impl ManualTrigger {
    fn applies(self, snapshot: &ConfigSnapshot) -> bool {
        match self {
            Self::Always => true,
            Self::WhenSelected => snapshot.has_manual_selection(),
            Self::WhenManualWins => !snapshot.override_priority(),
        }
    }
}

pub struct Coordinator<S, E> {
    store: S,
    synchronizer: RuleSynchronizer<E>,
    manual_gate: Mutex<()>,
    permanent_gate: Mutex<()>,
}

impl<S: ConfigStore, E: RuleEngine> Coordinator<S, E> {
    pub fn new(store: S, engine: E) -> Self {
        Self {
            store,
            synchronizer: RuleSynchronizer::new(engine),
            manual_gate: Mutex::new(()),
            permanent_gate: Mutex::new(()),
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn engine(&self) -> &E {
        self.synchronizer.engine()
    }

    /// React to a storage change notification.
    pub async fn on_storage_changed(&self, change: &StorageChange) -> Vec<SyncReport> {
        if change.area != LOCAL_AREA {
            return Vec::new();
        }

        let profiles_changed = change.touches(USER_AGENTS_KEY);
        let settings_changed = change.touches(SETTINGS_KEY);
        let spoofs_changed = change.touches(PERMANENT_SPOOFS_KEY);
        let active_changed = change.touches(ACTIVE_ID_KEY);

        let mut reports = Vec::new();

        if spoofs_changed || settings_changed || profiles_changed {
            reports.extend(logged(Namespace::Permanent, self.sync_permanent().await));
        }

        let manual = if active_changed || profiles_changed {
            Some(ManualTrigger::Always)
        } else if settings_changed {
            Some(ManualTrigger::WhenSelected)
        } else {
            None
        };
        if let Some(trigger) = manual {
            let result = self.sync_manual(trigger).await;
            reports.extend(logged(Namespace::Manual, result).flatten());
        }

        reports
    }

    /// Handle a runtime message.
    pub async fn on_message(&self, message: Message) -> Option<SyncReport> {
        match message {
            Message::SetUserAgent { user_agent } => self.set_user_agent(user_agent.as_ref()).await,
        }
    }

    /// Apply `profile` as the manual selection.
    pub async fn set_user_agent(&self, profile: Option<&UserAgentProfile>) -> Option<SyncReport> {
        let _gate = self.manual_gate.lock().await;
        let result = self.synchronizer.apply_manual_selection(profile).await;
        logged(Namespace::Manual, result)
    }

    /// Install/startup: permanent spoofs first, then the manual selection
    /// only while it is the one configured to win, so the winning namespace
    /// is the one confirmed last.
    pub async fn on_startup(&self) -> Vec<SyncReport> {
        let mut reports = Vec::new();
        reports.extend(logged(Namespace::Permanent, self.sync_permanent().await));
        let result = self.sync_manual(ManualTrigger::WhenManualWins).await;
        reports.extend(logged(Namespace::Manual, result).flatten());
        reports
    }

    /// Rebuild both namespaces unconditionally.
    pub async fn resync_all(&self) -> Result<Vec<SyncReport>, SyncError> {
        let permanent = self.sync_permanent().await?;
        let manual = self.sync_manual(ManualTrigger::Always).await?;
        Ok(std::iter::once(permanent).chain(manual).collect())
    }

    async fn sync_permanent(&self) -> Result<SyncReport, SyncError> {
        let _gate = self.permanent_gate.lock().await;
        let snapshot = load_snapshot(&self.store).await?;
        self.synchronizer.apply_permanent_spoofs(&snapshot).await
    }

    async fn sync_manual(&self, trigger: ManualTrigger) -> Result<Option<SyncReport>, SyncError> {
        let _gate = self.manual_gate.lock().await;
        let snapshot = load_snapshot(&self.store).await?;
        if !trigger.applies(&snapshot) {
            return Ok(None);
        }
        self.synchronizer
            .apply_manual_selection(snapshot.active_profile())
            .await
            .map(Some)
    }
}

fn logged<T>(namespace: Namespace, result: Result<T, SyncError>) -> Option<T> {
    match result {
        Ok(value) => Some(value),
        Err(e) => {
            log::error!("Failed to sync {} rules: {}", namespace.as_str(), e);
            None
        }
    }
}
