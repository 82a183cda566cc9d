//! WebAssembly bindings for the User-Agent switcher background worker
//!
//! The JS service worker registers the browser listeners and forwards each
//! event to the matching export below. All of them share one coordinator,
//! so the per-namespace serialization holds across events.

mod chrome;

use std::rc::Rc;

use chrome::{apply_badge, from_js, to_js, ChromeEngine, ChromeStore};
use ua_core::badge::BadgeState;
use ua_core::config::{ACTIVE_ID_KEY, USER_AGENTS_KEY};
use ua_core::pattern::compile_domain_pattern;
use ua_core::types::UserAgentProfile;
use ua_core::useragent::resolve_final_user_agent;
use ua_sync::coordinator::{Coordinator, Message};
use ua_sync::repository::initialize_defaults;
use ua_sync::store::{load_snapshot, StorageChange, LOCAL_AREA};
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;

type BackgroundCoordinator = Coordinator<ChromeStore, ChromeEngine>;

thread_local! {
    static COORDINATOR: Rc<BackgroundCoordinator> =
        Rc::new(Coordinator::new(ChromeStore, ChromeEngine));
}

fn coordinator() -> Rc<BackgroundCoordinator> {
    COORDINATOR.with(Rc::clone)
}

#[wasm_bindgen(start)]
pub fn start() {
    console_error_panic_hook::set_once();
    wasm_logger::init(wasm_logger::Config::default());
}

/// `runtime.onInstalled`: seed the default profiles on first install, then
/// rebuild both namespaces.
#[wasm_bindgen]
pub async fn on_installed() -> Result<(), JsValue> {
    let coordinator = coordinator();
    match initialize_defaults(coordinator.store()).await {
        Ok(true) => log::info!("First run, default profiles installed"),
        Ok(false) => {}
        Err(e) => log::error!("Failed to seed defaults: {}", e),
    }
    coordinator.on_startup().await;
    update_badge().await
}

/// `runtime.onStartup`
#[wasm_bindgen]
pub async fn on_startup() -> Result<(), JsValue> {
    coordinator().on_startup().await;
    update_badge().await
}

/// `storage.onChanged`: `changes` is the listener's change object, only
/// its keys are used.
#[wasm_bindgen]
pub async fn on_storage_changed(changes: JsValue, area_name: String) -> Result<(), JsValue> {
    let changes: js_sys::Object = changes.dyn_into().unwrap_or_else(|_| js_sys::Object::new());
    let keys: Vec<String> = js_sys::Object::keys(&changes)
        .iter()
        .filter_map(|key| key.as_string())
        .collect();
    let change = StorageChange::new(&area_name, keys);

    coordinator().on_storage_changed(&change).await;

    if change.area == LOCAL_AREA
        && (change.touches(ACTIVE_ID_KEY) || change.touches(USER_AGENTS_KEY))
    {
        update_badge().await?;
    }
    Ok(())
}

/// `runtime.onMessage`. Unknown messages are rejected.
#[wasm_bindgen]
pub async fn on_message(message: JsValue) -> Result<JsValue, JsValue> {
    let message: Message = from_js(&message)
        .map_err(|e| JsValue::from_str(&format!("Unrecognized message: {}", e)))?;
    let applied = coordinator().on_message(message).await.is_some();
    to_js(&serde_json::json!({ "success": applied })).map_err(|e| JsValue::from_str(&e))
}

/// Refresh the toolbar badge from the stored selection.
#[wasm_bindgen]
pub async fn update_badge() -> Result<(), JsValue> {
    let coordinator = coordinator();
    let snapshot = load_snapshot(coordinator.store())
        .await
        .map_err(|e| JsValue::from_str(&e.to_string()))?;

    // An unknown active id leaves the badge as it is
    let Some(profile) = snapshot.active_profile() else {
        return Ok(());
    };

    if let Err(e) = apply_badge(&BadgeState::for_profile(Some(profile))).await {
        log::error!("Failed to update badge: {}", e);
    }
    Ok(())
}

/// URL filters for a domain entry, for previews in the options page.
#[wasm_bindgen]
pub fn compile_domain_pattern_js(domain: &str) -> Result<JsValue, JsValue> {
    let filters = compile_domain_pattern(domain).map_err(|e| JsValue::from_str(&e.to_string()))?;
    to_js(&filters).map_err(|e| JsValue::from_str(&e))
}

/// The header value `profile` would send, or `null` for the native one.
#[wasm_bindgen]
pub fn resolve_final_user_agent_js(profile: JsValue) -> Result<Option<String>, JsValue> {
    let profile: UserAgentProfile = from_js(&profile).map_err(|e| JsValue::from_str(&e))?;
    Ok(resolve_final_user_agent(Some(&profile)))
}

#[cfg(all(test, target_arch = "wasm32"))]
mod tests {
    use wasm_bindgen_test::*;

    use super::*;

    #[wasm_bindgen_test]
    fn compiles_plain_domain() {
        let filters: Vec<String> = from_js(&compile_domain_pattern_js("example.com").unwrap()).unwrap();
        assert_eq!(filters, vec!["*://example.com/*", "*://*.example.com/*"]);
    }

    #[wasm_bindgen_test]
    fn rejects_bare_wildcard() {
        assert!(compile_domain_pattern_js("*").is_err());
    }

    #[wasm_bindgen_test]
    fn append_mode_profile_from_js() {
        let profile = to_js(&serde_json::json!({
            "id": "x",
            "userAgent": "FooBot/1.0",
            "mode": "append",
        }))
        .unwrap();
        let resolved = resolve_final_user_agent_js(profile).unwrap().unwrap();
        assert!(resolved.ends_with(" FooBot/1.0"));
    }
}
