//! `chrome.*` extension APIs reached through `js_sys::Reflect`
//!
//! Values cross the boundary as JSON text so the Rust side only ever sees
//! `serde_json` values.

use async_trait::async_trait;
use js_sys::{Array, Function, Object, Promise, Reflect, JSON};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};
use ua_core::badge::BadgeState;
use ua_core::rule::HeaderRule;
use ua_sync::engine::{EngineError, RuleEngine, RuleMutation};
use ua_sync::store::{ConfigStore, StoreError};
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use wasm_bindgen_futures::JsFuture;

/// Walk `chrome.<path>` from the global object.
fn namespace(path: &[&str]) -> Result<JsValue, String> {
    let mut current = Reflect::get(&js_sys::global(), &"chrome".into()).map_err(describe)?;
    for segment in path {
        if current.is_undefined() || current.is_null() {
            return Err(format!("chrome.{} is not available", path.join(".")));
        }
        current = Reflect::get(&current, &JsValue::from_str(segment)).map_err(describe)?;
    }
    if current.is_undefined() {
        return Err(format!("chrome.{} is not available", path.join(".")));
    }
    Ok(current)
}

/// Call `chrome.<path>.<method>(args...)` and await the returned promise.
async fn call(path: &[&str], method: &str, args: &[JsValue]) -> Result<JsValue, String> {
    let target = namespace(path)?;
    let function: Function = Reflect::get(&target, &JsValue::from_str(method))
        .map_err(describe)?
        .dyn_into()
        .map_err(|_| format!("chrome.{}.{} is not a function", path.join("."), method))?;

    let args: Array = args.iter().collect();
    let returned = function.apply(&target, &args).map_err(describe)?;
    match returned.dyn_into::<Promise>() {
        Ok(promise) => JsFuture::from(promise).await.map_err(describe),
        Err(value) => Ok(value),
    }
}

pub(crate) fn describe(error: JsValue) -> String {
    if let Some(error) = error.dyn_ref::<js_sys::Error>() {
        return String::from(error.message());
    }
    error.as_string().unwrap_or_else(|| format!("{:?}", error))
}

pub(crate) fn to_js<T: Serialize + ?Sized>(value: &T) -> Result<JsValue, String> {
    let text = serde_json::to_string(value).map_err(|e| e.to_string())?;
    JSON::parse(&text).map_err(describe)
}

pub(crate) fn from_js<T: DeserializeOwned>(value: &JsValue) -> Result<T, String> {
    if value.is_undefined() {
        return Err("expected a value, got undefined".to_string());
    }
    let text: String = JSON::stringify(value).map_err(describe)?.into();
    serde_json::from_str(&text).map_err(|e| e.to_string())
}

// =============================================================================
// chrome.storage.local
// =============================================================================

pub struct ChromeStore;

#[async_trait(?Send)]
impl ConfigStore for ChromeStore {
    async fn get(&self, keys: &[&str]) -> Result<Map<String, Value>, StoreError> {
        let keys: Array = keys.iter().map(|key| JsValue::from_str(key)).collect();
        let result = call(&["storage", "local"], "get", &[keys.into()])
            .await
            .map_err(StoreError::Host)?;
        from_js(&result).map_err(StoreError::Host)
    }

    async fn set(&self, values: Map<String, Value>) -> Result<(), StoreError> {
        if values.is_empty() {
            return Ok(());
        }
        let object = to_js(&values).map_err(|reason| StoreError::Encode {
            key: values.keys().cloned().collect::<Vec<_>>().join(","),
            reason,
        })?;
        call(&["storage", "local"], "set", &[object])
            .await
            .map_err(StoreError::Host)?;
        Ok(())
    }
}

// =============================================================================
// chrome.declarativeNetRequest
// =============================================================================

pub struct ChromeEngine;

impl ChromeEngine {
    async fn dynamic_rules(&self) -> Result<Vec<Value>, EngineError> {
        let rules = call(&["declarativeNetRequest"], "getDynamicRules", &[])
            .await
            .map_err(EngineError::Host)?;
        from_js(&rules).map_err(EngineError::Host)
    }
}

#[async_trait(?Send)]
impl RuleEngine for ChromeEngine {
    async fn list_rules(&self) -> Result<Vec<HeaderRule>, EngineError> {
        Ok(self
            .dynamic_rules()
            .await?
            .into_iter()
            .filter_map(|rule| serde_json::from_value(rule).ok())
            .collect())
    }

    async fn list_rule_ids(&self) -> Result<Vec<i32>, EngineError> {
        Ok(self
            .dynamic_rules()
            .await?
            .iter()
            .filter_map(|rule| rule.get("id")?.as_i64())
            .filter_map(|id| i32::try_from(id).ok())
            .collect())
    }

    async fn mutate_rules(&self, mutation: RuleMutation) -> Result<(), EngineError> {
        let options = serde_json::json!({
            "removeRuleIds": mutation.remove_ids,
            "addRules": mutation.add_rules,
        });
        let options = to_js(&options).map_err(EngineError::Host)?;
        call(&["declarativeNetRequest"], "updateDynamicRules", &[options])
            .await
            .map_err(EngineError::Host)?;
        Ok(())
    }
}

// =============================================================================
// chrome.action
// =============================================================================

pub async fn apply_badge(badge: &BadgeState) -> Result<(), String> {
    call(&["action"], "setBadgeText", &[object(&[("text", badge.text.as_str())])?]).await?;
    if let Some(color) = &badge.background_color {
        call(&["action"], "setBadgeBackgroundColor", &[object(&[("color", color.as_str())])?]).await?;
    }
    call(&["action"], "setTitle", &[object(&[("title", badge.title.as_str())])?]).await?;
    Ok(())
}

fn object(fields: &[(&str, &str)]) -> Result<JsValue, String> {
    let object = Object::new();
    for (key, value) in fields {
        Reflect::set(&object, &JsValue::from_str(key), &JsValue::from_str(value)).map_err(describe)?;
    }
    Ok(object.into())
}
