use wasm_bindgen::JsValue;
use web_sys::Storage;

use graphchat_types::Preferences;

// Durable storage keys; flat string values that survive reloads.
const API_KEY: &str = "api_key";
const SESSION_ID: &str = "session_id";
const DARK_MODE: &str = "darkMode";

/// Session store backed by `window.localStorage`.
///
/// Saves are idempotent side effects; token shape is never validated.
pub struct SessionStore {
    storage: Storage,
}

impl SessionStore {
    pub fn new() -> Result<Self, JsValue> {
        let storage = crate::window()?
            .local_storage()?
            .ok_or_else(|| JsValue::from_str("localStorage unavailable"))?;
        Ok(Self { storage })
    }

    pub fn session_id(&self) -> Option<String> {
        self.get(SESSION_ID)
    }

    pub fn save_session_id(&self, id: &str) {
        self.set(SESSION_ID, id);
    }

    pub fn credential(&self) -> Option<String> {
        self.get(API_KEY)
    }

    pub fn save_credential(&self, token: &str) {
        self.set(API_KEY, token);
    }

    pub fn preferences(&self) -> Preferences {
        Preferences {
            dark_mode: self.get(DARK_MODE).as_deref() == Some("true"),
        }
    }

    pub fn save_preferences(&self, preferences: &Preferences) {
        self.set(DARK_MODE, if preferences.dark_mode { "true" } else { "false" });
    }

    fn get(&self, key: &str) -> Option<String> {
        self.storage
            .get_item(key)
            .ok()
            .flatten()
            .filter(|value| !value.is_empty())
    }

    fn set(&self, key: &str, value: &str) {
        if let Err(e) = self.storage.set_item(key, value) {
            log::error!("Failed to persist {}: {:?}", key, e);
        }
    }
}
