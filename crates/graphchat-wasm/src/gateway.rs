use gloo_net::http::Request;
use serde::de::DeserializeOwned;
use wasm_bindgen::JsValue;

use graphchat_types::{
    ChatHistoryResponse, ClearHistoryResponse, HasApiKeyResponse, HistoryRecord, SessionId,
    SessionIdResponse,
};

/// Endpoint set for the knowledge-graph backend.
#[derive(Debug, Clone)]
pub struct BackendConfig {
    pub ws_url: String,
    pub has_api_key_url: String,
    pub generate_session_id_url: String,
    pub chat_history_url: String,
}

impl BackendConfig {
    /// Derive endpoints from the optional `GRAPHCHAT_BACKEND` global set by
    /// the embedding page, falling back to the local development backend.
    pub fn from_page() -> Self {
        let base = crate::window()
            .ok()
            .and_then(|w| js_sys::Reflect::get(&w, &JsValue::from_str("GRAPHCHAT_BACKEND")).ok())
            .and_then(|v| v.as_string());
        match base {
            Some(base) => Self::with_base(base.trim_end_matches('/')),
            None => Self::default(),
        }
    }

    fn with_base(base: &str) -> Self {
        let ws_base = if let Some(rest) = base.strip_prefix("https") {
            format!("wss{}", rest)
        } else if let Some(rest) = base.strip_prefix("http") {
            format!("ws{}", rest)
        } else {
            base.to_string()
        };
        Self {
            ws_url: format!("{}/text2text", ws_base),
            has_api_key_url: format!("{}/hasapikey", base),
            generate_session_id_url: format!("{}/generate_session_id", base),
            chat_history_url: format!("{}/chat_history", base),
        }
    }
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self::with_base("http://localhost:8000")
    }
}

/// Request/response calls to the backend, one method per endpoint.
#[derive(Clone)]
pub struct Gateway {
    config: BackendConfig,
}

impl Gateway {
    pub fn new(config: BackendConfig) -> Self {
        Self { config }
    }

    /// True if the backend demands a credential before accepting
    /// questions. The endpoint reports whether a key is already present
    /// on the backend, hence the inversion.
    pub async fn check_credential_requirement(&self) -> Result<bool, JsValue> {
        let body: HasApiKeyResponse = get_json(&self.config.has_api_key_url).await?;
        Ok(!body.output)
    }

    /// Ask the backend to issue a fresh session id.
    pub async fn generate_session_id(&self) -> Result<SessionId, JsValue> {
        let response = Request::post(&self.config.generate_session_id_url)
            .json(&serde_json::json!({}))
            .map_err(|e| JsValue::from_str(&format!("Failed to build request: {:?}", e)))?
            .send()
            .await
            .map_err(|e| JsValue::from_str(&format!("Request failed: {:?}", e)))?;
        let body: SessionIdResponse = response
            .json()
            .await
            .map_err(|e| JsValue::from_str(&format!("Malformed response: {:?}", e)))?;
        Ok(body.session_id)
    }

    /// Fetch the stored conversation for a session. History is never
    /// partial.
    pub async fn fetch_history(&self, session_id: &str) -> Result<Vec<HistoryRecord>, JsValue> {
        let url = format!("{}?session_id={}", self.config.chat_history_url, session_id);
        let body: ChatHistoryResponse = get_json(&url).await?;
        Ok(body.messages)
    }

    /// Destructive. Returns the backend's success flag.
    pub async fn clear_history(&self, session_id: &str) -> Result<bool, JsValue> {
        let url = format!("{}?session_id={}", self.config.chat_history_url, session_id);
        let response = Request::delete(&url)
            .send()
            .await
            .map_err(|e| JsValue::from_str(&format!("Request failed: {:?}", e)))?;
        let body: ClearHistoryResponse = response
            .json()
            .await
            .map_err(|e| JsValue::from_str(&format!("Malformed response: {:?}", e)))?;
        Ok(body.success)
    }
}

async fn get_json<T: DeserializeOwned>(url: &str) -> Result<T, JsValue> {
    let response = Request::get(url)
        .send()
        .await
        .map_err(|e| JsValue::from_str(&format!("Request failed: {:?}", e)))?;
    response
        .json::<T>()
        .await
        .map_err(|e| JsValue::from_str(&format!("Malformed response: {:?}", e)))
}
