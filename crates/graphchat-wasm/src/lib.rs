use wasm_bindgen::prelude::*;
use web_sys::{Document, Window};

mod app;
mod dom;
mod gateway;
mod storage;
mod view;
mod websocket;

pub use app::ChatApp;
pub use gateway::{BackendConfig, Gateway};

/// Initialize the WASM module
/// This sets up panic hooks and logging
#[wasm_bindgen(start)]
pub fn init() {
    console_error_panic_hook::set_once();

    wasm_logger::init(wasm_logger::Config::default());

    log::info!("GraphChat WASM initialized");
}

/// Initialize the chat page
#[wasm_bindgen]
pub async fn init_chat_app() -> Result<(), JsValue> {
    app::ChatApp::new()?.start().await
}

/// Get the window object
pub(crate) fn window() -> Result<Window, JsValue> {
    web_sys::window().ok_or_else(|| JsValue::from_str("No window object"))
}

/// Get the document object
pub(crate) fn document() -> Result<Document, JsValue> {
    window()?
        .document()
        .ok_or_else(|| JsValue::from_str("No document object"))
}
