//! Minimal DOM binding for the presentation contract.
//!
//! The embedding page provides these element ids: `messagesContainer`,
//! `messageInput`, `sendButton`, `clearButton`, `loadingIndicator`,
//! `errorBanner`, `connectionStatus`, `serverUnavailable`, `modelSelect`,
//! `themeToggle`, `keyButton`, `keyModal`, `keyInput`, `keySaveButton`.
//! Only text content and class names are set here; styling stays in the
//! page's stylesheet.

use wasm_bindgen::JsValue;
use web_sys::{Document, Element};

use graphchat_chat::{Conversation, ConversationState};
use graphchat_types::{ChatMessage, MessageKind, Preferences};

use crate::dom;

#[derive(Clone)]
pub struct View {
    document: Document,
}

impl View {
    pub fn new(document: Document) -> Self {
        Self { document }
    }

    pub(crate) fn document(&self) -> &Document {
        &self.document
    }

    /// Re-render everything derived from conversation state.
    pub fn render(&self, conversation: &Conversation) -> Result<(), JsValue> {
        self.render_messages(conversation.messages())?;
        self.set_conversation_state(conversation.state())?;
        self.set_error(conversation.error())
    }

    fn render_messages(&self, messages: &[ChatMessage]) -> Result<(), JsValue> {
        let container = dom::get_element_by_id(&self.document, "messagesContainer")?;
        dom::clear_element(&container);

        for message in messages {
            let element = self.message_element(message)?;
            container.append_child(&element)?;
        }

        dom::scroll_to_bottom(&container);
        Ok(())
    }

    fn message_element(&self, message: &ChatMessage) -> Result<Element, JsValue> {
        let class = match message.kind {
            MessageKind::UserInput => "message user",
            MessageKind::BotText => "message bot",
        };
        let wrapper = dom::create_element_with_class(&self.document, "div", class)?;
        if !message.complete {
            wrapper.class_list().add_1("streaming")?;
        }

        let text = dom::create_element_with_class(&self.document, "div", "message-text")?;
        text.set_text_content(Some(&message.text));
        wrapper.append_child(&text)?;

        // the generated query is shown on demand, as plain text
        if let Some(query) = &message.generated_query {
            let toggle = dom::create_element_with_class(&self.document, "button", "query-toggle")?;
            toggle.set_text_content(Some("Show query"));
            let block =
                dom::create_element_with_class(&self.document, "pre", "generated-query hidden")?;
            block.set_text_content(Some(query));
            {
                let block = block.clone();
                dom::add_click_listener(&toggle, move || {
                    let _ = block.class_list().toggle("hidden");
                })?;
            }
            wrapper.append_child(&toggle)?;
            wrapper.append_child(&block)?;
        }

        Ok(wrapper)
    }

    fn set_conversation_state(&self, state: ConversationState) -> Result<(), JsValue> {
        let loading = dom::get_html_element_by_id(&self.document, "loadingIndicator")?;
        if state == ConversationState::Waiting {
            dom::show_element(&loading);
        } else {
            dom::hide_element(&loading);
        }

        // input only accepted while ready; the reducer enforces this too
        let accepting = state == ConversationState::Ready;
        dom::get_textarea_by_id(&self.document, "messageInput")?.set_disabled(!accepting);
        dom::get_button_by_id(&self.document, "sendButton")?.set_disabled(!accepting);
        dom::get_button_by_id(&self.document, "clearButton")?.set_disabled(!accepting);
        Ok(())
    }

    fn set_error(&self, error: Option<&str>) -> Result<(), JsValue> {
        let banner = dom::get_html_element_by_id(&self.document, "errorBanner")?;
        match error {
            Some(detail) => {
                banner.set_text_content(Some(detail));
                dom::show_element(&banner);
            }
            None => {
                banner.set_text_content(None);
                dom::hide_element(&banner);
            }
        }
        Ok(())
    }

    pub fn set_connection_status(&self, connected: bool) -> Result<(), JsValue> {
        let status = dom::get_html_element_by_id(&self.document, "connectionStatus")?;
        if connected {
            dom::hide_element(&status);
        } else {
            status.set_text_content(Some("Could not connect to server, reconnecting..."));
            dom::show_element(&status);
        }
        Ok(())
    }

    /// Persistent and non-dismissable; a reload is the only way out.
    pub fn show_server_unavailable(&self) -> Result<(), JsValue> {
        let notice = dom::get_html_element_by_id(&self.document, "serverUnavailable")?;
        notice.set_text_content(Some(
            "Server is unavailable, please reload the page to try again.",
        ));
        dom::show_element(&notice);
        Ok(())
    }

    pub fn apply_theme(&self, preferences: &Preferences) -> Result<(), JsValue> {
        let root = self
            .document
            .document_element()
            .ok_or_else(|| JsValue::from_str("No document element"))?;
        root.class_list()
            .toggle_with_force("dark", preferences.dark_mode)?;
        Ok(())
    }

    pub fn set_credential_required(&self, required: bool) -> Result<(), JsValue> {
        let button = dom::get_html_element_by_id(&self.document, "keyButton")?;
        if required {
            dom::show_element(&button);
        } else {
            dom::hide_element(&button);
        }
        Ok(())
    }

    pub fn set_credential_modal_open(&self, open: bool) -> Result<(), JsValue> {
        let modal = dom::get_html_element_by_id(&self.document, "keyModal")?;
        if open {
            dom::show_element(&modal);
        } else {
            dom::hide_element(&modal);
        }
        Ok(())
    }

    pub fn credential_input(&self) -> Result<String, JsValue> {
        Ok(dom::get_input_by_id(&self.document, "keyInput")?.value())
    }

    /// Read and clear the question box; blank input maps to `None`.
    pub fn take_question_input(&self) -> Result<Option<String>, JsValue> {
        let input = dom::get_textarea_by_id(&self.document, "messageInput")?;
        let value = input.value();
        if value.trim().is_empty() {
            return Ok(None);
        }
        input.set_value("");
        Ok(Some(value))
    }

    pub fn selected_model(&self) -> Result<String, JsValue> {
        Ok(dom::get_select_by_id(&self.document, "modelSelect")?.value())
    }
}
