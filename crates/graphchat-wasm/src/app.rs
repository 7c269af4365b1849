use futures::channel::mpsc;
use futures::StreamExt;
use gloo_timers::future::TimeoutFuture;
use wasm_bindgen::JsValue;

use graphchat_chat::{ChatEvent, Conversation, Effect};
use graphchat_types::{ClientRequest, Session};

use crate::dom;
use crate::gateway::{BackendConfig, Gateway};
use crate::storage::SessionStore;
use crate::view::View;
use crate::websocket;

/// Everything the dispatch loop reacts to. Every source — DOM intents,
/// streaming replies, HTTP completions, timers — goes through the one
/// queue, so no two transitions can interleave.
pub(crate) enum AppEvent {
    Chat(ChatEvent),
    CredentialModalRequested,
    CredentialSaved { token: String },
    ThemeToggled,
    ChannelUp,
    ChannelDown,
    ServerUnavailable,
}

pub struct ChatApp {
    view: View,
    store: SessionStore,
    gateway: Gateway,
    ws_url: String,
}

impl ChatApp {
    pub fn new() -> Result<Self, JsValue> {
        let document = crate::document()?;
        let config = BackendConfig::from_page();
        Ok(Self {
            view: View::new(document),
            store: SessionStore::new()?,
            ws_url: config.ws_url.clone(),
            gateway: Gateway::new(config),
        })
    }

    pub async fn start(self) -> Result<(), JsValue> {
        // theme before anything else so the page does not flash
        let mut preferences = self.store.preferences();
        self.view.apply_theme(&preferences)?;

        // session identity: durable, or freshly issued and persisted
        let session_id = match self.store.session_id() {
            Some(id) => id,
            None => match self.gateway.generate_session_id().await {
                Ok(id) => {
                    self.store.save_session_id(&id);
                    id
                }
                Err(e) => {
                    log::error!("Session issuance failed: {:?}", e);
                    self.view.show_server_unavailable()?;
                    return Ok(());
                }
            },
        };

        // credential gate
        let needs_credential = match self.gateway.check_credential_requirement().await {
            Ok(needs) => needs,
            Err(e) => {
                log::error!("Credential check failed: {:?}", e);
                self.view.show_server_unavailable()?;
                return Ok(());
            }
        };
        let credential = self.store.credential();
        self.view.set_credential_required(needs_credential)?;
        if needs_credential && credential.is_none() {
            self.view.set_credential_modal_open(true)?;
        }

        let mut conversation = Conversation::new(Session {
            id: session_id.clone(),
            credential,
        });

        let (events_tx, mut events_rx) = mpsc::unbounded::<AppEvent>();
        let (outgoing_tx, outgoing_rx) = mpsc::unbounded::<ClientRequest>();

        // restore persisted history; the reducer fences stale sessions
        {
            let gateway = self.gateway.clone();
            let events = events_tx.clone();
            let session_id = session_id.clone();
            wasm_bindgen_futures::spawn_local(async move {
                match gateway.fetch_history(&session_id).await {
                    Ok(records) => {
                        let _ = events.unbounded_send(AppEvent::Chat(ChatEvent::HistoryLoaded {
                            session_id,
                            records,
                        }));
                    }
                    Err(e) => {
                        log::error!("History fetch failed: {:?}", e);
                        let _ = events.unbounded_send(AppEvent::ServerUnavailable);
                    }
                }
            });
        }

        // the persistent streaming channel
        {
            let events = events_tx.clone();
            let url = self.ws_url.clone();
            wasm_bindgen_futures::spawn_local(async move {
                websocket::run_channel(url, outgoing_rx, events).await;
            });
        }

        self.wire_intents(&events_tx)?;
        self.view.render(&conversation)?;

        // single dispatch loop: the only place conversation state mutates
        while let Some(event) = events_rx.next().await {
            match event {
                AppEvent::Chat(chat_event) => {
                    for effect in conversation.apply(chat_event) {
                        self.run_effect(effect, &outgoing_tx, &events_tx);
                    }
                    self.view.render(&conversation)?;
                }
                AppEvent::CredentialModalRequested => {
                    self.view.set_credential_modal_open(true)?;
                }
                AppEvent::CredentialSaved { token } => {
                    self.store.save_credential(&token);
                    self.view.set_credential_modal_open(false)?;
                }
                AppEvent::ThemeToggled => {
                    preferences.dark_mode = !preferences.dark_mode;
                    self.store.save_preferences(&preferences);
                    self.view.apply_theme(&preferences)?;
                }
                AppEvent::ChannelUp => self.view.set_connection_status(true)?,
                AppEvent::ChannelDown => self.view.set_connection_status(false)?,
                AppEvent::ServerUnavailable => self.view.show_server_unavailable()?,
            }
        }

        Ok(())
    }

    fn run_effect(
        &self,
        effect: Effect,
        outgoing: &mpsc::UnboundedSender<ClientRequest>,
        events: &mpsc::UnboundedSender<AppEvent>,
    ) {
        match effect {
            Effect::SendQuestion(request) => {
                if outgoing.unbounded_send(request).is_err() {
                    log::error!("Streaming channel task is gone, dropping question");
                }
            }
            Effect::ClearRemoteHistory { session_id } => {
                let gateway = self.gateway.clone();
                let events = events.clone();
                wasm_bindgen_futures::spawn_local(async move {
                    match gateway.clear_history(&session_id).await {
                        Ok(true) => {}
                        Ok(false) => {
                            let _ = events
                                .unbounded_send(AppEvent::Chat(ChatEvent::HistoryClearFailed));
                        }
                        Err(e) => {
                            log::error!("History clear failed: {:?}", e);
                            let _ = events
                                .unbounded_send(AppEvent::Chat(ChatEvent::HistoryClearFailed));
                        }
                    }
                });
            }
            Effect::ScheduleErrorReset { epoch, delay_ms } => {
                let events = events.clone();
                wasm_bindgen_futures::spawn_local(async move {
                    TimeoutFuture::new(delay_ms).await;
                    let _ = events
                        .unbounded_send(AppEvent::Chat(ChatEvent::ErrorTimerFired { epoch }));
                });
            }
        }
    }

    /// Hook DOM controls up to the event queue.
    fn wire_intents(&self, events: &mpsc::UnboundedSender<AppEvent>) -> Result<(), JsValue> {
        let document = self.view.document();

        // question submission: send button and Enter in the input box
        let submit = {
            let view = self.view.clone();
            let events = events.clone();
            move || match view.take_question_input() {
                Ok(Some(text)) => {
                    let _ = events.unbounded_send(AppEvent::Chat(ChatEvent::SubmitQuestion { text }));
                }
                Ok(None) => {}
                Err(e) => log::error!("Failed to read input: {:?}", e),
            }
        };
        {
            let submit = submit.clone();
            let button = dom::get_element_by_id(document, "sendButton")?;
            dom::add_click_listener(&button, move || submit())?;
        }
        {
            let input = dom::get_textarea_by_id(document, "messageInput")?;
            dom::add_keydown_listener(&input, move |event| {
                if event.key() == "Enter" && !event.shift_key() {
                    event.prevent_default();
                    submit();
                }
            })?;
        }

        {
            let events = events.clone();
            let button = dom::get_element_by_id(document, "clearButton")?;
            dom::add_click_listener(&button, move || {
                let _ = events.unbounded_send(AppEvent::Chat(ChatEvent::ClearHistory));
            })?;
        }

        {
            let view = self.view.clone();
            let events = events.clone();
            let select = dom::get_select_by_id(document, "modelSelect")?;
            dom::add_change_listener(&select, move || match view.selected_model() {
                Ok(model) => {
                    let _ = events.unbounded_send(AppEvent::Chat(ChatEvent::SelectModel { model }));
                }
                Err(e) => log::error!("Failed to read model selection: {:?}", e),
            })?;
        }

        {
            let events = events.clone();
            let toggle = dom::get_element_by_id(document, "themeToggle")?;
            dom::add_click_listener(&toggle, move || {
                let _ = events.unbounded_send(AppEvent::ThemeToggled);
            })?;
        }

        {
            let events = events.clone();
            let button = dom::get_element_by_id(document, "keyButton")?;
            dom::add_click_listener(&button, move || {
                let _ = events.unbounded_send(AppEvent::CredentialModalRequested);
            })?;
        }

        {
            let view = self.view.clone();
            let events = events.clone();
            let button = dom::get_element_by_id(document, "keySaveButton")?;
            dom::add_click_listener(&button, move || match view.credential_input() {
                Ok(token) => {
                    let _ = events.unbounded_send(AppEvent::CredentialSaved { token });
                }
                Err(e) => log::error!("Failed to read credential: {:?}", e),
            })?;
        }

        Ok(())
    }
}
