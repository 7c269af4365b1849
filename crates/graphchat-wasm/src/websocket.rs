use futures::channel::mpsc::{UnboundedReceiver, UnboundedSender};
use futures::stream::SplitSink;
use futures::{SinkExt, StreamExt};
use gloo_net::websocket::{futures::WebSocket, Message as WsMessage};
use gloo_timers::future::TimeoutFuture;
use wasm_bindgen::JsValue;

use graphchat_chat::ChatEvent;
use graphchat_types::{ClientRequest, ServerReply, RECONNECT_INTERVAL_MS};

use crate::app::AppEvent;

/// Drive the persistent streaming channel for the life of the page.
///
/// Questions arrive on `outgoing`; replies and connection status are
/// forwarded to the app event queue. On closure the channel reconnects on
/// a fixed interval, indefinitely — a human reloads the page if the
/// service stays down for long.
pub(crate) async fn run_channel(
    url: String,
    mut outgoing: UnboundedReceiver<ClientRequest>,
    events: UnboundedSender<AppEvent>,
) {
    let mut attempt: u64 = 0;
    loop {
        if attempt == 0 {
            log::info!("Connecting to WebSocket: {}", url);
        } else {
            log::info!("Reconnecting (attempt {})...", attempt + 1);
        }
        attempt += 1;

        let ws = match WebSocket::open(&url) {
            Ok(ws) => ws,
            Err(e) => {
                log::error!("Failed to connect: {:?}", e);
                let _ = events.unbounded_send(AppEvent::ChannelDown);
                TimeoutFuture::new(RECONNECT_INTERVAL_MS).await;
                continue;
            }
        };

        let (mut sink, stream) = ws.split();
        let mut stream = stream.fuse();
        let _ = events.unbounded_send(AppEvent::ChannelUp);

        loop {
            futures::select! {
                frame = stream.next() => match frame {
                    Some(Ok(WsMessage::Text(text))) => {
                        log::debug!("Received: {}", text);
                        match ServerReply::from_json(&text) {
                            Ok(reply) => {
                                let _ = events
                                    .unbounded_send(AppEvent::Chat(ChatEvent::Reply(reply)));
                            }
                            // one bad frame does not tear the channel down
                            Err(e) => log::warn!("Dropping malformed reply: {}", e),
                        }
                    }
                    Some(Ok(WsMessage::Bytes(_))) => {
                        log::warn!("Received unexpected binary message");
                    }
                    Some(Err(e)) => {
                        log::error!("WebSocket error: {:?}", e);
                        break;
                    }
                    None => {
                        log::info!("WebSocket closed");
                        break;
                    }
                },
                request = outgoing.next() => match request {
                    Some(request) => {
                        if let Err(e) = send(&mut sink, &request).await {
                            log::error!("Failed to send: {:?}", e);
                            break;
                        }
                    }
                    // the app hung up; nothing left to drive
                    None => return,
                },
            }
        }

        let _ = events.unbounded_send(AppEvent::ChannelDown);
        TimeoutFuture::new(RECONNECT_INTERVAL_MS).await;
    }
}

async fn send(
    sink: &mut SplitSink<WebSocket, WsMessage>,
    request: &ClientRequest,
) -> Result<(), JsValue> {
    let json = request
        .to_json()
        .map_err(|e| JsValue::from_str(&format!("Failed to serialize: {}", e)))?;

    log::debug!("Sending message: {}", json);

    sink.send(WsMessage::Text(json))
        .await
        .map_err(|e| JsValue::from_str(&format!("Failed to send: {:?}", e)))
}
