use graphchat_types::{
    ChatMessage, ClientRequest, HistoryRecord, ServerReply, Session, SessionId, ERROR_RESET_MS,
};

use crate::question::strip_question_prefix;

/// Model the backend uses to translate questions into Cypher.
const DEFAULT_MODEL: &str = "openai";

/// Conversation phase. Drives whether new user input is accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConversationState {
    Ready,
    Waiting,
    Streaming,
    Error,
}

/// Everything that can happen to a conversation, from any source.
#[derive(Debug, Clone, PartialEq)]
pub enum ChatEvent {
    /// The user submitted a question.
    SubmitQuestion { text: String },
    /// The user asked to clear the conversation.
    ClearHistory,
    /// The user picked a different translation model.
    SelectModel { model: String },
    /// A tagged reply arrived on the streaming channel.
    Reply(ServerReply),
    /// A history fetch completed for the given session.
    HistoryLoaded {
        session_id: SessionId,
        records: Vec<HistoryRecord>,
    },
    /// The remote history clear failed (transport error or `success=false`).
    HistoryClearFailed,
    /// The error-reset timer fired.
    ErrorTimerFired { epoch: u64 },
}

/// Side effects requested by the reducer. The caller performs the I/O and
/// feeds the outcome back in as further events.
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    /// Enqueue a question on the streaming channel.
    SendQuestion(ClientRequest),
    /// Issue the destructive history clear for this session.
    ClearRemoteHistory { session_id: SessionId },
    /// Arrange for `ErrorTimerFired { epoch }` after `delay_ms`.
    ScheduleErrorReset { epoch: u64, delay_ms: u32 },
}

/// The conversation state machine. Owns the ordered message log; all
/// mutation goes through [`Conversation::apply`].
///
/// Invariant: at most one message in the log is incomplete, and it is
/// always the last one.
#[derive(Debug)]
pub struct Conversation {
    session: Session,
    model: String,
    messages: Vec<ChatMessage>,
    state: ConversationState,
    error: Option<String>,
    next_id: u64,
    error_epoch: u64,
}

impl Conversation {
    pub fn new(session: Session) -> Self {
        Self {
            session,
            model: DEFAULT_MODEL.to_string(),
            messages: Vec::new(),
            state: ConversationState::Ready,
            error: None,
            next_id: 0,
            error_epoch: 0,
        }
    }

    pub fn state(&self) -> ConversationState {
        self.state
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    /// Current user-visible error text, if any. Set both by conversational
    /// errors and by a failed history clear.
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Apply one event and return the effects the caller must perform.
    pub fn apply(&mut self, event: ChatEvent) -> Vec<Effect> {
        match event {
            ChatEvent::SubmitQuestion { text } => self.on_submit(text),
            ChatEvent::ClearHistory => self.on_clear(),
            ChatEvent::SelectModel { model } => {
                self.model = model;
                Vec::new()
            }
            ChatEvent::Reply(reply) => self.on_reply(reply),
            ChatEvent::HistoryLoaded {
                session_id,
                records,
            } => self.on_history(session_id, records),
            ChatEvent::HistoryClearFailed => {
                self.error = Some("error on clearing chat history".to_string());
                Vec::new()
            }
            ChatEvent::ErrorTimerFired { epoch } => self.on_error_timer(epoch),
        }
    }

    /// Only one outstanding question at a time: submissions are accepted
    /// solely from the ready state.
    fn on_submit(&mut self, text: String) -> Vec<Effect> {
        if self.state != ConversationState::Ready {
            log::warn!("question submitted while {:?}, ignoring", self.state);
            return Vec::new();
        }

        let question = strip_question_prefix(&text);
        let id = self.alloc_id();
        self.messages.push(ChatMessage::user(id, question.clone()));
        self.error = None;
        self.state = ConversationState::Waiting;

        vec![Effect::SendQuestion(ClientRequest::Question {
            question,
            model: Some(self.model.clone()),
            session_id: Some(self.session.id.clone()),
        })]
    }

    /// The clear is optimistic: the local log empties immediately and a
    /// later network failure only surfaces an error string.
    fn on_clear(&mut self) -> Vec<Effect> {
        if self.state != ConversationState::Ready {
            log::warn!("clear requested while {:?}, ignoring", self.state);
            return Vec::new();
        }

        self.messages.clear();
        self.error = None;

        vec![Effect::ClearRemoteHistory {
            session_id: self.session.id.clone(),
        }]
    }

    fn on_reply(&mut self, reply: ServerReply) -> Vec<Effect> {
        match reply {
            ServerReply::Start => {
                // keeps the at-most-one-incomplete-message invariant under
                // duplicate delivery
                if self.messages.last().is_some_and(|m| !m.complete) {
                    log::warn!("start while an answer is under construction, ignoring");
                } else {
                    let id = self.alloc_id();
                    self.messages.push(ChatMessage::bot_placeholder(id));
                }
                self.state = ConversationState::Streaming;
                Vec::new()
            }
            ServerReply::Stream { output } => {
                // The transport offers no ordering guarantee beyond a
                // single in-order connection; a fragment without a prior
                // start is dropped rather than crashing.
                match self.messages.last_mut() {
                    Some(last) if !last.complete => last.text.push_str(&output),
                    _ => log::warn!("stream fragment with no answer under construction, dropping"),
                }
                Vec::new()
            }
            ServerReply::End {
                output: _,
                generated_cypher,
            } => {
                match self.messages.last_mut() {
                    Some(last) if !last.complete => {
                        last.complete = true;
                        last.generated_query = generated_cypher;
                        self.state = ConversationState::Ready;
                    }
                    _ => log::warn!("end with no answer under construction, dropping"),
                }
                Vec::new()
            }
            ServerReply::Error { detail } => {
                log::error!("backend error: {}", detail);
                self.error = Some(detail);
                self.state = ConversationState::Error;
                self.error_epoch += 1;
                vec![Effect::ScheduleErrorReset {
                    epoch: self.error_epoch,
                    delay_ms: ERROR_RESET_MS,
                }]
            }
            ServerReply::Debug { detail } => {
                log::debug!("backend: {}", detail);
                Vec::new()
            }
        }
    }

    /// Late responses for a superseded session are discarded.
    fn on_history(&mut self, session_id: SessionId, records: Vec<HistoryRecord>) -> Vec<Effect> {
        if session_id != self.session.id {
            log::warn!(
                "history response for stale session {}, discarding",
                session_id
            );
            return Vec::new();
        }

        for record in records {
            if let Some(message) = ChatMessage::from_history(self.next_id, &record) {
                self.next_id += 1;
                self.messages.push(message);
            }
        }
        Vec::new()
    }

    /// A stale epoch means another error (or a ready transition) superseded
    /// the timer; the firing is ignored.
    fn on_error_timer(&mut self, epoch: u64) -> Vec<Effect> {
        if epoch == self.error_epoch && self.state == ConversationState::Error {
            self.state = ConversationState::Ready;
            self.error = None;
        }
        Vec::new()
    }

    fn alloc_id(&mut self) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use graphchat_types::MessageKind;

    fn test_conversation() -> Conversation {
        Conversation::new(Session::new("session-1"))
    }

    fn submit(conversation: &mut Conversation, text: &str) -> Vec<Effect> {
        conversation.apply(ChatEvent::SubmitQuestion {
            text: text.to_string(),
        })
    }

    fn reply(conversation: &mut Conversation, reply: ServerReply) -> Vec<Effect> {
        conversation.apply(ChatEvent::Reply(reply))
    }

    #[test]
    fn test_submit_appends_message_and_sends_question() {
        let mut conversation = test_conversation();
        let effects = submit(&mut conversation, "What airports are near Paris?");

        assert_eq!(conversation.state(), ConversationState::Waiting);
        assert_eq!(conversation.messages().len(), 1);
        let message = &conversation.messages()[0];
        assert_eq!(message.kind, MessageKind::UserInput);
        assert!(message.complete);

        assert_eq!(
            effects,
            vec![Effect::SendQuestion(ClientRequest::Question {
                question: "What airports are near Paris?".to_string(),
                model: Some("openai".to_string()),
                session_id: Some("session-1".to_string()),
            })]
        );
    }

    #[test]
    fn test_submit_strips_question_prefix() {
        let mut conversation = test_conversation();
        let effects = submit(&mut conversation, "3) What airports are near Paris?");

        assert_eq!(
            conversation.messages()[0].text,
            "What airports are near Paris?"
        );
        match &effects[0] {
            Effect::SendQuestion(ClientRequest::Question { question, .. }) => {
                assert_eq!(question, "What airports are near Paris?");
            }
            other => panic!("expected send question, got {:?}", other),
        }
    }

    #[test]
    fn test_submit_carries_selected_model() {
        let mut conversation = test_conversation();
        conversation.apply(ChatEvent::SelectModel {
            model: "gpt4all".to_string(),
        });
        let effects = submit(&mut conversation, "hi");

        match &effects[0] {
            Effect::SendQuestion(ClientRequest::Question { model, .. }) => {
                assert_eq!(model.as_deref(), Some("gpt4all"));
            }
            other => panic!("expected send question, got {:?}", other),
        }
    }

    #[test]
    fn test_submit_while_busy_is_noop() {
        let mut conversation = test_conversation();
        submit(&mut conversation, "first");
        assert_eq!(conversation.state(), ConversationState::Waiting);

        let effects = submit(&mut conversation, "second");
        assert!(effects.is_empty());
        assert_eq!(conversation.messages().len(), 1);
        assert_eq!(conversation.state(), ConversationState::Waiting);

        reply(&mut conversation, ServerReply::Start);
        assert_eq!(conversation.state(), ConversationState::Streaming);

        let effects = submit(&mut conversation, "third");
        assert!(effects.is_empty());
        assert_eq!(conversation.messages().len(), 2);
        assert_eq!(conversation.state(), ConversationState::Streaming);
    }

    #[test]
    fn test_stream_fragments_concatenate() {
        let mut conversation = test_conversation();
        submit(&mut conversation, "name a city");
        reply(&mut conversation, ServerReply::Start);
        reply(
            &mut conversation,
            ServerReply::Stream {
                output: "Ni".to_string(),
            },
        );
        reply(
            &mut conversation,
            ServerReply::Stream {
                output: "ce".to_string(),
            },
        );
        reply(
            &mut conversation,
            ServerReply::End {
                output: String::new(),
                generated_cypher: Some("MATCH (a:Airport) RETURN a".to_string()),
            },
        );

        assert_eq!(conversation.state(), ConversationState::Ready);
        let bot = conversation.messages().last().unwrap();
        assert_eq!(bot.kind, MessageKind::BotText);
        assert_eq!(bot.text, "Nice");
        assert!(bot.complete);
        assert_eq!(
            bot.generated_query.as_deref(),
            Some("MATCH (a:Airport) RETURN a")
        );
    }

    #[test]
    fn test_end_completes_exactly_one_message() {
        let mut conversation = test_conversation();
        submit(&mut conversation, "q");
        reply(&mut conversation, ServerReply::Start);

        let incomplete_before = conversation
            .messages()
            .iter()
            .filter(|m| !m.complete)
            .count();
        assert_eq!(incomplete_before, 1);

        reply(
            &mut conversation,
            ServerReply::End {
                output: String::new(),
                generated_cypher: None,
            },
        );

        assert!(conversation.messages().iter().all(|m| m.complete));
        assert_eq!(conversation.state(), ConversationState::Ready);
    }

    #[test]
    fn test_stream_without_start_is_dropped() {
        let mut conversation = test_conversation();
        let effects = reply(
            &mut conversation,
            ServerReply::Stream {
                output: "orphan".to_string(),
            },
        );
        assert!(effects.is_empty());
        assert!(conversation.messages().is_empty());

        let effects = reply(
            &mut conversation,
            ServerReply::End {
                output: String::new(),
                generated_cypher: None,
            },
        );
        assert!(effects.is_empty());
        assert!(conversation.messages().is_empty());
    }

    #[test]
    fn test_duplicate_start_keeps_single_incomplete_message() {
        let mut conversation = test_conversation();
        submit(&mut conversation, "q");
        reply(&mut conversation, ServerReply::Start);
        reply(&mut conversation, ServerReply::Start);

        let incomplete = conversation
            .messages()
            .iter()
            .filter(|m| !m.complete)
            .count();
        assert_eq!(incomplete, 1);
        assert_eq!(conversation.state(), ConversationState::Streaming);
    }

    #[test]
    fn test_error_reply_then_timer_restores_ready() {
        let mut conversation = test_conversation();
        submit(&mut conversation, "q");
        let effects = reply(
            &mut conversation,
            ServerReply::Error {
                detail: "timeout".to_string(),
            },
        );

        assert_eq!(conversation.state(), ConversationState::Error);
        assert_eq!(conversation.error(), Some("timeout"));
        // the log is untouched
        assert_eq!(conversation.messages().len(), 1);

        let epoch = match effects.as_slice() {
            [Effect::ScheduleErrorReset { epoch, delay_ms }] => {
                assert_eq!(*delay_ms, 1_000);
                *epoch
            }
            other => panic!("expected scheduled reset, got {:?}", other),
        };

        conversation.apply(ChatEvent::ErrorTimerFired { epoch });
        assert_eq!(conversation.state(), ConversationState::Ready);
        assert_eq!(conversation.error(), None);
    }

    #[test]
    fn test_stale_error_timer_is_ignored() {
        let mut conversation = test_conversation();
        submit(&mut conversation, "q");
        let first = reply(
            &mut conversation,
            ServerReply::Error {
                detail: "first".to_string(),
            },
        );
        let first_epoch = match first.as_slice() {
            [Effect::ScheduleErrorReset { epoch, .. }] => *epoch,
            other => panic!("expected scheduled reset, got {:?}", other),
        };

        // a second error supersedes the first timer
        reply(
            &mut conversation,
            ServerReply::Error {
                detail: "second".to_string(),
            },
        );

        conversation.apply(ChatEvent::ErrorTimerFired { epoch: first_epoch });
        assert_eq!(conversation.state(), ConversationState::Error);
        assert_eq!(conversation.error(), Some("second"));
    }

    #[test]
    fn test_debug_reply_is_ignored() {
        let mut conversation = test_conversation();
        let effects = reply(
            &mut conversation,
            ServerReply::Debug {
                detail: "generated prompt".to_string(),
            },
        );
        assert!(effects.is_empty());
        assert!(conversation.messages().is_empty());
        assert_eq!(conversation.state(), ConversationState::Ready);
    }

    #[test]
    fn test_clear_while_ready_empties_log() {
        let mut conversation = test_conversation();
        submit(&mut conversation, "q");
        reply(&mut conversation, ServerReply::Start);
        reply(
            &mut conversation,
            ServerReply::End {
                output: String::new(),
                generated_cypher: None,
            },
        );
        assert_eq!(conversation.messages().len(), 2);

        let effects = conversation.apply(ChatEvent::ClearHistory);
        assert!(conversation.messages().is_empty());
        assert_eq!(
            effects,
            vec![Effect::ClearRemoteHistory {
                session_id: "session-1".to_string(),
            }]
        );
    }

    #[test]
    fn test_clear_while_streaming_is_noop() {
        let mut conversation = test_conversation();
        submit(&mut conversation, "q");
        reply(&mut conversation, ServerReply::Start);

        let effects = conversation.apply(ChatEvent::ClearHistory);
        assert!(effects.is_empty());
        assert_eq!(conversation.messages().len(), 2);
        assert_eq!(conversation.state(), ConversationState::Streaming);
    }

    #[test]
    fn test_clear_failure_keeps_log_empty_and_surfaces_error() {
        let mut conversation = test_conversation();
        submit(&mut conversation, "q");
        reply(&mut conversation, ServerReply::Start);
        reply(
            &mut conversation,
            ServerReply::End {
                output: String::new(),
                generated_cypher: None,
            },
        );
        conversation.apply(ChatEvent::ClearHistory);

        conversation.apply(ChatEvent::HistoryClearFailed);
        assert!(conversation.messages().is_empty());
        assert_eq!(conversation.error(), Some("error on clearing chat history"));
        // a clear failure is not a conversational error
        assert_eq!(conversation.state(), ConversationState::Ready);
    }

    #[test]
    fn test_history_loads_as_complete_messages() {
        let mut conversation = test_conversation();
        conversation.apply(ChatEvent::HistoryLoaded {
            session_id: "session-1".to_string(),
            records: vec![
                HistoryRecord {
                    kind: "human".to_string(),
                    content: "hi".to_string(),
                },
                HistoryRecord {
                    kind: "ai".to_string(),
                    content: "hello".to_string(),
                },
                HistoryRecord {
                    kind: "system".to_string(),
                    content: "skipped".to_string(),
                },
            ],
        });

        let messages = conversation.messages();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].kind, MessageKind::UserInput);
        assert_eq!(messages[1].kind, MessageKind::BotText);
        assert!(messages.iter().all(|m| m.complete));
    }

    #[test]
    fn test_history_for_stale_session_is_discarded() {
        let mut conversation = test_conversation();
        conversation.apply(ChatEvent::HistoryLoaded {
            session_id: "another-session".to_string(),
            records: vec![HistoryRecord {
                kind: "human".to_string(),
                content: "hi".to_string(),
            }],
        });
        assert!(conversation.messages().is_empty());
    }

    #[test]
    fn test_message_ids_stay_unique_across_clear() {
        let mut conversation = test_conversation();
        submit(&mut conversation, "first");
        let first_id = conversation.messages()[0].id;

        reply(&mut conversation, ServerReply::Start);
        reply(
            &mut conversation,
            ServerReply::End {
                output: String::new(),
                generated_cypher: None,
            },
        );
        conversation.apply(ChatEvent::ClearHistory);

        submit(&mut conversation, "second");
        assert!(conversation.messages()[0].id > first_id);
    }

    #[test]
    fn test_submit_clears_stale_error_text() {
        let mut conversation = test_conversation();
        conversation.apply(ChatEvent::HistoryClearFailed);
        assert!(conversation.error().is_some());

        submit(&mut conversation, "q");
        assert_eq!(conversation.error(), None);
    }
}
