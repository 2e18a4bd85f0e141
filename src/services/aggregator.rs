use std::sync::{Arc, Mutex, MutexGuard};

use uuid::Uuid;

use crate::models::{Conversation, Message, Role};
use crate::providers::{ChatMessage, GenerateRequest, GenerationBackend, ProviderError, StreamEvent};
use crate::services::errors::StudioError;
use crate::services::languages::language_instruction;
use crate::services::prompts;

/// Reply appended in place of a failed assistant turn.
pub const FALLBACK_REPLY: &str = "I'm sorry, I couldn't process your request. Please try again.";
pub const GREETING: &str =
    "Hello! I'm your AI assistant powered by Google Gemini. How can I help you today?";

/// Observable state of one aggregation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AggregateState {
    Pending(String),
    Complete(String),
    Failed(String),
}

/// Concatenates text fragments into one growing string.
#[derive(Debug, Default)]
pub struct StreamAggregator {
    buffer: String,
    fragments: usize,
}

impl StreamAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, fragment: &str) -> &str {
        self.buffer.push_str(fragment);
        self.fragments += 1;
        &self.buffer
    }

    pub fn fragments(&self) -> usize {
        self.fragments
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    pub fn into_text(self) -> String {
        self.buffer
    }
}

/// Run one streamed generation to settlement, reporting every partial.
///
/// Returns the final text, or the error that ended the stream. A stream
/// that settles without any text counts as a failure.
pub async fn collect_stream<F>(
    backend: Arc<dyn GenerationBackend>,
    request: GenerateRequest,
    mut on_partial: F,
) -> Result<String, ProviderError>
where
    F: FnMut(&str) + Send,
{
    let (tx, mut rx) = tokio::sync::mpsc::channel::<StreamEvent>(64);

    let _stream_handle = tokio::spawn(async move {
        if let Err(e) = backend.stream_generate(request, tx.clone()).await {
            let _ = tx.send(StreamEvent::Error(e)).await;
        }
    });

    let mut aggregator = StreamAggregator::new();

    loop {
        match rx.recv().await {
            Some(StreamEvent::Token(token)) => {
                if token.is_empty() {
                    continue;
                }
                on_partial(aggregator.push(&token));
            }
            Some(StreamEvent::Done {
                tokens_in,
                tokens_out,
            }) => {
                tracing::debug!(
                    fragments = aggregator.fragments(),
                    ?tokens_in,
                    ?tokens_out,
                    "stream complete"
                );
                break;
            }
            Some(StreamEvent::Error(error)) => {
                tracing::warn!("Stream failed after {} fragments: {}", aggregator.fragments(), error);
                return Err(error);
            }
            None => break,
        }
    }

    if aggregator.is_empty() {
        return Err(ProviderError::InvalidResponse(
            "Stream ended without any content".to_string(),
        ));
    }

    Ok(aggregator.into_text())
}

#[derive(Debug)]
pub enum SubmitOutcome {
    /// The assistant reply, immutable from here on.
    Completed(Message),
    /// The stream failed; `reply` is the fallback message now in the history.
    Failed { reply: Message, error: StudioError },
    /// Another submission is still streaming; nothing changed.
    Busy,
}

struct SessionState {
    conversation: Conversation,
    streaming: bool,
}

fn lock_state(state: &Mutex<SessionState>) -> MutexGuard<'_, SessionState> {
    // A poisoned lock still holds a consistent history
    state.lock().unwrap_or_else(|e| e.into_inner())
}

/// Clears the streaming flag and any partial reply if a submission is
/// dropped before its stream settles.
struct PendingReply {
    state: Arc<Mutex<SessionState>>,
    assistant_id: String,
    settled: bool,
}

impl Drop for PendingReply {
    fn drop(&mut self) {
        if self.settled {
            return;
        }
        let mut state = lock_state(&self.state);
        state.streaming = false;
        state.conversation.remove(&self.assistant_id);
        tracing::debug!("Chat submission dropped before the reply settled");
    }
}

/// One chat conversation and its single in-flight stream.
pub struct ChatSession {
    backend: Arc<dyn GenerationBackend>,
    model: String,
    language: String,
    state: Arc<Mutex<SessionState>>,
}

impl ChatSession {
    pub fn new(backend: Arc<dyn GenerationBackend>, model: &str, language: &str) -> Self {
        Self {
            backend,
            model: model.to_string(),
            language: language.to_string(),
            state: Arc::new(Mutex::new(SessionState {
                conversation: Self::fresh_conversation(),
                streaming: false,
            })),
        }
    }

    fn fresh_conversation() -> Conversation {
        Conversation::with_messages(vec![Message::assistant(GREETING)])
    }

    fn lock(&self) -> MutexGuard<'_, SessionState> {
        lock_state(&self.state)
    }

    pub fn messages(&self) -> Vec<Message> {
        self.lock().conversation.messages.clone()
    }

    pub fn len(&self) -> usize {
        self.lock().conversation.len()
    }

    pub fn is_streaming(&self) -> bool {
        self.lock().streaming
    }

    /// Start over. Refused while a stream is in flight.
    pub fn new_chat(&self) -> bool {
        let mut state = self.lock();
        if state.streaming {
            return false;
        }
        state.conversation = Self::fresh_conversation();
        true
    }

    /// Resume from persisted history. Refused while a stream is in flight.
    pub fn restore(&self, messages: Vec<Message>) -> bool {
        let mut state = self.lock();
        if state.streaming {
            return false;
        }
        state.conversation = if messages.is_empty() {
            Self::fresh_conversation()
        } else {
            Conversation::with_messages(messages)
        };
        true
    }

    /// Prior turns as sent to the model: fallback replies are dropped and
    /// the history must open with a user turn.
    fn history_for_request(messages: &[Message]) -> Vec<ChatMessage> {
        messages
            .iter()
            .filter(|m| !(m.role == Role::Assistant && m.content == FALLBACK_REPLY))
            .skip_while(|m| m.role == Role::Assistant)
            .map(|m| ChatMessage {
                role: m.role,
                content: m.content.clone(),
                images: Vec::new(),
            })
            .collect()
    }

    /// Submit a user turn and stream the reply into the conversation.
    ///
    /// `on_update` sees `Pending` after every fragment and then exactly one
    /// of `Complete` or `Failed`.
    pub async fn submit<F>(&self, content: &str, mut on_update: F) -> Result<SubmitOutcome, StudioError>
    where
        F: FnMut(&AggregateState) + Send,
    {
        if content.trim().is_empty() {
            return Err(StudioError::validation("message", "Please enter a message."));
        }

        let history = {
            let mut state = self.lock();
            if state.streaming {
                tracing::debug!("Submission ignored: a reply is still streaming");
                return Ok(SubmitOutcome::Busy);
            }
            state.streaming = true;
            state.conversation.push(Message::user(content));
            Self::history_for_request(&state.conversation.messages)
        };

        let mut request = GenerateRequest::text(&self.model, history);
        request.system_prompt = Some(prompts::chat_system_prompt(&language_instruction(
            &self.language,
        )));

        let assistant_id = Uuid::new_v4().to_string();
        let mut pending = PendingReply {
            state: self.state.clone(),
            assistant_id: assistant_id.clone(),
            settled: false,
        };
        let mut started = false;
        let shared = self.state.clone();

        let result = collect_stream(self.backend.clone(), request, |partial| {
            {
                let mut state = lock_state(&shared);
                if started {
                    state.conversation.replace_content(&assistant_id, partial);
                } else {
                    let mut message = Message::assistant(partial);
                    message.id = assistant_id.clone();
                    state.conversation.push(message);
                    started = true;
                }
            }
            on_update(&AggregateState::Pending(partial.to_string()));
        })
        .await;

        pending.settled = true;
        let mut state = self.lock();
        state.streaming = false;

        match result {
            Ok(text) => {
                let reply = state
                    .conversation
                    .messages
                    .iter()
                    .find(|m| m.id == assistant_id)
                    .cloned()
                    .unwrap_or_else(|| Message::assistant(text.clone()));
                drop(state);
                on_update(&AggregateState::Complete(text));
                Ok(SubmitOutcome::Completed(reply))
            }
            Err(error) => {
                tracing::error!("Chat stream failed: {}", error);
                state.conversation.remove(&assistant_id);
                let reply = Message::assistant(FALLBACK_REPLY);
                state.conversation.push(reply.clone());
                drop(state);
                on_update(&AggregateState::Failed(error.to_string()));
                Ok(SubmitOutcome::Failed {
                    reply,
                    error: error.into(),
                })
            }
        }
    }
}
