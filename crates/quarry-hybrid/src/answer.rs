//! Retrieval-augmented answers: the top passages of a semantic search are
//! numbered into a prompt and sent to a chat model together with the
//! conversation so far.
use std::fmt::Write as _;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use quarry_core::types::Score;
use quarry_core::{Error, Result};

use crate::retriever::Retriever;

/// Inputs that end an interactive session.
pub const EXIT_COMMANDS: [&str; 3] = ["bye", "quit", "exit"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn new(role: Role, content: impl Into<String>) -> Self { Self { role, content: content.into() } }
    pub fn user(content: impl Into<String>) -> Self { Self::new(Role::User, content) }
    pub fn assistant(content: impl Into<String>) -> Self { Self::new(Role::Assistant, content) }
}

/// A chat model. Implementations block; failures are `Error::Generation`.
pub trait ChatProvider: Send + Sync {
    fn model_id(&self) -> &str;
    fn chat(&self, messages: &[ChatMessage]) -> Result<String>;
}

/// Questions and replies exchanged so far, oldest first.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Conversation {
    messages: Vec<ChatMessage>,
}

impl Conversation {
    pub fn new() -> Self { Self::default() }

    pub fn messages(&self) -> &[ChatMessage] { &self.messages }

    pub fn push(&mut self, message: ChatMessage) { self.messages.push(message); }

    pub fn len(&self) -> usize { self.messages.len() }

    pub fn is_empty(&self) -> bool { self.messages.is_empty() }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Answer {
    pub text: String,
    pub passages: Vec<Score>,
}

pub fn is_exit_command(input: &str) -> bool {
    let input = input.trim().to_lowercase();
    EXIT_COMMANDS.contains(&input.as_str())
}

/// Prompt that grounds the model in the numbered `passages`.
pub fn build_prompt(question: &str, passages: &[Score]) -> String {
    let mut prompt = String::from(
        "Answer the question using only the numbered passages below. \
         If they do not contain the answer, say that you are not sure.\n\nPassages:\n",
    );
    for (i, p) in passages.iter().enumerate() {
        let _ = writeln!(prompt, "{}. [{}] {}", i + 1, p.title, p.text.trim());
    }
    let _ = write!(prompt, "\nQuestion: {}", question.trim());
    prompt
}

/// Retrieve context for `question`, ask `chat`, and record the exchange in `conversation`.
///
/// The conversation keeps the bare question and the reply; the retrieved
/// passages only travel with the current turn.
pub async fn answer(
    retriever: &Retriever,
    chat: Arc<dyn ChatProvider>,
    question: &str,
    conversation: &mut Conversation,
) -> Result<Answer> {
    if question.trim().is_empty() { return Err(Error::Operation("empty question".to_string())); }
    let passages = retriever.semantic_search(question, Some(retriever.settings().chat.context_passages)).await?;
    debug!("answering with {} passages", passages.len());

    let mut messages = conversation.messages().to_vec();
    messages.push(ChatMessage::user(build_prompt(question, &passages)));
    let model = chat.model_id().to_string();
    let reply = tokio::task::spawn_blocking(move || chat.chat(&messages))
        .await
        .map_err(|e| Error::Operation(format!("chat task failed: {e}")))??;
    let text = reply.trim().to_string();
    info!("{} answered in {} chars", model, text.len());

    conversation.push(ChatMessage::user(question.trim()));
    conversation.push(ChatMessage::assistant(text.clone()));
    Ok(Answer { text, passages })
}
