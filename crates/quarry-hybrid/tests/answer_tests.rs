use std::sync::Arc;

use parking_lot::Mutex;
use quarry_core::chunk_store::ChunkStore;
use quarry_core::config::Settings;
use quarry_core::types::{Score, SourceKind};
use quarry_core::{Error, Result};
use quarry_embed::HashEmbedder;
use quarry_hybrid::{answer, build_prompt, is_exit_command, ChatMessage, ChatProvider, Conversation, Retriever, Role};

/// Replies with a fixed text and records every request.
struct ScriptedChat {
    reply: Result<String>,
    seen: Mutex<Vec<Vec<ChatMessage>>>,
}

impl ScriptedChat {
    fn replying(text: &str) -> Arc<Self> { Arc::new(Self { reply: Ok(text.to_string()), seen: Mutex::new(Vec::new()) }) }
    fn failing() -> Arc<Self> {
        Arc::new(Self { reply: Err(Error::Generation("model not loaded".to_string())), seen: Mutex::new(Vec::new()) })
    }
}

impl ChatProvider for ScriptedChat {
    fn model_id(&self) -> &str { "scripted" }
    fn chat(&self, messages: &[ChatMessage]) -> Result<String> {
        self.seen.lock().push(messages.to_vec());
        match &self.reply {
            Ok(text) => Ok(text.clone()),
            Err(e) => Err(Error::Generation(e.to_string())),
        }
    }
}

async fn retriever() -> Retriever {
    let mut store = ChunkStore::new();
    store.push_document("holmes", ["Holmes lived at 221B Baker Street.", "Watson was an army doctor.", "Moriarty was a professor."]);
    let mut settings = Settings::default();
    settings.chat.context_passages = 2;
    let retriever = Retriever::new(Arc::new(HashEmbedder::new(64)), settings);
    retriever.build_indexes(&store).await.expect("build");
    retriever
}

#[test]
fn exit_commands_are_case_insensitive() {
    for input in ["bye", "Quit", " EXIT \n"] { assert!(is_exit_command(input), "{input:?}"); }
    for input in ["", "byebye", "exit now"] { assert!(!is_exit_command(input), "{input:?}"); }
}

#[test]
fn prompt_numbers_the_passages() {
    let passages = vec![
        Score { id: 4, rank: 0.9, title: "a".into(), text: "first passage ".into(), source: SourceKind::Semantic },
        Score { id: 2, rank: 0.5, title: "b".into(), text: "second passage".into(), source: SourceKind::Semantic },
    ];
    let prompt = build_prompt(" Who? ", &passages);
    assert!(prompt.contains("1. [a] first passage\n"));
    assert!(prompt.contains("2. [b] second passage\n"));
    assert!(prompt.ends_with("Question: Who?"));
}

#[tokio::test]
async fn answer_records_the_exchange() -> Result<()> {
    let retriever = retriever().await;
    let chat = ScriptedChat::replying("  He lived on Baker Street.  ");
    let mut conversation = Conversation::new();

    let first = answer(&retriever, chat.clone(), "Where did Holmes live?", &mut conversation).await?;
    assert_eq!(first.text, "He lived on Baker Street.");
    assert_eq!(first.passages.len(), 2);
    assert_eq!(conversation.len(), 2);
    assert_eq!(conversation.messages()[0], ChatMessage::user("Where did Holmes live?"));
    assert_eq!(conversation.messages()[1].role, Role::Assistant);

    answer(&retriever, chat.clone(), "And Watson?", &mut conversation).await?;
    assert_eq!(conversation.len(), 4);

    let seen = chat.seen.lock();
    assert_eq!(seen.len(), 2);
    assert_eq!(seen[0].len(), 1);
    // second request carries the first exchange plus the new prompt
    assert_eq!(seen[1].len(), 3);
    assert!(seen[1][2].content.contains("Question: And Watson?"));
    assert!(seen[1][2].content.contains("1. [holmes]"));
    Ok(())
}

#[tokio::test]
async fn failed_generation_leaves_history_untouched() {
    let retriever = retriever().await;
    let mut conversation = Conversation::new();
    let res = answer(&retriever, ScriptedChat::failing(), "Who was Moriarty?", &mut conversation).await;
    assert!(matches!(res, Err(Error::Generation(_))));
    assert!(conversation.is_empty());
}

#[tokio::test]
async fn empty_question_is_rejected() {
    let retriever = retriever().await;
    let mut conversation = Conversation::new();
    let res = answer(&retriever, ScriptedChat::replying("x"), "  ", &mut conversation).await;
    assert!(matches!(res, Err(Error::Operation(_))));
}
