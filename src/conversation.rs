//! Conversational retrieval over one game's rulebook.
//!
//! A [`Conversation`] answers each question in two model calls:
//!
//! 1. With prior turns present, the follow-up is rewritten into a
//!    standalone question so retrieval does not depend on pronouns like
//!    "it" or "that card".
//! 2. The top-k rulebook chunks for that question are placed in the system
//!    prompt and the model answers the user's original question.
//!
//! The history only grows when both calls succeed.

use std::sync::Arc;

use crate::error::{QaError, Result};
use crate::llm::{ChatMessage, ChatModel};
use crate::models::{Exchange, Message, Role};
use crate::vectorstore::GameStore;

const CONDENSE_PROMPT: &str = "Given the following conversation and a follow up question, \
rephrase the follow up question to be a standalone question, in its original language.";

const ANSWER_PROMPT: &str = "Use the following pieces of context to answer the user's question. \
If you don't know the answer, just say that you don't know, don't try to make up an answer.";

pub struct Conversation {
    store: GameStore,
    chat: Arc<dyn ChatModel>,
    k: usize,
    history: Vec<Message>,
}

impl Conversation {
    pub fn new(store: GameStore, chat: Arc<dyn ChatModel>, k: usize) -> Self {
        Self {
            store,
            chat,
            k,
            history: Vec::new(),
        }
    }

    pub fn history(&self) -> &[Message] {
        &self.history
    }

    /// Answers `question` and returns the full updated history.
    pub async fn ask(&mut self, question: &str) -> Result<&[Message]> {
        let question = question.trim();
        if question.is_empty() {
            return Err(QaError::Precondition("question must not be empty".into()));
        }

        let standalone = if self.history.is_empty() {
            question.to_string()
        } else {
            self.condense(question).await?
        };

        let context = self
            .store
            .retrieve(&standalone, self.k)
            .await?
            .into_iter()
            .map(|hit| hit.text)
            .collect::<Vec<_>>()
            .join("\n\n");

        let messages = [
            ChatMessage::system(format!("{}\n----------------\n{}", ANSWER_PROMPT, context)),
            ChatMessage::user(question),
        ];
        let answer = self.chat.complete(&messages).await?;

        tracing::debug!(namespace = %self.store.namespace(), %standalone, "answered question");

        self.history.push(Message::human(question));
        self.history.push(Message::ai(answer));
        Ok(&self.history)
    }

    async fn condense(&self, question: &str) -> Result<String> {
        let transcript = self
            .history
            .iter()
            .map(|m| match m.role {
                Role::Human => format!("Human: {}", m.content),
                Role::Ai => format!("Assistant: {}", m.content),
            })
            .collect::<Vec<_>>()
            .join("\n");

        let prompt = format!(
            "{}\n\nChat History:\n{}\nFollow Up Input: {}\nStandalone question:",
            CONDENSE_PROMPT, transcript, question
        );
        self.chat.complete(&[ChatMessage::user(prompt)]).await
    }
}

/// Pairs each question with the answer that followed it, newest first.
pub fn reverse_pairs(history: &[Message]) -> Vec<Exchange> {
    let mut pairs: Vec<Exchange> = history
        .windows(2)
        .filter(|w| w[0].role == Role::Human && w[1].role == Role::Ai)
        .map(|w| Exchange {
            question: w[0].content.clone(),
            answer: w[1].content.clone(),
        })
        .collect();
    pairs.reverse();
    pairs
}
