//! # Rulebook QA
//!
//! Ask questions about board-game rules in natural language.
//!
//! Users upload a game's rulebook as a PDF named `<ID>_<type>.pdf`. The
//! catalog ID identifies the game on BoardGameGeek; the text is chunked,
//! embedded and stored in a per-game namespace of a shared vector index.
//! Questions are answered by a chat model grounded on the most similar
//! chunks, with the conversation kept per browser session.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐   ┌────────────────┐   ┌──────────────┐
//! │  Upload  │──▶│ Extract+Chunk  │──▶│ Vector index │
//! │  (PDF)   │   │ Embed (OpenAI) │   │ ns per game  │
//! └──────────┘   └────────────────┘   └──────┬───────┘
//!                                            │ top-k
//!                 ┌──────────┐        ┌──────▼───────┐
//!                 │ Browser  │◀──────▶│ Conversation │
//!                 │ session  │        │ (chat model) │
//!                 └──────────┘        └──────────────┘
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`error`] | Domain error type |
//! | [`models`] | Core data types |
//! | [`extract`] | PDF text extraction |
//! | [`catalog`] | Game identification from the file name |
//! | [`chunk`] | Text chunking |
//! | [`embedding`] | Embedding provider abstraction |
//! | [`llm`] | Chat model provider and key check |
//! | [`index`] | Vector index backends (Pinecone, in-memory) |
//! | [`vectorstore`] | Per-game store: build and fetch |
//! | [`games`] | Game list derived from namespaces |
//! | [`conversation`] | Retrieval-grounded chat with memory |
//! | [`session`] | Per-visitor state and action handlers |
//! | [`server`] | HTTP server |
//! | [`ui`] | The HTML page |

pub mod catalog;
pub mod chunk;
pub mod config;
pub mod conversation;
pub mod embedding;
pub mod error;
pub mod extract;
pub mod games;
pub mod index;
pub mod llm;
pub mod models;
pub mod server;
pub mod session;
pub mod ui;
pub mod vectorstore;
