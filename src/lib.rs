//! # Chat Recall
//!
//! Retrieval-augmented question answering over chat history.
//!
//! Messages pulled from a chat workspace are validated, embedded, and kept
//! in an in-memory vector index. A question retrieves the nearest messages
//! and a text-generation model composes an answer grounded in them.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐   ┌─────────────┐   ┌──────────────┐
//! │ ChatSource  │──▶│   ingest    │──▶│ IndexManager │
//! │ Slack/Export│   │ validate+map│   │ VectorIndex  │
//! └─────────────┘   └─────────────┘   └──────┬───────┘
//!                                            │ query(k)
//!                                     ┌──────▼───────┐   ┌───────────┐
//!                                     │ AnswerEngine │──▶│ Generator │
//!                                     └──────┬───────┘   └───────────┘
//!                          ┌─────────────────┼───────────────┐
//!                          ▼                 ▼               ▼
//!                     ┌─────────┐      ┌──────────┐     ┌─────────┐
//!                     │   CLI   │      │   HTTP   │     │   MCP   │
//!                     │(recall) │      │  (axum)  │     │ (stdio) │
//!                     └─────────┘      └──────────┘     └─────────┘
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Core data types |
//! | [`error`] | Core error kinds |
//! | [`embedding`] | Embedding provider abstraction |
//! | [`index`] | Vector index lifecycle |
//! | [`ingest`] | Message ingestion pipeline |
//! | [`generation`] | Text generation providers |
//! | [`answer`] | Retrieval-augmented answering |
//! | [`sources`] | Chat source trait and factory |
//! | [`connector_slack`] | Slack Web API source |
//! | [`connector_export`] | Exported channel files source |
//! | [`harness`] | Wiring shared by all entry points |
//! | [`traits`] | Tool trait and registry |
//! | [`server`] | HTTP tool server |
//! | [`mcp`] | MCP stdio bridge |
//! | [`logging`] | Tracing subscriber setup |

pub mod answer;
pub mod config;
pub mod connector_export;
pub mod connector_slack;
pub mod embedding;
pub mod error;
pub mod generation;
pub mod harness;
pub(crate) mod http;
pub mod index;
pub mod ingest;
pub mod logging;
pub mod mcp;
pub mod models;
pub mod server;
pub mod sources;
pub mod traits;
