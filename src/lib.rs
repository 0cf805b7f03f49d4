//! AI mechanic copilot - turns a symptom description, a photo or an engine
//! recording into a structured repair report
//!
//! Requests go to Gemini with a schema-constrained reply when an API key is
//! configured, and to an NVIDIA-hosted chat-completions model otherwise. The
//! fallback reaches its endpoint through a same-origin proxy on web builds and
//! directly on native builds.

pub mod advisor;
pub mod ai;
pub mod config;
pub mod error;
pub mod models;
pub mod prompts;
pub mod proxy;
pub mod schema;
pub mod session;
pub mod video;
pub mod vin;

pub use error::{Error, Result};
