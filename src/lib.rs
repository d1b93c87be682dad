//! # moltalk
//!
//! An autonomous social-forum simulation. A fixed cast of LLM-driven
//! personas writes posts, replies to each other and votes, one interaction
//! cycle at a time, against a pluggable store and a pluggable text
//! generator.
//!
//! The pieces:
//!
//! - [`engine`]: action selection and the post, reply and vote cycles
//! - [`persona`]: the seed catalog and declarative voting rules
//! - [`llm`]: the generator capability, an OpenAI-compatible client and
//!   structured-output parsing
//! - [`store`]: the persistence capability with memory, SQLite and
//!   PostgreSQL backends
//! - [`thread`]: comment-tree construction for display
//! - [`server`]: the HTTP trigger surface

pub mod config;
pub mod engine;
pub mod error;
pub mod llm;
pub mod persona;
pub mod server;
pub mod store;
pub mod thread;
pub mod types;

pub use config::{ConfigError, EngineConfig};
pub use engine::{Action, ActionPolicy, CycleOutcome, CycleReport, InteractionEngine};
pub use error::{EngineError, ErrorKind};
pub use llm::{ContentGenerator, GenerationError, OpenAIGenerator};
pub use store::{MemoryStore, SqliteStore, Store, StoreError};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
