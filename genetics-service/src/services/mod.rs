pub mod chat;
pub mod database;
pub mod metrics;
pub mod providers;
pub mod sessions;

pub use chat::{ChatError, ChatProxy};
pub use database::GeneticsDb;
pub use sessions::{InMemorySessionStore, SessionStore};
