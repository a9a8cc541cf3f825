//! GoTrue-compatible identity backend (Supabase Auth plus a PostgREST admin
//! table).

pub mod api;
pub mod client;
pub mod error;
pub mod pkce;
pub mod storage;
pub mod types;

pub use api::Transport;
pub use client::GoTrueStore;
pub use error::GoTrueError;
pub use storage::{FileStorage, MemoryStorage, SessionStorage, StorageKeys};
