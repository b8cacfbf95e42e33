//! Command Handlers
//!
//! Thin HTTP-facing wrappers over the domain services. Each handler owns
//! the service(s) it needs and performs request-level authorization before
//! delegating — mirrors the teacher's one-handler-per-use-case layout.

pub mod anonymous_user_handler;
pub mod commands;
pub mod merge_handler;
pub mod rebuild_handler;
pub mod sync_handler;

pub use anonymous_user_handler::AnonymousUserHandler;
pub use commands::{AckCursor, MergeCommand, SyncCommand, SyncResult};
pub use merge_handler::MergeHandler;
pub use rebuild_handler::RebuildHandler;
pub use sync_handler::SyncHandler;
