//! PostgreSQL persistence for the task graph, chat history, action
//! log, scheduling/recovery state, and subagent tracking rows. The
//! in-memory types in `taskforge-core` are the source of truth during
//! a turn; this crate only loads and saves their snapshots.

pub mod config;
pub mod models;
pub mod pool;
pub mod queries;
