//! Elite Voices Library
//!
//! Watches the Elite Dangerous player journal and speaks NPC dialogue.

pub mod audio;
pub mod cache;
pub mod config;
pub mod dedup;
pub mod error;
pub mod history;
pub mod journal;
pub mod ledger;
pub mod logging;
pub mod pipeline;
pub mod tts;
pub mod watcher;
