//! Application layer containing the transfer orchestration logic.
//!
//! `TransferOrchestrator` is the entry point for instant transfers; the key
//! directory, limit guard and funding resolver are the steps it drives.
//! Scheduled transfers, receipts and the assistant read-path sit beside it
//! and share the same storage handle.

pub mod assistant;
pub mod funding;
pub mod key_directory;
pub mod limit_guard;
pub mod orchestrator;
pub mod receipts;
pub mod scheduler;
pub mod settlement;
