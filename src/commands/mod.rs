//! Command Execution Module
//!
//! Bridges the text protocol and the storage engine: parsed commands go
//! in, wire-ready replies come out. Kept free of any socket handling so
//! the full command surface is testable without a network.

pub mod handler;

pub use handler::CommandHandler;
