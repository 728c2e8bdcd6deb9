//! Persistence use-case services.
//!
//! # Responsibility
//! - Orchestrate store calls into create/delete/existence operations.
//! - Keep callers decoupled from store consistency behavior.

pub mod consistency;
pub mod coordinator;
