//! Entity collaborator contracts and bundled entity kinds.
//!
//! # Responsibility
//! - Define what an attribute set must offer to be persisted.
//! - Define the per-kind key-only lookup hook injected into the coordinator.
//!
//! # Invariants
//! - Existence is decided solely by the key-only query of a kind.

pub mod account;
pub mod attributes;
