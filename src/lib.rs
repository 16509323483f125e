//! Fieldset - a hierarchical settings engine for field-service applications.
//!
//! This library provides the core functionality for the `fst` CLI tool and
//! for embedding: a tree of typed configuration nodes with value inheritance,
//! a target-binding index, and a live subscription bus that keeps consumers
//! (dropdown option lists, scalar defaults, feature flags, the equipment
//! revision checklist) up to date as the tree changes.

pub mod bindings;
pub mod bus;
pub mod checklist;
pub mod cli;
pub mod commands;
pub mod models;
pub mod resolver;
pub mod store;
pub mod targets;


/// Library-level error type for fieldset operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Not initialized: run `fst system init` first")]
    NotInitialized,

    #[error("Node not found: {0}")]
    NotFound(String),

    #[error("Parent node not found: {0}")]
    ParentNotFound(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Unknown target: {0}")]
    UnknownTarget(String),

    #[error("{0}")]
    Other(String),
}

/// Result type alias for fieldset operations.
pub type Result<T> = std::result::Result<T, Error>;
