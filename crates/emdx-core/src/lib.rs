//! Core domain types for the emdx knowledge base.
//!
//! This crate holds the plain data model shared by the storage, search,
//! executor, and CLI crates: documents, tags, tasks, epics, executions,
//! filters, and the id/slug generators. It has no I/O of its own.

pub mod document;
pub mod enums;
pub mod epic;
pub mod execution;
pub mod filter;
pub mod idgen;
pub mod link;
pub mod source;
pub mod tag;
pub mod task;
pub mod validation;
