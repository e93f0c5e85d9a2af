//! Core types for the Replica cloning engine.
//!
//! This is the leaf crate with zero internal dependencies. It defines
//! the self-describing type system every cloned value refers to:
//! [`Type`] handles into the process-wide type table, structural
//! [`TypeKind`]s, struct member descriptors with their
//! [`CloneDirective`]s, and the error types shared by the workspace.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod error;
pub mod kind;
mod table;
pub mod types;

pub use error::{TypeError, ValueError};
pub use kind::Kind;
pub use types::{CloneDirective, FieldDesc, Type, TypeKind};
