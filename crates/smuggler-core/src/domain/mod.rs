//! Domain models for smuggler.
//!
//! Canonical definitions for the per-invocation entities:
//! - `Action`: which lifecycle hook is running
//! - `CommandDefinition` / `CommandTable`: what to execute for it
//! - `ResourceRequest`: the parsed controller request
//! - `Version` / `MetadataPair`: units exchanged with the controller
//! - `ResourceResponse`: the structured result

pub mod action;
pub mod command;
pub mod error;
pub mod request;
pub mod response;
pub mod version;

// Re-export main types and errors
pub use action::Action;
pub use command::{CommandDefinition, CommandTable};
pub use error::{Result, SmugglerError};
pub use request::ResourceRequest;
pub use response::{InOutResponse, ResourceResponse};
pub use version::{MetadataPair, Version};
