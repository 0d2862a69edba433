//! Core launch logic: types, parsing, registry, resolution, composition, execution.

pub mod composer;
pub mod context;
pub mod error;
pub mod executor;
pub mod parser;
pub mod plan;
pub mod registry;
pub mod resolver;
pub mod types;
