//! navlaunch: declarative bringup for a robot navigation stack.
//!
//! Launch arguments, templated parameter documents, and conditionally
//! composed sub-plans, built into one immutable plan and evaluated in
//! append order against an external launch runtime.

pub mod bringup;
pub mod cli;
pub mod core;
pub mod logging;
pub mod provenance;
pub mod runtime;
