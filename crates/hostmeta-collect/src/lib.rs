//! hostmeta-collect: metadata collection for the local host
//!
//! Runs probe commands through a [`CommandRunner`] and assembles their output
//! into a [`hostmeta_core::HostSnapshot`].

pub mod category;
pub mod collector;
pub mod error;
pub mod parse;
pub mod runner;

pub use category::Category;
pub use collector::Collector;
pub use error::CollectError;
pub use runner::{CommandOutput, CommandRunner, LocalRunner};
