//! Answer generator port and prompt templating.

pub mod client;
pub mod prompt;
