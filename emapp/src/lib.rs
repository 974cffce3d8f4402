pub mod command;
pub mod error;
pub mod internal;
pub mod progress;
