pub mod common;
pub mod document;
pub mod mutable;
pub mod utils;
