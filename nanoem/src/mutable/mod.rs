pub mod common;
pub mod document;
