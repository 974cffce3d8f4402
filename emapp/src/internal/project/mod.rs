pub mod redo;
