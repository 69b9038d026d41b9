pub mod filesystem;

pub use filesystem::{FileScriptStore, DESCRIPTOR_FILE};
