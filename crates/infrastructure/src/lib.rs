//! 脚本运行时的基础设施实现

pub mod storage;

pub use storage::FileScriptStore;
