//! # Scriptd Dispatcher
//!
//! 注册表、CRON解析、定时调度器，以及把它们与存储和执行器组合起来的脚本引擎。

pub mod controller;
pub mod cron_utils;
pub mod registry;
pub mod scheduler;

pub use controller::{NewScript, ScriptEngine, ScriptUpdate};
pub use cron_utils::CronScheduler;
pub use registry::ScriptRegistry;
pub use scheduler::ScriptScheduler;
