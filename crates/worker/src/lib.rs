//! # Scriptd Worker
//!
//! 脚本执行器：进程启动、stdin 信号协议、输出采集与超时控制。

pub mod executors;
pub mod launcher;
pub mod signal;

pub use executors::{ProcessExecutor, ProcessHandle};
pub use launcher::ProcessLauncher;
pub use signal::{InvocationState, MarkerScanner, SIGNAL_MARKER};
