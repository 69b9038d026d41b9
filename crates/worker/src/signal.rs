//! stdin 信号协议
//!
//! 子进程在 stdout 中输出 `message:` 表示请求输入，执行器随即把调用方的消息
//! （没有消息时为空行）写入子进程 stdin。每次调用最多握手一次。

/// 请求输入的标记
pub const SIGNAL_MARKER: &[u8] = b"message:";

/// 单次调用的状态机
///
/// ```text
/// Spawned ──stdout──▶ AwaitingSignal ──marker──▶ SignalSent
///    │                     │                         │
///    └──────timeout────────┴─────────timeout─────────┴──▶ TimedOut
/// 任意非终止状态 ──exit──▶ Exited
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvocationState {
    Spawned,
    AwaitingSignal,
    SignalSent,
    Exited,
    TimedOut,
}

impl InvocationState {
    /// 收到一段 stdout
    pub fn on_stdout(self) -> Self {
        match self {
            InvocationState::Spawned => InvocationState::AwaitingSignal,
            other => other,
        }
    }

    /// 检测到标记，返回新状态以及是否需要写 stdin
    pub fn on_marker(self) -> (Self, bool) {
        match self {
            InvocationState::AwaitingSignal => (InvocationState::SignalSent, true),
            other => (other, false),
        }
    }

    pub fn on_exit(self) -> Self {
        match self {
            InvocationState::TimedOut => InvocationState::TimedOut,
            _ => InvocationState::Exited,
        }
    }

    pub fn on_timeout(self) -> Self {
        match self {
            InvocationState::Exited => InvocationState::Exited,
            _ => InvocationState::TimedOut,
        }
    }
}

/// 在 stdout 字节流中查找标记
///
/// 保留上一段数据的末尾几个字节，标记被拆到两段读取中时同样能识别。
#[derive(Debug, Default)]
pub struct MarkerScanner {
    tail: Vec<u8>,
}

impl MarkerScanner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn observe(&mut self, chunk: &[u8]) -> bool {
        let mut window = std::mem::take(&mut self.tail);
        window.extend_from_slice(chunk);

        let found = window
            .windows(SIGNAL_MARKER.len())
            .any(|w| w == SIGNAL_MARKER);

        let keep = SIGNAL_MARKER.len() - 1;
        let start = window.len().saturating_sub(keep);
        self.tail = window.split_off(start);
        found
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_transitions() {
        let state = InvocationState::Spawned;
        assert_eq!(state.on_marker(), (InvocationState::Spawned, false));

        let state = state.on_stdout();
        assert_eq!(state, InvocationState::AwaitingSignal);

        let (state, write) = state.on_marker();
        assert!(write);
        assert_eq!(state, InvocationState::SignalSent);

        let (state, write) = state.on_marker();
        assert!(!write);
        assert_eq!(state, InvocationState::SignalSent);

        assert_eq!(state.on_stdout(), InvocationState::SignalSent);
        assert_eq!(state.on_exit(), InvocationState::Exited);
        assert_eq!(state.on_timeout(), InvocationState::TimedOut);
    }

    #[test]
    fn test_terminal_states_are_sticky() {
        let timed_out = InvocationState::AwaitingSignal.on_timeout();
        assert_eq!(timed_out.on_exit(), InvocationState::TimedOut);
        assert_eq!(timed_out, InvocationState::TimedOut);

        let exited = InvocationState::SignalSent.on_exit();
        assert_eq!(exited.on_timeout(), InvocationState::Exited);
        assert_eq!(exited.on_marker(), (InvocationState::Exited, false));
    }

    #[test]
    fn test_scanner_single_chunk() {
        let mut scanner = MarkerScanner::new();
        assert!(!scanner.observe(b"hello\n"));
        assert!(scanner.observe(b"please send message: now"));
    }

    #[test]
    fn test_scanner_split_marker() {
        let mut scanner = MarkerScanner::new();
        assert!(!scanner.observe(b"mess"));
        assert!(scanner.observe(b"age:"));

        let mut scanner = MarkerScanner::new();
        assert!(!scanner.observe(b"m"));
        assert!(!scanner.observe(b"essa"));
        assert!(scanner.observe(b"ge:\n"));
    }

    #[test]
    fn test_scanner_no_false_positive() {
        let mut scanner = MarkerScanner::new();
        assert!(!scanner.observe(b"message"));
        assert!(!scanner.observe(b" :"));
        assert!(!scanner.observe(b"messages are fine"));
    }
}
