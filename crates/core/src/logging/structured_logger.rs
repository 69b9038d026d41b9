//! Structured logging utilities
//!
//! Event helpers for the script lifecycle and invocation outcomes. Every event
//! carries an `event` field so log pipelines can filter on it.

use chrono::{DateTime, Utc};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::errors::ScriptError;
use crate::models::{ExecutionOutcome, ExitState, ScriptDescriptor};

/// Structured logging utilities
pub struct StructuredLogger;

impl StructuredLogger {
    /// Log script registration
    pub fn log_script_registered(descriptor: &ScriptDescriptor) {
        info!(
            event = "script_registered",
            script.id = %descriptor.id,
            script.name = %descriptor.name,
            script.runtime = %descriptor.runtime_kind,
            script.webhook = descriptor.webhook_enabled,
            script.cron = ?descriptor.active_schedule(),
            "Script registered"
        );
    }

    /// Log script metadata or source update
    pub fn log_script_updated(descriptor: &ScriptDescriptor) {
        info!(
            event = "script_updated",
            script.id = %descriptor.id,
            script.updated = descriptor.updated,
            "Script updated"
        );
    }

    /// Log script deletion
    pub fn log_script_deleted(script_id: &str) {
        info!(event = "script_deleted", script.id = script_id, "Script deleted");
    }

    /// Log a script skipped during startup reload
    pub fn log_script_skipped(script_id: &str, reason: &ScriptError) {
        warn!(
            event = "script_skipped",
            script.id = script_id,
            error = %reason,
            "Script skipped during reload"
        );
    }

    /// Log child process start
    pub fn log_invocation_started(
        script_id: &str,
        invocation_id: Uuid,
        pid: Option<u32>,
        args: &[String],
    ) {
        info!(
            event = "invocation_started",
            script.id = script_id,
            invocation.id = %invocation_id,
            process.pid = ?pid,
            invocation.args = ?args,
            "Invocation started"
        );
    }

    /// Log terminal outcome of an invocation
    pub fn log_invocation_completed(outcome: &ExecutionOutcome) {
        match outcome.status {
            ExitState::Exited { code } => info!(
                event = "invocation_completed",
                script.id = %outcome.script_id,
                invocation.id = %outcome.invocation_id,
                exit_code = code,
                duration_ms = outcome.duration_ms,
                stdout_bytes = outcome.stdout.len(),
                stderr_bytes = outcome.stderr.len(),
                "Invocation completed"
            ),
            ExitState::Killed => warn!(
                event = "invocation_killed",
                script.id = %outcome.script_id,
                invocation.id = %outcome.invocation_id,
                duration_ms = outcome.duration_ms,
                "Invocation terminated by signal"
            ),
            ExitState::TimedOut => warn!(
                event = "invocation_timed_out",
                script.id = %outcome.script_id,
                invocation.id = %outcome.invocation_id,
                duration_ms = outcome.duration_ms,
                "Invocation exceeded its timeout and was terminated"
            ),
        }
    }

    /// Log invocation failure before a process handle existed
    pub fn log_invocation_failed(script_id: &str, error: &ScriptError) {
        error!(
            event = "invocation_failed",
            script.id = script_id,
            error = %error,
            "Invocation failed"
        );
    }

    /// Log stdin signal handshake
    pub fn log_signal_sent(script_id: &str, invocation_id: Uuid, payload_bytes: usize) {
        debug!(
            event = "signal_sent",
            script.id = script_id,
            invocation.id = %invocation_id,
            payload_bytes = payload_bytes,
            "Message written to child stdin"
        );
    }

    /// Log cron fire
    pub fn log_cron_fired(script_id: &str, fired_at: DateTime<Utc>) {
        info!(
            event = "cron_fired",
            script.id = script_id,
            cron.fired_at = %fired_at,
            "Cron schedule fired"
        );
    }
}
