//! # Restart policy for subsystem start.
//!
//! The manifest carries `restart_policy`, `restart_delay_ms`, and
//! `max_retries` per subsystem; the manager acts on them when a `start`
//! fails during the start fan-out. Full process supervision (restarting a
//! crashed host) stays outside the composition core.

use std::time::Duration;

use tracing::warn;

use crate::manifest::SubsystemInfo;

/// When a failed start may be retried.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RestartPolicy {
    /// Never retry.
    #[default]
    Never,
    /// Retry while start keeps failing.
    OnFailure,
    /// Retry regardless of the failure reason.
    Always,
}

impl RestartPolicy {
    /// Parses a manifest policy name; unknown names fall back to `Never`.
    pub fn parse(name: &str) -> Self {
        match name {
            "" | "never" => RestartPolicy::Never,
            "on_failure" => RestartPolicy::OnFailure,
            "always" => RestartPolicy::Always,
            other => {
                warn!(policy = other, "unknown restart policy, treating as never");
                RestartPolicy::Never
            }
        }
    }

    pub fn allows_retry(self) -> bool {
        matches!(self, RestartPolicy::OnFailure | RestartPolicy::Always)
    }
}

/// Per-subsystem retry parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RestartSpec {
    pub policy: RestartPolicy,
    pub delay: Duration,
    pub max_retries: u32,
}

impl RestartSpec {
    pub fn none() -> Self {
        Self {
            policy: RestartPolicy::Never,
            delay: Duration::ZERO,
            max_retries: 0,
        }
    }

    pub fn from_manifest(info: &SubsystemInfo) -> Self {
        Self {
            policy: RestartPolicy::parse(&info.restart_policy),
            delay: Duration::from_millis(info.restart_delay_ms),
            max_retries: info.max_retries,
        }
    }
}

impl Default for RestartSpec {
    fn default() -> Self {
        Self::none()
    }
}
