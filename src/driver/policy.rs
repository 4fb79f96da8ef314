//! Retry and deadline policy for individual host calls.
use std::time::{Duration, Instant};

use tracing::warn;

use crate::host::HostError;

/// How a single host call is attempted.
///
/// Transient rejections ([`HostError::Busy`]) are retried with exponential
/// backoff. A call that runs past `call_timeout` is reported as
/// [`HostError::Timeout`] whatever its outcome; the driver then kills the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CallPolicy {
    /// Retries after the first attempt.
    pub retries: u32,
    /// Delay before the first retry; doubled for each further retry.
    pub backoff: Duration,
    /// Wall-clock limit for one attempt. `None` disables the check.
    pub call_timeout: Option<Duration>,
}

impl Default for CallPolicy {
    fn default() -> Self {
        Self {
            retries: 3,
            backoff: Duration::from_millis(50),
            call_timeout: Some(Duration::from_secs(30)),
        }
    }
}

impl CallPolicy {
    /// Policy that never retries and never times out.
    pub fn immediate() -> Self {
        Self {
            retries: 0,
            backoff: Duration::ZERO,
            call_timeout: None,
        }
    }

    /// Run `call` under this policy.
    ///
    /// # Arguments
    /// * `what` - Name of the host call, for logs
    /// * `call` - The host call; invoked once per attempt
    pub fn run<T>(
        &self,
        what: &str,
        mut call: impl FnMut() -> Result<T, HostError>,
    ) -> Result<T, HostError> {
        let mut delay = self.backoff;
        let mut attempt = 0u32;

        loop {
            let started = Instant::now();
            let result = call();

            if let Some(limit) = self.call_timeout {
                if started.elapsed() > limit {
                    return Err(HostError::Timeout(limit));
                }
            }

            match result {
                Err(err) if err.is_transient() && attempt < self.retries => {
                    attempt += 1;
                    warn!(call = what, attempt, ?delay, error = %err, "host busy, retrying");
                    std::thread::sleep(delay);
                    delay = delay.saturating_mul(2);
                },
                other => return other,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retries_transient_errors() {
        let policy = CallPolicy {
            retries: 2,
            backoff: Duration::ZERO,
            call_timeout: None,
        };
        let mut calls = 0;
        let result = policy.run("move_slide", || {
            calls += 1;
            if calls < 3 {
                Err(HostError::Busy("busy".into()))
            } else {
                Ok(calls)
            }
        });
        assert_eq!(result.unwrap(), 3);
    }

    #[test]
    fn test_gives_up_after_retries() {
        let policy = CallPolicy {
            retries: 1,
            backoff: Duration::ZERO,
            call_timeout: None,
        };
        let mut calls = 0;
        let result: Result<(), _> = policy.run("move_slide", || {
            calls += 1;
            Err(HostError::Busy("busy".into()))
        });
        assert!(matches!(result, Err(HostError::Busy(_))));
        assert_eq!(calls, 2);
    }

    #[test]
    fn test_permanent_errors_are_not_retried() {
        let mut calls = 0;
        let result: Result<(), _> = CallPolicy::default().run("save_as", || {
            calls += 1;
            Err(HostError::Rejected("locked".into()))
        });
        assert!(matches!(result, Err(HostError::Rejected(_))));
        assert_eq!(calls, 1);
    }

    #[test]
    fn test_slow_call_times_out() {
        let policy = CallPolicy {
            retries: 0,
            backoff: Duration::ZERO,
            call_timeout: Some(Duration::from_millis(5)),
        };
        let result = policy.run("open", || {
            std::thread::sleep(Duration::from_millis(30));
            Ok(())
        });
        assert!(matches!(result, Err(HostError::Timeout(_))));
    }
}
