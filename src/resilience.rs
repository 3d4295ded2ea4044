//! Retry-and-fallback wrapper around `saveState`/`loadState`.
//!
//! Wraps an operation so transient failures are retried, and (for
//! `loadState` specifically) a still-failing load can fall back to a cold
//! start instead of surfacing the error, at the caller's discretion.

use anyhow::Result;
use log::warn;

/// `{maxRetries, fallbackOnLoadFailure}` from the spec's resilience wrapper.
#[derive(Debug, Clone, Copy)]
pub struct ResilienceConfig {
    pub max_retries: u32,
    pub fallback_on_load_failure: bool,
}

impl Default for ResilienceConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            fallback_on_load_failure: false,
        }
    }
}

/// Result of a `loadState` call: whether the pipeline actually applied the
/// snapshot, or fell back to a cleared, cold-start state after the snapshot
/// itself could not be applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadOutcome {
    pub cold_start: bool,
}

/// Retries `op` up to `max_retries` additional times after the first
/// failure, logging each retry at `warn` level. Succeeds as soon as `op`
/// returns `Ok`; returns the last error if every attempt fails.
pub(crate) fn retry<T>(max_retries: u32, mut op: impl FnMut() -> Result<T>) -> Result<T> {
    let mut attempt = 0u32;
    loop {
        match op() {
            Ok(value) => return Ok(value),
            Err(err) => {
                if attempt >= max_retries {
                    return Err(err);
                }
                attempt += 1;
                warn!("operation failed, retrying ({attempt}/{max_retries}): {err}");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn retry_succeeds_after_transient_failures() {
        let calls = Cell::new(0);
        let result = retry(3, || {
            let n = calls.get() + 1;
            calls.set(n);
            if n < 3 {
                anyhow::bail!("not yet");
            }
            Ok(n)
        });
        assert_eq!(result.unwrap(), 3);
    }

    #[test]
    fn retry_surfaces_error_once_budget_is_exhausted() {
        let calls = Cell::new(0);
        let result: Result<()> = retry(2, || {
            calls.set(calls.get() + 1);
            anyhow::bail!("always fails")
        });
        assert!(result.is_err());
        assert_eq!(calls.get(), 3);
    }
}
