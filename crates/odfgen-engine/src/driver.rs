//! Task driver.
//!
//! Pipelines are written as straight-line async code. Nested awaits are
//! flattened by the compiler, so driving a job means handing its future to a
//! single-threaded runtime: only one job runs at a time and control passes
//! between jobs at explicit yield points.

use odfgen_core::{Error, Result};
use std::future::Future;
use std::time::Duration;
use tokio::runtime::{Builder, Runtime};

/// Drives async computations to completion on a current-thread runtime.
pub struct TaskDriver {
    runtime: Runtime,
}

impl TaskDriver {
    pub fn new() -> Result<Self> {
        let runtime = Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| Error::Internal(format!("failed to build runtime: {}", e)))?;
        Ok(Self { runtime })
    }

    /// Run `computation` and everything it spawns until it returns.
    ///
    /// Errors surface through the computation's own output, so stages can
    /// catch them locally with `match` or let `?` carry them to the caller.
    pub fn drive<F: Future>(&self, computation: F) -> F::Output {
        self.runtime.block_on(computation)
    }
}

/// Cooperative yield point: lets sibling tasks run before resuming.
pub async fn cooperate() {
    tokio::task::yield_now().await;
}

/// Yield for at least `delay`; a zero delay is a plain yield.
pub async fn pause(delay: Duration) {
    if delay.is_zero() {
        cooperate().await;
    } else {
        tokio::time::sleep(delay).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    async fn leaf(value: u32) -> u32 {
        cooperate().await;
        value
    }

    async fn middle(value: u32) -> u32 {
        leaf(value).await + 1
    }

    async fn failing_leaf() -> Result<u32> {
        cooperate().await;
        Err(Error::Render("bad template".to_string()))
    }

    async fn outer_propagating() -> Result<u32> {
        let value = failing_leaf().await?;
        Ok(value + 1)
    }

    #[test]
    fn test_nested_computations_resume_with_plain_value() {
        let driver = TaskDriver::new().unwrap();
        let result = driver.drive(async { middle(41).await });
        assert_eq!(result, 42);
    }

    #[test]
    fn test_failure_is_observable_at_suspension_point() {
        let driver = TaskDriver::new().unwrap();
        let handled = driver.drive(async {
            match failing_leaf().await {
                Ok(_) => "unexpected".to_string(),
                Err(e) => format!("caught: {}", e),
            }
        });
        assert_eq!(handled, "caught: render error: bad template");
    }

    #[test]
    fn test_unhandled_failure_reaches_caller() {
        let driver = TaskDriver::new().unwrap();
        let err = driver.drive(outer_propagating()).unwrap_err();
        assert!(matches!(err, Error::Render(_)));
    }

    #[test]
    fn test_tasks_interleave_at_yield_points() {
        let driver = TaskDriver::new().unwrap();
        let log = Arc::new(Mutex::new(Vec::new()));

        driver.drive({
            let log = log.clone();
            async move {
                let mut handles = Vec::new();
                for name in ["a", "b"] {
                    let log = log.clone();
                    handles.push(tokio::spawn(async move {
                        log.lock().unwrap().push(format!("{}1", name));
                        cooperate().await;
                        log.lock().unwrap().push(format!("{}2", name));
                    }));
                }
                for handle in handles {
                    handle.await.unwrap();
                }
            }
        });

        let log = log.lock().unwrap();
        assert_eq!(log.len(), 4);
        let first_phase: Vec<_> = log[..2].iter().map(|s| s.ends_with('1')).collect();
        assert_eq!(first_phase, vec![true, true]);
    }

    #[test]
    fn test_pause_with_zero_delay() {
        let driver = TaskDriver::new().unwrap();
        driver.drive(pause(Duration::ZERO));
        driver.drive(pause(Duration::from_millis(1)));
    }
}
