//! Worker loops with circuit breaking and cooperative shutdown

use crate::processor::{GenerationProcessor, ProcessOutcome};
use crate::sweeper::Sweeper;
use chrono::Utc;
use contentforge_common::metrics;
use rand::Rng;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{error, info, warn};

/// Consecutive failures before the claim loop pauses
pub const MAX_FAILURES: u32 = 5;

pub const CIRCUIT_BREAK_DURATION: Duration = Duration::from_secs(30);

/// Consecutive-failure counter shared by the loops
#[derive(Debug, Default)]
pub struct CircuitBreaker {
    consecutive_failures: u32,
}

impl CircuitBreaker {
    pub fn record_success(&mut self) {
        self.consecutive_failures = 0;
    }

    pub fn record_failure(&mut self) {
        self.consecutive_failures += 1;
    }

    pub fn is_open(&self) -> bool {
        self.consecutive_failures >= MAX_FAILURES
    }

    pub fn failures(&self) -> u32 {
        self.consecutive_failures
    }

    pub fn reset(&mut self) {
        self.consecutive_failures = 0;
    }
}

/// Poll interval plus up to 25% random jitter so idle workers spread out
pub fn jittered(interval: Duration) -> Duration {
    let max_jitter = (interval.as_millis() / 4) as u64;
    if max_jitter == 0 {
        return interval;
    }
    interval + Duration::from_millis(rand::thread_rng().gen_range(0..=max_jitter))
}

/// Sleep unless shutdown is signalled first. Returns `false` on shutdown.
async fn pause(duration: Duration, shutdown: &mut watch::Receiver<bool>) -> bool {
    tokio::select! {
        _ = tokio::time::sleep(duration) => true,
        _ = shutdown.changed() => false,
    }
}

/// Claim and process items until shutdown. An in-flight item always
/// finishes before the loop exits.
pub async fn claim_loop(
    worker_id: usize,
    processor: GenerationProcessor,
    poll_interval: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut breaker = CircuitBreaker::default();
    info!(worker_id, "Claim loop started");

    while !*shutdown.borrow() {
        if breaker.is_open() {
            warn!(worker_id, failures = breaker.failures(), "Circuit breaker open, pausing...");
            if !pause(CIRCUIT_BREAK_DURATION, &mut shutdown).await {
                break;
            }
            breaker.reset();
            info!(worker_id, "Circuit breaker reset, resuming...");
        }

        match processor.process_next().await {
            Ok(Some(outcome)) => {
                metrics::record_worker_outcome(outcome_label(&outcome));
                match outcome {
                    ProcessOutcome::Failed { .. } => breaker.record_failure(),
                    _ => breaker.record_success(),
                }
            }
            Ok(None) => {
                breaker.record_success();
                if !pause(jittered(poll_interval), &mut shutdown).await {
                    break;
                }
            }
            Err(e) => {
                breaker.record_failure();
                error!(worker_id, error = %e, failures = breaker.failures(), "Failed to process queue");
                if !pause(jittered(poll_interval), &mut shutdown).await {
                    break;
                }
            }
        }
    }

    info!(worker_id, "Claim loop stopped");
}

fn outcome_label(outcome: &ProcessOutcome) -> &'static str {
    match outcome {
        ProcessOutcome::Completed { .. } => "completed",
        ProcessOutcome::Failed { .. } => "failed",
        ProcessOutcome::Abandoned { .. } => "abandoned",
    }
}

/// Run the sweeper every `interval` until shutdown
pub async fn sweep_loop(sweeper: Sweeper, interval: Duration, mut shutdown: watch::Receiver<bool>) {
    info!(interval_secs = interval.as_secs(), "Sweep loop started");

    loop {
        if let Err(e) = sweeper.run_once(Utc::now()).await {
            error!(error = %e, "Sweep failed");
        }
        if !pause(interval, &mut shutdown).await {
            break;
        }
    }

    info!("Sweep loop stopped");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_circuit_breaker_opens_after_max_failures() {
        let mut breaker = CircuitBreaker::default();
        for _ in 0..MAX_FAILURES - 1 {
            breaker.record_failure();
        }
        assert!(!breaker.is_open());

        breaker.record_failure();
        assert!(breaker.is_open());

        breaker.reset();
        assert!(!breaker.is_open());
    }

    #[test]
    fn test_success_clears_failures() {
        let mut breaker = CircuitBreaker::default();
        breaker.record_failure();
        breaker.record_failure();
        breaker.record_success();
        assert_eq!(breaker.failures(), 0);
    }

    #[test]
    fn test_jitter_stays_within_a_quarter() {
        let base = Duration::from_millis(1000);
        for _ in 0..50 {
            let d = jittered(base);
            assert!(d >= base && d <= Duration::from_millis(1250));
        }
        assert_eq!(jittered(Duration::from_millis(2)), Duration::from_millis(2));
    }

    #[tokio::test]
    async fn test_pause_returns_false_on_shutdown() {
        let (tx, mut rx) = watch::channel(false);
        tx.send(true).unwrap();
        assert!(!pause(Duration::from_secs(60), &mut rx).await);
    }
}
