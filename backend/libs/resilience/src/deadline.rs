/// Per-request deadlines shared across several awaits
///
/// A `Deadline` is fixed once when a request starts. Every suspension point
/// bounded by it races against the same instant, so a slow first step leaves
/// less time for the later ones instead of each step getting a fresh budget.
use std::future::Future;
use std::time::Duration;
use tokio::time::{timeout_at, Instant};

use crate::timeout::TimeoutError;

#[derive(Debug, Clone, Copy)]
pub struct Deadline {
    at: Instant,
    budget: Duration,
}

impl Deadline {
    pub fn after(budget: Duration) -> Self {
        Self {
            at: Instant::now() + budget,
            budget,
        }
    }

    pub fn budget(&self) -> Duration {
        self.budget
    }

    pub fn remaining(&self) -> Duration {
        self.at.saturating_duration_since(Instant::now())
    }

    pub fn is_expired(&self) -> bool {
        Instant::now() >= self.at
    }

    /// Await `future` until the deadline. Returns `DeadlinePassed` without
    /// polling when the deadline has already gone by.
    pub async fn run<F, T>(&self, future: F) -> Result<T, TimeoutError>
    where
        F: Future<Output = T>,
    {
        if self.is_expired() {
            return Err(TimeoutError::DeadlinePassed);
        }

        timeout_at(self.at, future)
            .await
            .map_err(|_| TimeoutError::Elapsed(self.budget))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_run_completes_before_deadline() {
        let deadline = Deadline::after(Duration::from_secs(1));
        let value = deadline.run(async { "done" }).await.unwrap();
        assert_eq!(value, "done");
        assert!(!deadline.is_expired());
    }

    #[tokio::test]
    async fn test_run_elapsed() {
        let deadline = Deadline::after(Duration::from_millis(10));
        let result = deadline
            .run(tokio::time::sleep(Duration::from_secs(1)))
            .await;
        assert!(matches!(result, Err(TimeoutError::Elapsed(_))));
    }

    #[tokio::test]
    async fn test_budget_is_shared_between_awaits() {
        let deadline = Deadline::after(Duration::from_millis(50));
        tokio::time::sleep(Duration::from_millis(60)).await;

        assert!(deadline.is_expired());
        assert_eq!(deadline.remaining(), Duration::ZERO);
        let result = deadline.run(async { 1 }).await;
        assert!(matches!(result, Err(TimeoutError::DeadlinePassed)));
    }
}
