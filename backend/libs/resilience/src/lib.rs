/// Resilience helpers for store-facing calls
///
/// - **Timeout**: bound a single async call
/// - **Deadline**: bound a whole request that awaits several calls, so that
///   completed work can be kept when the budget runs out
///
/// # Example: chunked fan-out under one request deadline
///
/// ```rust,no_run
/// use resilience::Deadline;
/// use std::time::Duration;
///
/// #[tokio::main]
/// async fn main() {
///     let deadline = Deadline::after(Duration::from_millis(3000));
///
///     let first = deadline.run(async { 1 }).await;
///     let second = deadline.run(async { 2 }).await;
///     assert!(first.is_ok() && second.is_ok());
/// }
/// ```

pub mod deadline;
pub mod timeout;

pub use deadline::Deadline;
pub use timeout::{with_timeout, TimeoutError};
