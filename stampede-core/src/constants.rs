use std::time::Duration;

/// Granularity of the scenario clock.
pub const DEFAULT_TICK: Duration = Duration::from_millis(100);

/// Hard per-request timeout. In-flight requests exceeding it are recorded as timeouts.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Run deadline used when the stages themselves carry no duration.
pub const DEFAULT_MAX_DURATION: Duration = Duration::from_secs(30);

pub const DEFAULT_MAX_CONCURRENCY: usize = 10_000;

/// Application-level status reported by the system under test on success.
pub const DEFAULT_SUCCESS_SENTINEL: &str = "True";

/// Number of failed requests whose detail is kept for the final report.
pub const MAX_ERROR_SAMPLES: usize = 10;

pub const DEFAULT_QUERY_ID: &str = "1234";

pub const DEFAULT_QUERY_SQL: &str = "SELECT id, username, email, password_hash, balance, is_active, created_at, updated_at FROM users LIMIT 1";

/// Range `{rand}` draws from when the descriptor names none.
pub const DEFAULT_RANDOM_RANGE: (u64, u64) = (1, 1000);

/// Pause before a client retries a connection that just failed.
pub const CONNECT_RETRY_BACKOFF: Duration = Duration::from_millis(100);
