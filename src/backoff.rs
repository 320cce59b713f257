//! Randomized exponential backoff shared by the refresh-retry and lock-contention loops.

// crates.io
use rand::Rng;
// self
use crate::_prelude::*;

/// Exponential backoff policy with a hard ceiling and a 50–100% jitter band.
///
/// Jitter keeps concurrently-refreshing processes from synchronizing their retries into storms
/// against the token endpoint. The rng is passed in by the caller so tests can seed it and
/// assert exact delays.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BackoffPolicy {
	base: Duration,
	cap: Duration,
}
impl BackoffPolicy {
	/// Default growth base.
	pub const DEFAULT_BASE: Duration = Duration::milliseconds(750);
	/// Default delay ceiling.
	pub const DEFAULT_CAP: Duration = Duration::seconds(10);

	/// Creates a policy from a growth base and a ceiling; negative inputs clamp to zero.
	pub fn new(base: Duration, cap: Duration) -> Self {
		let base = base.max(Duration::ZERO);
		let cap = cap.max(base);

		Self { base, cap }
	}

	/// Computes the jittered delay for the given zero-based attempt number.
	pub fn delay<R>(&self, attempt: u32, rng: &mut R) -> Duration
	where
		R: Rng,
	{
		let grown = self.base.as_seconds_f64() * 2_f64.powi(attempt.min(32) as i32);
		let capped = grown.min(self.cap.as_seconds_f64());

		if capped <= 0. {
			return Duration::ZERO;
		}

		Duration::seconds_f64(capped * rng.random_range(0.5..1.0))
	}
}
impl Default for BackoffPolicy {
	fn default() -> Self {
		Self::new(Self::DEFAULT_BASE, Self::DEFAULT_CAP)
	}
}

/// Converts a non-negative [`Duration`] into its std counterpart for timer calls.
pub(crate) fn to_std(duration: Duration) -> std::time::Duration {
	std::time::Duration::try_from(duration).unwrap_or_default()
}
