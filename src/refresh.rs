//! Lock-arbitrated token refresh execution.
//!
//! At most one process performs the network exchange per region at a time: the executor
//! acquires the region's lock lease, runs the bounded-retry exchange, writes the result, and
//! releases the lease on every exit path. Contenders either decline (background mode) or poll
//! the cache for the holder's result (blocking mode). Outcomes are values, not exceptions:
//! callers branch on [`RefreshOutcome`].

// std
use std::sync::atomic::{AtomicU64, Ordering};
// self
use crate::{
	_prelude::*,
	backoff::to_std,
	coordinator::Coordinator,
	endpoint::Credentials,
	lock::Lease,
	obs::{self, OpKind, OpOutcome, OpSpan},
	region::{self, RegionCode},
	store::StoreError,
	token::CachedToken,
};

/// Cache-poll iterations granted to a blocked contender before its final lock attempt.
const LOCK_POLL_ATTEMPTS: u32 = 5;

/// How a refresh call behaves when another holder owns the region lock.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RefreshMode {
	/// Wait for a usable token: poll the cache, then retry the lock once before failing.
	Blocking,
	/// Decline immediately; an eager renewal never duplicates in-flight work.
	Background,
}

/// What a completed refresh call actually did.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RefreshOutcome {
	/// This call held the lock and wrote a fresh token.
	Refreshed,
	/// Another holder's refresh landed while this call was waiting.
	Observed,
	/// The lock was contended in background mode; nothing was attempted.
	Declined,
}

/// Thread-safe counters for refresh attempts.
#[derive(Debug, Default)]
pub struct RefreshCounters {
	attempts: AtomicU64,
	success: AtomicU64,
	failure: AtomicU64,
}
impl RefreshCounters {
	/// Returns the total number of refresh calls.
	pub fn attempts(&self) -> u64 {
		self.attempts.load(Ordering::Relaxed)
	}

	/// Returns the number of refresh calls that ended with a usable token (including declines
	/// and observed results).
	pub fn successes(&self) -> u64 {
		self.success.load(Ordering::Relaxed)
	}

	/// Returns the number of failed refresh calls.
	pub fn failures(&self) -> u64 {
		self.failure.load(Ordering::Relaxed)
	}

	fn record_attempt(&self) {
		self.attempts.fetch_add(1, Ordering::Relaxed);
	}

	fn record_success(&self) {
		self.success.fetch_add(1, Ordering::Relaxed);
	}

	fn record_failure(&self) {
		self.failure.fetch_add(1, Ordering::Relaxed);
	}
}

impl Coordinator {
	/// Refreshes the region's token under the distributed lock protocol.
	///
	/// Public so ETL jobs can force a renewal after a known-bad token; [`Coordinator::get_token`]
	/// drives it in both modes on its own.
	pub async fn refresh(&self, region: &RegionCode, mode: RefreshMode) -> Result<RefreshOutcome> {
		const KIND: OpKind = OpKind::Refresh;

		let span = OpSpan::new(KIND, "refresh");

		obs::record_op_outcome(KIND, OpOutcome::Attempt);
		self.counters.record_attempt();

		let result = span.instrument(self.refresh_inner(region, mode)).await;

		match &result {
			Ok(_) => {
				obs::record_op_outcome(KIND, OpOutcome::Success);
				self.counters.record_success();
			},
			Err(_) => {
				obs::record_op_outcome(KIND, OpOutcome::Failure);
				self.counters.record_failure();
			},
		}

		result
	}

	async fn refresh_inner(&self, region: &RegionCode, mode: RefreshMode) -> Result<RefreshOutcome> {
		let credentials = self.config.require_credentials()?.clone();
		let token_url = self.registry.resolve(region)?.token.clone();
		let lock_key = region::lock_key(&self.config.key_namespace, region);

		if let Some(lease) =
			Lease::acquire(self.store.as_ref(), lock_key.clone(), self.config.lock_ttl).await?
		{
			return self.exchange_under_lease(lease, region, &token_url, &credentials).await;
		}

		match mode {
			RefreshMode::Background => Ok(RefreshOutcome::Declined),
			RefreshMode::Blocking =>
				self.wait_for_holder(region, lock_key, &token_url, &credentials).await,
		}
	}

	/// Polls the cache while another holder refreshes, then makes one last acquisition attempt.
	async fn wait_for_holder(
		&self,
		region: &RegionCode,
		lock_key: String,
		token_url: &Url,
		credentials: &Credentials,
	) -> Result<RefreshOutcome> {
		for _ in 0..LOCK_POLL_ATTEMPTS {
			let delay = {
				let mut rng = rand::rng();

				self.config.backoff.delay(0, &mut rng)
			};

			tokio::time::sleep(to_std(delay)).await;

			if self.read_cached(region).await?.is_some() {
				return Ok(RefreshOutcome::Observed);
			}
		}

		// The holder may have crashed; its lease will have expired by now if so.
		match Lease::acquire(self.store.as_ref(), lock_key, self.config.lock_ttl).await? {
			Some(lease) => self.exchange_under_lease(lease, region, token_url, credentials).await,
			None =>
				if self.read_cached(region).await?.is_some() {
					Ok(RefreshOutcome::Observed)
				} else {
					Err(Error::Contention { region: region.clone() })
				},
		}
	}

	async fn exchange_under_lease(
		&self,
		lease: Lease,
		region: &RegionCode,
		token_url: &Url,
		credentials: &Credentials,
	) -> Result<RefreshOutcome> {
		let result = self.exchange_and_store(region, token_url, credentials).await;

		lease.release(self.store.as_ref()).await;

		result.map(|()| RefreshOutcome::Refreshed)
	}

	/// Runs the bounded-retry exchange and persists the skew-adjusted result.
	async fn exchange_and_store(
		&self,
		region: &RegionCode,
		token_url: &Url,
		credentials: &Credentials,
	) -> Result<()> {
		let mut attempt = 0;

		loop {
			match self.endpoint.exchange(token_url, credentials).await {
				Ok(grant) => {
					let now = OffsetDateTime::now_utc();
					let lifetime =
						(Duration::seconds(grant.expires_in as i64) - self.config.clock_skew)
							.max(Duration::ZERO);
					let record = CachedToken::new(grant.access_token, now + lifetime);
					let payload = record.encode().map_err(|e| StoreError::Serialization {
						message: e.to_string(),
					})?;
					let ttl = lifetime.max(Duration::seconds(1));

					self.store
						.put(&region::token_key(&self.config.key_namespace, region), payload, ttl)
						.await?;

					return Ok(());
				},
				Err(err) => {
					attempt += 1;

					if !err.is_retryable() || attempt >= self.config.max_retries {
						return Err(err.into());
					}

					let delay = {
						let mut rng = rand::rng();

						self.config.backoff.delay(attempt - 1, &mut rng)
					};

					obs::record_warning(OpKind::Refresh, region.as_ref(), &err);
					tokio::time::sleep(to_std(delay)).await;
				},
			}
		}
	}
}
