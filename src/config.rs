//! Process-wide coordinator configuration, fixed at construction.

// self
use crate::{_prelude::*, backoff::BackoffPolicy, endpoint::Credentials, error::ConfigError};

/// Tunables governing cache freshness, locking, and the exchange retry loop.
///
/// All values are process-wide and fixed once the coordinator is built. Credentials may stay
/// unset while constructing the configuration; their absence only becomes fatal at the first
/// token lookup.
#[derive(Clone, Debug)]
pub struct CoordinatorConfig {
	/// Client credentials for the token exchange; absence is fatal at first use.
	pub credentials: Option<Credentials>,
	/// Remaining-lifetime threshold under which eager background renewal starts.
	pub refresh_leeway: Duration,
	/// Safety margin subtracted from every endpoint-reported token lifetime.
	pub clock_skew: Duration,
	/// Lifetime of a refresh lock lease.
	pub lock_ttl: Duration,
	/// Maximum token-exchange attempts within one refresh.
	pub max_retries: u32,
	/// Backoff policy shared by the retry and lock-contention loops.
	pub backoff: BackoffPolicy,
	/// Timeout applied to every token endpoint HTTP call.
	pub http_timeout: Duration,
	/// Prefix for every shared-store key written by the coordinator.
	pub key_namespace: String,
}
impl CoordinatorConfig {
	/// Default clock-skew margin.
	pub const DEFAULT_CLOCK_SKEW: Duration = Duration::seconds(5);
	/// Default HTTP timeout for token exchanges.
	pub const DEFAULT_HTTP_TIMEOUT: Duration = Duration::seconds(20);
	/// Default store key namespace.
	pub const DEFAULT_KEY_NAMESPACE: &'static str = "oauth2";
	/// Default lock lease duration.
	pub const DEFAULT_LOCK_TTL: Duration = Duration::seconds(20);
	/// Default exchange attempt budget.
	pub const DEFAULT_MAX_RETRIES: u32 = 5;
	/// Default eager-renewal leeway.
	pub const DEFAULT_REFRESH_LEEWAY: Duration = Duration::seconds(60);

	/// Creates a configuration with every default and no credentials.
	pub fn new() -> Self {
		Self {
			credentials: None,
			refresh_leeway: Self::DEFAULT_REFRESH_LEEWAY,
			clock_skew: Self::DEFAULT_CLOCK_SKEW,
			lock_ttl: Self::DEFAULT_LOCK_TTL,
			max_retries: Self::DEFAULT_MAX_RETRIES,
			backoff: BackoffPolicy::default(),
			http_timeout: Self::DEFAULT_HTTP_TIMEOUT,
			key_namespace: Self::DEFAULT_KEY_NAMESPACE.into(),
		}
	}

	/// Sets the client credentials.
	pub fn with_credentials(
		mut self,
		client_id: impl Into<String>,
		client_secret: impl Into<String>,
	) -> Self {
		self.credentials = Some(Credentials::new(client_id, client_secret));

		self
	}

	/// Overrides the eager-renewal leeway.
	pub fn with_refresh_leeway(mut self, leeway: Duration) -> Self {
		self.refresh_leeway = leeway.max(Duration::ZERO);

		self
	}

	/// Overrides the clock-skew margin.
	pub fn with_clock_skew(mut self, skew: Duration) -> Self {
		self.clock_skew = skew.max(Duration::ZERO);

		self
	}

	/// Overrides the lock lease duration.
	pub fn with_lock_ttl(mut self, ttl: Duration) -> Self {
		self.lock_ttl = ttl.max(Duration::seconds(1));

		self
	}

	/// Overrides the exchange attempt budget; at least one attempt is always made.
	pub fn with_max_retries(mut self, attempts: u32) -> Self {
		self.max_retries = attempts.max(1);

		self
	}

	/// Overrides the backoff policy.
	pub fn with_backoff(mut self, backoff: BackoffPolicy) -> Self {
		self.backoff = backoff;

		self
	}

	/// Overrides the token endpoint HTTP timeout.
	pub fn with_http_timeout(mut self, timeout: Duration) -> Self {
		self.http_timeout = timeout;

		self
	}

	/// Overrides the store key namespace.
	pub fn with_key_namespace(mut self, namespace: impl Into<String>) -> Self {
		self.key_namespace = namespace.into();

		self
	}

	/// Returns the configured credentials or the fatal configuration error.
	pub(crate) fn require_credentials(&self) -> Result<&Credentials, ConfigError> {
		self.credentials
			.as_ref()
			.filter(|credentials| credentials.is_complete())
			.ok_or(ConfigError::MissingCredentials)
	}
}
impl Default for CoordinatorConfig {
	fn default() -> Self {
		Self::new()
	}
}
