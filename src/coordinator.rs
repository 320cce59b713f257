//! Cache-first token lookup orchestration.
//!
//! [`Coordinator::get_token`] is the one entry point the rest of a worker fleet calls. It reads
//! the region's cache entry, classifies its freshness, and either serves it directly, serves it
//! while renewing eagerly in the background, or blocks on a lock-arbitrated refresh. The fresh
//! path never touches the lock or the network.

// self
use crate::{
	_prelude::*,
	config::CoordinatorConfig,
	endpoint::TokenEndpointClient,
	obs::{self, OpKind, OpOutcome, OpSpan},
	refresh::{RefreshCounters, RefreshMode},
	region::{self, RegionCode, RegionRegistry},
	store::SharedStore,
	token::{CachedToken, Freshness, TokenSecret},
};
#[cfg(feature = "reqwest")] use crate::endpoint::ReqwestTokenClient;

type GuardMap = Arc<Mutex<HashMap<RegionCode, Arc<AsyncMutex<()>>>>>;

/// Distributed token cache-and-refresh coordinator.
///
/// The coordinator owns shared handles to the store, the token endpoint transport, and the
/// region registry; cloning is cheap and every clone observes the same caches, counters, and
/// in-process refresh guards. Create one per process and share it (including with the detached
/// background tasks it spawns itself).
#[derive(Clone)]
pub struct Coordinator {
	/// Shared key-value store holding cache and lock entries.
	pub(crate) store: Arc<dyn SharedStore>,
	/// Transport used for client-credentials exchanges.
	pub(crate) endpoint: Arc<dyn TokenEndpointClient>,
	/// Immutable region table.
	pub(crate) registry: Arc<RegionRegistry>,
	/// Process-wide configuration.
	pub(crate) config: Arc<CoordinatorConfig>,
	/// Always-on refresh outcome counters.
	pub(crate) counters: Arc<RefreshCounters>,
	eager_guards: GuardMap,
}
impl Coordinator {
	/// Creates a coordinator from caller-provided store and transport handles.
	pub fn new(
		store: Arc<dyn SharedStore>,
		endpoint: Arc<dyn TokenEndpointClient>,
		registry: RegionRegistry,
		config: CoordinatorConfig,
	) -> Self {
		Self {
			store,
			endpoint,
			registry: Arc::new(registry),
			config: Arc::new(config),
			counters: Default::default(),
			eager_guards: Default::default(),
		}
	}

	/// Creates a coordinator that provisions its own reqwest-backed transport, honoring the
	/// configured HTTP timeout.
	#[cfg(feature = "reqwest")]
	pub fn with_reqwest(
		store: Arc<dyn SharedStore>,
		registry: RegionRegistry,
		config: CoordinatorConfig,
	) -> Result<Self> {
		let endpoint = ReqwestTokenClient::new(config.http_timeout)?;

		Ok(Self::new(store, Arc::new(endpoint), registry, config))
	}

	/// Returns the region registry the coordinator was built with.
	pub fn registry(&self) -> &RegionRegistry {
		&self.registry
	}

	/// Returns the process-wide configuration.
	pub fn config(&self) -> &CoordinatorConfig {
		&self.config
	}

	/// Returns the refresh outcome counters.
	pub fn refresh_counters(&self) -> &RefreshCounters {
		&self.counters
	}

	/// Returns a bearer token for `region`, refreshing through the distributed lock protocol
	/// when the cache cannot satisfy the call.
	///
	/// Freshly cached tokens return without any lock or network activity. Tokens inside the
	/// leeway window return immediately while a detached background refresh renews them. A miss
	/// or expired entry blocks on a synchronous refresh and re-reads the cache; if no live
	/// token appears after a full attempt, the call fails with [`Error::Unavailable`].
	pub async fn get_token(&self, region: &RegionCode) -> Result<TokenSecret> {
		const KIND: OpKind = OpKind::TokenLookup;

		let span = OpSpan::new(KIND, "get_token");

		obs::record_op_outcome(KIND, OpOutcome::Attempt);

		let result = span.instrument(self.get_token_inner(region)).await;

		match &result {
			Ok(_) => obs::record_op_outcome(KIND, OpOutcome::Success),
			Err(_) => obs::record_op_outcome(KIND, OpOutcome::Failure),
		}

		result
	}

	async fn get_token_inner(&self, region: &RegionCode) -> Result<TokenSecret> {
		self.config.require_credentials()?;
		self.registry.resolve(region)?;

		let now = OffsetDateTime::now_utc();

		if let Some(cached) = self.read_cached(region).await? {
			match cached.freshness(now, self.config.refresh_leeway) {
				Freshness::Fresh => return Ok(cached.access_token),
				Freshness::Stale => {
					self.spawn_background_refresh(region);

					return Ok(cached.access_token);
				},
				Freshness::Expired => (),
			}
		}

		match self.refresh(region, RefreshMode::Blocking).await {
			Ok(_) => (),
			Err(err @ (Error::Config(_) | Error::Storage(_))) => return Err(err),
			// Endpoint and contention failures never surface directly; the re-read below
			// decides whether another holder still produced a usable token.
			Err(err) => obs::record_warning(OpKind::Refresh, region.as_ref(), &err),
		}

		match self.read_cached(region).await? {
			Some(token) => Ok(token.access_token),
			None => Err(Error::Unavailable { region: region.clone() }),
		}
	}

	/// Deletes the region's cached token, forcing the next lookup through a refresh.
	pub async fn invalidate(&self, region: &RegionCode) -> Result<()> {
		self.registry.resolve(region)?;
		self.store.delete(&region::token_key(&self.config.key_namespace, region)).await?;

		Ok(())
	}

	/// Reads and self-heals the region's cache entry.
	///
	/// Only live, well-formed records are returned. Malformed values and values whose embedded
	/// expiry has passed are deleted and reported as a miss, never served.
	pub(crate) async fn read_cached(&self, region: &RegionCode) -> Result<Option<CachedToken>> {
		let key = region::token_key(&self.config.key_namespace, region);
		let Some(raw) = self.store.get(&key).await? else {
			return Ok(None);
		};

		match CachedToken::decode(&raw) {
			Ok(token) =>
				if token.is_live_at(OffsetDateTime::now_utc()) {
					Ok(Some(token))
				} else {
					self.store.delete(&key).await?;

					Ok(None)
				},
			Err(err) => {
				obs::record_warning(OpKind::TokenLookup, region.as_ref(), &err);
				self.store.delete(&key).await?;

				Ok(None)
			},
		}
	}

	/// Spawns a detached eager renewal for `region`.
	///
	/// The task is deliberately decoupled from the caller: it is never awaited, it survives
	/// caller cancellation, and every failure (including configuration errors) is logged and
	/// discarded at the task boundary. One eager refresh per region runs per process at a time.
	fn spawn_background_refresh(&self, region: &RegionCode) {
		let this = self.clone();
		let region = region.clone();

		tokio::spawn(async move {
			let guard = this.eager_guard(&region);
			let Some(_permit) = guard.try_lock() else {
				return;
			};

			if let Err(err) = this.refresh(&region, RefreshMode::Background).await {
				obs::record_warning(OpKind::Refresh, region.as_ref(), &err);
			}
		});
	}

	fn eager_guard(&self, region: &RegionCode) -> Arc<AsyncMutex<()>> {
		let mut guards = self.eager_guards.lock();

		guards.entry(region.clone()).or_insert_with(|| Arc::new(AsyncMutex::new(()))).clone()
	}
}
impl Debug for Coordinator {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("Coordinator")
			.field("registry", &self.registry)
			.field("config", &self.config)
			.finish_non_exhaustive()
	}
}
