//! Rust's distributed OAuth 2.0 client-credentials coordinator - region-aware token caching,
//! lease-locked single-flight refresh, and eager renewal for fleets of rate-limited workers.

#![deny(clippy::all, missing_docs, unused_crate_dependencies)]

#[cfg(feature = "reqwest")] pub mod api;
pub mod backoff;
pub mod config;
pub mod coordinator;
pub mod endpoint;
pub mod error;
pub mod lock;
pub mod obs;
pub mod refresh;
pub mod region;
pub mod store;
pub mod token;
#[cfg(all(any(test, feature = "test"), feature = "reqwest"))]
pub mod _preludet {
	//! Convenience re-exports and helpers for integration tests; enabled via `cfg(test)` or the
	//! `test` crate feature.

	pub use crate::_prelude::*;

	// self
	use crate::{
		config::CoordinatorConfig,
		coordinator::Coordinator,
		endpoint::ReqwestTokenClient,
		region::RegionRegistry,
		store::{MemoryStore, SharedStore},
	};

	/// Builds a reqwest token client that accepts the self-signed certificates produced by
	/// `httpmock` during tests.
	pub fn test_reqwest_token_client() -> ReqwestTokenClient {
		let client = ReqwestClient::builder()
			.danger_accept_invalid_certs(true)
			.danger_accept_invalid_hostnames(true)
			.redirect(reqwest::redirect::Policy::none())
			.build()
			.expect("Failed to build insecure Reqwest client for tests.");

		ReqwestTokenClient::with_client(client)
	}

	/// Constructs a [`Coordinator`] backed by an in-memory store and the reqwest transport used
	/// across integration tests.
	pub fn build_test_coordinator(
		registry: RegionRegistry,
		config: CoordinatorConfig,
	) -> (Coordinator, Arc<MemoryStore>) {
		let store_backend = Arc::new(MemoryStore::default());
		let store: Arc<dyn SharedStore> = store_backend.clone();
		let coordinator =
			Coordinator::new(store, Arc::new(test_reqwest_token_client()), registry, config);

		(coordinator, store_backend)
	}
}

mod _prelude {
	pub use std::{
		collections::{BTreeMap, HashMap},
		fmt::{Debug, Display, Formatter, Result as FmtResult},
		future::Future,
		pin::Pin,
		str::FromStr,
		sync::Arc,
	};

	pub use async_lock::Mutex as AsyncMutex;
	pub use parking_lot::{Mutex, RwLock};
	#[cfg(feature = "reqwest")] pub use reqwest::Client as ReqwestClient;
	pub use serde::{Deserialize, Serialize};
	pub use thiserror::Error as ThisError;
	pub use time::{Duration, OffsetDateTime};
	pub use url::Url;

	pub use crate::error::{Error, Result};
}

#[cfg(feature = "reqwest")] pub use reqwest;
pub use time;
pub use url;
#[cfg(test)] use httpmock as _;
