//! Coordinator-level error types shared across the cache, lock, and refresh layers.

// self
use crate::{_prelude::*, region::RegionCode};

/// Coordinator-wide result type alias returning [`Error`] by default.
pub type Result<T, E = Error> = std::result::Result<T, E>;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Canonical coordinator error exposed by public APIs.
///
/// `get_token` surfaces only `Config`, `Storage`, and `Unavailable`; `Endpoint` and `Contention`
/// are refresh-executor failures that the coordinator's re-read collapses into `Unavailable`.
#[derive(Debug, ThisError)]
pub enum Error {
	/// Storage-layer failure.
	#[error("{0}")]
	Storage(
		#[from]
		#[source]
		crate::store::StoreError,
	),
	/// Local configuration problem.
	#[error(transparent)]
	Config(#[from] ConfigError),
	/// Token endpoint exchange failure; carries the last attempt's error.
	#[error(transparent)]
	Endpoint(#[from] EndpointError),

	/// The refresh lock stayed contended and no valid token appeared within the poll budget.
	#[error("Token refresh for region `{region}` lost the lock race and no valid token appeared.")]
	Contention {
		/// Region whose refresh could not be arbitrated.
		region: RegionCode,
	},
	/// A full synchronous refresh attempt produced no usable token.
	#[error("No usable token could be produced for region `{region}`.")]
	Unavailable {
		/// Region whose token could not be obtained.
		region: RegionCode,
	},
}

/// Configuration and validation failures raised by the coordinator. Fatal, never retried.
#[derive(Debug, ThisError)]
pub enum ConfigError {
	/// Client credentials are missing or empty.
	#[error("Client credentials are not configured.")]
	MissingCredentials,
	/// Requested region is not present in the region registry.
	#[error("Region `{region}` is not present in the region registry.")]
	UnknownRegion {
		/// Region code as supplied by the caller.
		region: String,
	},
	/// HTTP client could not be constructed.
	#[error("HTTP client could not be constructed.")]
	HttpClientBuild {
		/// Underlying transport builder failure.
		#[source]
		source: BoxError,
	},
}
impl ConfigError {
	/// Wraps a transport's builder failure inside [`ConfigError`].
	pub fn http_client_build(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::HttpClientBuild { source: Box::new(src) }
	}
}
#[cfg(feature = "reqwest")]
impl From<reqwest::Error> for ConfigError {
	fn from(e: reqwest::Error) -> Self {
		Self::http_client_build(e)
	}
}

/// Failures raised while exchanging client credentials against a token endpoint.
///
/// Retryability drives the refresh executor's bounded retry loop: transport failures, malformed
/// success bodies, and throttling/server statuses are worth another attempt, anything else is a
/// terminal rejection.
#[derive(Debug, ThisError)]
pub enum EndpointError {
	/// Underlying HTTP client reported a network failure.
	#[error("Network error occurred while calling the token endpoint.")]
	Transport {
		/// Transport-specific network error.
		#[source]
		source: BoxError,
	},
	/// Token endpoint answered with a non-success status.
	#[error("Token endpoint returned HTTP {status}: {body}.")]
	Status {
		/// HTTP status code of the response.
		status: u16,
		/// Truncated response body preview.
		body: String,
	},
	/// Token endpoint responded with malformed JSON that could not be parsed.
	#[error("Token endpoint returned malformed JSON.")]
	MalformedResponse {
		/// Structured parsing failure.
		#[source]
		source: serde_path_to_error::Error<serde_json::Error>,
		/// HTTP status code of the response.
		status: u16,
	},
}
impl EndpointError {
	/// Statuses that signal a transient server-side or throttling condition.
	pub const RETRYABLE_STATUSES: [u16; 5] = [429, 500, 502, 503, 504];

	/// Wraps a transport-specific network error.
	pub fn transport(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::Transport { source: Box::new(src) }
	}

	/// Returns `true` when another exchange attempt may succeed.
	pub fn is_retryable(&self) -> bool {
		match self {
			Self::Transport { .. } | Self::MalformedResponse { .. } => true,
			Self::Status { status, .. } => Self::RETRYABLE_STATUSES.contains(status),
		}
	}
}
#[cfg(feature = "reqwest")]
impl From<reqwest::Error> for EndpointError {
	fn from(e: reqwest::Error) -> Self {
		Self::transport(e)
	}
}
