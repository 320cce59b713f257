//! Downstream data API client boundary.
//!
//! Every call obtains a bearer token through the coordinator, issues a single authorized GET,
//! and fails fast. Retry and backoff live exclusively in the refresh executor; data fetches
//! that fail are the calling job's problem to reschedule. Auth-layer failures stay distinct
//! from data-layer failures so operators can tell the two outages apart.

// crates.io
use serde::de::DeserializeOwned;
// self
use crate::{_prelude::*, coordinator::Coordinator, endpoint::body_preview, region::RegionCode};

/// Failures raised by [`ApiClient`] calls.
#[derive(Debug, ThisError)]
pub enum ApiError {
	/// No bearer token could be obtained; the data API was never contacted.
	#[error("Failed to obtain a bearer token for the request.")]
	Auth {
		/// Coordinator failure that blocked the request.
		#[source]
		source: Error,
	},
	/// The request path could not be joined onto the region's API base URL.
	#[error("Request path could not be resolved against the API host.")]
	InvalidPath {
		/// Underlying parsing failure.
		#[source]
		source: url::ParseError,
	},
	/// Underlying HTTP client reported a network failure.
	#[error("Network error occurred while calling the data API.")]
	Transport {
		/// Transport-specific network error.
		#[source]
		source: reqwest::Error,
	},
	/// The data API answered with a non-success status.
	#[error("Data API returned HTTP {status}: {body}.")]
	Status {
		/// HTTP status code of the response.
		status: u16,
		/// Truncated response body preview.
		body: String,
	},
	/// The data API returned a success status with malformed JSON.
	#[error("Data API returned malformed JSON.")]
	MalformedResponse {
		/// Structured parsing failure.
		#[source]
		source: serde_path_to_error::Error<serde_json::Error>,
	},
}

/// Bearer-authenticated GET client for region-scoped data APIs.
#[derive(Clone, Debug)]
pub struct ApiClient {
	coordinator: Coordinator,
	http: ReqwestClient,
}
impl ApiClient {
	/// Creates a client that provisions its own transport, honoring the coordinator's
	/// configured HTTP timeout.
	pub fn new(coordinator: Coordinator) -> Result<Self> {
		let http = ReqwestClient::builder()
			.timeout(crate::backoff::to_std(coordinator.config().http_timeout))
			.build()
			.map_err(crate::error::ConfigError::from)?;

		Ok(Self::with_client(coordinator, http))
	}

	/// Wraps an existing reqwest [`ReqwestClient`].
	pub fn with_client(coordinator: Coordinator, http: ReqwestClient) -> Self {
		Self { coordinator, http }
	}

	/// Returns the coordinator backing this client.
	pub fn coordinator(&self) -> &Coordinator {
		&self.coordinator
	}

	/// Issues one authorized GET against the region's API host and decodes the JSON response.
	pub async fn get_json<T>(
		&self,
		region: &RegionCode,
		path: &str,
		query: &[(&str, &str)],
	) -> Result<T, ApiError>
	where
		T: DeserializeOwned,
	{
		let token = self
			.coordinator
			.get_token(region)
			.await
			.map_err(|source| ApiError::Auth { source })?;
		let base = &self
			.coordinator
			.registry()
			.resolve(region)
			.map_err(|source| ApiError::Auth { source: source.into() })?
			.api;
		let url = base.join(path).map_err(|source| ApiError::InvalidPath { source })?;
		let response = self
			.http
			.get(url)
			.query(query)
			.header(reqwest::header::AUTHORIZATION, format!("Bearer {}", token.expose()))
			.send()
			.await
			.map_err(|source| ApiError::Transport { source })?;
		let status = response.status();
		let bytes =
			response.bytes().await.map_err(|source| ApiError::Transport { source })?;

		if !status.is_success() {
			return Err(ApiError::Status { status: status.as_u16(), body: body_preview(&bytes) });
		}

		let mut deserializer = serde_json::Deserializer::from_slice(&bytes);

		serde_path_to_error::deserialize(&mut deserializer)
			.map_err(|source| ApiError::MalformedResponse { source })
	}
}
