//! Transport primitives for the client-credentials token exchange.
//!
//! The exchange is a single `POST` to a region's token endpoint with the form body
//! `grant_type=client_credentials` and HTTP Basic authentication built from the configured
//! client id/secret. [`TokenEndpointClient`] is the coordinator's only dependency on an HTTP
//! stack; tests substitute in-process fakes and production uses [`ReqwestTokenClient`].

// crates.io
use base64::{Engine, prelude::BASE64_STANDARD};
// self
use crate::{_prelude::*, error::EndpointError, token::TokenSecret};

const BODY_PREVIEW_LEN: usize = 256;

/// Client id/secret pair used for HTTP Basic authentication against token endpoints.
#[derive(Clone, Debug)]
pub struct Credentials {
	/// OAuth 2.0 client identifier.
	pub client_id: String,
	/// Confidential client secret.
	pub client_secret: TokenSecret,
}
impl Credentials {
	/// Creates a credentials pair.
	pub fn new(client_id: impl Into<String>, client_secret: impl Into<String>) -> Self {
		Self { client_id: client_id.into(), client_secret: TokenSecret::new(client_secret) }
	}

	/// Returns `true` when both parts are non-empty.
	pub fn is_complete(&self) -> bool {
		!self.client_id.is_empty() && !self.client_secret.expose().is_empty()
	}

	/// Builds the `Authorization: Basic` header value for the pair.
	pub fn authorization_header(&self) -> String {
		let raw = format!("{}:{}", self.client_id, self.client_secret.expose());

		format!("Basic {}", BASE64_STANDARD.encode(raw))
	}
}

/// Successful token endpoint response.
#[derive(Clone, Deserialize)]
pub struct TokenGrant {
	/// Issued bearer credential.
	pub access_token: String,
	/// Reported lifetime in seconds; endpoints omitting the field grant no lifetime at all.
	#[serde(default)]
	pub expires_in: u64,
}
impl Debug for TokenGrant {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("TokenGrant")
			.field("access_token", &"<redacted>")
			.field("expires_in", &self.expires_in)
			.finish()
	}
}

/// Boxed future returned by [`TokenEndpointClient::exchange`].
pub type ExchangeFuture<'a> =
	Pin<Box<dyn Future<Output = Result<TokenGrant, EndpointError>> + 'a + Send>>;

/// Abstraction over HTTP transports capable of executing the client-credentials exchange.
pub trait TokenEndpointClient
where
	Self: Send + Sync,
{
	/// Performs one exchange against `token_url`, classifying every failure mode into
	/// [`EndpointError`] so the refresh executor can decide retryability.
	fn exchange<'a>(
		&'a self,
		token_url: &'a Url,
		credentials: &'a Credentials,
	) -> ExchangeFuture<'a>;
}

/// Thin wrapper around [`ReqwestClient`] implementing the production exchange.
///
/// Token requests must not follow redirects; configure any custom client accordingly before
/// passing it to [`ReqwestTokenClient::with_client`].
#[cfg(feature = "reqwest")]
#[derive(Clone)]
pub struct ReqwestTokenClient(pub ReqwestClient);
#[cfg(feature = "reqwest")]
impl ReqwestTokenClient {
	/// Builds a client with the provided request timeout and redirects disabled.
	pub fn new(timeout: Duration) -> Result<Self, crate::error::ConfigError> {
		let client = ReqwestClient::builder()
			.timeout(crate::backoff::to_std(timeout))
			.redirect(reqwest::redirect::Policy::none())
			.build()?;

		Ok(Self(client))
	}

	/// Wraps an existing reqwest [`ReqwestClient`].
	pub fn with_client(client: ReqwestClient) -> Self {
		Self(client)
	}
}
#[cfg(feature = "reqwest")]
impl TokenEndpointClient for ReqwestTokenClient {
	fn exchange<'a>(
		&'a self,
		token_url: &'a Url,
		credentials: &'a Credentials,
	) -> ExchangeFuture<'a> {
		Box::pin(async move {
			let response = self
				.0
				.post(token_url.clone())
				.header(reqwest::header::AUTHORIZATION, credentials.authorization_header())
				.form(&[("grant_type", "client_credentials")])
				.send()
				.await?;
			let status = response.status().as_u16();
			let bytes = response.bytes().await?;

			if status != 200 {
				return Err(EndpointError::Status { status, body: body_preview(&bytes) });
			}

			let mut deserializer = serde_json::Deserializer::from_slice(&bytes);

			serde_path_to_error::deserialize(&mut deserializer)
				.map_err(|source| EndpointError::MalformedResponse { source, status })
		})
	}
}

/// Truncates a response body into a log-safe preview string.
pub(crate) fn body_preview(bytes: &[u8]) -> String {
	let text = String::from_utf8_lossy(bytes);

	match text.char_indices().nth(BODY_PREVIEW_LEN) {
		Some((idx, _)) => format!("{}...", &text[..idx]),
		None => text.into_owned(),
	}
}
