//! Cached token records, freshness classification, and the store wire format.
//!
//! A region's cache entry is a small JSON document, `{"access_token": "...", "expires_at":
//! 1723...5}`, where `expires_at` is fractional epoch seconds. The embedded expiry stays the
//! source of truth; the store's own TTL is only a backstop against stalled deletions. Anything
//! that fails to decode is treated as absent by the coordinator and proactively deleted.

// self
use crate::_prelude::*;

/// Redacted token secret wrapper keeping sensitive material out of logs.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenSecret(String);
impl TokenSecret {
	/// Wraps a new secret string.
	pub fn new(value: impl Into<String>) -> Self {
		Self(value.into())
	}

	/// Returns the inner token value. Callers must avoid logging this string.
	pub fn expose(&self) -> &str {
		&self.0
	}
}
impl AsRef<str> for TokenSecret {
	fn as_ref(&self) -> &str {
		self.expose()
	}
}
impl Debug for TokenSecret {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_tuple("TokenSecret").field(&"<redacted>").finish()
	}
}
impl Display for TokenSecret {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str("<redacted>")
	}
}

/// Cache-freshness classes evaluated against a leeway window.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Freshness {
	/// More than `leeway` of lifetime remains; serve without any lock or network activity.
	Fresh,
	/// Still valid but inside the leeway window; serve and renew eagerly in the background.
	Stale,
	/// The embedded expiry has passed; the value must not be served.
	Expired,
}

/// Per-region token record persisted in the shared store.
#[derive(Clone, Serialize, Deserialize)]
pub struct CachedToken {
	/// Bearer credential returned by the token endpoint.
	pub access_token: TokenSecret,
	/// Absolute instant after which the token must not be trusted.
	#[serde(with = "epoch_seconds")]
	pub expires_at: OffsetDateTime,
}
impl CachedToken {
	/// Creates a record from a credential and its absolute expiry.
	pub fn new(access_token: impl Into<String>, expires_at: OffsetDateTime) -> Self {
		Self { access_token: TokenSecret::new(access_token), expires_at }
	}

	/// Remaining lifetime at the provided instant; negative once expired.
	pub fn remaining(&self, now: OffsetDateTime) -> Duration {
		self.expires_at - now
	}

	/// Returns `true` while the embedded expiry lies in the future.
	pub fn is_live_at(&self, now: OffsetDateTime) -> bool {
		self.remaining(now) > Duration::ZERO
	}

	/// Classifies the record against the eager-renewal leeway window.
	pub fn freshness(&self, now: OffsetDateTime, leeway: Duration) -> Freshness {
		let remaining = self.remaining(now);

		if remaining > leeway {
			Freshness::Fresh
		} else if remaining > Duration::ZERO {
			Freshness::Stale
		} else {
			Freshness::Expired
		}
	}

	/// Decodes a stored value, rejecting malformed documents and empty credentials.
	pub fn decode(raw: &str) -> Result<Self, CacheDecodeError> {
		let mut deserializer = serde_json::Deserializer::from_str(raw);
		let record: Self = serde_path_to_error::deserialize(&mut deserializer)
			.map_err(|source| CacheDecodeError::Json { source })?;

		if record.access_token.expose().is_empty() {
			return Err(CacheDecodeError::EmptyAccessToken);
		}

		Ok(record)
	}

	/// Serializes the record into its store wire format.
	pub fn encode(&self) -> Result<String, serde_json::Error> {
		serde_json::to_string(self)
	}
}
impl Debug for CachedToken {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("CachedToken")
			.field("access_token", &"<redacted>")
			.field("expires_at", &self.expires_at)
			.finish()
	}
}

/// Reasons a stored value failed to decode into a [`CachedToken`].
#[derive(Debug, ThisError)]
pub enum CacheDecodeError {
	/// The stored document is not the expected JSON shape.
	#[error("Cached token value is malformed JSON.")]
	Json {
		/// Structured parsing failure.
		#[source]
		source: serde_path_to_error::Error<serde_json::Error>,
	},
	/// The stored document carries an empty credential.
	#[error("Cached token value carries an empty access token.")]
	EmptyAccessToken,
}

/// Serde adapter persisting [`OffsetDateTime`] as fractional epoch seconds.
mod epoch_seconds {
	// crates.io
	use serde::{Deserialize, Deserializer, Serializer, de};
	use time::OffsetDateTime;

	pub fn serialize<S>(value: &OffsetDateTime, serializer: S) -> Result<S::Ok, S::Error>
	where
		S: Serializer,
	{
		serializer.serialize_f64(value.unix_timestamp_nanos() as f64 / 1e9)
	}

	pub fn deserialize<'de, D>(deserializer: D) -> Result<OffsetDateTime, D::Error>
	where
		D: Deserializer<'de>,
	{
		let seconds = f64::deserialize(deserializer)?;

		if !seconds.is_finite() {
			return Err(de::Error::custom("expires_at must be a finite timestamp"));
		}

		OffsetDateTime::from_unix_timestamp_nanos((seconds * 1e9) as i128)
			.map_err(de::Error::custom)
	}
}
