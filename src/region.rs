//! Region identifiers, the region registry, and the shared-store key layout.

// std
use std::borrow::Borrow;
// self
use crate::{_prelude::*, error::ConfigError};

const REGION_CODE_MAX_LEN: usize = 16;

/// Validated region identifier, normalized to lowercase.
///
/// Region codes are short ASCII labels (`us`, `eu`, `kr`, ...) used to partition cache and lock
/// keys, so the same normalization must hold everywhere a code enters the system.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RegionCode(String);
impl RegionCode {
	/// Creates a new region code after validation, lowercasing the input.
	pub fn new(value: impl AsRef<str>) -> Result<Self, RegionCodeError> {
		let view = value.as_ref();

		if view.is_empty() {
			return Err(RegionCodeError::Empty);
		}
		if view.len() > REGION_CODE_MAX_LEN {
			return Err(RegionCodeError::TooLong { max: REGION_CODE_MAX_LEN });
		}
		if !view.chars().all(|c| c.is_ascii_alphanumeric() || c == '-') {
			return Err(RegionCodeError::InvalidCharacter);
		}

		Ok(Self(view.to_ascii_lowercase()))
	}
}
impl AsRef<str> for RegionCode {
	fn as_ref(&self) -> &str {
		&self.0
	}
}
impl Borrow<str> for RegionCode {
	fn borrow(&self) -> &str {
		&self.0
	}
}
impl From<RegionCode> for String {
	fn from(value: RegionCode) -> Self {
		value.0
	}
}
impl TryFrom<String> for RegionCode {
	type Error = RegionCodeError;

	fn try_from(value: String) -> Result<Self, Self::Error> {
		Self::new(value)
	}
}
impl FromStr for RegionCode {
	type Err = RegionCodeError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		Self::new(s)
	}
}
impl Debug for RegionCode {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		write!(f, "Region({})", self.0)
	}
}
impl Display for RegionCode {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(&self.0)
	}
}

/// Error returned when region code validation fails.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, ThisError)]
pub enum RegionCodeError {
	/// The region code was empty.
	#[error("Region code cannot be empty.")]
	Empty,
	/// The region code exceeded the allowed character count.
	#[error("Region code exceeds {max} characters.")]
	TooLong {
		/// Maximum permitted character count.
		max: usize,
	},
	/// The region code contains characters outside ASCII alphanumerics and dashes.
	#[error("Region code contains invalid characters.")]
	InvalidCharacter,
}

/// Endpoint pair declared for a single region.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegionEndpoints {
	/// Token endpoint URL used for client-credentials exchanges.
	pub token: Url,
	/// Downstream data API base URL.
	pub api: Url,
}

/// Immutable region table mapping codes to endpoint pairs; built once, shared everywhere.
#[derive(Clone, Debug)]
pub struct RegionRegistry(BTreeMap<RegionCode, RegionEndpoints>);
impl RegionRegistry {
	/// Creates a new builder for assembling a registry.
	pub fn builder() -> RegionRegistryBuilder {
		RegionRegistryBuilder::default()
	}

	/// Resolves a region to its endpoints, failing for codes outside the registry.
	pub fn resolve(&self, region: &RegionCode) -> Result<&RegionEndpoints, ConfigError> {
		self.0
			.get(region)
			.ok_or_else(|| ConfigError::UnknownRegion { region: region.to_string() })
	}

	/// Returns `true` when the registry contains the given region.
	pub fn contains(&self, region: &RegionCode) -> bool {
		self.0.contains_key(region)
	}

	/// Iterates over the registered regions in code order.
	pub fn iter(&self) -> impl Iterator<Item = (&RegionCode, &RegionEndpoints)> {
		self.0.iter()
	}
}

/// Errors raised while constructing or validating a [`RegionRegistry`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, ThisError)]
pub enum RegionRegistryError {
	/// A registry must declare at least one region.
	#[error("Region registry must declare at least one region.")]
	NoRegions,
	/// Endpoints must use HTTPS.
	#[error("The {endpoint} endpoint for region `{region}` must use HTTPS: {url}.")]
	InsecureEndpoint {
		/// Region whose endpoint failed validation.
		region: String,
		/// Which endpoint failed validation.
		endpoint: &'static str,
		/// Endpoint URL that failed validation.
		url: String,
	},
}

/// Builder for [`RegionRegistry`] values.
#[derive(Debug, Default)]
pub struct RegionRegistryBuilder(BTreeMap<RegionCode, RegionEndpoints>);
impl RegionRegistryBuilder {
	/// Declares a region together with its token and data API endpoints.
	pub fn region(mut self, code: RegionCode, token: Url, api: Url) -> Self {
		self.0.insert(code, RegionEndpoints { token, api });

		self
	}

	/// Consumes the builder and validates the resulting registry.
	pub fn build(self) -> Result<RegionRegistry, RegionRegistryError> {
		if self.0.is_empty() {
			return Err(RegionRegistryError::NoRegions);
		}

		for (code, endpoints) in &self.0 {
			validate_endpoint(code, "token", &endpoints.token)?;
			validate_endpoint(code, "api", &endpoints.api)?;
		}

		Ok(RegionRegistry(self.0))
	}
}

fn validate_endpoint(
	region: &RegionCode,
	name: &'static str,
	url: &Url,
) -> Result<(), RegionRegistryError> {
	if url.scheme() != "https" {
		Err(RegionRegistryError::InsecureEndpoint {
			region: region.to_string(),
			endpoint: name,
			url: url.to_string(),
		})
	} else {
		Ok(())
	}
}

/// Shared-store key holding a region's cached token.
pub(crate) fn token_key(namespace: &str, region: &RegionCode) -> String {
	format!("{namespace}:{region}")
}

/// Shared-store key holding a region's refresh lock lease.
pub(crate) fn lock_key(namespace: &str, region: &RegionCode) -> String {
	format!("{namespace}:{region}:lock")
}
