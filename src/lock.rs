//! Lease-based distributed lock protocol over the shared store.
//!
//! One lock key per region, holding an opaque lease token with a short TTL. Mutual exclusion is
//! advisory: a crashed holder self-heals via TTL expiry, and the narrow window where an expired
//! holder overlaps its successor costs at most one redundant endpoint call. Release is the
//! classic check-then-delete: a lease may only remove the entry while its own token is still
//! the stored value.

// crates.io
use rand::Rng;
// self
use crate::{
	_prelude::*,
	obs::{self, OpKind},
	store::{SharedStore, StoreError},
};

/// Opaque value identifying a single lock acquisition attempt.
///
/// Combines the process id, random entropy, and a nanosecond timestamp; attempts never reuse a
/// token, so a stored value identifies exactly one holder.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LeaseToken(String);
impl LeaseToken {
	/// Generates a fresh lease token for one acquisition attempt.
	pub fn generate() -> Self {
		let entropy: u64 = rand::rng().random();
		let stamp = OffsetDateTime::now_utc().unix_timestamp_nanos();

		Self(format!("{}-{entropy:016x}-{stamp}", std::process::id()))
	}

	/// Returns the token's stored representation.
	pub fn as_str(&self) -> &str {
		&self.0
	}
}
impl Display for LeaseToken {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(&self.0)
	}
}

/// A held lock lease; release it explicitly once the protected work finishes.
#[derive(Debug)]
pub struct Lease {
	key: String,
	token: LeaseToken,
}
impl Lease {
	/// Attempts to acquire the lock at `key` for `ttl`, returning `None` while another holder's
	/// lease is live.
	pub async fn acquire(
		store: &dyn SharedStore,
		key: String,
		ttl: Duration,
	) -> Result<Option<Self>, StoreError> {
		let token = LeaseToken::generate();

		if store.put_if_absent(&key, token.as_str().to_owned(), ttl).await? {
			Ok(Some(Self { key, token }))
		} else {
			Ok(None)
		}
	}

	/// Returns the lock key this lease was acquired for.
	pub fn key(&self) -> &str {
		&self.key
	}

	/// Returns the lease token written into the store.
	pub fn token(&self) -> &LeaseToken {
		&self.token
	}

	/// Releases the lock if this lease still owns it.
	///
	/// A mismatched value means our TTL expired and another attempt took over; the release is
	/// then a no-op. Store failures during release are logged and swallowed; an abandoned
	/// entry self-heals via TTL.
	pub async fn release(self, store: &dyn SharedStore) {
		if let Err(err) = store.delete_if_equal(&self.key, self.token.as_str()).await {
			obs::record_warning(OpKind::Refresh, &self.key, &err);
		}
	}
}
