//! Storage contracts and built-in backends for the shared token/lock store.
//!
//! The coordinator only ever relies on single-key atomicity: conditional set with expiry for
//! lock acquisition and guarded delete for lock release. No multi-key transactions are assumed,
//! so any store exposing these five primitives can sit behind the trait.

#[cfg(feature = "redis")] pub mod redis;
pub mod memory;

#[cfg(feature = "redis")] pub use redis::RedisStore;
pub use memory::MemoryStore;

// self
use crate::_prelude::*;

/// Boxed future returned by [`SharedStore`] operations.
pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, StoreError>> + 'a + Send>>;

/// Shared key-value store contract consumed by the coordinator.
///
/// Every value carries a store-managed TTL; implementations must treat entries past their TTL as
/// absent from all five operations, not just `get`.
pub trait SharedStore
where
	Self: Send + Sync,
{
	/// Fetches the value stored under `key`, if present and unexpired.
	fn get<'a>(&'a self, key: &'a str) -> StoreFuture<'a, Option<String>>;

	/// Stores or replaces `key` with the provided TTL.
	fn put<'a>(&'a self, key: &'a str, value: String, ttl: Duration) -> StoreFuture<'a, ()>;

	/// Atomically stores `key` only if absent, returning `true` on success.
	fn put_if_absent<'a>(
		&'a self,
		key: &'a str,
		value: String,
		ttl: Duration,
	) -> StoreFuture<'a, bool>;

	/// Removes `key` unconditionally.
	fn delete<'a>(&'a self, key: &'a str) -> StoreFuture<'a, ()>;

	/// Atomically removes `key` only while its value equals `expected`, returning `true` when
	/// the entry was removed.
	fn delete_if_equal<'a>(&'a self, key: &'a str, expected: &'a str) -> StoreFuture<'a, bool>;
}

/// Error type produced by [`SharedStore`] implementations.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ThisError)]
pub enum StoreError {
	/// Serialization failures surfaced while preparing a value for the backend.
	#[error("Serialization error: {message}.")]
	Serialization {
		/// Human-readable error payload.
		message: String,
	},
	/// Backend-level failure for the storage engine.
	#[error("Backend failure: {message}.")]
	Backend {
		/// Human-readable error payload.
		message: String,
	},
}
