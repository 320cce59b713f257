//! Thread-safe in-memory [`SharedStore`] implementation for local development and tests.

// self
use crate::{
	_prelude::*,
	store::{SharedStore, StoreFuture},
};

type StoreMap = Arc<RwLock<HashMap<String, Entry>>>;

#[derive(Clone, Debug)]
struct Entry {
	value: String,
	deadline: OffsetDateTime,
}
impl Entry {
	fn is_live(&self, now: OffsetDateTime) -> bool {
		self.deadline > now
	}
}

/// Thread-safe storage backend that keeps entries in-process and simulates store TTLs.
#[derive(Clone, Debug, Default)]
pub struct MemoryStore(StoreMap);
impl MemoryStore {
	fn get_now(map: StoreMap, key: String) -> Option<String> {
		let now = OffsetDateTime::now_utc();
		let mut guard = map.write();

		match guard.get(&key) {
			Some(entry) if entry.is_live(now) => Some(entry.value.clone()),
			Some(_) => {
				guard.remove(&key);

				None
			},
			None => None,
		}
	}

	fn put_now(map: StoreMap, key: String, value: String, ttl: Duration) {
		let deadline = OffsetDateTime::now_utc() + ttl;

		map.write().insert(key, Entry { value, deadline });
	}

	fn put_if_absent_now(map: StoreMap, key: String, value: String, ttl: Duration) -> bool {
		let now = OffsetDateTime::now_utc();
		let mut guard = map.write();

		if guard.get(&key).is_some_and(|entry| entry.is_live(now)) {
			return false;
		}

		guard.insert(key, Entry { value, deadline: now + ttl });

		true
	}

	fn delete_if_equal_now(map: StoreMap, key: String, expected: String) -> bool {
		let now = OffsetDateTime::now_utc();
		let mut guard = map.write();

		match guard.get(&key) {
			Some(entry) if entry.is_live(now) && entry.value == expected => {
				guard.remove(&key);

				true
			},
			Some(entry) if !entry.is_live(now) => {
				guard.remove(&key);

				false
			},
			_ => false,
		}
	}
}
impl SharedStore for MemoryStore {
	fn get<'a>(&'a self, key: &'a str) -> StoreFuture<'a, Option<String>> {
		let map = self.0.clone();
		let key = key.to_owned();

		Box::pin(async move { Ok(Self::get_now(map, key)) })
	}

	fn put<'a>(&'a self, key: &'a str, value: String, ttl: Duration) -> StoreFuture<'a, ()> {
		let map = self.0.clone();
		let key = key.to_owned();

		Box::pin(async move {
			Self::put_now(map, key, value, ttl);

			Ok(())
		})
	}

	fn put_if_absent<'a>(
		&'a self,
		key: &'a str,
		value: String,
		ttl: Duration,
	) -> StoreFuture<'a, bool> {
		let map = self.0.clone();
		let key = key.to_owned();

		Box::pin(async move { Ok(Self::put_if_absent_now(map, key, value, ttl)) })
	}

	fn delete<'a>(&'a self, key: &'a str) -> StoreFuture<'a, ()> {
		let map = self.0.clone();
		let key = key.to_owned();

		Box::pin(async move {
			map.write().remove(&key);

			Ok(())
		})
	}

	fn delete_if_equal<'a>(&'a self, key: &'a str, expected: &'a str) -> StoreFuture<'a, bool> {
		let map = self.0.clone();
		let key = key.to_owned();
		let expected = expected.to_owned();

		Box::pin(async move { Ok(Self::delete_if_equal_now(map, key, expected)) })
	}
}
