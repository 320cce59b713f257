//! Redis-backed [`SharedStore`] implementation for multi-process deployments.
//!
//! Conditional set maps to `SET NX EX` and guarded delete runs server-side as a small Lua
//! script, so lock acquisition and release stay atomic even across partitions of workers.

// crates.io
use redis::{AsyncCommands, Client, Script, aio::ConnectionManager};
// self
use crate::{
	_prelude::*,
	store::{SharedStore, StoreError, StoreFuture},
};

const GUARDED_DELETE: &str = r"
if redis.call('GET', KEYS[1]) == ARGV[1] then
	return redis.call('DEL', KEYS[1])
end
return 0
";

/// Redis storage backend sharing one multiplexed connection across clones.
///
/// Construct once and share; the inner [`ConnectionManager`] reconnects on its own, so cloning
/// the store is the supported way to hand it to concurrent tasks.
#[derive(Clone)]
pub struct RedisStore {
	connection: ConnectionManager,
	guarded_delete: Arc<Script>,
}
impl RedisStore {
	/// Wraps an already-established connection manager.
	pub fn new(connection: ConnectionManager) -> Self {
		Self { connection, guarded_delete: Arc::new(Script::new(GUARDED_DELETE)) }
	}

	/// Connects to the provided Redis URL and wraps the resulting connection manager.
	pub async fn connect(redis_url: &str) -> Result<Self, StoreError> {
		let client = Client::open(redis_url).map_err(backend)?;
		let connection = ConnectionManager::new(client).await.map_err(backend)?;

		Ok(Self::new(connection))
	}

	fn ttl_seconds(ttl: Duration) -> u64 {
		ttl.whole_seconds().max(1) as u64
	}
}
impl SharedStore for RedisStore {
	fn get<'a>(&'a self, key: &'a str) -> StoreFuture<'a, Option<String>> {
		let mut connection = self.connection.clone();

		Box::pin(async move {
			let value: Option<String> = connection.get(key).await.map_err(backend)?;

			Ok(value)
		})
	}

	fn put<'a>(&'a self, key: &'a str, value: String, ttl: Duration) -> StoreFuture<'a, ()> {
		let mut connection = self.connection.clone();

		Box::pin(async move {
			let () = connection
				.set_ex(key, value, Self::ttl_seconds(ttl))
				.await
				.map_err(backend)?;

			Ok(())
		})
	}

	fn put_if_absent<'a>(
		&'a self,
		key: &'a str,
		value: String,
		ttl: Duration,
	) -> StoreFuture<'a, bool> {
		let mut connection = self.connection.clone();

		Box::pin(async move {
			let reply: Option<String> = redis::cmd("SET")
				.arg(key)
				.arg(value)
				.arg("NX")
				.arg("EX")
				.arg(Self::ttl_seconds(ttl))
				.query_async(&mut connection)
				.await
				.map_err(backend)?;

			Ok(reply.is_some())
		})
	}

	fn delete<'a>(&'a self, key: &'a str) -> StoreFuture<'a, ()> {
		let mut connection = self.connection.clone();

		Box::pin(async move {
			let _: i64 = connection.del(key).await.map_err(backend)?;

			Ok(())
		})
	}

	fn delete_if_equal<'a>(&'a self, key: &'a str, expected: &'a str) -> StoreFuture<'a, bool> {
		let mut connection = self.connection.clone();

		Box::pin(async move {
			let removed: i64 = self
				.guarded_delete
				.key(key)
				.arg(expected)
				.invoke_async(&mut connection)
				.await
				.map_err(backend)?;

			Ok(removed == 1)
		})
	}
}
impl Debug for RedisStore {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("RedisStore").finish_non_exhaustive()
	}
}

fn backend(e: redis::RedisError) -> StoreError {
	StoreError::Backend { message: e.to_string() }
}
