//! Best-effort TTL caching of upstream responses.
//!
//! [`CacheStore`] is the storage contract; [`MemoryCache`] is the in-process implementation.
//! [`ResponseCache`] sits in front of a store and never lets a storage or (de)serialization
//! failure reach the caller: failures are logged and treated as a miss.

pub mod memory;

pub use memory::{CacheEntry, MemoryCache};

// crates.io
use serde::de::DeserializeOwned;
use serde_json::Value;
// self
use crate::{_prelude::*, clock::Clock};

/// Boxed future returned by [`CacheStore`] operations.
pub type CacheFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, CacheError>> + 'a + Send>>;

/// Storage backend contract for cached responses.
pub trait CacheStore
where
	Self: Send + Sync,
{
	/// Stores `value` under `key` for `ttl`, replacing any previous entry.
	fn store(&self, key: String, value: Value, ttl: Duration) -> CacheFuture<'_, ()>;

	/// Returns the live value under `key`; expired entries read as absent.
	fn retrieve<'a>(&'a self, key: &'a str) -> CacheFuture<'a, Option<Value>>;

	/// Drops the entry under `key`, if any.
	fn remove<'a>(&'a self, key: &'a str) -> CacheFuture<'a, ()>;
}

/// Error type produced by [`CacheStore`] implementations.
#[derive(Clone, Debug, PartialEq, Eq, ThisError)]
pub enum CacheError {
	/// Backend-level failure for the storage engine.
	#[error("Cache backend failure: {message}.")]
	Backend {
		/// Human-readable error payload.
		message: String,
	},
}

/// Typed, failure-tolerant front for a [`CacheStore`].
#[derive(Clone)]
pub struct ResponseCache(Arc<dyn CacheStore>);
impl ResponseCache {
	/// Wraps an existing store.
	pub fn new(store: Arc<dyn CacheStore>) -> Self {
		Self(store)
	}

	/// Creates a cache backed by a [`MemoryCache`] reading time from `clock`.
	pub fn in_memory(clock: Arc<dyn Clock>) -> Self {
		Self::new(Arc::new(MemoryCache::new(clock)))
	}

	/// Returns the cached value for `key`, or `None` on a miss or any failure.
	pub async fn get<T>(&self, key: &str) -> Option<T>
	where
		T: DeserializeOwned,
	{
		let value = match self.0.retrieve(key).await {
			Ok(value) => value?,
			Err(e) => {
				tracing::warn!(key, error = %e, "cache retrieve failed; treating as miss");

				return None;
			},
		};

		match serde_json::from_value(value) {
			Ok(typed) => Some(typed),
			Err(e) => {
				tracing::warn!(key, error = %e, "cached value has an unexpected shape; evicting");

				if let Err(e) = self.0.remove(key).await {
					tracing::warn!(key, error = %e, "cache eviction failed");
				}

				None
			},
		}
	}

	/// Caches `value` under `key` for `ttl`; failures are logged and otherwise ignored.
	pub async fn put<T>(&self, key: &str, value: &T, ttl: Duration)
	where
		T: Serialize,
	{
		let value = match serde_json::to_value(value) {
			Ok(value) => value,
			Err(e) => {
				tracing::warn!(key, error = %e, "response could not be serialized for caching");

				return;
			},
		};

		if let Err(e) = self.0.store(key.to_owned(), value, ttl).await {
			tracing::warn!(key, error = %e, "cache store failed");
		}
	}
}
impl Debug for ResponseCache {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str("ResponseCache(..)")
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;
	use crate::clock::ManualClock;

	struct BrokenStore;
	impl CacheStore for BrokenStore {
		fn store(&self, _: String, _: Value, _: Duration) -> CacheFuture<'_, ()> {
			Box::pin(async { Err(CacheError::Backend { message: "read-only".into() }) })
		}

		fn retrieve<'a>(&'a self, _: &'a str) -> CacheFuture<'a, Option<Value>> {
			Box::pin(async { Err(CacheError::Backend { message: "offline".into() }) })
		}

		fn remove<'a>(&'a self, _: &'a str) -> CacheFuture<'a, ()> {
			Box::pin(async { Ok(()) })
		}
	}

	#[derive(Debug, PartialEq, Serialize, Deserialize)]
	struct Summoner {
		puuid: String,
		level: u32,
	}

	fn clock() -> Arc<ManualClock> {
		Arc::new(ManualClock::new(time::macros::datetime!(2025-11-10 12:00 UTC)))
	}

	#[tokio::test]
	async fn entry_expires_after_ttl() {
		let clock = clock();
		let cache = ResponseCache::in_memory(clock.clone());
		let value = Summoner { puuid: "p-1".into(), level: 30 };

		cache.put("summoner/EUW:faker", &value, Duration::seconds(1)).await;

		assert_eq!(cache.get::<Summoner>("summoner/EUW:faker").await, Some(value));

		clock.advance(Duration::milliseconds(1_100));

		assert_eq!(cache.get::<Summoner>("summoner/EUW:faker").await, None);
	}

	#[tokio::test]
	async fn shape_mismatch_is_a_miss() {
		let cache = ResponseCache::in_memory(clock());

		cache.put("k", &"not a summoner", Duration::minutes(1)).await;

		assert_eq!(cache.get::<Summoner>("k").await, None);
		assert_eq!(cache.get::<String>("k").await, None);
	}

	#[tokio::test]
	async fn backend_failures_are_swallowed() {
		let cache = ResponseCache::new(Arc::new(BrokenStore));

		cache.put("k", &1_u8, Duration::minutes(1)).await;

		assert_eq!(cache.get::<u8>("k").await, None);
	}
}
