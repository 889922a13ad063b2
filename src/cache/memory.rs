//! Thread-safe in-memory [`CacheStore`] with lazy expiration.
//!
//! Expired entries are dropped when read. Writes also sweep the whole map once per sweep
//! interval, so keys that are never read again do not accumulate.

// crates.io
use serde_json::Value;
// self
use crate::{
	_prelude::*,
	cache::{CacheFuture, CacheStore},
	clock::Clock,
};

type EntryMap = Arc<RwLock<HashMap<String, CacheEntry>>>;

/// One cached value and its lifetime.
#[derive(Clone, Debug, PartialEq)]
pub struct CacheEntry {
	/// Cached payload.
	pub value: Value,
	/// Instant the value was stored.
	pub stored_at: OffsetDateTime,
	/// Lifetime measured from `stored_at`.
	pub ttl: Duration,
}
impl CacheEntry {
	/// Returns `true` once `ttl` has fully elapsed at `now`.
	pub fn is_expired_at(&self, now: OffsetDateTime) -> bool {
		now - self.stored_at >= self.ttl
	}
}

/// Cache that keeps entries in-process.
#[derive(Clone)]
pub struct MemoryCache {
	clock: Arc<dyn Clock>,
	entries: EntryMap,
	sweep_interval: Duration,
	next_sweep: Arc<Mutex<OffsetDateTime>>,
}
impl MemoryCache {
	/// Default time between full sweeps.
	pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::minutes(10);

	/// Creates an empty cache reading time from `clock`.
	pub fn new(clock: Arc<dyn Clock>) -> Self {
		let next_sweep = clock.now().saturating_add(Self::DEFAULT_SWEEP_INTERVAL);

		Self {
			clock,
			entries: Default::default(),
			sweep_interval: Self::DEFAULT_SWEEP_INTERVAL,
			next_sweep: Arc::new(Mutex::new(next_sweep)),
		}
	}

	/// Sweeps expired entries on the first write after each `interval`.
	pub fn with_sweep_interval(mut self, interval: Duration) -> Self {
		self.sweep_interval = interval;
		*self.next_sweep.lock() = self.clock.now().saturating_add(interval);

		self
	}

	/// Number of stored entries, expired ones included until they are read or swept.
	pub fn len(&self) -> usize {
		self.entries.read().len()
	}

	/// Returns `true` when nothing is stored.
	pub fn is_empty(&self) -> bool {
		self.entries.read().is_empty()
	}

	/// Drops every expired entry; returns how many were removed.
	pub fn purge_expired(&self) -> usize {
		Self::purge_at(&mut self.entries.write(), self.clock.now())
	}

	fn purge_at(entries: &mut HashMap<String, CacheEntry>, now: OffsetDateTime) -> usize {
		let before = entries.len();

		entries.retain(|_, entry| !entry.is_expired_at(now));

		before - entries.len()
	}

	fn store_now(&self, key: String, value: Value, ttl: Duration) {
		let now = self.clock.now();
		let mut entries = self.entries.write();

		entries.insert(key, CacheEntry { value, stored_at: now, ttl });

		let sweep_due = {
			let mut next_sweep = self.next_sweep.lock();

			if now >= *next_sweep {
				*next_sweep = now.saturating_add(self.sweep_interval);

				true
			} else {
				false
			}
		};

		if sweep_due {
			let purged = Self::purge_at(&mut entries, now);

			tracing::debug!(purged, remaining = entries.len(), "swept expired cache entries");
		}
	}

	fn retrieve_now(&self, key: &str) -> Option<Value> {
		let now = self.clock.now();

		{
			let entries = self.entries.read();

			match entries.get(key) {
				Some(entry) if !entry.is_expired_at(now) => return Some(entry.value.clone()),
				Some(_) => {},
				None => return None,
			}
		}

		let mut entries = self.entries.write();

		// Another writer may have refreshed the entry between the two locks.
		if entries.get(key).is_some_and(|entry| entry.is_expired_at(now)) {
			entries.remove(key);

			return None;
		}

		entries.get(key).map(|entry| entry.value.clone())
	}
}
impl Debug for MemoryCache {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("MemoryCache").field("entries", &self.len()).finish()
	}
}
impl CacheStore for MemoryCache {
	fn store(&self, key: String, value: Value, ttl: Duration) -> CacheFuture<'_, ()> {
		self.store_now(key, value, ttl);

		Box::pin(async { Ok(()) })
	}

	fn retrieve<'a>(&'a self, key: &'a str) -> CacheFuture<'a, Option<Value>> {
		let value = self.retrieve_now(key);

		Box::pin(async move { Ok(value) })
	}

	fn remove<'a>(&'a self, key: &'a str) -> CacheFuture<'a, ()> {
		self.entries.write().remove(key);

		Box::pin(async { Ok(()) })
	}
}
