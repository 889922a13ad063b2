//! Lazily populated table of every [`RateLimit`] the process knows about.

// self
use crate::{
	_prelude::*,
	clock::Clock,
	config::InitialRateLimits,
	id::MethodId,
	rate_limit::{IntervalWindow, LimitKey, LimitScope, RateLimit, RateLimitState},
	region::Region,
};

type LimitMap = RwLock<HashMap<LimitKey, Arc<RateLimit>>>;

/// Point-in-time view of one limit, for diagnostics.
#[derive(Clone, Debug)]
pub struct LimitStatus {
	/// Limit identity.
	pub key: LimitKey,
	/// Coarse state at the time of the snapshot.
	pub state: RateLimitState,
	/// Window details ordered by interval.
	pub windows: Vec<IntervalWindow>,
}

/// Owns one [`RateLimit`] per region (application scope) and per region and method.
///
/// Limits are created on first use. Keys named in the seed configuration start with those
/// windows; every other key starts unconfigured and learns its shape from response headers.
pub struct RateLimitRegistry {
	clock: Arc<dyn Clock>,
	seed: InitialRateLimits,
	limits: LimitMap,
}
impl RateLimitRegistry {
	/// Creates an empty registry where every limit starts unconfigured.
	pub fn new(clock: Arc<dyn Clock>) -> Self {
		Self::with_config(clock, &InitialRateLimits::default())
	}

	/// Creates a registry that seeds newly created limits from `seed`.
	pub fn with_config(clock: Arc<dyn Clock>, seed: &InitialRateLimits) -> Self {
		Self { clock, seed: seed.clone(), limits: RwLock::new(HashMap::new()) }
	}

	/// Clock shared by every limit in this registry.
	pub fn clock(&self) -> &Arc<dyn Clock> {
		&self.clock
	}

	/// Returns the limit for `key`, creating it on first use.
	pub fn get(&self, key: &LimitKey) -> Arc<RateLimit> {
		if let Some(limit) = self.limits.read().get(key) {
			return limit.clone();
		}

		let mut limits = self.limits.write();

		limits
			.entry(key.clone())
			.or_insert_with(|| {
				let specs = match &key.scope {
					LimitScope::Application => self.seed.application.as_slice(),
					LimitScope::Method(method) =>
						self.seed.methods.get(method).map(Vec::as_slice).unwrap_or_default(),
				};

				tracing::debug!(limit = %key, seeded = !specs.is_empty(), "registered rate limit");

				Arc::new(RateLimit::with_windows(key.clone(), self.clock.clone(), specs))
			})
			.clone()
	}

	/// Application-wide limit for `region`.
	pub fn application(&self, region: Region) -> Arc<RateLimit> {
		self.get(&LimitKey::application(region))
	}

	/// Limit for `method` on `region`.
	pub fn method(&self, region: Region, method: &MethodId) -> Arc<RateLimit> {
		self.get(&LimitKey::method(region, method.clone()))
	}

	/// Both limits a call to `method` on `region` counts against: application first.
	pub fn limits_for(&self, region: Region, method: &MethodId) -> Vec<Arc<RateLimit>> {
		vec![self.application(region), self.method(region, method)]
	}

	/// Snapshots every known limit, ordered by key.
	pub fn status(&self) -> Vec<LimitStatus> {
		let now = self.clock.now();
		let mut limits: Vec<Arc<RateLimit>> = self.limits.read().values().cloned().collect();

		limits.sort_by(|a, b| a.key().cmp(b.key()));
		limits
			.into_iter()
			.map(|limit| LimitStatus {
				key: limit.key().clone(),
				state: limit.state_at(now),
				windows: limit.windows(),
			})
			.collect()
	}
}
impl Debug for RateLimitRegistry {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("RateLimitRegistry").field("limits", &self.limits.read().len()).finish()
	}
}
