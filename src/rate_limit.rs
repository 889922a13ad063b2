//! Quota bookkeeping for the upstream API.
//!
//! A [`RateLimit`] is a named set of [`IntervalWindow`]s keyed by interval length; it is exceeded
//! as soon as any of its windows is. Limits start *unconfigured* (no windows, every request
//! allowed) until the upstream tells us what they are, and are reconciled against the usage
//! counts the upstream reports on every response.
//!
//! Every operation takes the limit's own lock for its whole duration, and [`acquire_all`] holds
//! the locks of all participating limits while it checks and consumes, so admission stays atomic
//! on a multi-threaded runtime.

pub mod header;
pub mod registry;
pub mod window;

pub use header::*;
pub use registry::*;
pub use window::*;

// crates.io
use parking_lot::MutexGuard;
// self
use crate::{_prelude::*, clock::Clock, error::ConfigError, id::MethodId, region::Region};

// One year; longer windows are not something the upstream publishes.
const MAX_INTERVAL_SECS: u64 = 365 * 24 * 60 * 60;
// Upper bound for windows and retry delays taken from response headers.
const MAX_INTERVAL: Duration = Duration::seconds(MAX_INTERVAL_SECS as i64);

/// Limit family, matching the two header families the upstream reports.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LimitKind {
	/// Application-wide quota shared by every method on a region.
	Application,
	/// Per-method quota.
	Method,
}
impl LimitKind {
	/// Returns a stable label suitable for log fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			LimitKind::Application => "application",
			LimitKind::Method => "method",
		}
	}

	/// Response header enumerating this family's quotas.
	pub const fn limits_header(self) -> &'static str {
		match self {
			LimitKind::Application => "x-app-rate-limit",
			LimitKind::Method => "x-method-rate-limit",
		}
	}

	/// Response header reporting this family's usage.
	pub const fn usage_header(self) -> &'static str {
		match self {
			LimitKind::Application => "x-app-rate-limit-count",
			LimitKind::Method => "x-method-rate-limit-count",
		}
	}

	/// Parses the value of the `X-Rate-Limit-Type` header; other values (e.g. `service`) are not
	/// quotas this crate tracks.
	pub fn from_type_header(value: &str) -> Option<Self> {
		match value.trim() {
			"application" => Some(LimitKind::Application),
			"method" => Some(LimitKind::Method),
			_ => None,
		}
	}
}
impl Display for LimitKind {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// What a limit applies to within a region.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LimitScope {
	/// The application-wide quota.
	Application,
	/// One method's quota.
	Method(MethodId),
}

/// Identity of a [`RateLimit`]: the region it is enforced on plus its scope.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct LimitKey {
	/// Region the quota applies to.
	pub region: Region,
	/// Application-wide or method-specific.
	pub scope: LimitScope,
}
impl LimitKey {
	/// Key for a region's application-wide limit.
	pub fn application(region: Region) -> Self {
		Self { region, scope: LimitScope::Application }
	}

	/// Key for one method's limit on a region.
	pub fn method(region: Region, method: MethodId) -> Self {
		Self { region, scope: LimitScope::Method(method) }
	}

	/// Header family this key is reconciled from.
	pub fn kind(&self) -> LimitKind {
		match self.scope {
			LimitScope::Application => LimitKind::Application,
			LimitScope::Method(_) => LimitKind::Method,
		}
	}
}
impl Display for LimitKey {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		match &self.scope {
			LimitScope::Application => write!(f, "{}/application", self.region),
			LimitScope::Method(method) => write!(f, "{}/method/{method}", self.region),
		}
	}
}

/// Shape of one window: `requests` allowed every `interval_secs` seconds.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WindowSpec {
	/// Requests permitted per interval.
	pub requests: u32,
	/// Interval length in seconds.
	pub interval_secs: u64,
}
impl WindowSpec {
	/// Creates a window spec.
	pub const fn new(requests: u32, interval_secs: u64) -> Self {
		Self { requests, interval_secs }
	}

	/// Interval as a [`Duration`].
	pub fn interval(&self) -> Duration {
		Duration::seconds(i64::try_from(self.interval_secs).unwrap_or(i64::MAX))
	}

	/// Rejects windows that could never admit a request or never reset.
	pub fn validate(&self) -> Result<(), ConfigError> {
		if self.requests == 0 || self.interval_secs == 0 || self.interval_secs > MAX_INTERVAL_SECS {
			return Err(ConfigError::InvalidWindow {
				requests: self.requests,
				interval_secs: self.interval_secs,
			});
		}

		Ok(())
	}
}
impl Display for WindowSpec {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		write!(f, "{}:{}", self.requests, self.interval_secs)
	}
}

/// Coarse state of a [`RateLimit`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RateLimitState {
	/// No window is known yet; requests pass so the real limits can be learned.
	Unconfigured,
	/// Every window has room.
	Active,
	/// At least one window is exhausted.
	Exceeded {
		/// Instant by which every exhausted window will have reset.
		until: OffsetDateTime,
	},
}

#[derive(Debug, Default)]
struct Windows(BTreeMap<u64, IntervalWindow>);
impl Windows {
	fn from_specs(specs: &[WindowSpec], now: OffsetDateTime) -> Self {
		Self(
			specs
				.iter()
				.map(|spec| (spec.interval_secs, IntervalWindow::new(*spec, now)))
				.collect(),
		)
	}

	fn roll(&mut self, now: OffsetDateTime) {
		for window in self.0.values_mut() {
			window.roll(now);
		}
	}

	fn has_capacity(&self) -> bool {
		self.0.values().all(IntervalWindow::has_capacity)
	}

	fn consume(&mut self) {
		for window in self.0.values_mut() {
			window.consume();
		}
	}

	/// Latest reset among exhausted windows.
	fn blocked_until(&self) -> Option<OffsetDateTime> {
		self.0.values().filter(|window| !window.has_capacity()).map(IntervalWindow::resets_at).max()
	}

	fn state(&self) -> RateLimitState {
		if self.0.is_empty() {
			return RateLimitState::Unconfigured;
		}

		match self.blocked_until() {
			Some(until) => RateLimitState::Exceeded { until },
			None => RateLimitState::Active,
		}
	}

	fn same_shape(&self, specs: &[WindowSpec]) -> bool {
		let incoming: BTreeMap<u64, u32> =
			specs.iter().map(|spec| (spec.interval_secs, spec.requests)).collect();

		incoming.len() == self.0.len()
			&& incoming.iter().all(|(interval, requests)| {
				self.0.get(interval).is_some_and(|window| window.max_requests() == *requests)
			})
	}

	fn reshape(&mut self, specs: &[WindowSpec], now: OffsetDateTime) {
		let rebuilt = specs
			.iter()
			.map(|spec| {
				let window = match self.0.get(&spec.interval_secs) {
					Some(existing) => existing.reshaped(*spec),
					None => IntervalWindow::new(*spec, now),
				};

				(spec.interval_secs, window)
			})
			.collect();

		self.0 = rebuilt;
	}
}

/// Named set of interval windows enforced together.
pub struct RateLimit {
	key: LimitKey,
	clock: Arc<dyn Clock>,
	windows: Mutex<Windows>,
}
impl RateLimit {
	/// Creates an unconfigured limit; it admits every request until reconciled.
	pub fn new(key: LimitKey, clock: Arc<dyn Clock>) -> Self {
		Self { key, clock, windows: Mutex::new(Windows::default()) }
	}

	/// Creates a limit pre-seeded with known windows, opened at the clock's current instant.
	pub fn with_windows(key: LimitKey, clock: Arc<dyn Clock>, specs: &[WindowSpec]) -> Self {
		let windows = Windows::from_specs(specs, clock.now());

		Self { key, clock, windows: Mutex::new(windows) }
	}

	/// Identity of this limit.
	pub fn key(&self) -> &LimitKey {
		&self.key
	}

	/// Header family this limit is reconciled from.
	pub fn kind(&self) -> LimitKind {
		self.key.kind()
	}

	/// Returns `true` once at least one window is known.
	pub fn is_configured(&self) -> bool {
		!self.windows.lock().0.is_empty()
	}

	/// Returns `true` if one more request fits into every window.
	pub fn has_capacity(&self) -> bool {
		self.has_capacity_at(self.clock.now())
	}

	/// [`RateLimit::has_capacity`] evaluated at `now`.
	pub fn has_capacity_at(&self, now: OffsetDateTime) -> bool {
		let mut windows = self.windows.lock();

		windows.roll(now);
		windows.has_capacity()
	}

	/// Counts one outgoing request in every window.
	///
	/// Callers that check capacity first should prefer [`RateLimit::try_acquire`] or
	/// [`acquire_all`] so no other caller can slip in between the check and the count.
	pub fn consume(&self) {
		self.consume_at(self.clock.now());
	}

	/// [`RateLimit::consume`] evaluated at `now`.
	pub fn consume_at(&self, now: OffsetDateTime) {
		let mut windows = self.windows.lock();

		windows.roll(now);
		windows.consume();
	}

	/// Checks capacity and counts the request in one step.
	pub fn try_acquire(&self) -> bool {
		acquire_all_at(std::slice::from_ref(&self), self.clock.now()).is_ok()
	}

	/// Current state.
	pub fn state(&self) -> RateLimitState {
		self.state_at(self.clock.now())
	}

	/// [`RateLimit::state`] evaluated at `now`.
	pub fn state_at(&self, now: OffsetDateTime) -> RateLimitState {
		let mut windows = self.windows.lock();

		windows.roll(now);
		windows.state()
	}

	/// How long until every exhausted window has reset; `None` while capacity remains.
	pub fn retry_after_at(&self, now: OffsetDateTime) -> Option<Duration> {
		let mut windows = self.windows.lock();

		windows.roll(now);
		windows.blocked_until().map(|until| until - now)
	}

	/// Copies the current windows, ordered by interval.
	pub fn windows(&self) -> Vec<IntervalWindow> {
		let now = self.clock.now();
		let mut windows = self.windows.lock();

		windows.roll(now);
		windows.0.values().cloned().collect()
	}

	/// Reconciles local bookkeeping from the raw limits/usage headers of one response.
	///
	/// `retry_after_secs` must only be supplied when this limit's family triggered a 429.
	/// Malformed headers are logged and skipped.
	pub fn reconcile_from_headers(
		&self,
		limits_header: Option<&str>,
		usage_header: Option<&str>,
		retry_after_secs: Option<u64>,
	) {
		let limits = limits_header.and_then(|raw| match parse_limit_header(raw) {
			Ok(specs) => Some(specs),
			Err(e) => {
				tracing::warn!(limit = %self.key, error = %e, "ignoring malformed limits header");

				None
			},
		});
		let usage = usage_header.and_then(|raw| match parse_usage_header(raw) {
			Ok(usage) => Some(usage),
			Err(e) => {
				tracing::warn!(limit = %self.key, error = %e, "ignoring malformed usage header");

				None
			},
		});
		let retry_after = retry_after_secs
			.map(|secs| Duration::seconds(i64::try_from(secs).unwrap_or(i64::MAX)));

		self.reconcile_at(self.clock.now(), limits.as_deref(), usage.as_deref(), retry_after);
	}

	/// Reconciles local bookkeeping from parsed headers at `now`.
	///
	/// 1. A different window shape replaces the windows, carrying usage and schedule over for
	///    intervals that still exist.
	/// 2. Reported usage raises local usage (`max(local, reported)`), which makes repeated or
	///    reordered observations converge on the same state.
	/// 3. A retry delay exhausts the window the upstream reports as over quota (or, when none is
	///    reported, the longest window) and moves its reset to `now + retry_after`.
	pub fn reconcile_at(
		&self,
		now: OffsetDateTime,
		limits: Option<&[WindowSpec]>,
		usage: Option<&[WindowUsage]>,
		retry_after: Option<Duration>,
	) {
		let limits = limits.map(|specs| self.valid_specs(specs));
		let retry_after = retry_after.map(|delay| delay.clamp(Duration::ZERO, MAX_INTERVAL));
		let mut windows = self.windows.lock();

		windows.roll(now);

		if let Some(specs) = limits.as_deref().filter(|specs| !specs.is_empty()) {
			if !windows.same_shape(specs) {
				tracing::debug!(
					limit = %self.key,
					windows = %format_specs(specs),
					"rate limit shape changed; rebuilding windows"
				);

				windows.reshape(specs, now);
			}
		}
		if let Some(usage) = usage {
			for reported in usage {
				if let Some(window) = windows.0.get_mut(&reported.interval_secs) {
					window.merge_reported(reported.used);
				}
			}
		}
		if let Some(delay) = retry_after {
			let over_quota = usage.and_then(|usage| {
				usage.iter().find_map(|reported| {
					windows
						.0
						.get(&reported.interval_secs)
						.filter(|window| reported.used > window.max_requests())
						.map(|_| reported.interval_secs)
				})
			});
			let target = over_quota.or_else(|| windows.0.keys().next_back().copied());

			match target.and_then(|interval| windows.0.get_mut(&interval)) {
				Some(window) => {
					window.reschedule(now, delay);

					tracing::debug!(
						limit = %self.key,
						interval_secs = window.interval_secs(),
						retry_after_secs = delay.whole_seconds(),
						"rescheduled window reset after upstream rejection"
					);
				},
				None => tracing::warn!(
					limit = %self.key,
					"retry delay received for a limit with no known windows"
				),
			}
		}
	}

	fn valid_specs(&self, specs: &[WindowSpec]) -> Vec<WindowSpec> {
		specs
			.iter()
			.filter(|spec| match spec.validate() {
				Ok(()) => true,
				Err(e) => {
					tracing::warn!(limit = %self.key, error = %e, "ignoring reported window");

					false
				},
			})
			.copied()
			.collect()
	}
}
impl Debug for RateLimit {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("RateLimit")
			.field("key", &self.key)
			.field("windows", &self.windows.lock().0)
			.finish()
	}
}

/// Atomically checks every limit and, only if all have capacity, counts one request in each.
///
/// On rejection nothing is consumed and the returned value is the longest wait among the
/// exhausted limits. The same limit listed twice is counted once.
pub fn acquire_all(limits: &[Arc<RateLimit>], clock: &dyn Clock) -> Result<(), Option<Duration>> {
	let refs: Vec<&RateLimit> = limits.iter().map(Arc::as_ref).collect();

	acquire_all_at(&refs, clock.now())
}

fn acquire_all_at(limits: &[&RateLimit], now: OffsetDateTime) -> Result<(), Option<Duration>> {
	let mut ordered: Vec<&RateLimit> = limits.to_vec();

	// A fixed lock order keeps concurrent acquisitions over overlapping sets deadlock-free.
	ordered.sort_by(|a, b| {
		a.key.cmp(&b.key).then_with(|| (*a as *const RateLimit).cmp(&(*b as *const RateLimit)))
	});
	ordered.dedup_by(|a, b| std::ptr::eq(*a, *b));

	let mut guards: Vec<MutexGuard<'_, Windows>> =
		ordered.iter().map(|limit| limit.windows.lock()).collect();

	for guard in guards.iter_mut() {
		guard.roll(now);
	}

	if guards.iter().all(|guard| guard.has_capacity()) {
		for guard in guards.iter_mut() {
			guard.consume();
		}

		Ok(())
	} else {
		let until = guards.iter().filter_map(|guard| guard.blocked_until()).max();

		Err(until.map(|until| until - now))
	}
}

fn format_specs(specs: &[WindowSpec]) -> String {
	specs.iter().map(WindowSpec::to_string).collect::<Vec<_>>().join(",")
}
