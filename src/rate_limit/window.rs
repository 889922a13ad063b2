//! A single rolling quota window (e.g. 20 requests every second).
//!
//! Resets are evaluated lazily: whenever the window is touched at `now`, every reset whose target
//! instant has passed is applied. The next target is always derived from the previous *target*
//! rather than from the moment the reset was observed, so late observations never make the
//! schedule drift.

// self
use crate::{_prelude::*, rate_limit::WindowSpec};

/// Usage within one interval of a [`RateLimit`](crate::rate_limit::RateLimit).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IntervalWindow {
	interval: Duration,
	max_requests: u32,
	used_requests: u32,
	window_start: OffsetDateTime,
	resets_at: OffsetDateTime,
}
impl IntervalWindow {
	/// Opens a fresh window at `now` with no recorded usage.
	pub fn new(spec: WindowSpec, now: OffsetDateTime) -> Self {
		let interval = spec.interval();

		Self {
			interval,
			max_requests: spec.requests,
			used_requests: 0,
			window_start: now,
			resets_at: now.saturating_add(interval),
		}
	}

	/// Window length.
	pub fn interval(&self) -> Duration {
		self.interval
	}

	/// Window length in whole seconds.
	pub fn interval_secs(&self) -> u64 {
		self.interval.whole_seconds().unsigned_abs()
	}

	/// Requests permitted per interval.
	pub fn max_requests(&self) -> u32 {
		self.max_requests
	}

	/// Requests counted against the current interval (may exceed the quota after reconciliation).
	pub fn used_requests(&self) -> u32 {
		self.used_requests
	}

	/// Instant the current interval began.
	pub fn window_start(&self) -> OffsetDateTime {
		self.window_start
	}

	/// Instant the usage count is next cleared.
	pub fn resets_at(&self) -> OffsetDateTime {
		self.resets_at
	}

	/// Shape of this window.
	pub fn spec(&self) -> WindowSpec {
		WindowSpec { requests: self.max_requests, interval_secs: self.interval_secs() }
	}

	/// Returns `true` while another request fits into the current interval.
	pub fn has_capacity(&self) -> bool {
		self.used_requests < self.max_requests
	}

	/// Applies every reset that was due at or before `now`; returns `true` if one fired.
	pub fn roll(&mut self, now: OffsetDateTime) -> bool {
		if now < self.resets_at {
			return false;
		}

		let interval_ns = self.interval.whole_nanoseconds().max(1);
		let overdue_ns = (now - self.resets_at).whole_nanoseconds();
		let missed = overdue_ns / interval_ns;
		let last_target = i64::try_from(missed * interval_ns)
			.ok()
			.and_then(|ns| self.resets_at.checked_add(Duration::nanoseconds(ns)))
			.unwrap_or(now);

		self.window_start = last_target;
		self.resets_at = last_target.saturating_add(self.interval);
		self.used_requests = 0;

		true
	}

	/// Counts one outgoing request.
	pub fn consume(&mut self) {
		self.used_requests = self.used_requests.saturating_add(1);
	}

	/// Raises the local count to the upstream's view when the upstream has seen more requests.
	///
	/// Counts never move down here: concurrent responses may report stale values, and the larger
	/// count is the safe one.
	pub fn merge_reported(&mut self, reported: u32) {
		self.used_requests = self.used_requests.max(reported);
	}

	/// Marks the window exhausted and moves its next reset to `now + delay`.
	///
	/// Later resets continue every interval from the rescheduled instant.
	pub fn reschedule(&mut self, now: OffsetDateTime, delay: Duration) {
		self.used_requests = self.used_requests.max(self.max_requests);
		self.resets_at = now.saturating_add(delay);
	}

	/// Builds a window with `spec`'s shape that inherits this window's usage and schedule.
	pub(crate) fn reshaped(&self, spec: WindowSpec) -> Self {
		Self { max_requests: spec.requests, ..self.clone() }
	}
}
