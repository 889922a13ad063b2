//! Observability helpers for governed fetches and lookups.
//!
//! Spans are named `mastery_lookup.op` and carry the `op` (operation) and `stage` (call site)
//! fields. Enable the `metrics` feature to increment the `mastery_lookup_fetch_total` counter for
//! every governed fetch, labeled by `outcome`.

mod metrics;
mod tracing;

pub use metrics::*;
pub use tracing::*;

// self
use crate::_prelude::*;

/// Operations instrumented by the crate.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum OpKind {
	/// A governed upstream fetch.
	Fetch,
	/// A full player lookup (summoner plus masteries plus leaderboard updates).
	Lookup,
	/// A leaderboard snapshot write.
	Snapshot,
}
impl OpKind {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			OpKind::Fetch => "fetch",
			OpKind::Lookup => "lookup",
			OpKind::Snapshot => "snapshot",
		}
	}
}
impl Display for OpKind {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// How a governed fetch ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FetchOutcome {
	/// Served from the cache; nothing was sent.
	CacheHit,
	/// Upstream answered 200 and the body decoded.
	Success,
	/// Rejected locally or by a recognized 429.
	RateLimited,
	/// Upstream answered with any other non-200 status.
	UpstreamError,
	/// The request never produced a response.
	TransportError,
	/// A 200 body failed to decode.
	Malformed,
}
impl FetchOutcome {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			FetchOutcome::CacheHit => "cache_hit",
			FetchOutcome::Success => "success",
			FetchOutcome::RateLimited => "rate_limited",
			FetchOutcome::UpstreamError => "upstream_error",
			FetchOutcome::TransportError => "transport_error",
			FetchOutcome::Malformed => "malformed",
		}
	}

	/// Classifies a failed fetch.
	pub fn of_error(error: &Error) -> Self {
		match error {
			Error::RateLimited { .. } => FetchOutcome::RateLimited,
			Error::Transport(_) => FetchOutcome::TransportError,
			Error::MalformedBody { .. } => FetchOutcome::Malformed,
			_ => FetchOutcome::UpstreamError,
		}
	}
}
impl Display for FetchOutcome {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}
