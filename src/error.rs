//! Crate-level error types shared by the governor, lookup path, and leaderboard sinks.

// self
use crate::{_prelude::*, rate_limit::LimitKind};

/// Crate-wide result type alias returning [`Error`] by default.
pub type Result<T, E = Error> = std::result::Result<T, E>;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Canonical error exposed by public APIs.
#[derive(Debug, ThisError)]
pub enum Error {
	/// Local configuration problem.
	#[error(transparent)]
	Config(#[from] ConfigError),
	/// Transport failure (DNS, TCP, TLS, timeout).
	#[error(transparent)]
	Transport(#[from] TransportError),
	/// Snapshot sink failure.
	#[error("{0}")]
	Storage(
		#[from]
		#[source]
		crate::leaderboard::StoreError,
	),
	/// Caller supplied an identifier that failed validation.
	#[error(transparent)]
	Identifier(#[from] crate::id::IdentifierError),

	/// A quota would be (or was) exceeded; no retry is attempted.
	#[error("Rate limit exceeded ({origin}).")]
	RateLimited {
		/// Whether the limit was predicted locally or confirmed by the upstream.
		origin: RateLimitOrigin,
		/// Earliest moment a retry may succeed, when known.
		retry_after: Option<Duration>,
	},
	/// Upstream answered with a non-200 status that is not a recognized rate-limit rejection.
	#[error("Upstream API returned status {status} for {url}.")]
	Upstream {
		/// HTTP status code.
		status: u16,
		/// Raw response body; not necessarily JSON.
		body: String,
		/// Request URL with credentials removed.
		url: String,
	},
	/// A 200 response carried a body that could not be decoded.
	#[error("Upstream API returned a malformed body for {url}.")]
	MalformedBody {
		/// Request URL with credentials removed.
		url: String,
		/// Structured parsing failure.
		#[source]
		source: serde_path_to_error::Error<serde_json::Error>,
	},
}
impl Error {
	/// Returns `true` for both locally predicted and upstream-confirmed rate limiting.
	pub fn is_rate_limited(&self) -> bool {
		matches!(self, Self::RateLimited { .. })
	}

	/// Returns `true` when the upstream reported the subject as missing (HTTP 404).
	pub fn is_not_found(&self) -> bool {
		matches!(self, Self::Upstream { status: 404, .. })
	}

	/// Retry hint carried by [`Error::RateLimited`].
	pub fn retry_after(&self) -> Option<Duration> {
		match self {
			Self::RateLimited { retry_after, .. } => *retry_after,
			_ => None,
		}
	}
}

/// Where a rate-limit rejection was decided.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RateLimitOrigin {
	/// Local bookkeeping predicted the call would exceed a quota; nothing was sent.
	Local,
	/// The upstream answered 429 and named the limit type that was exceeded.
	Upstream {
		/// Limit family named by the upstream.
		kind: LimitKind,
	},
}
impl Display for RateLimitOrigin {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		match self {
			Self::Local => f.write_str("predicted locally"),
			Self::Upstream { kind } => write!(f, "{kind} limit reported by upstream"),
		}
	}
}

/// Configuration and validation failures.
#[derive(Debug, ThisError)]
pub enum ConfigError {
	/// HTTP client could not be constructed.
	#[error("HTTP client could not be constructed.")]
	HttpClientBuild {
		/// Underlying transport builder failure.
		#[source]
		source: BoxError,
	},
	/// The API key is missing.
	#[error("An API key is required.")]
	MissingApiKey,
	/// The configured API base or a derived request URL is invalid.
	#[error("Request URL is invalid.")]
	InvalidUrl {
		/// Underlying parsing failure.
		#[source]
		source: url::ParseError,
	},
	/// The configured API base cannot carry path segments.
	#[error("API base `{0}` cannot be used as a base URL.")]
	CannotBeABase(String),
	/// Leaderboard sizes are inconsistent.
	#[error("Leaderboard display size {display} must be between 1 and the tracked size {track}.")]
	LeaderboardSizes {
		/// Entries shown externally.
		display: usize,
		/// Entries tracked per category.
		track: usize,
	},
	/// A window definition has a zero interval or zero quota.
	#[error("Rate limit window {requests}:{interval_secs} needs a positive interval and quota.")]
	InvalidWindow {
		/// Requests allowed per interval.
		requests: u32,
		/// Interval length in seconds.
		interval_secs: u64,
	},
	/// A configuration file could not be read.
	#[error("Failed to read configuration file {path}.")]
	Read {
		/// File path.
		path: String,
		/// Underlying IO failure.
		#[source]
		source: std::io::Error,
	},
	/// A configuration file could not be parsed.
	#[error("Failed to parse configuration file {path}.")]
	Parse {
		/// File path.
		path: String,
		/// Structured parsing failure.
		#[source]
		source: serde_path_to_error::Error<serde_json::Error>,
	},
}
impl ConfigError {
	/// Wraps a transport's builder failure inside [`ConfigError`].
	pub fn http_client_build(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::HttpClientBuild { source: Box::new(src) }
	}
}
impl From<url::ParseError> for ConfigError {
	fn from(source: url::ParseError) -> Self {
		Self::InvalidUrl { source }
	}
}
#[cfg(feature = "reqwest")]
impl From<ReqwestError> for ConfigError {
	fn from(e: ReqwestError) -> Self {
		Self::http_client_build(e)
	}
}

/// Transport-level failures (network, IO, timeouts).
#[derive(Debug, ThisError)]
pub enum TransportError {
	/// Underlying HTTP client reported a network failure.
	#[error("Network error occurred while calling the upstream API.")]
	Network {
		/// Transport-specific network error.
		#[source]
		source: BoxError,
	},
	/// The request did not complete in time.
	#[error("Upstream API request timed out.")]
	Timeout,
	/// Underlying IO failure surfaced during transport.
	#[error("I/O error occurred while calling the upstream API.")]
	Io(#[from] std::io::Error),
}
impl TransportError {
	/// Wraps a transport-specific network error.
	pub fn network(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::Network { source: Box::new(src) }
	}
}
#[cfg(feature = "reqwest")]
impl From<ReqwestError> for TransportError {
	fn from(e: ReqwestError) -> Self {
		if e.is_timeout() { Self::Timeout } else { Self::network(e) }
	}
}
