//! Rate limit header parsing.
//!
//! The upstream describes each limit family with two headers of the same shape,
//! `requests:interval,requests:interval,...`: one enumerating the quota per interval, the other
//! reporting how many requests it has counted per interval so far. A 429 additionally names the
//! exceeded family and carries a numeric `Retry-After`.

// self
use crate::{
	_prelude::*,
	http::ResponseHeaders,
	rate_limit::{LimitKind, WindowSpec},
};

/// Header naming the limit family that triggered a 429.
pub const RATE_LIMIT_TYPE: &str = "x-rate-limit-type";
/// Header carrying the retry delay in seconds.
pub const RETRY_AFTER: &str = "retry-after";

/// Usage the upstream reports for one interval.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WindowUsage {
	/// Requests counted so far in the interval.
	pub used: u32,
	/// Interval length in seconds.
	pub interval_secs: u64,
}

/// Error raised for a header segment that is not `number:number`.
#[derive(Clone, Debug, PartialEq, Eq, ThisError)]
#[error("Malformed rate limit header segment `{segment}`.")]
pub struct HeaderParseError {
	/// Offending segment.
	pub segment: String,
}

/// Parses a limits header such as `20:1,100:120` into window definitions.
///
/// An empty header yields no windows. Whitespace around segments is ignored.
pub fn parse_limit_header(raw: &str) -> Result<Vec<WindowSpec>, HeaderParseError> {
	parse_pairs(raw).map(|pairs| {
		pairs
			.into_iter()
			.map(|(requests, interval_secs)| WindowSpec { requests, interval_secs })
			.collect()
	})
}

/// Parses a usage (count) header such as `3:1,41:120`.
pub fn parse_usage_header(raw: &str) -> Result<Vec<WindowUsage>, HeaderParseError> {
	parse_pairs(raw).map(|pairs| {
		pairs
			.into_iter()
			.map(|(used, interval_secs)| WindowUsage { used, interval_secs })
			.collect()
	})
}

fn parse_pairs(raw: &str) -> Result<Vec<(u32, u64)>, HeaderParseError> {
	raw.split(',')
		.map(str::trim)
		.filter(|segment| !segment.is_empty())
		.map(|segment| {
			let malformed = || HeaderParseError { segment: segment.to_owned() };
			let (count, interval) = segment.split_once(':').ok_or_else(malformed)?;
			let count = count.trim().parse::<u32>().map_err(|_| malformed())?;
			let interval = interval.trim().parse::<u64>().map_err(|_| malformed())?;

			Ok((count, interval))
		})
		.collect()
}

/// Rate limit metadata extracted from one upstream response.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RateLimitHeaders {
	/// Raw application limits header.
	pub app_limits: Option<String>,
	/// Raw application usage header.
	pub app_usage: Option<String>,
	/// Raw method limits header.
	pub method_limits: Option<String>,
	/// Raw method usage header.
	pub method_usage: Option<String>,
	/// Limit family named by a 429, if recognized.
	pub limit_type: Option<LimitKind>,
	/// Raw `Retry-After` value, if present.
	pub retry_after_raw: Option<String>,
}
impl RateLimitHeaders {
	/// Extracts the rate limit headers from a response.
	pub fn from_headers(headers: &ResponseHeaders) -> Self {
		let owned = |name: &str| headers.get(name).map(str::to_owned);

		Self {
			app_limits: owned(LimitKind::Application.limits_header()),
			app_usage: owned(LimitKind::Application.usage_header()),
			method_limits: owned(LimitKind::Method.limits_header()),
			method_usage: owned(LimitKind::Method.usage_header()),
			limit_type: headers.get(RATE_LIMIT_TYPE).and_then(LimitKind::from_type_header),
			retry_after_raw: owned(RETRY_AFTER),
		}
	}

	/// Limits header for `kind`.
	pub fn limits(&self, kind: LimitKind) -> Option<&str> {
		match kind {
			LimitKind::Application => self.app_limits.as_deref(),
			LimitKind::Method => self.method_limits.as_deref(),
		}
	}

	/// Usage header for `kind`.
	pub fn usage(&self, kind: LimitKind) -> Option<&str> {
		match kind {
			LimitKind::Application => self.app_usage.as_deref(),
			LimitKind::Method => self.method_usage.as_deref(),
		}
	}

	/// Returns `true` when the response carries either header for `kind`.
	pub fn mentions(&self, kind: LimitKind) -> bool {
		self.limits(kind).is_some() || self.usage(kind).is_some()
	}

	/// `Retry-After` as whole seconds; `None` when absent or not a plain number.
	pub fn retry_after_secs(&self) -> Option<u64> {
		self.retry_after_raw.as_deref().and_then(|raw| raw.trim().parse::<u64>().ok())
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn parses_limits_in_order() {
		let windows = parse_limit_header("20:1,100:120").expect("Header should parse.");

		assert_eq!(
			windows,
			vec![
				WindowSpec { requests: 20, interval_secs: 1 },
				WindowSpec { requests: 100, interval_secs: 120 },
			]
		);
	}

	#[test]
	fn tolerates_whitespace_and_empty_segments() {
		let usage = parse_usage_header(" 3:1 , 41:120,").expect("Header should parse.");

		assert_eq!(
			usage,
			vec![
				WindowUsage { used: 3, interval_secs: 1 },
				WindowUsage { used: 41, interval_secs: 120 },
			]
		);
		assert!(parse_limit_header("").expect("Empty header should parse.").is_empty());
	}

	#[test]
	fn rejects_malformed_segments() {
		let err = parse_limit_header("20:1,oops").expect_err("Segment without colon must fail.");

		assert_eq!(err.segment, "oops");
		assert!(parse_limit_header("20:-1").is_err());
		assert!(parse_usage_header("x:1").is_err());
	}

	#[test]
	fn extracts_typed_fields_from_response_headers() {
		let headers = ResponseHeaders::from_pairs([
			("X-App-Rate-Limit", "20:1,100:120"),
			("X-App-Rate-Limit-Count", "21:1,30:120"),
			("X-Rate-Limit-Type", "application"),
			("Retry-After", "4"),
		]);
		let parsed = RateLimitHeaders::from_headers(&headers);

		assert_eq!(parsed.limits(LimitKind::Application), Some("20:1,100:120"));
		assert_eq!(parsed.usage(LimitKind::Application), Some("21:1,30:120"));
		assert!(!parsed.mentions(LimitKind::Method));
		assert_eq!(parsed.limit_type, Some(LimitKind::Application));
		assert_eq!(parsed.retry_after_secs(), Some(4));
	}

	#[test]
	fn non_numeric_retry_after_is_ignored() {
		let headers = ResponseHeaders::from_pairs([
			("x-rate-limit-type", "service"),
			("retry-after", "Wed, 21 Oct 2015 07:28:00 GMT"),
		]);
		let parsed = RateLimitHeaders::from_headers(&headers);

		assert_eq!(parsed.limit_type, None);
		assert_eq!(parsed.retry_after_secs(), None);
		assert!(parsed.retry_after_raw.is_some());
	}
}
