//! Transport primitives for upstream API calls.
//!
//! [`UpstreamHttpClient`] is the governor's only dependency on an HTTP stack. It performs one
//! `GET` and hands back the status, headers, and raw body without interpreting any of them; status
//! classification, header reconciliation, and decoding all happen in the governor. Transport
//! failures (DNS, TCP, TLS, timeouts) surface as [`TransportError`].

// std
use std::ops::Deref;
// self
use crate::{_prelude::*, error::TransportError};

/// Boxed future returned by [`UpstreamHttpClient::get`].
pub type TransportFuture<'a> =
	Pin<Box<dyn Future<Output = Result<UpstreamResponse, TransportError>> + 'a + Send>>;

/// Abstraction over HTTP transports able to issue upstream `GET` requests.
///
/// Implementations must be `Send + Sync + 'static` so one transport can back a shared
/// governor, and the futures they return must be `Send` so callers can spawn them on a
/// multi-threaded runtime.
pub trait UpstreamHttpClient
where
	Self: 'static + Send + Sync,
{
	/// Performs `request` and returns the response, whatever its status.
	fn get(&self, request: UpstreamRequest) -> TransportFuture<'_>;
}

/// One outbound `GET`.
#[derive(Clone, Debug)]
pub struct UpstreamRequest {
	/// Absolute request URL.
	pub url: Url,
	/// Extra request headers (credentials included).
	pub headers: Vec<(String, String)>,
	/// Per-request timeout; `None` leaves the transport's default in place.
	pub timeout: Option<Duration>,
}
impl UpstreamRequest {
	/// Creates a request for `url` with no extra headers.
	pub fn new(url: Url) -> Self {
		Self { url, headers: Vec::new(), timeout: None }
	}

	/// Adds a request header.
	pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
		self.headers.push((name.into(), value.into()));

		self
	}

	/// Sets the per-request timeout.
	pub fn with_timeout(mut self, timeout: Duration) -> Self {
		self.timeout = Some(timeout);

		self
	}
}

/// Response headers with case-insensitive lookup.
///
/// Names are stored lowercased. Repeated headers keep the last value seen.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ResponseHeaders(HashMap<String, String>);
impl ResponseHeaders {
	/// Builds headers from `(name, value)` pairs.
	pub fn from_pairs<I, N, V>(pairs: I) -> Self
	where
		I: IntoIterator<Item = (N, V)>,
		N: AsRef<str>,
		V: Into<String>,
	{
		let mut headers = Self::default();

		for (name, value) in pairs {
			headers.insert(name, value);
		}

		headers
	}

	/// Inserts or replaces a header.
	pub fn insert(&mut self, name: impl AsRef<str>, value: impl Into<String>) {
		self.0.insert(name.as_ref().to_ascii_lowercase(), value.into());
	}

	/// Returns the value of `name`, ignoring case.
	pub fn get(&self, name: &str) -> Option<&str> {
		self.0.get(&name.to_ascii_lowercase()).map(String::as_str)
	}

	/// Number of stored headers.
	pub fn len(&self) -> usize {
		self.0.len()
	}

	/// Returns `true` when no header is stored.
	pub fn is_empty(&self) -> bool {
		self.0.is_empty()
	}
}

/// Raw upstream response.
#[derive(Clone, Debug)]
pub struct UpstreamResponse {
	/// URL that produced the response.
	pub url: Url,
	/// HTTP status code.
	pub status: u16,
	/// Response headers.
	pub headers: ResponseHeaders,
	/// Undecoded body.
	pub body: Vec<u8>,
}
impl UpstreamResponse {
	/// Body as text, replacing invalid UTF-8.
	pub fn body_text(&self) -> String {
		String::from_utf8_lossy(&self.body).into_owned()
	}
}

/// Thin wrapper around [`ReqwestClient`] so shared HTTP behavior lives in one place.
#[cfg(feature = "reqwest")]
#[derive(Clone, Debug, Default)]
pub struct ReqwestHttpClient(pub ReqwestClient);
#[cfg(feature = "reqwest")]
impl ReqwestHttpClient {
	/// Wraps an existing reqwest [`ReqwestClient`].
	pub fn with_client(client: ReqwestClient) -> Self {
		Self(client)
	}

	async fn execute(
		client: ReqwestClient,
		request: UpstreamRequest,
	) -> Result<UpstreamResponse, TransportError> {
		let mut builder = client.get(request.url);

		for (name, value) in &request.headers {
			builder = builder.header(name.as_str(), value.as_str());
		}
		if let Some(timeout) = request.timeout.and_then(|t| std::time::Duration::try_from(t).ok())
		{
			builder = builder.timeout(timeout);
		}

		let response = builder.send().await?;
		let url = response.url().clone();
		let status = response.status().as_u16();
		let headers = ResponseHeaders::from_pairs(response.headers().iter().filter_map(
			|(name, value)| Some((name.as_str(), value.to_str().ok()?)),
		));
		let body = response.bytes().await?.to_vec();

		Ok(UpstreamResponse { url, status, headers, body })
	}
}
#[cfg(feature = "reqwest")]
impl AsRef<ReqwestClient> for ReqwestHttpClient {
	fn as_ref(&self) -> &ReqwestClient {
		&self.0
	}
}
#[cfg(feature = "reqwest")]
impl Deref for ReqwestHttpClient {
	type Target = ReqwestClient;

	fn deref(&self) -> &Self::Target {
		&self.0
	}
}
#[cfg(feature = "reqwest")]
impl UpstreamHttpClient for ReqwestHttpClient {
	fn get(&self, request: UpstreamRequest) -> TransportFuture<'_> {
		let client = self.0.clone();

		Box::pin(Self::execute(client, request))
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn header_lookup_ignores_case() {
		let headers =
			ResponseHeaders::from_pairs([("X-App-Rate-Limit", "20:1"), ("retry-after", "3")]);

		assert_eq!(headers.get("x-app-rate-limit"), Some("20:1"));
		assert_eq!(headers.get("Retry-After"), Some("3"));
		assert_eq!(headers.get("x-method-rate-limit"), None);
		assert_eq!(headers.len(), 2);
	}

	#[test]
	fn request_builder_collects_headers() {
		let url =
			Url::parse("https://euw1.api.riotgames.com/x").expect("URL fixture should parse.");
		let request = UpstreamRequest::new(url)
			.with_header("X-Riot-Token", "key")
			.with_timeout(Duration::seconds(3));

		assert_eq!(request.headers, vec![("X-Riot-Token".to_owned(), "key".to_owned())]);
		assert_eq!(request.timeout, Some(Duration::seconds(3)));
	}
}
