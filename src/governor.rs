//! Quota-aware, cached access to the upstream API.
//!
//! A governed fetch runs these steps in order:
//!
//! 1. Serve from the [`ResponseCache`] when possible; a hit sends nothing and consumes no quota.
//! 2. Check every attached [`RateLimit`] and consume one request from each, as one atomic step
//!    ([`acquire_all`]). Any exhausted limit fails the call immediately with
//!    [`Error::RateLimited`]; there is no waiting or retrying.
//! 3. Send the request. Quota consumed for a request that then fails in transport is not
//!    refunded.
//! 4. Reconcile each attached limit from the response headers of its own family.
//! 5. Classify: a 200 is decoded and cached; a 429 naming an attached limit family with a numeric
//!    `Retry-After` is a rate-limit rejection; everything else is [`Error::Upstream`].
//!
//! Concurrent fetches of the same cache key are serialized so only one of them reaches the
//! upstream while the others are answered from the cache.

// crates.io
use serde::de::DeserializeOwned;
// self
use crate::{
	_prelude::*,
	cache::ResponseCache,
	clock::{self, Clock},
	config::{API_KEY_HEADER, Config},
	error::{ConfigError, RateLimitOrigin, TransportError},
	http::{UpstreamHttpClient, UpstreamRequest, UpstreamResponse},
	id::MethodId,
	obs::{self, FetchOutcome, LookupSpan, OpKind},
	rate_limit::{RateLimit, RateLimitHeaders, RateLimitRegistry, acquire_all},
	region::Region,
};
#[cfg(feature = "reqwest")] use crate::http::ReqwestHttpClient;

type FetchGuards = Arc<Mutex<HashMap<String, Arc<AsyncMutex<()>>>>>;

#[cfg(feature = "reqwest")]
/// Governor specialized for the crate's default reqwest transport.
pub type ReqwestGovernor = Governor<ReqwestHttpClient>;

/// Fronts the upstream API with caching and quota enforcement.
pub struct Governor<C>
where
	C: ?Sized + UpstreamHttpClient,
{
	http_client: Arc<C>,
	clock: Arc<dyn Clock>,
	registry: Arc<RateLimitRegistry>,
	cache: ResponseCache,
	config: Config,
	fetch_guards: FetchGuards,
}
impl<C> Governor<C>
where
	C: ?Sized + UpstreamHttpClient,
{
	/// Starts building a governor on top of `http_client`.
	pub fn builder(http_client: impl Into<Arc<C>>) -> GovernorBuilder<C> {
		GovernorBuilder {
			http_client: http_client.into(),
			clock: None,
			registry: None,
			cache: None,
			config: None,
		}
	}

	/// Clock every time-dependent decision reads from.
	pub fn clock(&self) -> &Arc<dyn Clock> {
		&self.clock
	}

	/// Registry holding the limits this governor enforces.
	pub fn registry(&self) -> &Arc<RateLimitRegistry> {
		&self.registry
	}

	/// Response cache consulted before every request.
	pub fn cache(&self) -> &ResponseCache {
		&self.cache
	}

	/// Active configuration.
	pub fn config(&self) -> &Config {
		&self.config
	}

	/// Limits a call to `method` on `region` counts against.
	pub fn limits_for(&self, region: Region, method: &MethodId) -> Vec<Arc<RateLimit>> {
		self.registry.limits_for(region, method)
	}

	/// Builds the request URL for `segments` on `region`, percent-encoding each segment.
	pub fn url_for(&self, region: Region, segments: &[&str]) -> Result<Url> {
		let mut url = self.config.base_url(region)?;

		if url.cannot_be_a_base() {
			return Err(ConfigError::CannotBeABase(url.to_string()).into());
		}
		if let Ok(mut path) = url.path_segments_mut() {
			path.pop_if_empty().extend(segments);
		}

		Ok(url)
	}

	/// Governed `GET` of `url` through the configured transport, decoding the body as `T`.
	///
	/// The API key header and request timeout from [`Config`] are applied.
	pub async fn fetch<T>(
		&self,
		cache_key: &str,
		limits: &[Arc<RateLimit>],
		ttl: Duration,
		url: Url,
	) -> Result<T>
	where
		T: Serialize + DeserializeOwned,
	{
		let request = UpstreamRequest::new(url)
			.with_header(API_KEY_HEADER, self.config.api_key.as_str())
			.with_timeout(self.config.request_timeout());

		self.fetch_with(cache_key, limits, ttl, || self.http_client.get(request)).await
	}

	/// Governed fetch where the caller supplies the `GET` itself.
	///
	/// `get` is invoked at most once, and only after the cache missed and every limit in
	/// `limits` admitted the call.
	pub async fn fetch_with<T, F, Fut>(
		&self,
		cache_key: &str,
		limits: &[Arc<RateLimit>],
		ttl: Duration,
		get: F,
	) -> Result<T>
	where
		T: Serialize + DeserializeOwned,
		F: FnOnce() -> Fut,
		Fut: Future<Output = Result<UpstreamResponse, TransportError>>,
	{
		let span = LookupSpan::new(OpKind::Fetch, "governor_fetch");

		span.instrument(async move {
			let guard = self.fetch_guard(cache_key);
			let result = {
				let _singleflight = guard.lock().await;

				self.fetch_guarded(cache_key, limits, ttl, get).await
			};

			self.release_fetch_guard(cache_key, guard);

			let outcome = match &result {
				Ok((_, true)) => FetchOutcome::CacheHit,
				Ok((_, false)) => FetchOutcome::Success,
				Err(e) => FetchOutcome::of_error(e),
			};

			obs::record_fetch_outcome(outcome);

			result.map(|(value, _)| value)
		})
		.await
	}

	/// Returns the decoded value plus whether it came from the cache.
	async fn fetch_guarded<T, F, Fut>(
		&self,
		cache_key: &str,
		limits: &[Arc<RateLimit>],
		ttl: Duration,
		get: F,
	) -> Result<(T, bool)>
	where
		T: Serialize + DeserializeOwned,
		F: FnOnce() -> Fut,
		Fut: Future<Output = Result<UpstreamResponse, TransportError>>,
	{
		if let Some(hit) = self.cache.get::<T>(cache_key).await {
			tracing::debug!(cache_key, "served from cache");

			return Ok((hit, true));
		}
		if let Err(retry_after) = acquire_all(limits, self.clock.as_ref()) {
			tracing::debug!(cache_key, ?retry_after, "rejected locally; quota exhausted");

			return Err(Error::RateLimited { origin: RateLimitOrigin::Local, retry_after });
		}

		let response = get().await?;
		let headers = RateLimitHeaders::from_headers(&response.headers);

		self.reconcile(limits, &headers, response.status);

		let url = redact_url(&response.url);

		match response.status {
			200 => {
				let mut deserializer = serde_json::Deserializer::from_slice(&response.body);
				let value: T = serde_path_to_error::deserialize(&mut deserializer)
					.map_err(|source| Error::MalformedBody { url, source })?;

				self.cache.put(cache_key, &value, ttl).await;

				Ok((value, false))
			},
			429 => match Self::upstream_rejection(limits, &headers) {
				Some(rejection) => Err(rejection),
				None => Err(self.upstream_error(response.status, response.body_text(), url)),
			},
			status => Err(self.upstream_error(status, response.body_text(), url)),
		}
	}

	fn reconcile(&self, limits: &[Arc<RateLimit>], headers: &RateLimitHeaders, status: u16) {
		let retry_after = headers.retry_after_secs();

		for limit in limits {
			let kind = limit.kind();
			let triggered = status == 429 && headers.limit_type == Some(kind);

			if !headers.mentions(kind) && !triggered {
				continue;
			}

			limit.reconcile_from_headers(
				headers.limits(kind),
				headers.usage(kind),
				retry_after.filter(|_| triggered),
			);
		}
	}

	/// A 429 is a rate-limit rejection only when it names one of our limit families and carries a
	/// numeric delay.
	fn upstream_rejection(limits: &[Arc<RateLimit>], headers: &RateLimitHeaders) -> Option<Error> {
		let kind = headers.limit_type.filter(|kind| limits.iter().any(|l| l.kind() == *kind))?;

		match headers.retry_after_secs() {
			Some(secs) => Some(Error::RateLimited {
				origin: RateLimitOrigin::Upstream { kind },
				retry_after: Some(Duration::seconds(i64::try_from(secs).unwrap_or(i64::MAX))),
			}),
			None => {
				tracing::error!(
					limit_kind = %kind,
					retry_after = headers.retry_after_raw.as_deref(),
					"rate-limit rejection without a numeric Retry-After"
				);

				None
			},
		}
	}

	fn upstream_error(&self, status: u16, body: String, url: String) -> Error {
		if self.config.log_api_errors && status != 404 {
			tracing::warn!(status, %url, body = body.as_str(), "upstream API error");
		}

		Error::Upstream { status, body, url }
	}

	fn fetch_guard(&self, cache_key: &str) -> Arc<AsyncMutex<()>> {
		let mut guards = self.fetch_guards.lock();

		guards.entry(cache_key.to_owned()).or_insert_with(|| Arc::new(AsyncMutex::new(()))).clone()
	}

	fn release_fetch_guard(&self, cache_key: &str, guard: Arc<AsyncMutex<()>>) {
		let mut guards = self.fetch_guards.lock();

		// Only the map and this caller hold it: nobody else is waiting on the key.
		if Arc::strong_count(&guard) == 2 {
			guards.remove(cache_key);
		}
	}
}
#[cfg(feature = "reqwest")]
impl Governor<ReqwestHttpClient> {
	/// Creates a governor with a reqwest transport, the system clock, an in-memory cache, and a
	/// registry seeded from `config`.
	pub fn new(config: Config) -> Result<Self> {
		let client = ReqwestClient::builder()
			.timeout(std::time::Duration::from_millis(config.request_timeout_ms))
			.build()
			.map_err(ConfigError::from)?;

		Self::builder(ReqwestHttpClient::with_client(client)).config(config).build()
	}
}
impl<C> Debug for Governor<C>
where
	C: ?Sized + UpstreamHttpClient,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("Governor")
			.field("registry", &self.registry)
			.field("api_base", &self.config.api_base)
			.finish()
	}
}

/// Builder for [`Governor`].
pub struct GovernorBuilder<C>
where
	C: ?Sized + UpstreamHttpClient,
{
	http_client: Arc<C>,
	clock: Option<Arc<dyn Clock>>,
	registry: Option<Arc<RateLimitRegistry>>,
	cache: Option<ResponseCache>,
	config: Option<Config>,
}
impl<C> GovernorBuilder<C>
where
	C: ?Sized + UpstreamHttpClient,
{
	/// Overrides the clock (defaults to the system clock).
	pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
		self.clock = Some(clock);

		self
	}

	/// Shares an existing registry (defaults to one seeded from the config).
	pub fn registry(mut self, registry: Arc<RateLimitRegistry>) -> Self {
		self.registry = Some(registry);

		self
	}

	/// Overrides the cache (defaults to an in-memory cache on the governor's clock).
	pub fn cache(mut self, cache: ResponseCache) -> Self {
		self.cache = Some(cache);

		self
	}

	/// Sets the configuration; required.
	pub fn config(mut self, config: Config) -> Self {
		self.config = Some(config);

		self
	}

	/// Validates the configuration and assembles the governor.
	pub fn build(self) -> Result<Governor<C>> {
		let config = self.config.ok_or(ConfigError::MissingApiKey)?;

		config.validate()?;

		let clock = self.clock.unwrap_or_else(clock::system);
		let registry = self.registry.unwrap_or_else(|| {
			Arc::new(RateLimitRegistry::with_config(clock.clone(), &config.initial_rate_limits))
		});
		let cache = self.cache.unwrap_or_else(|| ResponseCache::in_memory(clock.clone()));

		Ok(Governor {
			http_client: self.http_client,
			clock,
			registry,
			cache,
			config,
			fetch_guards: Default::default(),
		})
	}
}

/// Renders `url` for errors and logs, without credentials or an `api_key` query parameter.
pub fn redact_url(url: &Url) -> String {
	let mut redacted = url.clone();

	// Both only fail for URLs that cannot carry credentials in the first place.
	let _ = redacted.set_username("");
	let _ = redacted.set_password(None);

	if redacted.query().is_some() {
		let kept: Vec<(String, String)> = url
			.query_pairs()
			.filter(|(name, _)| name != "api_key")
			.map(|(name, value)| (name.into_owned(), value.into_owned()))
			.collect();

		if kept.is_empty() {
			redacted.set_query(None);
		} else {
			redacted.query_pairs_mut().clear().extend_pairs(kept);
		}
	}

	redacted.to_string()
}
