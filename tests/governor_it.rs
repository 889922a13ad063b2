// crates.io
use httpmock::prelude::*;
use serde_json::Value;
// self
use mastery_lookup::{
	_preludet::*,
	config::{Config, InitialRateLimits},
	error::RateLimitOrigin,
	governor::Governor,
	http::ReqwestHttpClient,
	id::MethodId,
	rate_limit::{LimitKind, WindowSpec},
	region::Region,
};

const SUMMONER_PATH: &str = "/lol/summoner/v4/summoners/by-name/Faker";
const METHOD: &str = "GET_getBySummonerName";

fn method() -> MethodId {
	MethodId::new(METHOD).expect("Method identifier fixture should be valid.")
}

fn seeded_config(server: &MockServer, application: Vec<WindowSpec>) -> Config {
	test_config(&server.base_url())
		.with_initial_rate_limits(InitialRateLimits { application, ..Default::default() })
}

async fn fetch_summoner(
	governor: &Governor<ReqwestHttpClient>,
	cache_key: &str,
	name: &str,
) -> Result<Value> {
	let url = governor
		.url_for(Region::Euw, &["lol", "summoner", "v4", "summoners", "by-name", name])
		.expect("Summoner URL should build.");

	governor
		.fetch(cache_key, &governor.limits_for(Region::Euw, &method()), Duration::minutes(10), url)
		.await
}

#[tokio::test]
async fn cached_response_is_served_without_spending_quota() {
	let server = MockServer::start_async().await;
	let (governor, clock) =
		build_test_governor(&seeded_config(&server, vec![WindowSpec::new(5, 1)]));
	let mock = server
		.mock_async(|when, then| {
			when.method(GET).path(SUMMONER_PATH).header("x-riot-token", "test-api-key");
			then.status(200)
				.header("content-type", "application/json")
				.body("{\"puuid\":\"p-1\",\"name\":\"Faker\"}");
		})
		.await;
	let first =
		fetch_summoner(&governor, "summoner/EUW:faker", "Faker").await.expect("First fetch.");
	let second =
		fetch_summoner(&governor, "summoner/EUW:faker", "Faker").await.expect("Cached fetch.");

	assert_eq!(first, second);
	assert_eq!(first["puuid"], "p-1");

	mock.assert_calls_async(1).await;

	let application = governor.registry().application(Region::Euw);

	assert_eq!(application.windows()[0].used_requests(), 1);

	// Past the TTL the entry is gone and the upstream is asked again.
	clock.advance(Duration::minutes(10));

	fetch_summoner(&governor, "summoner/EUW:faker", "Faker").await.expect("Refetch after expiry.");

	mock.assert_calls_async(2).await;
}

#[tokio::test]
async fn exhausted_quota_rejects_locally_until_the_window_resets() {
	let server = MockServer::start_async().await;
	let (governor, clock) =
		build_test_governor(&seeded_config(&server, vec![WindowSpec::new(2, 10)]));
	let mock = server
		.mock_async(|when, then| {
			when.method(GET).path(SUMMONER_PATH);
			then.status(200).body("{}");
		})
		.await;

	fetch_summoner(&governor, "a", "Faker").await.expect("First call fits the quota.");
	fetch_summoner(&governor, "b", "Faker").await.expect("Second call fits the quota.");

	clock.advance(Duration::seconds(4));

	let err = fetch_summoner(&governor, "c", "Faker")
		.await
		.expect_err("Third call inside the window must be rejected.");

	match err {
		Error::RateLimited { origin: RateLimitOrigin::Local, retry_after } =>
			assert_eq!(retry_after, Some(Duration::seconds(6))),
		other => panic!("Unexpected error: {other:?}"),
	}

	mock.assert_calls_async(2).await;
	clock.advance(Duration::seconds(6));
	fetch_summoner(&governor, "c", "Faker").await.expect("Call after the reset should pass.");
	mock.assert_calls_async(3).await;
}

#[tokio::test]
async fn response_headers_teach_unconfigured_limits() {
	let server = MockServer::start_async().await;
	let (governor, _) = build_test_governor(&test_config(&server.base_url()));

	server
		.mock_async(|when, then| {
			when.method(GET).path(SUMMONER_PATH);
			then.status(200)
				.header("x-app-rate-limit", "20:1,100:120")
				.header("x-app-rate-limit-count", "1:1,37:120")
				.header("x-method-rate-limit", "2000:60")
				.header("x-method-rate-limit-count", "12:60")
				.body("{}");
		})
		.await;

	assert!(!governor.registry().application(Region::Euw).is_configured());

	fetch_summoner(&governor, "learn", "Faker").await.expect("Fetch should succeed.");

	let application = governor.registry().application(Region::Euw).windows();
	let method = governor.registry().method(Region::Euw, &method()).windows();

	assert_eq!(application.len(), 2);
	assert_eq!(application[0].spec(), WindowSpec::new(20, 1));
	assert_eq!(application[1].used_requests(), 37);
	assert_eq!(method.len(), 1);
	assert_eq!(method[0].used_requests(), 12);
	// Other regions keep their own bookkeeping.
	assert!(!governor.registry().application(Region::Kr).is_configured());
}

#[tokio::test]
async fn typed_429_blocks_the_named_limit() {
	let server = MockServer::start_async().await;
	let (governor, _) = build_test_governor(&test_config(&server.base_url()));
	let mock = server
		.mock_async(|when, then| {
			when.method(GET).path(SUMMONER_PATH);
			then.status(429)
				.header("x-rate-limit-type", "method")
				.header("retry-after", "7")
				.header("x-method-rate-limit", "5:10")
				.header("x-method-rate-limit-count", "5:10")
				.body("{\"status\":{\"status_code\":429}}");
		})
		.await;
	let err = fetch_summoner(&governor, "typed", "Faker")
		.await
		.expect_err("Typed 429 must surface as a rate-limit error.");

	match err {
		Error::RateLimited { origin: RateLimitOrigin::Upstream { kind }, retry_after } => {
			assert_eq!(kind, LimitKind::Method);
			assert_eq!(retry_after, Some(Duration::seconds(7)));
		},
		other => panic!("Unexpected error: {other:?}"),
	}

	let err = fetch_summoner(&governor, "typed-again", "Faker")
		.await
		.expect_err("The blocked method must be rejected locally.");

	assert!(matches!(err, Error::RateLimited { origin: RateLimitOrigin::Local, .. }));
	assert_eq!(err.retry_after(), Some(Duration::seconds(7)));

	mock.assert_calls_async(1).await;
}

#[tokio::test]
async fn untyped_429_is_an_upstream_error() {
	let server = MockServer::start_async().await;
	let (governor, _) = build_test_governor(&test_config(&server.base_url()));

	server
		.mock_async(|when, then| {
			when.method(GET).path(SUMMONER_PATH);
			then.status(429).body("slow down");
		})
		.await;

	let err = fetch_summoner(&governor, "generic", "Faker")
		.await
		.expect_err("Generic 429 must fail.");

	match err {
		Error::Upstream { status, body, .. } => {
			assert_eq!(status, 429);
			assert_eq!(body, "slow down");
		},
		other => panic!("Unexpected error: {other:?}"),
	}
}

#[tokio::test]
async fn missing_summoner_maps_to_not_found() {
	let server = MockServer::start_async().await;
	let (governor, _) = build_test_governor(&test_config(&server.base_url()));
	let mock = server
		.mock_async(|when, then| {
			when.method(GET).path("/lol/summoner/v4/summoners/by-name/nobody");
			then.status(404).body("{\"status\":{\"status_code\":404}}");
		})
		.await;
	let err = fetch_summoner(&governor, "summoner/EUW:nobody", "nobody")
		.await
		.expect_err("Unknown summoner must fail.");

	assert!(err.is_not_found());
	assert!(!err.is_rate_limited());

	// Failures are never cached.
	fetch_summoner(&governor, "summoner/EUW:nobody", "nobody").await.expect_err("Still missing.");
	mock.assert_calls_async(2).await;
}

#[tokio::test]
async fn malformed_body_reports_the_failing_path() {
	let server = MockServer::start_async().await;
	let (governor, _) = build_test_governor(&test_config(&server.base_url()));

	server
		.mock_async(|when, then| {
			when.method(GET).path(SUMMONER_PATH);
			then.status(200).body("{\"puuid\":");
		})
		.await;

	let err = fetch_summoner(&governor, "broken", "Faker")
		.await
		.expect_err("Truncated JSON must fail.");

	match err {
		Error::MalformedBody { url, .. } => assert!(url.ends_with(SUMMONER_PATH)),
		other => panic!("Unexpected error: {other:?}"),
	}
}

#[tokio::test]
async fn transport_failure_keeps_the_request_counted() {
	let config = test_config("http://127.0.0.1:9")
		.with_initial_rate_limits(InitialRateLimits {
			application: vec![WindowSpec::new(3, 1)],
			..Default::default()
		});
	let (governor, _) = build_test_governor(&config);
	let err = fetch_summoner(&governor, "offline", "Faker")
		.await
		.expect_err("Unreachable upstream must fail.");

	assert!(matches!(err, Error::Transport(_)));
	assert_eq!(governor.registry().application(Region::Euw).windows()[0].used_requests(), 1);
}
