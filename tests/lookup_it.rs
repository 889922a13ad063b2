// crates.io
use httpmock::prelude::*;
// self
use mastery_lookup::{_preludet::*, id::CategoryId, region::Region};

const SUMMONER_PATH: &str = "/lol/summoner/v4/summoners/by-name/Faker";
const MASTERIES_PATH: &str = "/lol/champion-mastery/v4/champion-masteries/by-puuid/puuid-faker";
const SUMMONER_BODY: &str = "{\"id\":\"s-1\",\"accountId\":\"a-1\",\"puuid\":\"puuid-faker\",\
	\"name\":\"Faker\",\"profileIconId\":6,\"summonerLevel\":512}";
const MASTERIES_BODY: &str = "[\
	{\"championId\":7,\"championPoints\":1200,\"championLevel\":5},\
	{\"championId\":157,\"championPoints\":90000,\"championLevel\":7,\"chestGranted\":true}\
]";

#[tokio::test]
async fn lookup_resolves_profile_and_feeds_leaderboards() {
	let server = MockServer::start_async().await;
	let (service, engine, _) = build_test_lookup(&test_config(&server.base_url()));
	let summoner = server
		.mock_async(|when, then| {
			when.method(GET).path(SUMMONER_PATH).header("x-riot-token", "test-api-key");
			then.status(200).header("content-type", "application/json").body(SUMMONER_BODY);
		})
		.await;
	let masteries = server
		.mock_async(|when, then| {
			when.method(GET).path(MASTERIES_PATH);
			then.status(200).header("content-type", "application/json").body(MASTERIES_BODY);
		})
		.await;
	let profile = service.lookup(Region::Kr, "Faker").await.expect("Lookup should succeed.");

	assert_eq!(profile.summoner.puuid, "puuid-faker");
	assert_eq!(profile.summoner.summoner_level, 512);
	assert_eq!(profile.masteries[0].champion_id, 157);
	assert_eq!(profile.total_points, 91_200);
	assert_eq!(profile.total_level, 12);

	assert_eq!(
		engine.categories(),
		vec![CategoryId::TOTAL_LEVEL, CategoryId::TOTAL_POINTS, CategoryId(7), CategoryId(157)]
	);

	let top = engine.get_top(CategoryId::TOTAL_POINTS, 10);

	assert_eq!(top.len(), 1);
	assert_eq!(top[0].owner_key.as_ref(), "puuid-faker");
	assert_eq!(top[0].display_name, "Faker");
	assert_eq!(top[0].region, Region::Kr);
	assert_eq!(top[0].score, 91_200);

	// Same player under a different spelling is served from the cache.
	service.lookup(Region::Kr, "faker ").await.expect("Cached lookup should succeed.");

	summoner.assert_calls_async(1).await;
	masteries.assert_calls_async(1).await;
	assert_eq!(engine.get_top(CategoryId(157), 10).len(), 1);
}

#[tokio::test]
async fn unknown_summoner_leaves_leaderboards_untouched() {
	let server = MockServer::start_async().await;
	let (service, engine, _) = build_test_lookup(&test_config(&server.base_url()));
	let masteries = server
		.mock_async(|when, then| {
			when.method(GET).path_includes("/champion-masteries/");
			then.status(200).body("[]");
		})
		.await;

	server
		.mock_async(|when, then| {
			when.method(GET).path("/lol/summoner/v4/summoners/by-name/ghost");
			then.status(404).body("{\"status\":{\"message\":\"Data not found\"}}");
		})
		.await;

	let err = service.lookup(Region::Na, "ghost").await.expect_err("Unknown name must fail.");

	assert!(err.is_not_found());
	assert!(engine.categories().is_empty());

	masteries.assert_calls_async(0).await;
}

#[tokio::test]
async fn better_player_takes_the_top_slot() {
	let server = MockServer::start_async().await;
	let (service, engine, _) = build_test_lookup(&test_config(&server.base_url()));

	for (name, puuid, points) in [("Alpha", "p-alpha", 100), ("Beta", "p-beta", 300)] {
		let summoner = format!(
			"{{\"id\":\"{name}\",\"puuid\":\"{puuid}\",\"name\":\"{name}\",\"summonerLevel\":30}}"
		);
		let masteries =
			format!("[{{\"championId\":1,\"championPoints\":{points},\"championLevel\":2}}]");

		server
			.mock_async(move |when, then| {
				when.method(GET).path(format!("/lol/summoner/v4/summoners/by-name/{name}"));
				then.status(200).body(summoner);
			})
			.await;
		server
			.mock_async(move |when, then| {
				when.method(GET)
					.path(format!("/lol/champion-mastery/v4/champion-masteries/by-puuid/{puuid}"));
				then.status(200).body(masteries);
			})
			.await;
	}

	service.lookup(Region::Euw, "Alpha").await.expect("First lookup should succeed.");
	service.lookup(Region::Euw, "Beta").await.expect("Second lookup should succeed.");

	let names: Vec<_> = engine
		.display_top(CategoryId(1))
		.into_iter()
		.map(|entry| (entry.display_name, entry.score))
		.collect();

	assert_eq!(names, vec![("Beta".to_owned(), 300), ("Alpha".to_owned(), 100)]);
}
