//! Runs a player lookup against a mock upstream, prints the resulting leaderboards, and writes a
//! snapshot the way a long-running service would on shutdown.

// std
use std::sync::Arc;
// crates.io
use color_eyre::Result;
use httpmock::prelude::*;
use url::Url;
// self
use mastery_lookup::{
	config::Config,
	governor::Governor,
	id::CategoryId,
	leaderboard::{LeaderboardEngine, SnapshotWriter},
	lookup::LookupService,
	region::Region,
};

const SUMMONER_BODY: &str =
	"{\"id\":\"s\",\"puuid\":\"demo-puuid\",\"name\":\"Faker\",\"summonerLevel\":700}";

#[tokio::main]
async fn main() -> Result<()> {
	color_eyre::install()?;

	let server = MockServer::start_async().await;
	let summoner_mock = server
		.mock_async(|when, then| {
			when.method(GET).path("/lol/summoner/v4/summoners/by-name/Faker");
			then.status(200)
				.header("content-type", "application/json")
				.header("x-app-rate-limit", "20:1,100:120")
				.header("x-app-rate-limit-count", "1:1,1:120")
				.body(SUMMONER_BODY);
		})
		.await;

	server
		.mock_async(|when, then| {
			when.method(GET)
				.path("/lol/champion-mastery/v4/champion-masteries/by-puuid/demo-puuid");
			then.status(200).header("content-type", "application/json").body(
				"[{\"championId\":7,\"championPoints\":912000,\"championLevel\":7},\
				 {\"championId\":4,\"championPoints\":455000,\"championLevel\":7}]",
			);
		})
		.await;

	let mut config = Config::new("demo-key").with_api_base(Url::parse(&server.base_url())?);

	config.log_leaderboard_changes = true;
	config.snapshot_path =
		Some(std::env::temp_dir().join("mastery-lookup-demo").join("leaderboards.json"));

	let governor = Arc::new(Governor::new(config.clone())?);
	let engine = Arc::new(LeaderboardEngine::from_config(&config));
	let service = LookupService::new(governor.clone(), engine.clone());
	let profile = service.lookup(Region::Kr, "Faker").await?;

	println!("{} has {} mastery points.", profile.summoner.name, profile.total_points);

	// Served from the cache: no second upstream call.
	service.lookup(Region::Kr, "faker").await?;
	summoner_mock.assert_calls_async(1).await;

	for status in governor.registry().status() {
		println!("{}: {:?}", status.key, status.state);
	}
	for entry in engine.display_top(CategoryId::TOTAL_POINTS) {
		println!("#1 total points: {} ({})", entry.display_name, entry.score);
	}

	if let (Some(writer), Some(path)) =
		(SnapshotWriter::from_config(engine, &config), config.snapshot_path.as_ref())
	{
		writer.save_now().await?;

		println!("Snapshot written to {}.", path.display());
	}

	Ok(())
}
