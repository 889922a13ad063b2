//! Player lookup: resolve a summoner by name, fetch their champion masteries, and feed every score
//! into the leaderboards.

// self
use crate::{
	_prelude::*,
	governor::Governor,
	http::UpstreamHttpClient,
	id::{CategoryId, MethodId, OwnerKey},
	leaderboard::LeaderboardEngine,
	obs::{LookupSpan, OpKind},
	region::Region,
};

/// Method name of the summoner-by-name endpoint.
pub const GET_SUMMONER_BY_NAME: &str = "GET_getBySummonerName";
/// Method name of the all-masteries endpoint.
pub const GET_ALL_CHAMPION_MASTERIES: &str = "GET_getAllChampionMasteries";

/// Summoner as returned by the upstream.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Summoner {
	/// Encrypted summoner id.
	pub id: String,
	/// Encrypted account id.
	#[serde(default)]
	pub account_id: String,
	/// Encrypted player UUID; stable across name changes.
	pub puuid: String,
	/// Summoner name.
	pub name: String,
	/// Profile icon id.
	#[serde(default)]
	pub profile_icon_id: i64,
	/// Account level.
	pub summoner_level: u64,
}

/// One champion's mastery as returned by the upstream.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChampionMastery {
	/// Champion id; also the leaderboard category.
	pub champion_id: i64,
	/// Mastery points.
	pub champion_points: u64,
	/// Mastery level.
	pub champion_level: u32,
	/// Whether a chest was granted this season.
	#[serde(default)]
	pub chest_granted: bool,
	/// Points earned since the current level was reached.
	#[serde(default)]
	pub champion_points_since_last_level: i64,
	/// Points still needed for the next level.
	#[serde(default)]
	pub champion_points_until_next_level: i64,
	/// Last play time in milliseconds since the Unix epoch.
	#[serde(default)]
	pub last_play_time: i64,
	/// Mastery tokens held.
	#[serde(default)]
	pub tokens_earned: u32,
}

/// Everything a lookup yields.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerProfile {
	/// Region searched.
	pub region: Region,
	/// Resolved summoner.
	pub summoner: Summoner,
	/// Masteries as returned, highest points first.
	pub masteries: Vec<ChampionMastery>,
	/// Sum of mastery points.
	pub total_points: u64,
	/// Sum of mastery levels.
	pub total_level: u64,
}

/// Removes spaces and lowercases, the form the upstream matches names in.
pub fn standardize_name(name: &str) -> String {
	name.chars().filter(|c| !c.is_whitespace()).flat_map(char::to_lowercase).collect()
}

/// Lookup path over a shared [`Governor`] and [`LeaderboardEngine`].
pub struct LookupService<C>
where
	C: ?Sized + UpstreamHttpClient,
{
	governor: Arc<Governor<C>>,
	engine: Arc<LeaderboardEngine>,
}
impl<C> LookupService<C>
where
	C: ?Sized + UpstreamHttpClient,
{
	/// Creates a lookup service.
	pub fn new(governor: Arc<Governor<C>>, engine: Arc<LeaderboardEngine>) -> Self {
		Self { governor, engine }
	}

	/// Governor used for upstream calls.
	pub fn governor(&self) -> &Arc<Governor<C>> {
		&self.governor
	}

	/// Leaderboards fed by lookups.
	pub fn engine(&self) -> &Arc<LeaderboardEngine> {
		&self.engine
	}

	/// Looks up `name` on `region` and records every score on the leaderboards.
	///
	/// A missing summoner surfaces as [`Error::Upstream`] with status 404 (see
	/// [`Error::is_not_found`]).
	pub async fn lookup(&self, region: Region, name: &str) -> Result<PlayerProfile> {
		let span = LookupSpan::new(OpKind::Lookup, "lookup");

		span.instrument(async move {
			let summoner = self.summoner(region, name).await?;
			let mut masteries = self.masteries(region, &summoner.puuid).await?;

			masteries.sort_by(|a, b| b.champion_points.cmp(&a.champion_points));

			let total_points = masteries.iter().map(|m| m.champion_points).sum();
			let total_level = masteries.iter().map(|m| u64::from(m.champion_level)).sum();
			let profile =
				PlayerProfile { region, summoner, masteries, total_points, total_level };

			self.record_scores(&profile)?;

			Ok(profile)
		})
		.await
	}

	/// Resolves a summoner by name.
	pub async fn summoner(&self, region: Region, name: &str) -> Result<Summoner> {
		let method = MethodId::new(GET_SUMMONER_BY_NAME)?;
		let cache_key = format!("summoner/{region}:{}", standardize_name(name));
		let url = self
			.governor
			.url_for(region, &["lol", "summoner", "v4", "summoners", "by-name", name])?;
		let ttl = self.governor.config().cache_ttls.summoner();

		self.governor
			.fetch(&cache_key, &self.governor.limits_for(region, &method), ttl, url)
			.await
	}

	/// Fetches every champion mastery of the player identified by `puuid`.
	pub async fn masteries(&self, region: Region, puuid: &str) -> Result<Vec<ChampionMastery>> {
		let method = MethodId::new(GET_ALL_CHAMPION_MASTERIES)?;
		let cache_key = format!("championmasteries/{region}:{puuid}");
		let url = self.governor.url_for(
			region,
			&["lol", "champion-mastery", "v4", "champion-masteries", "by-puuid", puuid],
		)?;
		let ttl = self.governor.config().cache_ttls.champion_mastery();

		self.governor
			.fetch(&cache_key, &self.governor.limits_for(region, &method), ttl, url)
			.await
	}

	fn record_scores(&self, profile: &PlayerProfile) -> Result<()> {
		let owner = OwnerKey::new(&profile.summoner.puuid)?;
		let name = profile.summoner.name.as_str();
		let scores = profile
			.masteries
			.iter()
			.map(|m| (CategoryId(m.champion_id), m.champion_points))
			.chain([
				(CategoryId::TOTAL_POINTS, profile.total_points),
				(CategoryId::TOTAL_LEVEL, profile.total_level),
			]);

		for (category, score) in scores {
			self.engine.upsert(category, owner.clone(), name, profile.region, score);
		}

		Ok(())
	}
}
impl<C> Debug for LookupService<C>
where
	C: ?Sized + UpstreamHttpClient,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("LookupService").field("governor", &self.governor).finish()
	}
}
