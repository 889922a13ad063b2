//! Runtime configuration.
//!
//! Every field has a default, so a JSON file only needs to name what it overrides (usually just
//! `apiKey`). [`Config::validate`] runs on every entry point that accepts a config.

// std
use std::path::{Path, PathBuf};
// self
use crate::{_prelude::*, error::ConfigError, id::MethodId, rate_limit::WindowSpec, region::Region};

/// Header carrying the API key on every upstream request.
pub const API_KEY_HEADER: &str = "X-Riot-Token";

/// Process configuration for the governor, lookup path, and leaderboard.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Config {
	/// Upstream API key.
	pub api_key: String,
	/// Overrides the per-region base URL (`https://{platform}.api.riotgames.com`).
	pub api_base: Option<Url>,
	/// Cache lifetimes per resource.
	pub cache_ttls: CacheTtls,
	/// Leaderboard capacities.
	pub leaderboard: LeaderboardSizes,
	/// Windows to seed limits with before the upstream reports any.
	pub initial_rate_limits: InitialRateLimits,
	/// Per-request timeout in milliseconds.
	pub request_timeout_ms: u64,
	/// Logs non-404 upstream errors at `warn`.
	pub log_api_errors: bool,
	/// Logs leaderboard inserts and moves at `info` instead of `debug`.
	pub log_leaderboard_changes: bool,
	/// Where leaderboard snapshots are written; `None` disables persistence.
	pub snapshot_path: Option<PathBuf>,
	/// Seconds between snapshot writes.
	pub snapshot_interval_secs: u64,
}
impl Config {
	/// Creates a default configuration with `api_key`.
	pub fn new(api_key: impl Into<String>) -> Self {
		Self { api_key: api_key.into(), ..Default::default() }
	}

	/// Routes every region to `base` instead of the public hosts.
	pub fn with_api_base(mut self, base: Url) -> Self {
		self.api_base = Some(base);

		self
	}

	/// Replaces the seed windows.
	pub fn with_initial_rate_limits(mut self, limits: InitialRateLimits) -> Self {
		self.initial_rate_limits = limits;

		self
	}

	/// Replaces the leaderboard capacities.
	pub fn with_leaderboard(mut self, sizes: LeaderboardSizes) -> Self {
		self.leaderboard = sizes;

		self
	}

	/// Loads and validates a JSON configuration file.
	pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
		let path = path.as_ref();
		let display = path.display().to_string();
		let raw = std::fs::read(path)
			.map_err(|source| ConfigError::Read { path: display.clone(), source })?;
		let mut deserializer = serde_json::Deserializer::from_slice(&raw);
		let config: Self = serde_path_to_error::deserialize(&mut deserializer)
			.map_err(|source| ConfigError::Parse { path: display, source })?;

		config.validate()?;

		Ok(config)
	}

	/// Checks cross-field constraints.
	pub fn validate(&self) -> Result<(), ConfigError> {
		if self.api_key.trim().is_empty() {
			return Err(ConfigError::MissingApiKey);
		}
		if let Some(base) = self.api_base.as_ref().filter(|base| base.cannot_be_a_base()) {
			return Err(ConfigError::CannotBeABase(base.to_string()));
		}

		self.leaderboard.validate()?;
		self.initial_rate_limits.validate()?;

		Ok(())
	}

	/// Base URL requests for `region` are resolved against.
	pub fn base_url(&self, region: Region) -> Result<Url, ConfigError> {
		match &self.api_base {
			Some(base) => Ok(base.clone()),
			None => Ok(Url::parse(&format!(
				"https://{}.api.riotgames.com",
				region.platform_id().to_ascii_lowercase()
			))?),
		}
	}

	/// Request timeout as a [`Duration`].
	pub fn request_timeout(&self) -> Duration {
		Duration::milliseconds(i64::try_from(self.request_timeout_ms).unwrap_or(i64::MAX))
	}

	/// Interval between snapshot writes.
	pub fn snapshot_interval(&self) -> Duration {
		Duration::seconds(i64::try_from(self.snapshot_interval_secs).unwrap_or(i64::MAX))
	}
}
impl Default for Config {
	fn default() -> Self {
		Self {
			api_key: String::new(),
			api_base: None,
			cache_ttls: CacheTtls::default(),
			leaderboard: LeaderboardSizes::default(),
			initial_rate_limits: InitialRateLimits::default(),
			request_timeout_ms: 10_000,
			log_api_errors: true,
			log_leaderboard_changes: false,
			snapshot_path: None,
			snapshot_interval_secs: 300,
		}
	}
}

/// Cache lifetimes, in seconds.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CacheTtls {
	/// Lifetime of a resolved summoner.
	pub summoner_secs: u64,
	/// Lifetime of a mastery list.
	pub champion_mastery_secs: u64,
}
impl CacheTtls {
	/// Summoner lifetime as a [`Duration`].
	pub fn summoner(&self) -> Duration {
		secs(self.summoner_secs)
	}

	/// Mastery list lifetime as a [`Duration`].
	pub fn champion_mastery(&self) -> Duration {
		secs(self.champion_mastery_secs)
	}
}
impl Default for CacheTtls {
	fn default() -> Self {
		Self { summoner_secs: 600, champion_mastery_secs: 600 }
	}
}

/// Leaderboard capacities.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct LeaderboardSizes {
	/// Entries kept per category.
	pub track: usize,
	/// Entries shown per category; never more than `track`.
	pub display: usize,
}
impl LeaderboardSizes {
	/// Ensures `0 < display <= track`.
	pub fn validate(&self) -> Result<(), ConfigError> {
		if self.display == 0 || self.display > self.track {
			return Err(ConfigError::LeaderboardSizes { display: self.display, track: self.track });
		}

		Ok(())
	}
}
impl Default for LeaderboardSizes {
	fn default() -> Self {
		Self { track: 60, display: 50 }
	}
}

/// Windows known ahead of time.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct InitialRateLimits {
	/// Application-wide windows, applied to every region.
	pub application: Vec<WindowSpec>,
	/// Per-method windows, applied to every region.
	pub methods: HashMap<MethodId, Vec<WindowSpec>>,
}
impl InitialRateLimits {
	/// Rejects windows with a zero quota or interval.
	pub fn validate(&self) -> Result<(), ConfigError> {
		self.application
			.iter()
			.chain(self.methods.values().flatten())
			.try_for_each(WindowSpec::validate)
	}
}

fn secs(value: u64) -> Duration {
	Duration::seconds(i64::try_from(value).unwrap_or(i64::MAX))
}
