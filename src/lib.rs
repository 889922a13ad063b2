//! Quota-governed, cached lookups against a rate-limited game statistics API, feeding bounded
//! per-category leaderboards.
//!
//! The crate is split into two cooperating halves:
//!
//! - [`governor::Governor`] fronts the upstream API. It consults a [`cache::ResponseCache`], admits
//!   a request only when every [`rate_limit::RateLimit`] attached to the call has capacity, and
//!   reconciles its local bookkeeping with the usage counts the upstream reports back.
//! - [`leaderboard::LeaderboardEngine`] keeps a top-K list per category, updated incrementally as
//!   lookups observe new scores.
//!
//! [`lookup::LookupService`] wires both together for the player lookup path.

#![deny(clippy::all, missing_docs, unused_crate_dependencies)]

pub mod cache;
pub mod clock;
pub mod config;
pub mod error;
pub mod governor;
pub mod http;
pub mod id;
pub mod leaderboard;
pub mod lookup;
pub mod obs;
pub mod rate_limit;
pub mod region;
#[cfg(all(any(test, feature = "test"), feature = "reqwest"))]
pub mod _preludet {
	//! Convenience re-exports and helpers for integration tests; enabled via `cfg(test)` or the
	//! `test` crate feature.

	pub use crate::_prelude::*;

	// self
	use crate::{
		clock::{Clock, ManualClock},
		config::Config,
		governor::Governor,
		http::ReqwestHttpClient,
		leaderboard::LeaderboardEngine,
		lookup::LookupService,
		rate_limit::RateLimitRegistry,
	};

	/// Governor type alias used by reqwest-backed integration tests.
	pub type ReqwestTestGovernor = Governor<ReqwestHttpClient>;

	/// Fixed instant every test clock starts from.
	pub fn test_epoch() -> OffsetDateTime {
		time::macros::datetime!(2025-11-10 12:00 UTC)
	}

	/// Builds a configuration that routes every region to `base` (typically an `httpmock`
	/// server URL).
	pub fn test_config(base: &str) -> Config {
		let base = Url::parse(base).expect("Mock server base URL should parse.");

		Config::new("test-api-key").with_api_base(base)
	}

	/// Constructs a [`Governor`] wired to a reqwest transport, a fresh registry, and a
	/// [`ManualClock`] pinned to [`test_epoch`].
	pub fn build_test_governor(config: &Config) -> (Arc<ReqwestTestGovernor>, Arc<ManualClock>) {
		let clock = Arc::new(ManualClock::new(test_epoch()));
		let shared: Arc<dyn Clock> = clock.clone();
		let registry = Arc::new(RateLimitRegistry::with_config(
			shared.clone(),
			&config.initial_rate_limits,
		));
		let governor = Governor::builder(ReqwestHttpClient::default())
			.clock(shared)
			.registry(registry)
			.config(config.clone())
			.build()
			.expect("Failed to build the test governor.");

		(Arc::new(governor), clock)
	}

	/// Constructs a [`LookupService`] on top of [`build_test_governor`] with an empty
	/// leaderboard configured from `config`.
	pub fn build_test_lookup(
		config: &Config,
	) -> (LookupService<ReqwestHttpClient>, Arc<LeaderboardEngine>, Arc<ManualClock>) {
		let (governor, clock) = build_test_governor(config);
		let engine = Arc::new(LeaderboardEngine::from_config(config));
		let service = LookupService::new(governor, engine.clone());

		(service, engine, clock)
	}
}

mod _prelude {
	pub use std::{
		collections::{BTreeMap, HashMap},
		error::Error as StdError,
		fmt::{Debug, Display, Formatter, Result as FmtResult},
		future::Future,
		hash::Hash,
		pin::Pin,
		str::FromStr,
		sync::Arc,
	};

	pub use async_lock::Mutex as AsyncMutex;
	pub use parking_lot::{Mutex, RwLock};
	#[cfg(feature = "reqwest")]
	pub use reqwest::{Client as ReqwestClient, Error as ReqwestError};
	pub use serde::{Deserialize, Serialize};
	pub use thiserror::Error as ThisError;
	pub use time::{Duration, OffsetDateTime};
	pub use url::Url;

	pub use crate::error::{Error, Result};
}

#[cfg(feature = "reqwest")] pub use reqwest;
pub use url;
#[cfg(test)] use {color_eyre as _, httpmock as _, proptest as _};
