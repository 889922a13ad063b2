// std
use std::collections::{HashMap, HashSet};
// crates.io
use proptest::prelude::*;
// self
use mastery_lookup::{
	id::{CategoryId, OwnerKey},
	leaderboard::LeaderboardEngine,
	region::Region,
};

const CATEGORY: CategoryId = CategoryId(42);

fn upserts() -> impl Strategy<Value = Vec<(u8, u64)>> {
	prop::collection::vec((0_u8..12, 0_u64..50), 0..200)
}

proptest! {
	#![proptest_config(ProptestConfig::with_cases(200))]

	#[test]
	fn board_stays_bounded_ordered_and_unique(
		track in 1_usize..8,
		display in 1_usize..8,
		updates in upserts(),
	) {
		let engine = LeaderboardEngine::new(track, display);
		let mut latest = HashMap::new();

		for (owner, score) in updates {
			let key = OwnerKey::new(format!("owner-{owner}")).expect("Owner key should be valid.");

			engine.upsert(CATEGORY, key.clone(), key.to_string(), Region::Euw, score);
			latest.insert(key, score);
		}

		let entries = engine.get_top(CATEGORY, usize::MAX);
		let owners: HashSet<_> = entries.iter().map(|entry| entry.owner_key.clone()).collect();

		prop_assert!(entries.len() <= track);
		prop_assert!(engine.display_top(CATEGORY).len() <= display.min(track));
		prop_assert_eq!(owners.len(), entries.len());
		prop_assert!(entries.windows(2).all(|pair| pair[0].score >= pair[1].score));

		// A ranked owner always shows the most recent score it reported.
		for entry in &entries {
			prop_assert_eq!(Some(&entry.score), latest.get(&entry.owner_key));
		}
	}

	#[test]
	fn snapshot_restore_is_identity_on_live_boards(updates in upserts()) {
		let engine = LeaderboardEngine::new(5, 5);

		for (owner, score) in updates {
			let key = OwnerKey::new(format!("owner-{owner}")).expect("Owner key should be valid.");

			engine.upsert(CATEGORY, key, "name", Region::Na, score);
		}

		let snapshot = engine.snapshot();
		let restored = LeaderboardEngine::from_snapshot(engine.sizes(), snapshot.clone());

		prop_assert_eq!(restored.snapshot(), snapshot);
	}
}
