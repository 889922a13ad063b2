//! Bounded per-category top-K rankings.
//!
//! Each category keeps at most `track` entries ordered by score, best first, with at most one
//! entry per owner. Only the first `display` entries are meant to be shown. Ties never reorder:
//! a newcomer only takes a slot from an entry with a strictly lower score, so owners with equal
//! scores keep their arrival order.
//!
//! Categories are guarded by their own locks; updates to unrelated categories never contend.

pub mod file;
pub mod sink;

pub use file::FileSnapshotSink;
pub use sink::*;

// std
use std::collections::HashSet;
// self
use crate::{
	_prelude::*,
	config::{Config, LeaderboardSizes},
	id::{CategoryId, OwnerKey},
	region::Region,
};

/// Serialized form of every leaderboard: category id to ordered entries.
pub type LeaderboardSnapshot = BTreeMap<CategoryId, Vec<LeaderboardEntry>>;

/// One ranked owner.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeaderboardEntry {
	/// Stable identity of the scored subject.
	pub owner_key: OwnerKey,
	/// Name shown next to the score.
	pub display_name: String,
	/// Region the owner plays on.
	pub region: Region,
	/// Score; higher ranks better.
	pub score: u64,
}

/// What an upsert did to a leaderboard.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UpsertOutcome {
	/// A new owner entered at `rank`.
	Inserted {
		/// Rank taken (0 is best).
		rank: usize,
	},
	/// An existing owner changed rank.
	Moved {
		/// Previous rank.
		from: usize,
		/// New rank.
		to: usize,
	},
	/// An existing owner's entry was rewritten without changing rank.
	Updated {
		/// Rank held.
		rank: usize,
	},
	/// The entry was already stored exactly as given.
	Unchanged {
		/// Rank held.
		rank: usize,
	},
	/// The score did not qualify for the tracked range.
	Dropped,
}

/// One category's ranking.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Leaderboard {
	capacity: usize,
	entries: Vec<LeaderboardEntry>,
}
impl Leaderboard {
	/// Creates an empty leaderboard tracking up to `capacity` entries.
	pub fn new(capacity: usize) -> Self {
		Self { capacity, entries: Vec::new() }
	}

	/// Builds a leaderboard from possibly untidy entries (e.g. a hand-edited snapshot).
	///
	/// Entries are stably sorted by descending score and each owner keeps only its best score
	/// (the earliest listed wins a tie). The result is trimmed to `capacity`.
	pub fn from_entries(capacity: usize, mut entries: Vec<LeaderboardEntry>) -> Self {
		entries.sort_by(|a, b| b.score.cmp(&a.score));

		let mut seen = HashSet::new();

		entries.retain(|entry| seen.insert(entry.owner_key.clone()));
		entries.truncate(capacity);

		Self { capacity, entries }
	}

	/// Maximum number of entries kept.
	pub fn capacity(&self) -> usize {
		self.capacity
	}

	/// Entries, best first.
	pub fn entries(&self) -> &[LeaderboardEntry] {
		&self.entries
	}

	/// Number of entries.
	pub fn len(&self) -> usize {
		self.entries.len()
	}

	/// Returns `true` when nothing is ranked.
	pub fn is_empty(&self) -> bool {
		self.entries.is_empty()
	}

	/// The first `n` entries (fewer when the board is shorter).
	pub fn top(&self, n: usize) -> &[LeaderboardEntry] {
		&self.entries[..n.min(self.entries.len())]
	}

	/// Rank currently held by `owner`.
	pub fn rank_of(&self, owner: &OwnerKey) -> Option<usize> {
		self.entries.iter().position(|entry| &entry.owner_key == owner)
	}

	/// Records `candidate`'s latest score.
	///
	/// Scanning from the top, the candidate either meets its own slot first (rewritten in place)
	/// or the first slot that is empty or holds a strictly lower score (inserted there, after which
	/// any older entry of the same owner further down is removed). A decreased score that would
	/// leave the board out of order is moved down behind every entry scoring at least as much.
	pub fn upsert(&mut self, candidate: LeaderboardEntry) -> UpsertOutcome {
		for rank in 0..=self.entries.len() {
			if rank >= self.capacity {
				break;
			}

			let Some(current) = self.entries.get(rank) else {
				self.entries.push(candidate);

				return UpsertOutcome::Inserted { rank };
			};

			if current.owner_key == candidate.owner_key {
				return self.rewrite(rank, candidate);
			}
			if current.score < candidate.score {
				return self.insert_at(rank, candidate);
			}
		}

		UpsertOutcome::Dropped
	}

	fn rewrite(&mut self, rank: usize, candidate: LeaderboardEntry) -> UpsertOutcome {
		if self.entries[rank] == candidate {
			return UpsertOutcome::Unchanged { rank };
		}

		let previous = self.entries[rank].score;

		if candidate.score < previous {
			tracing::warn!(
				owner = %candidate.owner_key,
				previous,
				score = candidate.score,
				"score decreased"
			);

			if self.entries.get(rank + 1).is_some_and(|next| next.score > candidate.score) {
				self.entries.remove(rank);

				let to = self
					.entries
					.iter()
					.position(|entry| entry.score < candidate.score)
					.unwrap_or(self.entries.len());

				self.entries.insert(to, candidate);

				return UpsertOutcome::Moved { from: rank, to };
			}
		}

		self.entries[rank] = candidate;

		UpsertOutcome::Updated { rank }
	}

	fn insert_at(&mut self, rank: usize, candidate: LeaderboardEntry) -> UpsertOutcome {
		let owner = candidate.owner_key.clone();

		self.entries.insert(rank, candidate);

		// Duplicates are removed before trimming so an improving owner never pushes a third
		// party off a full board.
		let stale = self.entries[rank + 1..]
			.iter()
			.position(|entry| entry.owner_key == owner)
			.map(|offset| rank + 1 + offset);

		if let Some(index) = stale {
			self.entries.remove(index);
		}

		self.entries.truncate(self.capacity);

		match stale {
			Some(index) => UpsertOutcome::Moved { from: index - 1, to: rank },
			None => UpsertOutcome::Inserted { rank },
		}
	}
}

/// Per-category leaderboards sharing one set of capacities.
#[derive(Debug)]
pub struct LeaderboardEngine {
	sizes: LeaderboardSizes,
	log_changes: bool,
	boards: RwLock<HashMap<CategoryId, Arc<Mutex<Leaderboard>>>>,
}
impl LeaderboardEngine {
	/// Creates an engine tracking `track` entries per category and displaying `display`.
	///
	/// `display` is clamped to `track`.
	pub fn new(track: usize, display: usize) -> Self {
		Self::with_sizes(LeaderboardSizes { track, display: display.min(track) })
	}

	/// Creates an engine from configured sizes.
	pub fn with_sizes(sizes: LeaderboardSizes) -> Self {
		Self { sizes, log_changes: false, boards: Default::default() }
	}

	/// Restores an engine from a snapshot, tidying each category as
	/// [`Leaderboard::from_entries`] does.
	pub fn from_snapshot(sizes: LeaderboardSizes, snapshot: LeaderboardSnapshot) -> Self {
		let boards = snapshot
			.into_iter()
			.map(|(category, entries)| {
				(category, Arc::new(Mutex::new(Leaderboard::from_entries(sizes.track, entries))))
			})
			.collect();

		Self { sizes, log_changes: false, boards: RwLock::new(boards) }
	}

	/// Creates an engine sized and logging as `config` asks.
	pub fn from_config(config: &Config) -> Self {
		Self::with_sizes(config.leaderboard).with_change_logging(config.log_leaderboard_changes)
	}

	/// Logs inserts and moves at `info` instead of `debug`.
	pub fn with_change_logging(mut self, enabled: bool) -> Self {
		self.log_changes = enabled;

		self
	}

	/// Whether inserts and moves are logged at `info`.
	pub fn logs_changes(&self) -> bool {
		self.log_changes
	}

	/// Capacities in effect.
	pub fn sizes(&self) -> LeaderboardSizes {
		self.sizes
	}

	/// Records `owner_key`'s score in `category`.
	pub fn upsert(
		&self,
		category: CategoryId,
		owner_key: OwnerKey,
		display_name: impl Into<String>,
		region: Region,
		score: u64,
	) -> UpsertOutcome {
		let candidate =
			LeaderboardEntry { owner_key, display_name: display_name.into(), region, score };
		let board = self.board(category);
		let outcome = board.lock().upsert(candidate.clone());

		match outcome {
			UpsertOutcome::Inserted { .. } | UpsertOutcome::Moved { .. } => {
				let owner = &candidate.owner_key;

				if self.log_changes {
					tracing::info!(%category, %owner, score, ?outcome, "leaderboard changed");
				} else {
					tracing::debug!(%category, %owner, score, ?outcome, "leaderboard changed");
				}
			},
			_ => {},
		}

		outcome
	}

	/// The best `n` entries of `category`.
	pub fn get_top(&self, category: CategoryId, n: usize) -> Vec<LeaderboardEntry> {
		self.boards
			.read()
			.get(&category)
			.map(|board| board.lock().top(n).to_vec())
			.unwrap_or_default()
	}

	/// The entries of `category` meant to be shown.
	pub fn display_top(&self, category: CategoryId) -> Vec<LeaderboardEntry> {
		self.get_top(category, self.sizes.display)
	}

	/// Categories with at least one recorded upsert, ascending.
	pub fn categories(&self) -> Vec<CategoryId> {
		let mut categories: Vec<_> = self.boards.read().keys().copied().collect();

		categories.sort_unstable();

		categories
	}

	/// Copies every category's entries.
	pub fn snapshot(&self) -> LeaderboardSnapshot {
		let boards: Vec<_> =
			self.boards.read().iter().map(|(id, board)| (*id, board.clone())).collect();

		boards.into_iter().map(|(id, board)| (id, board.lock().entries().to_vec())).collect()
	}

	fn board(&self, category: CategoryId) -> Arc<Mutex<Leaderboard>> {
		if let Some(board) = self.boards.read().get(&category) {
			return board.clone();
		}

		self.boards
			.write()
			.entry(category)
			.or_insert_with(|| Arc::new(Mutex::new(Leaderboard::new(self.sizes.track))))
			.clone()
	}
}
