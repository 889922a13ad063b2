//! Snapshot persistence contracts and the periodic writer.

// self
use crate::{
	_prelude::*,
	config::{Config, LeaderboardSizes},
	leaderboard::{FileSnapshotSink, LeaderboardEngine, LeaderboardSnapshot},
	obs::{LookupSpan, OpKind},
};

/// Boxed future returned by [`SnapshotSink`] operations.
pub type SnapshotFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, StoreError>> + 'a + Send>>;

/// Destination for leaderboard snapshots.
pub trait SnapshotSink
where
	Self: Send + Sync,
{
	/// Persists `snapshot`, replacing the previous one.
	fn save<'a>(&'a self, snapshot: &'a LeaderboardSnapshot) -> SnapshotFuture<'a, ()>;

	/// Returns the last persisted snapshot, if any.
	fn load(&self) -> SnapshotFuture<'_, Option<LeaderboardSnapshot>>;
}

/// Error type produced by [`SnapshotSink`] implementations.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ThisError)]
pub enum StoreError {
	/// Serialization failures surfaced by the backend.
	#[error("Serialization error: {message}.")]
	Serialization {
		/// Human-readable error payload.
		message: String,
	},
	/// Backend-level failure for the storage engine.
	#[error("Backend failure: {message}.")]
	Backend {
		/// Human-readable error payload.
		message: String,
	},
}

impl LeaderboardEngine {
	/// Restores an engine from `sink`, or starts empty when nothing was saved yet.
	pub async fn load_from(
		sink: &dyn SnapshotSink,
		sizes: LeaderboardSizes,
	) -> Result<Self, StoreError> {
		Ok(match sink.load().await? {
			Some(snapshot) => Self::from_snapshot(sizes, snapshot),
			None => Self::with_sizes(sizes),
		})
	}
}

/// Writes the engine's snapshot to a sink on a fixed interval.
pub struct SnapshotWriter {
	engine: Arc<LeaderboardEngine>,
	sink: Arc<dyn SnapshotSink>,
	interval: Duration,
}
impl SnapshotWriter {
	const MIN_INTERVAL: Duration = Duration::SECOND;

	/// Creates a writer; intervals shorter than one second are raised to one second.
	pub fn new(
		engine: Arc<LeaderboardEngine>,
		sink: Arc<dyn SnapshotSink>,
		interval: Duration,
	) -> Self {
		Self { engine, sink, interval: interval.max(Self::MIN_INTERVAL) }
	}

	/// Creates a writer saving to [`Config::snapshot_path`] every
	/// [`Config::snapshot_interval`]; `None` when no path is configured.
	pub fn from_config(engine: Arc<LeaderboardEngine>, config: &Config) -> Option<Self> {
		let path = config.snapshot_path.as_ref()?;

		Some(Self::new(
			engine,
			Arc::new(FileSnapshotSink::new(path)),
			config.snapshot_interval(),
		))
	}

	/// Interval between writes.
	pub fn interval(&self) -> Duration {
		self.interval
	}

	/// Writes one snapshot immediately.
	pub async fn save_now(&self) -> Result<(), StoreError> {
		let span = LookupSpan::new(OpKind::Snapshot, "snapshot_save");

		span.instrument(async {
			let snapshot = self.engine.snapshot();

			self.sink.save(&snapshot).await?;

			tracing::debug!(categories = snapshot.len(), "leaderboard snapshot written");

			Ok(())
		})
		.await
	}

	/// Saves every interval until the task is dropped; failures are logged and retried on the
	/// next tick.
	pub async fn run(self) {
		let period = std::time::Duration::try_from(self.interval)
			.unwrap_or(std::time::Duration::from_secs(1));
		let mut ticker = tokio::time::interval(period);

		ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
		// The first tick completes immediately; the initial state was just loaded.
		ticker.tick().await;

		loop {
			ticker.tick().await;

			if let Err(e) = self.save_now().await {
				tracing::error!(error = %e, "leaderboard snapshot failed");
			}
		}
	}
}
impl Debug for SnapshotWriter {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("SnapshotWriter").field("interval", &self.interval).finish()
	}
}
