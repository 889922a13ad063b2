// std
use std::{collections::HashMap, sync::Arc};
// crates.io
use proptest::prelude::*;
use time::{Duration, macros::datetime};
// self
use mastery_lookup::{
	clock::{Clock, ManualClock},
	rate_limit::{LimitKey, RateLimit, WindowSpec, WindowUsage, acquire_all},
	region::Region,
};

proptest! {
	#![proptest_config(ProptestConfig::with_cases(200))]

	#[test]
	fn admitted_requests_never_exceed_any_interval_quota(
		requests in 1_u32..6,
		interval_secs in 1_u64..5,
		steps in prop::collection::vec(0_i64..1_500, 1..120),
	) {
		let start = datetime!(2025-11-10 12:00 UTC);
		let clock = Arc::new(ManualClock::new(start));
		let shared: Arc<dyn Clock> = clock.clone();
		let limit = Arc::new(RateLimit::with_windows(
			LimitKey::application(Region::Euw),
			shared.clone(),
			&[WindowSpec::new(requests, interval_secs)],
		));
		let interval_ms = i64::try_from(interval_secs * 1_000).expect("Interval fits in i64.");
		let mut admitted = HashMap::<i64, u32>::new();

		for step in steps {
			clock.advance(Duration::milliseconds(step));

			if acquire_all(std::slice::from_ref(&limit), shared.as_ref()).is_ok() {
				let elapsed = (clock.now() - start).whole_milliseconds();
				let bucket = i64::try_from(elapsed).expect("Elapsed fits in i64.") / interval_ms;

				*admitted.entry(bucket).or_default() += 1;
			}
		}

		prop_assert!(admitted.values().all(|count| *count <= requests));
	}

	#[test]
	fn reported_usage_only_raises_local_counts(
		local in 0_u32..10,
		reported in 0_u32..20,
	) {
		let now = datetime!(2025-11-10 12:00 UTC);
		let clock: Arc<dyn Clock> = Arc::new(ManualClock::new(now));
		let spec = WindowSpec::new(10, 60);
		let limit = RateLimit::with_windows(LimitKey::application(Region::Kr), clock, &[spec]);

		for _ in 0..local {
			limit.consume_at(now);
		}

		let usage = [WindowUsage { used: reported, interval_secs: 60 }];

		limit.reconcile_at(now, Some(&[spec][..]), Some(&usage[..]), None);
		limit.reconcile_at(now, Some(&[spec][..]), Some(&usage[..]), None);

		prop_assert_eq!(limit.windows()[0].used_requests(), local.max(reported));
	}
}
