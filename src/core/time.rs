//! Wall-clock helpers shared by the presence index, scheduler and
//! reconciliation monitor. Last-writer-wins wall-clock comparisons are an
//! accepted, documented behavior here rather than something to paper over
//! with a logical clock.

use chrono::{DateTime, Utc};

#[must_use]
pub fn now() -> DateTime<Utc> { Utc::now() }

/// `remaining = max(0, target - now)`, used by `TimestampMark`'s stored
/// invariant and `getByIdOrToken`'s derived `remaining` field.
#[must_use]
pub fn remaining(target: DateTime<Utc>, now: DateTime<Utc>) -> chrono::Duration {
	let delta = target - now;
	if delta < chrono::Duration::zero() { chrono::Duration::zero() } else { delta }
}

#[cfg(test)]
mod tests {
	use chrono::Duration;

	use super::*;

	#[test]
	fn remaining_clamps_to_zero_when_past() {
		let now = Utc::now();
		let target = now - Duration::seconds(5);
		assert_eq!(remaining(target, now), Duration::zero());
	}

	#[test]
	fn remaining_is_positive_before_target() {
		let now = Utc::now();
		let target = now + Duration::seconds(10);
		let rem = remaining(target, now);
		assert!(rem > Duration::zero() && rem <= Duration::seconds(10));
	}
}
