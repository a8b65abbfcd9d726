use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Closed day-granularity interval. Both boundary days belong to the range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
	pub start: NaiveDate,
	pub end: NaiveDate,
}

#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum BookingError {
	#[error("end date must not be before start date")]
	EndBeforeStart,
	#[error("start date must not be in the past")]
	StartInPast,
}

impl DateRange {
	pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self, BookingError> {
		if end < start {
			return Err(BookingError::EndBeforeStart);
		}
		Ok(DateRange { start, end })
	}

	/// A booking candidate additionally may not start before `today`.
	pub fn new_booking(start: NaiveDate, end: NaiveDate, today: NaiveDate) -> Result<Self, BookingError> {
		let range = Self::new(start, end)?;
		if start < today {
			return Err(BookingError::StartInPast);
		}
		Ok(range)
	}

	/// Inclusive day count: a one-day rental spans a single date.
	pub fn days(&self) -> i64 {
		(self.end - self.start).num_days() + 1
	}

	/// Closed-interval overlap. Sharing a single boundary day counts as a
	/// conflict: no same-day turnover between two rentals.
	pub fn overlaps(&self, other: &DateRange) -> bool {
		self.start <= other.end && self.end >= other.start
	}

	pub fn conflicts(&self, unavailable: &[DateRange]) -> Vec<DateRange> {
		unavailable.iter().filter(|r| self.overlaps(r)).copied().collect()
	}

	pub fn is_available(&self, unavailable: &[DateRange]) -> bool {
		unavailable.iter().all(|r| !self.overlaps(r))
	}

	pub fn quote(&self, price_per_day: f64) -> f64 {
		self.days() as f64 * price_per_day
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn d(y: i32, m: u32, day: u32) -> NaiveDate {
		NaiveDate::from_ymd_opt(y, m, day).unwrap()
	}

	fn r(start: NaiveDate, end: NaiveDate) -> DateRange {
		DateRange::new(start, end).unwrap()
	}

	#[test]
	fn empty_unavailable_set_is_always_available() {
		let candidate = r(d(2025, 11, 18), d(2025, 11, 19));
		assert!(candidate.is_available(&[]));
		assert!(candidate.conflicts(&[]).is_empty());
	}

	#[test]
	fn candidate_inside_an_interval_is_rejected() {
		let busy = r(d(2025, 11, 20), d(2025, 11, 25));
		let candidate = r(d(2025, 11, 21), d(2025, 11, 23));
		assert!(!candidate.is_available(&[busy]));
		assert_eq!(candidate.conflicts(&[busy]), vec![busy]);
	}

	#[test]
	fn adjacent_candidate_does_not_overlap() {
		// candidate.end == interval.start - 1
		let busy = r(d(2025, 11, 20), d(2025, 11, 25));
		assert!(r(d(2025, 11, 18), d(2025, 11, 19)).is_available(&[busy]));
		// and on the other side: candidate.start == interval.end + 1
		assert!(r(d(2025, 11, 26), d(2025, 11, 28)).is_available(&[busy]));
	}

	#[test]
	fn shared_boundary_day_counts_as_overlap() {
		let busy = r(d(2025, 11, 20), d(2025, 11, 25));
		assert!(!r(d(2025, 11, 19), d(2025, 11, 20)).is_available(&[busy]));
		assert!(!r(d(2025, 11, 25), d(2025, 11, 27)).is_available(&[busy]));
	}

	#[test]
	fn candidate_spanning_the_whole_interval_conflicts() {
		let busy = r(d(2025, 11, 20), d(2025, 11, 25));
		let candidate = r(d(2025, 11, 10), d(2025, 11, 30));
		assert_eq!(candidate.conflicts(&[busy]), vec![busy]);
	}

	#[test]
	fn all_conflicting_intervals_are_reported() {
		let first = r(d(2025, 11, 1), d(2025, 11, 3));
		let second = r(d(2025, 11, 10), d(2025, 11, 12));
		let third = r(d(2025, 11, 20), d(2025, 11, 25));
		let candidate = r(d(2025, 11, 3), d(2025, 11, 10));
		assert_eq!(candidate.conflicts(&[first, second, third]), vec![first, second]);
	}

	#[test]
	fn end_before_start_is_invalid_input() {
		assert_eq!(
			DateRange::new(d(2025, 11, 20), d(2025, 11, 19)),
			Err(BookingError::EndBeforeStart)
		);
	}

	#[test]
	fn booking_may_not_start_in_the_past() {
		let today = d(2025, 11, 20);
		assert_eq!(
			DateRange::new_booking(d(2025, 11, 19), d(2025, 11, 22), today),
			Err(BookingError::StartInPast)
		);
		// starting today is fine
		assert!(DateRange::new_booking(d(2025, 11, 20), d(2025, 11, 22), today).is_ok());
	}

	#[test]
	fn fully_past_window_is_rejected() {
		let today = d(2025, 11, 20);
		assert_eq!(
			DateRange::new_booking(d(2025, 11, 1), d(2025, 11, 5), today),
			Err(BookingError::StartInPast)
		);
	}

	#[test]
	fn inclusive_day_count_and_quote() {
		let range = r(d(2025, 11, 22), d(2025, 11, 26));
		assert_eq!(range.days(), 5);
		assert_eq!(range.quote(120.0), 600.0);
		// one-day rental still bills one day
		let single = r(d(2025, 11, 22), d(2025, 11, 22));
		assert_eq!(single.days(), 1);
		assert_eq!(single.quote(120.0), 120.0);
	}
}
