use chrono::Duration;
use shared_types::TimeSlot;

/// Split a free interval into back-to-back slots of `duration_minutes`,
/// aligned to the interval start. A trailing remainder shorter than the
/// duration is dropped.
pub fn quantize(free: &TimeSlot, duration_minutes: i64) -> Vec<TimeSlot> {
    let duration = Duration::minutes(duration_minutes);
    if duration <= Duration::zero() {
        return Vec::new();
    }

    let mut slots = Vec::new();
    let mut start = free.start;
    while start + duration <= free.end {
        slots.push(TimeSlot::new(start, start + duration));
        start += duration;
    }
    slots
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Utc};

    fn at(minute: i64) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2026-10-20T00:00:00Z")
            .unwrap()
            .with_timezone(&Utc)
            + Duration::minutes(minute)
    }

    #[test]
    fn exact_fit() {
        let slots = quantize(&TimeSlot::new(at(0), at(90)), 30);
        assert_eq!(
            slots,
            vec![
                TimeSlot::new(at(0), at(30)),
                TimeSlot::new(at(30), at(60)),
                TimeSlot::new(at(60), at(90)),
            ]
        );
    }

    #[test]
    fn remainder_is_dropped() {
        let slots = quantize(&TimeSlot::new(at(0), at(100)), 45);
        assert_eq!(slots.len(), 2);
        assert_eq!(slots[1].end, at(90));
    }

    #[test]
    fn interval_shorter_than_duration() {
        assert!(quantize(&TimeSlot::new(at(0), at(20)), 30).is_empty());
    }

    #[test]
    fn slots_have_exact_duration_and_do_not_overlap() {
        for duration in [15, 30, 45, 60, 90, 120] {
            let free = TimeSlot::new(at(7), at(7 + 517));
            let slots = quantize(&free, duration);
            for s in &slots {
                assert_eq!(s.duration(), Duration::minutes(duration));
            }
            for pair in slots.windows(2) {
                assert!(pair[0].end <= pair[1].start);
            }
            if let Some(last) = slots.last() {
                assert!(last.end <= free.end);
            }
            assert_eq!(slots.first().map(|s| s.start), Some(at(7)));
        }
    }

    #[test]
    fn non_positive_duration_yields_nothing() {
        assert!(quantize(&TimeSlot::new(at(0), at(60)), 0).is_empty());
    }
}
