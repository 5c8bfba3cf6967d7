use shared_types::BusySlot;

/// Merge busy intervals from any number of calendars into a sorted,
/// disjoint set. Intervals that touch are merged; degenerate intervals are
/// dropped.
pub fn merge_busy(busy_arrays: &[Vec<BusySlot>]) -> Vec<BusySlot> {
    let mut all: Vec<BusySlot> = busy_arrays
        .iter()
        .flatten()
        .filter(|slot| slot.start < slot.end)
        .copied()
        .collect();
    all.sort_by_key(|slot| slot.start);

    let mut merged: Vec<BusySlot> = Vec::with_capacity(all.len());
    for slot in all {
        if let Some(last) = merged.last_mut() {
            if slot.start <= last.end {
                last.end = last.end.max(slot.end);
                continue;
            }
        }
        merged.push(slot);
    }
    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Duration, Utc};

    fn base() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2026-10-20T00:00:00Z")
            .unwrap()
            .with_timezone(&Utc)
    }

    fn busy(start_min: i64, end_min: i64) -> BusySlot {
        BusySlot::new(
            base() + Duration::minutes(start_min),
            base() + Duration::minutes(end_min),
        )
    }

    fn covered(slots: &[BusySlot], minute: i64) -> bool {
        let t = base() + Duration::minutes(minute);
        slots.iter().any(|s| s.start <= t && t < s.end)
    }

    /// Small deterministic generator so the property checks stay reproducible.
    fn pseudo_random_intervals(seed: u64, count: usize) -> Vec<Vec<BusySlot>> {
        let mut state = seed;
        let mut next = move || {
            state = state.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
            (state >> 33) as i64
        };
        (0..3)
            .map(|_| {
                (0..count)
                    .map(|_| {
                        let start = next() % 600;
                        let len = 1 + next() % 90;
                        busy(start, start + len)
                    })
                    .collect()
            })
            .collect()
    }

    #[test]
    fn empty_input_gives_empty_output() {
        assert!(merge_busy(&[]).is_empty());
        assert!(merge_busy(&[vec![], vec![]]).is_empty());
    }

    #[test]
    fn single_array_is_sorted() {
        let merged = merge_busy(&[vec![busy(120, 180), busy(0, 30)]]);
        assert_eq!(merged, vec![busy(0, 30), busy(120, 180)]);
    }

    #[test]
    fn touching_intervals_merge() {
        let merged = merge_busy(&[vec![busy(0, 60)], vec![busy(60, 90)]]);
        assert_eq!(merged, vec![busy(0, 90)]);
    }

    #[test]
    fn contained_interval_is_absorbed() {
        let merged = merge_busy(&[vec![busy(0, 120), busy(30, 45)], vec![busy(100, 110)]]);
        assert_eq!(merged, vec![busy(0, 120)]);
    }

    #[test]
    fn overlapping_members_merge_across_arrays() {
        // member A 09:00-10:00, member B 09:30-10:30
        let merged = merge_busy(&[vec![busy(0, 60)], vec![busy(30, 90)]]);
        assert_eq!(merged, vec![busy(0, 90)]);
    }

    #[test]
    fn merge_is_idempotent() {
        for seed in 1..20 {
            let input = pseudo_random_intervals(seed, 8);
            let once = merge_busy(&input);
            let twice = merge_busy(&[once.clone()]);
            assert_eq!(once, twice, "seed {seed}");
        }
    }

    #[test]
    fn merge_preserves_union_and_leaves_positive_gaps() {
        for seed in 1..20 {
            let input = pseudo_random_intervals(seed, 8);
            let flat: Vec<BusySlot> = input.iter().flatten().copied().collect();
            let merged = merge_busy(&input);

            for pair in merged.windows(2) {
                assert!(pair[0].end < pair[1].start, "seed {seed}: {pair:?}");
            }
            for minute in 0..720 {
                assert_eq!(covered(&flat, minute), covered(&merged, minute), "seed {seed} minute {minute}");
            }
        }
    }
}
