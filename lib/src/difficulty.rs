//! Fixed-segment difficulty retargeting from mean block interval.

use crate::timestamp::Timestamp;
use crate::{BLOCK_TIME_TARGET_MS, DEFAULT_DIFFICULTY, SEGMENT};

/// `[seg_start, seg_stop)` of block numbers whose mining_timestamps feed a
/// retarget decision for the block that would follow `parent_block_num`,
/// or `None` if that block isn't a segment boundary. Genesis (block 0) is
/// excluded from the first segment — its timestamp is a network constant,
/// not a real mining time, and would skew the mean.
pub fn segment_range(parent_block_num: u64) -> Option<(u64, u64)> {
    let candidate_num = parent_block_num + 1;
    if candidate_num < SEGMENT || candidate_num % SEGMENT != 0 {
        return None;
    }
    let seg_stop = candidate_num;
    let seg_start = seg_stop - SEGMENT;
    Some((if seg_start == 0 { 1 } else { seg_start }, seg_stop))
}

/// `round(log2(TARGET_MS / mean_delta))` over consecutive, ascending
/// `timestamps`. Needs at least two timestamps to form a delta.
pub fn adjustment(timestamps: &[Timestamp]) -> i64 {
    assert!(timestamps.len() >= 2, "need at least two timestamps to compute a delta");
    let deltas: Vec<i64> = timestamps
        .windows(2)
        .map(|pair| pair[1].unix_millis() - pair[0].unix_millis())
        .collect();
    let mean = deltas.iter().sum::<i64>() as f64 / deltas.len() as f64;
    let log_mean = mean.log2();
    let log_target = (BLOCK_TIME_TARGET_MS as f64).log2();
    (log_target - log_mean).round() as i64
}

/// Required difficulty for the block that would follow `parent_block_num`.
/// `segment_timestamps` must be `Some` (and cover `segment_range`) exactly
/// when `segment_range(parent_block_num)` is `Some`.
pub fn required_difficulty(
    parent_block_num: u64,
    parent_difficulty: u8,
    segment_timestamps: Option<&[Timestamp]>,
) -> u8 {
    let candidate_num = parent_block_num + 1;
    if candidate_num < SEGMENT {
        return DEFAULT_DIFFICULTY;
    }
    if candidate_num % SEGMENT == 0 {
        let timestamps =
            segment_timestamps.expect("segment boundary retarget requires segment timestamps");
        let adjusted = parent_difficulty as i64 + adjustment(timestamps);
        return adjusted.clamp(0, 255) as u8;
    }
    parent_difficulty
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ts(millis: i64) -> Timestamp {
        Timestamp::from_millis(millis)
    }

    #[test]
    fn below_segment_uses_default_difficulty() {
        assert_eq!(required_difficulty(5, 9, None), DEFAULT_DIFFICULTY);
    }

    #[test]
    fn non_boundary_keeps_parent_difficulty() {
        assert_eq!(required_difficulty(SEGMENT + 3, 7, None), 7);
    }

    #[test]
    fn segment_range_excludes_genesis_in_first_segment() {
        assert_eq!(segment_range(SEGMENT - 1), Some((1, SEGMENT)));
    }

    #[test]
    fn segment_range_is_none_off_boundary() {
        assert_eq!(segment_range(SEGMENT), None);
    }

    #[test]
    fn segment_range_second_segment_includes_genesis_omitted_floor() {
        assert_eq!(
            segment_range(2 * SEGMENT - 1),
            Some((SEGMENT, 2 * SEGMENT))
        );
    }

    #[test]
    fn double_target_mean_halves_difficulty_by_one() {
        let timestamps: Vec<Timestamp> = (0..SEGMENT)
            .map(|i| ts(i as i64 * BLOCK_TIME_TARGET_MS * 2))
            .collect();
        assert_eq!(adjustment(&timestamps), -1);
    }

    #[test]
    fn quarter_target_mean_raises_difficulty_by_two() {
        let timestamps: Vec<Timestamp> = (0..SEGMENT)
            .map(|i| ts(i as i64 * (BLOCK_TIME_TARGET_MS / 4)))
            .collect();
        assert_eq!(adjustment(&timestamps), 2);
    }

    #[test]
    fn retarget_result_clamps_to_u8_range() {
        let timestamps: Vec<Timestamp> = (0..SEGMENT).map(|i| ts(i as i64)).collect();
        assert_eq!(
            required_difficulty(2 * SEGMENT - 1, 250, Some(&timestamps)),
            255
        );
    }

    #[test]
    #[should_panic]
    fn retarget_without_timestamps_panics() {
        required_difficulty(2 * SEGMENT - 1, 2, None);
    }
}
