//! XP curve shared by every Neighbor.
//!
//! `xp_threshold(level)` is the cumulative XP needed to *be* at `level`:
//!
//! ```text
//! xp_threshold(1) = 201
//! xp_threshold(n) = xp_threshold(n - 1) + floor(n^2.5) + n + 200
//! ```
//!
//! Thresholds are memoized for the lifetime of the process. The formula never
//! changes, so the cache is append-only and never invalidated.
use std::sync::{Mutex, OnceLock};

use crate::neighbor::errors::NeighborError;

/// Threshold for level 1.
pub const BASE_THRESHOLD: i64 = 201;

/// `THRESHOLDS[i]` holds `xp_threshold(i + 1)`.
static THRESHOLDS: OnceLock<Mutex<Vec<i64>>> = OnceLock::new();

fn threshold_cache() -> &'static Mutex<Vec<i64>> {
    THRESHOLDS.get_or_init(|| Mutex::new(vec![BASE_THRESHOLD]))
}

/// `floor(n^2.5) + n + 200`. Computed as `n^2 * sqrt(n)` so perfect squares stay exact.
fn step(level: i64) -> Option<i64> {
    let squared = level.checked_mul(level)?;
    let curve = (squared as f64 * (level as f64).sqrt()).floor();
    if !curve.is_finite() || curve >= i64::MAX as f64 {
        return None;
    }
    (curve as i64).checked_add(level)?.checked_add(200)
}

/// Cumulative XP required to reach `level`.
pub fn xp_threshold(level: i64) -> Result<i64, NeighborError> {
    if level < 1 {
        return Err(NeighborError::InvalidArgument(format!(
            "level cannot be lower than 1 (got {level})"
        )));
    }
    let index = usize::try_from(level - 1)
        .map_err(|_| NeighborError::InvalidArgument(format!("level {level} is too large")))?;

    let mut cache = threshold_cache()
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner());
    while cache.len() <= index {
        let next_level = cache.len() as i64 + 1;
        let previous = cache[cache.len() - 1];
        let next = step(next_level)
            .and_then(|delta| previous.checked_add(delta))
            .ok_or_else(|| {
                NeighborError::InvalidArgument(format!("level {level} is too large"))
            })?;
        cache.push(next);
    }
    Ok(cache[index])
}

/// Largest level whose threshold is `<= xp`, or 0 below the first threshold.
pub fn level_from_xp(xp: i64) -> Result<i64, NeighborError> {
    if xp < 0 {
        return Err(NeighborError::InvalidArgument(format!(
            "XP cannot be lower than 0 (got {xp})"
        )));
    }
    let mut level = 1;
    loop {
        match xp_threshold(level) {
            Ok(threshold) if threshold <= xp => level += 1,
            // A threshold past i64::MAX is above any representable XP.
            Ok(_) | Err(_) => return Ok(level - 1),
        }
    }
}

/// XP still missing before `xp` reaches the next level.
pub fn xp_to_next_level(xp: i64) -> Result<i64, NeighborError> {
    let level = level_from_xp(xp)?;
    Ok(xp_threshold(level + 1)? - xp)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_threshold_is_201() {
        assert_eq!(xp_threshold(1).unwrap(), 201);
    }

    #[test]
    fn thresholds_follow_the_recurrence() {
        // 201 + floor(2^2.5) + 2 + 200 = 201 + 5 + 202
        assert_eq!(xp_threshold(2).unwrap(), 408);
        // 408 + floor(3^2.5) + 3 + 200 = 408 + 15 + 203
        assert_eq!(xp_threshold(3).unwrap(), 626);
        // 626 + 32 + 4 + 200
        assert_eq!(xp_threshold(4).unwrap(), 862);
    }

    #[test]
    fn thresholds_strictly_increase() {
        let mut previous = xp_threshold(1).unwrap();
        for level in 2..=500 {
            let current = xp_threshold(level).unwrap();
            assert!(current > previous, "level {level} did not increase");
            previous = current;
        }
    }

    #[test]
    fn rejects_levels_below_one() {
        assert!(matches!(
            xp_threshold(0),
            Err(NeighborError::InvalidArgument(_))
        ));
        assert!(matches!(
            xp_threshold(-1),
            Err(NeighborError::InvalidArgument(_))
        ));
    }

    #[test]
    fn level_from_xp_boundaries() {
        assert_eq!(level_from_xp(0).unwrap(), 0);
        assert_eq!(level_from_xp(200).unwrap(), 0);
        assert_eq!(level_from_xp(201).unwrap(), 1);
        assert_eq!(level_from_xp(407).unwrap(), 1);
        assert_eq!(level_from_xp(408).unwrap(), 2);
        assert_eq!(level_from_xp(625).unwrap(), 2);
        assert_eq!(level_from_xp(626).unwrap(), 3);
    }

    #[test]
    fn level_brackets_xp() {
        for xp in (0..20_000).step_by(37) {
            let level = level_from_xp(xp).unwrap();
            if level >= 1 {
                assert!(xp_threshold(level).unwrap() <= xp);
            }
            assert!(xp < xp_threshold(level + 1).unwrap());
        }
    }

    #[test]
    fn rejects_negative_xp() {
        assert!(matches!(
            level_from_xp(-5),
            Err(NeighborError::InvalidArgument(_))
        ));
    }

    #[test]
    fn remaining_xp_to_next_level() {
        assert_eq!(xp_to_next_level(0).unwrap(), 201);
        assert_eq!(xp_to_next_level(201).unwrap(), 207);
        assert_eq!(xp_to_next_level(400).unwrap(), 8);
    }
}
