//! Order statistics over an unordered sample buffer.
//!
//! Percentiles are exact: `p_q` is the element at sorted index
//! `floor(count * q)`. Selection uses `select_nth_unstable` (introselect,
//! expected linear time) instead of a full sort.

use serde::Serialize;

/// Reported quantiles in permille, ascending. The ascending order lets each
/// selection run only on the suffix left unordered by the previous one.
pub const QUANTILES_PERMILLE: [u64; 4] = [100, 500, 990, 999];

/// Sorted index for a quantile expressed in permille: `floor(count * q)`,
/// clamped to the last element.
#[inline]
pub fn quantile_index(count: usize, permille: u64) -> usize {
    if count == 0 {
        return 0;
    }
    let idx = (count as u128 * u128::from(permille) / 1000) as usize;
    idx.min(count - 1)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Percentiles {
    pub p10: i32,
    pub p50: i32,
    pub p99: i32,
    pub p999: i32,
}

impl Percentiles {
    /// Reorders `values` in place. Returns None for an empty buffer.
    pub fn select(values: &mut [i32]) -> Option<Self> {
        if values.is_empty() {
            return None;
        }
        let count = values.len();
        let mut out = [0i32; QUANTILES_PERMILLE.len()];
        // Elements at and before `ordered_upto` are already partitioned; later
        // (larger) indices only need selecting within the tail.
        let mut ordered_upto: Option<usize> = None;

        for (slot, &permille) in out.iter_mut().zip(QUANTILES_PERMILLE.iter()) {
            let idx = quantile_index(count, permille);
            match ordered_upto {
                Some(prev) if prev == idx => {}
                Some(prev) if prev < idx => {
                    values[prev + 1..].select_nth_unstable(idx - prev - 1);
                }
                _ => {
                    values.select_nth_unstable(idx);
                }
            }
            ordered_upto = Some(idx);
            *slot = values[idx];
        }

        Some(Self { p10: out[0], p50: out[1], p99: out[2], p999: out[3] })
    }
}

/// Count, sum, truncating mean and extremes of a sample buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Moments {
    pub count: u64,
    pub sum: i64,
    pub avg: i32,
    pub min: i32,
    pub max: i32,
}

impl Moments {
    /// Single linear pass. Returns None for an empty buffer.
    pub fn scan(values: &[i32]) -> Option<Self> {
        let (&first, rest) = values.split_first()?;
        let mut sum = i64::from(first);
        let mut min = first;
        let mut max = first;
        for &v in rest {
            sum += i64::from(v);
            min = min.min(v);
            max = max.max(v);
        }
        let count = values.len() as u64;
        // Mean of i32 samples always lies within [min, max], so it fits in i32.
        let avg = sum.checked_div(count as i64).unwrap_or(0) as i32;
        Some(Self { count, sum, avg, min, max })
    }
}
