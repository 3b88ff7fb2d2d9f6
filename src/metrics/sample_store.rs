//! Priority-ordered storage for weighted reservoir samples.
//!
//! Entries are keyed by a [`Priority`]: the sampling priority (a float) plus a
//! random 64-bit tiebreak. Two samples that draw the exact same float priority
//! therefore still get distinct keys instead of overwriting each other.

use std::collections::btree_map::Entry;
use std::collections::BTreeMap;

use ordered_float::NotNan;

/// Ordering key of a stored sample. Ordered by priority, then tiebreak.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Priority {
    value: NotNan<f64>,
    tiebreak: u64,
}

impl Priority {
    /// Returns `None` when `value` is NaN.
    pub fn new(value: f64, tiebreak: u64) -> Option<Self> {
        NotNan::new(value).ok().map(|value| Self { value, tiebreak })
    }

    pub fn value(&self) -> f64 {
        self.value.into_inner()
    }

    pub fn tiebreak(&self) -> u64 {
        self.tiebreak
    }
}

/// A value retained by the reservoir together with its decay weight.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WeightedSample {
    pub weight: f64,
    pub value: i64,
}

/// Ordered map from [`Priority`] to [`WeightedSample`].
///
/// Holds at most a reservoir's worth of entries (a few thousand), so a
/// `BTreeMap` gives O(log n) insert, delete and find-min without any
/// bespoke balancing.
#[derive(Debug, Default, Clone)]
pub struct WeightedSampleStore {
    entries: BTreeMap<Priority, WeightedSample>,
}

impl WeightedSampleStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a sample. Returns `false`, leaving the store untouched, if an
    /// entry with the identical key already exists.
    pub fn insert(&mut self, key: Priority, sample: WeightedSample) -> bool {
        match self.entries.entry(key) {
            Entry::Vacant(slot) => {
                slot.insert(sample);
                true
            }
            Entry::Occupied(_) => false,
        }
    }

    pub fn find_min(&self) -> Option<(Priority, WeightedSample)> {
        self.entries.first_key_value().map(|(k, s)| (*k, *s))
    }

    pub fn delete_min(&mut self) -> Option<(Priority, WeightedSample)> {
        self.entries.pop_first()
    }

    pub fn delete(&mut self, key: &Priority) -> Option<WeightedSample> {
        self.entries.remove(key)
    }

    /// Ascending iteration. The borrow pins the store, so the sequence
    /// reflects a single point in time and can be restarted by calling
    /// `iter()` again.
    pub fn iter(&self) -> impl Iterator<Item = (Priority, &WeightedSample)> + '_ {
        self.entries.iter().map(|(k, s)| (*k, s))
    }

    pub fn clear(&mut self) {
        self.entries = BTreeMap::new();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Multiply every weight and priority by `factor`, re-keying in place.
    ///
    /// A positive factor preserves relative order. When the factor is tiny,
    /// priorities may underflow to zero and collide; the tiebreak then keeps
    /// them apart, and an exact collision is resolved by bumping the
    /// tiebreak, so no sample is ever lost or duplicated.
    pub fn rescale(&mut self, factor: f64) {
        debug_assert!(factor.is_finite() && factor >= 0.0);

        let old = std::mem::take(&mut self.entries);
        for (key, sample) in old {
            let scaled = WeightedSample {
                weight: sample.weight * factor,
                value: sample.value,
            };
            let value = NotNan::new(key.value() * factor).unwrap_or(key.value);
            let mut tiebreak = key.tiebreak;
            loop {
                let new_key = Priority { value, tiebreak };
                if self.insert(new_key, scaled) {
                    break;
                }
                tiebreak = tiebreak.wrapping_add(1);
            }
        }
    }
}
