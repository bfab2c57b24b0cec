//! Salience-weighted selection.
//!
//! `SalienceSet` is a multiset of `(weight, item)` entries kept in insertion
//! order. It is what the coderack draws its next codelet from, but it is generic
//! and usable on its own.
//!
//! ## Invariants
//!
//! - No entry weight is NaN or infinite. Insertion and reweighting reject such
//!   values with [`Error::InvalidWeight`] before touching the set.
//! - `total_weight` is the sum of entry weights, maintained incrementally. It may
//!   drift (floating point accumulation, or a removal/reweight that did not find
//!   its entry). A removal or reweight that misses marks the total stale, and
//!   the next weighted draw re-derives it first. A draw that walks off the end
//!   of the entries also re-derives the total and retries.
//!
//! ## Selection strategies
//!
//! ```text
//! SearchQuality::Fast  select_salient ─┐
//!                      select_random  ─┴─▶ select_approximate (rotation)
//! SearchQuality::Best  select_salient ───▶ select_weighted_random
//!                      select_random  ───▶ select_uniform_random
//! ```
//!
//! Under `Fast` the salient and random entry points are identical: both ignore
//! weights and rotate. Callers may rely on that.

use crate::Error;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::VecDeque;
use tracing::{trace, warn};

/// How carefully selection honors weights.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SearchQuality {
    /// O(1) round-robin approximation; weights are ignored.
    Fast,
    /// True salience-proportional (or uniform) random draws.
    #[default]
    Best,
}

pub(crate) fn check_finite(weight: f64) -> Result<f64, Error> {
    if weight.is_finite() { Ok(weight) } else { Err(Error::InvalidWeight(weight)) }
}

#[derive(Debug, Clone)]
pub struct SalienceSet<T> {
    entries: VecDeque<(f64, T)>,
    total: f64,
    last_selected: Option<T>,
    /// Set when an update missed its entry; the next weighted draw recomputes.
    stale: bool,
    rng: StdRng,
}

impl<T: Clone + PartialEq> Default for SalienceSet<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone + PartialEq> SalienceSet<T> {
    /// Create an empty set with an entropy-seeded generator.
    pub fn new() -> Self {
        Self::with_rng(StdRng::from_entropy())
    }

    /// Create an empty set whose draws are reproducible.
    pub fn seeded(seed: u64) -> Self {
        Self::with_rng(StdRng::seed_from_u64(seed))
    }

    fn with_rng(rng: StdRng) -> Self {
        SalienceSet { entries: VecDeque::new(), total: 0.0, last_selected: None, stale: false, rng }
    }

    /// Rebuild a set from stored parts, trusting the stored total.
    pub(crate) fn from_parts(total: f64, entries: Vec<(f64, T)>) -> Self {
        let mut set = Self::new();
        set.entries = entries.into();
        set.total = total;
        set
    }

    /// Replace the random generator with a seeded one.
    pub fn reseed(&mut self, seed: u64) {
        self.rng = StdRng::seed_from_u64(seed);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The running salience total (see the module notes on drift).
    pub fn total_weight(&self) -> f64 {
        self.total
    }

    /// Entries in order.
    pub fn iter(&self) -> impl Iterator<Item = (f64, &T)> {
        self.entries.iter().map(|(w, item)| (*w, item))
    }

    /// Append `item` with `weight`.
    pub fn insert(&mut self, weight: f64, item: T) -> Result<(), Error> {
        check_finite(weight)?;
        self.push_unchecked(weight, item);
        Ok(())
    }

    /// Append without validating; callers must have checked `weight`.
    pub(crate) fn push_unchecked(&mut self, weight: f64, item: T) {
        self.entries.push_back((weight, item));
        self.total += weight;
    }

    /// Remove the first entry holding `item` at exactly `weight`.
    ///
    /// The total is decremented by `weight` whether or not an entry was found.
    /// A miss marks the total stale so the next weighted draw re-derives it.
    pub fn remove(&mut self, weight: f64, item: &T) -> bool {
        let position = self.entries.iter().position(|(w, it)| *w == weight && it == item);
        self.total -= weight;
        self.remove_at(position)
    }

    /// Remove the first entry with exactly `weight`, whatever its item.
    ///
    /// Like [`remove`](Self::remove), the total is decremented unconditionally.
    pub fn remove_first_with_weight(&mut self, weight: f64) -> bool {
        let position = self.entries.iter().position(|(w, _)| *w == weight);
        self.total -= weight;
        self.remove_at(position)
    }

    fn remove_at(&mut self, position: Option<usize>) -> bool {
        match position {
            Some(index) => self.entries.remove(index).is_some(),
            None => {
                trace!(target: "terraced::salience", total = self.total, "removal found no entry; total marked stale");
                self.stale = true;
                false
            }
        }
    }

    /// Change the weight of the first entry holding `item` at `before`.
    ///
    /// When no entry matches (typically because of earlier floating point
    /// drift) only the total is adjusted, and it is marked stale.
    pub fn reweight(&mut self, item: &T, before: f64, after: f64) -> Result<(), Error> {
        check_finite(before)?;
        check_finite(after)?;
        match self.entries.iter_mut().find(|(w, it)| *w == before && it == item) {
            Some(entry) => entry.0 = after,
            None => {
                trace!(target: "terraced::salience", before, after, "reweight found no entry; adjusting total only");
                self.stale = true;
            }
        }
        self.total += after - before;
        Ok(())
    }

    /// Round-robin approximation of a salient draw.
    ///
    /// Returns the first entry, first rotating it to the back if it is the
    /// item returned by the previous call.
    pub fn select_approximate(&mut self) -> Option<(f64, T)> {
        let repeat = match (self.entries.front(), &self.last_selected) {
            (None, _) => return None,
            (Some((_, first)), Some(last)) => first == last,
            (Some(_), None) => false,
        };
        if repeat {
            if let Some(entry) = self.entries.pop_front() {
                self.entries.push_back(entry);
            }
        }
        let (weight, item) = self.entries.front().cloned()?;
        self.last_selected = Some(item.clone());
        Some((weight, item))
    }

    /// Draw an entry with probability proportional to its weight.
    pub fn select_weighted_random(&mut self) -> Option<(f64, T)> {
        if self.entries.is_empty() {
            return None;
        }
        if self.stale || self.total <= 0.0 {
            self.recompute_total();
        }

        for _ in 0..2 {
            let target = if self.total > 0.0 { self.rng.r#gen::<f64>() * self.total } else { 0.0 };
            let mut so_far = 0.0;
            for (weight, item) in &self.entries {
                so_far += *weight;
                if so_far >= target {
                    return Some((*weight, item.clone()));
                }
            }

            warn!(
                target: "terraced::salience",
                stored = self.total,
                actual = so_far,
                "salience drift: stored total overstates entries; recomputing"
            );
            self.total = so_far;
        }

        // Only reachable with negative weights, which the walk cannot honor.
        self.entries.back().cloned()
    }

    /// Draw an entry uniformly, ignoring weights.
    pub fn select_uniform_random(&mut self) -> Option<(f64, T)> {
        if self.entries.is_empty() {
            return None;
        }
        let index = self.rng.gen_range(0..self.entries.len());
        self.entries.get(index).cloned()
    }

    /// Salience-proportional draw at the requested quality.
    pub fn select_salient(&mut self, quality: SearchQuality) -> Option<(f64, T)> {
        match quality {
            SearchQuality::Fast => self.select_approximate(),
            SearchQuality::Best => self.select_weighted_random(),
        }
    }

    /// Unweighted draw at the requested quality.
    pub fn select_random(&mut self, quality: SearchQuality) -> Option<(f64, T)> {
        match quality {
            SearchQuality::Fast => self.select_approximate(),
            SearchQuality::Best => self.select_uniform_random(),
        }
    }

    /// Smallest weight, or `f64::MAX` when empty.
    pub fn min_weight(&self) -> f64 {
        self.entries.iter().fold(f64::MAX, |min, (w, _)| if *w < min { *w } else { min })
    }

    /// Largest weight, or `f64::MIN` when empty.
    pub fn max_weight(&self) -> f64 {
        self.entries.iter().fold(f64::MIN, |max, (w, _)| if *w > max { *w } else { max })
    }

    /// Re-derive the total from the entries and return it.
    pub fn recompute_total(&mut self) -> f64 {
        self.total = self.entries.iter().map(|(w, _)| *w).sum();
        self.stale = false;
        self.total
    }

    pub fn contains(&self, weight: f64, item: &T) -> bool {
        self.entries.iter().any(|(w, it)| *w == weight && it == item)
    }

    pub fn contains_weight(&self, weight: f64) -> bool {
        self.entries.iter().any(|(w, _)| *w == weight)
    }

    /// Weight of the first entry holding `item`, or `0.0` when absent.
    pub fn weight_of(&self, item: &T) -> f64 {
        self.entries.iter().find(|(_, it)| it == item).map(|(w, _)| *w).unwrap_or(0.0)
    }

    /// First item stored at exactly `weight`.
    pub fn find_by_weight(&self, weight: f64) -> Option<&T> {
        self.entries.iter().find(|(w, _)| *w == weight).map(|(_, item)| item)
    }

    /// Strict form of [`find_by_weight`](Self::find_by_weight).
    pub fn item_with_weight(&self, weight: f64) -> Result<&T, Error> {
        self.find_by_weight(weight).ok_or(Error::WeightNotFound(weight))
    }

    /// Replace the item of every entry stored at exactly `weight`.
    ///
    /// Bulk update kept for rebuilding sets before they are handed to a
    /// coderack; it does not change the total.
    pub fn replace_with_weight(&mut self, weight: f64, item: T) {
        for entry in self.entries.iter_mut().filter(|(w, _)| *w == weight) {
            entry.1 = item.clone();
        }
    }

    /// Remove every entry and reset the total.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.total = 0.0;
        self.last_selected = None;
        self.stale = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn true_sum<T: Clone + PartialEq>(set: &SalienceSet<T>) -> f64 {
        set.iter().map(|(w, _)| w).sum()
    }

    #[test]
    fn insert_rejects_non_finite_weights() {
        let mut set = SalienceSet::seeded(1);
        set.insert(2.0, "a").unwrap();

        assert!(matches!(set.insert(f64::NAN, "x"), Err(Error::InvalidWeight(_))));
        assert!(matches!(set.insert(f64::INFINITY, "x"), Err(Error::InvalidWeight(_))));
        assert!(matches!(set.insert(f64::NEG_INFINITY, "x"), Err(Error::InvalidWeight(_))));

        assert_eq!(set.len(), 1);
        assert_eq!(set.total_weight(), 2.0);
    }

    #[test]
    fn reweight_rejects_non_finite_without_mutation() {
        let mut set = SalienceSet::seeded(1);
        set.insert(2.0, "a").unwrap();
        assert!(set.reweight(&"a", 2.0, f64::NAN).is_err());
        assert_eq!(set.weight_of(&"a"), 2.0);
        assert_eq!(set.total_weight(), 2.0);
    }

    #[test]
    fn reweight_rejects_non_finite_previous_weight() {
        let mut set = SalienceSet::seeded(1);
        set.insert(2.0, "a").unwrap();
        assert!(matches!(set.reweight(&"a", f64::NAN, 3.0), Err(Error::InvalidWeight(_))));
        assert!(matches!(set.reweight(&"a", f64::INFINITY, 3.0), Err(Error::InvalidWeight(_))));
        assert_eq!(set.weight_of(&"a"), 2.0);
        assert_eq!(set.total_weight(), 2.0);
    }

    #[test]
    fn total_tracks_random_operation_sequences() {
        let mut ops = StdRng::seed_from_u64(7);
        let mut set: SalienceSet<u32> = SalienceSet::seeded(3);

        for step in 0..2_000u32 {
            match ops.gen_range(0..4) {
                0 | 1 => {
                    let weight = ops.gen_range(0.0..50.0);
                    set.insert(weight, step % 17).unwrap();
                }
                2 if !set.is_empty() => {
                    let index = ops.gen_range(0..set.len());
                    let (weight, item) = set.iter().nth(index).map(|(w, it)| (w, *it)).unwrap();
                    assert!(set.remove(weight, &item));
                }
                3 if !set.is_empty() => {
                    let index = ops.gen_range(0..set.len());
                    let (weight, item) = set.iter().nth(index).map(|(w, it)| (w, *it)).unwrap();
                    set.reweight(&item, weight, ops.gen_range(0.0..50.0)).unwrap();
                }
                _ => {}
            }

            assert!((set.total_weight() - true_sum(&set)).abs() < 1e-6);
            if !set.is_empty() {
                assert!(set.select_weighted_random().is_some());
            }
        }
    }

    #[test]
    fn remove_requires_item_and_weight() {
        let mut set = SalienceSet::seeded(1);
        set.insert(1.0, "a").unwrap();
        set.insert(2.0, "a").unwrap();
        set.insert(2.0, "b").unwrap();

        assert!(set.remove(2.0, &"b"));
        assert_eq!(set.len(), 2);
        assert!(set.contains(2.0, &"a"));
        assert!(!set.contains(2.0, &"b"));
        assert_eq!(set.total_weight(), 3.0);
    }

    #[test]
    fn failed_removals_still_decrement_total() {
        let mut set = SalienceSet::seeded(1);
        set.insert(5.0, "a").unwrap();

        assert!(!set.remove(3.0, &"a"));
        assert_eq!(set.total_weight(), 2.0);
        assert!(!set.remove_first_with_weight(1.0));
        assert_eq!(set.total_weight(), 1.0);
        assert_eq!(set.len(), 1);

        // The misses marked the total stale; the draw re-derives it first.
        assert_eq!(set.select_weighted_random(), Some((5.0, "a")));
        assert_eq!(set.total_weight(), 5.0);
        assert!(set.remove_first_with_weight(5.0));
        assert!(set.is_empty());
    }

    #[test]
    fn failed_removal_does_not_starve_trailing_entries() {
        let mut set = SalienceSet::seeded(42);
        set.insert(1.0, "a").unwrap();
        set.insert(1.0, "b").unwrap();
        set.insert(98.0, "c").unwrap();

        assert!(!set.remove(98.0, &"zzz"));
        assert_eq!(set.total_weight(), 2.0);

        let draws = 10_000;
        let c = (0..draws).filter(|_| set.select_weighted_random().unwrap().1 == "c").count();
        let ratio = c as f64 / draws as f64;
        assert!((ratio - 0.98).abs() <= 0.02, "ratio = {ratio}");
        assert_eq!(set.total_weight(), 100.0);
    }

    #[test]
    fn reweight_without_match_only_moves_total() {
        let mut set = SalienceSet::seeded(1);
        set.insert(1.0, "a").unwrap();
        set.reweight(&"missing", 0.0, 4.0).unwrap();
        assert_eq!(set.weight_of(&"a"), 1.0);
        assert_eq!(set.total_weight(), 5.0);
    }

    #[test]
    fn weighted_draw_heals_overstated_total() {
        let mut set = SalienceSet::seeded(11);
        set.insert(1.0, "a").unwrap();
        set.insert(1.0, "b").unwrap();
        set.reweight(&"ghost", 0.0, 50.0).unwrap();
        assert_eq!(set.total_weight(), 52.0);

        for _ in 0..20 {
            let (_, item) = set.select_weighted_random().unwrap();
            assert!(item == "a" || item == "b");
        }
        assert!((set.total_weight() - 2.0).abs() < 1e-9);
    }

    #[test]
    fn approximate_selection_round_robins() {
        let mut set = SalienceSet::seeded(1);
        for item in ["a", "b", "c"] {
            set.insert(1.0, item).unwrap();
        }

        let seen: Vec<&str> = (0..3).map(|_| set.select_approximate().unwrap().1).collect();
        assert!(seen.contains(&"a"));
        assert!(seen.contains(&"b"));
        assert!(seen.contains(&"c"));

        for _ in 0..10 {
            assert!(set.select_approximate().is_some());
        }
    }

    #[test]
    fn fast_quality_entry_points_are_interchangeable() {
        let mut salient = SalienceSet::seeded(1);
        let mut random = SalienceSet::seeded(2);
        for (w, item) in [(1.0, 'x'), (90.0, 'y'), (9.0, 'z')] {
            salient.insert(w, item).unwrap();
            random.insert(w, item).unwrap();
        }

        for _ in 0..9 {
            assert_eq!(salient.select_salient(SearchQuality::Fast), random.select_random(SearchQuality::Fast));
        }
    }

    #[test]
    fn weighted_draw_converges_to_salience() {
        let mut set = SalienceSet::seeded(42);
        set.insert(1.0, "low").unwrap();
        set.insert(1.0, "also-low").unwrap();
        set.insert(98.0, "high").unwrap();

        let draws = 10_000;
        let high = (0..draws).filter(|_| set.select_weighted_random().unwrap().1 == "high").count();
        let ratio = high as f64 / draws as f64;
        assert!((ratio - 0.98).abs() <= 0.02, "ratio = {ratio}");
    }

    #[test]
    fn uniform_draw_ignores_weights() {
        let mut set = SalienceSet::seeded(5);
        set.insert(0.001, "rare").unwrap();
        set.insert(1000.0, "common").unwrap();

        let rare = (0..4_000).filter(|_| set.select_uniform_random().unwrap().1 == "rare").count();
        assert!(rare > 1_500 && rare < 2_500, "rare = {rare}");
    }

    #[test]
    fn empty_set_selects_nothing() {
        let mut set: SalienceSet<u8> = SalienceSet::seeded(1);
        assert_eq!(set.select_approximate(), None);
        assert_eq!(set.select_weighted_random(), None);
        assert_eq!(set.select_uniform_random(), None);
        assert_eq!(set.min_weight(), f64::MAX);
        assert_eq!(set.max_weight(), f64::MIN);
    }

    #[test]
    fn min_max_and_lookups() {
        let mut set = SalienceSet::seeded(1);
        set.insert(3.0, "a").unwrap();
        set.insert(-1.0, "b").unwrap();
        set.insert(7.5, "c").unwrap();

        assert_eq!(set.min_weight(), -1.0);
        assert_eq!(set.max_weight(), 7.5);
        assert!(set.contains_weight(3.0));
        assert_eq!(set.find_by_weight(7.5), Some(&"c"));
        assert_eq!(set.weight_of(&"zzz"), 0.0);
        assert!(matches!(set.item_with_weight(2.0), Err(Error::WeightNotFound(_))));

        set.replace_with_weight(3.0, "d");
        assert_eq!(set.item_with_weight(3.0).unwrap(), &"d");

        set.clear();
        assert!(set.is_empty());
        assert_eq!(set.total_weight(), 0.0);
    }
}
