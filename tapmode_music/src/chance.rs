// Weighted discrete choice over arbitrary payloads.
//
// Every stochastic decision in the engine that is not a plain uniform roll
// goes through a `WeightedTable`: which mode a section uses, how long a
// phrase is, which gesture plays next, which offset a tapping motif visits.
// Tables are configuration values built once per run and rolled against the
// shared `MusicRng`.
//
// Rolling draws one integer in `[0, total)` and walks the entries in
// declaration order, so a given seed picks the same payload as long as the
// table is declared the same way. Zero weights are legal and never chosen;
// rolling a table whose total is zero is a configuration error.
//
// Also holds the two uniform helpers built on the same source: `pick` and
// `shuffle`.

use crate::error::ComposeError;
use serde::{Deserialize, Serialize};
use tapmode_prng::MusicRng;

/// A table of `(weight, payload)` pairs.
///
/// Serializes as a JSON list of `[weight, payload]` pairs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WeightedTable<T> {
    entries: Vec<(u32, T)>,
}

impl<T> WeightedTable<T> {
    pub fn new(entries: Vec<(u32, T)>) -> Self {
        WeightedTable { entries }
    }

    /// Every payload gets weight 1.
    pub fn uniform(payloads: Vec<T>) -> Self {
        WeightedTable {
            entries: payloads.into_iter().map(|p| (1, p)).collect(),
        }
    }

    pub fn entries(&self) -> &[(u32, T)] {
        &self.entries
    }

    /// Sum of all weights.
    pub fn total_weight(&self) -> u64 {
        self.entries.iter().map(|(w, _)| *w as u64).sum()
    }

    /// Payloads that can actually be drawn.
    pub fn positive_payloads(&self) -> impl Iterator<Item = &T> {
        self.entries.iter().filter(|(w, _)| *w > 0).map(|(_, p)| p)
    }

    /// Draw one payload with probability `weight / total`.
    ///
    /// `label` names the table in the error when the total is zero.
    /// Consumes exactly one draw from `rng`.
    pub fn roll(&self, rng: &mut MusicRng, label: &str) -> Result<&T, ComposeError> {
        let total = self.total_weight();
        if total == 0 {
            return Err(ComposeError::EmptyTable {
                table: label.to_string(),
            });
        }
        let mut r = rng.roll(total);
        for (weight, payload) in &self.entries {
            let w = *weight as u64;
            if r < w {
                return Ok(payload);
            }
            r -= w;
        }
        // r < total guarantees a hit above.
        unreachable!("weighted roll walked past the end of '{label}'")
    }
}

/// Uniform choice from a slice. One draw.
pub fn pick<'a, T>(rng: &mut MusicRng, items: &'a [T], label: &str) -> Result<&'a T, ComposeError> {
    if items.is_empty() {
        return Err(ComposeError::EmptyTable {
            table: label.to_string(),
        });
    }
    Ok(&items[rng.roll_usize(items.len())])
}

/// Fisher-Yates permutation. One draw per swap position (`len - 1` draws).
pub fn shuffle<T>(rng: &mut MusicRng, mut items: Vec<T>) -> Vec<T> {
    for i in (1..items.len()).rev() {
        let j = rng.roll_usize(i + 1);
        items.swap(i, j);
    }
    items
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_weight_never_selected() {
        let table = WeightedTable::new(vec![(0, "never"), (3, "a"), (0, "nope"), (1, "b")]);
        let mut rng = MusicRng::new(11);
        for _ in 0..5000 {
            let v = *table.roll(&mut rng, "test").unwrap();
            assert!(v == "a" || v == "b", "picked zero-weight payload {v}");
        }
    }

    #[test]
    fn proportions_follow_weights() {
        let table = WeightedTable::new(vec![(7, 0usize), (2, 1), (2, 2)]);
        let mut rng = MusicRng::new(3);
        let mut counts = [0u32; 3];
        let n = 22_000;
        for _ in 0..n {
            counts[*table.roll(&mut rng, "test").unwrap()] += 1;
        }
        let share = counts[0] as f64 / n as f64;
        // 7/11 ~ 0.636
        assert!((0.60..0.67).contains(&share), "share {share:.3}");
    }

    #[test]
    fn empty_total_fails_fast() {
        let table: WeightedTable<u32> = WeightedTable::new(vec![(0, 1), (0, 2)]);
        let mut rng = MusicRng::new(0);
        let err = table.roll(&mut rng, "phrase lengths").unwrap_err();
        assert!(matches!(err, ComposeError::EmptyTable { ref table } if table == "phrase lengths"));

        let empty: WeightedTable<u32> = WeightedTable::new(Vec::new());
        assert!(empty.roll(&mut rng, "empty").is_err());
    }

    #[test]
    fn roll_is_deterministic() {
        let table = WeightedTable::new(vec![(1, 'a'), (4, 'b'), (5, 'c')]);
        let mut a = MusicRng::from_seed_str("abc12");
        let mut b = MusicRng::from_seed_str("abc12");
        let xs: Vec<char> = (0..50).map(|_| *table.roll(&mut a, "t").unwrap()).collect();
        let ys: Vec<char> = (0..50).map(|_| *table.roll(&mut b, "t").unwrap()).collect();
        assert_eq!(xs, ys);
    }

    #[test]
    fn roll_walks_entries_in_declaration_order() {
        // The first "abc12" draw is 0.829..., and floor(0.829 * 11) = 9.
        let table = WeightedTable::new(vec![(7, "Aeolian"), (2, "Phrygian"), (2, "Locrian")]);
        let mut rng = MusicRng::from_seed_str("abc12");
        assert_eq!(*table.roll(&mut rng, "modes").unwrap(), "Locrian");

        let reordered = WeightedTable::new(vec![(7, "Aeolian"), (2, "Locrian"), (2, "Phrygian")]);
        let mut rng = MusicRng::from_seed_str("abc12");
        assert_eq!(*reordered.roll(&mut rng, "modes").unwrap(), "Phrygian");
    }

    #[test]
    fn positive_payloads_skip_zero_weights() {
        let table = WeightedTable::new(vec![(0, 1), (2, 2), (1, 3)]);
        let live: Vec<i32> = table.positive_payloads().copied().collect();
        assert_eq!(live, vec![2, 3]);
    }

    #[test]
    fn pick_covers_all_items() {
        let items = [2, 4, 7];
        let mut rng = MusicRng::new(8);
        let mut seen = [false; 3];
        for _ in 0..300 {
            let v = *pick(&mut rng, &items, "leaps").unwrap();
            seen[items.iter().position(|&x| x == v).unwrap()] = true;
        }
        assert!(seen.iter().all(|&s| s));
        let none: [i32; 0] = [];
        assert!(pick(&mut rng, &none, "none").is_err());
    }

    #[test]
    fn shuffle_is_a_permutation() {
        let mut rng = MusicRng::new(21);
        let mut shuffled = shuffle(&mut rng, (0..7).collect::<Vec<i32>>());
        shuffled.sort();
        assert_eq!(shuffled, (0..7).collect::<Vec<i32>>());
    }

    #[test]
    fn serializes_as_pairs() {
        let table = WeightedTable::new(vec![(3, 1u32), (5, 2)]);
        let json = serde_json::to_string(&table).unwrap();
        assert_eq!(json, "[[3,1],[5,2]]");
        let back: WeightedTable<u32> = serde_json::from_str(&json).unwrap();
        assert_eq!(back, table);
    }
}
