//! Combination helpers for variant generation

use super::LazySeq;

/// Zip per-position candidate lists into whole candidates.
///
/// The i-th combination takes the i-th candidate of every position; a
/// position with fewer candidates repeats its first one. This keeps the
/// number of combinations at the longest list instead of the product.
/// Any empty position makes the whole combination impossible.
#[must_use]
pub fn all_or_nothing<T: Clone>(positions: &[Vec<T>]) -> Vec<Vec<T>> {
    if positions.iter().any(Vec::is_empty) {
        return Vec::new();
    }
    let longest = positions.iter().map(Vec::len).max().unwrap_or(0);
    if positions.is_empty() {
        return vec![Vec::new()];
    }
    (0..longest)
        .map(|i| {
            positions
                .iter()
                .map(|candidates| candidates.get(i).unwrap_or(&candidates[0]).clone())
                .collect()
        })
        .collect()
}

/// Lazy [`all_or_nothing`] over two fallible sequences.
///
/// Pairs the i-th items of `a` and `b`; once one side runs dry it repeats its
/// first item until the other does too. An empty side yields nothing. The
/// first error ends the sequence.
pub fn zip_padded<A, B, E>(a: LazySeq<Result<A, E>>, b: LazySeq<Result<B, E>>) -> LazySeq<Result<(A, B), E>>
where
    A: Clone + 'static,
    B: Clone + 'static,
    E: 'static,
{
    Box::new(ZipPadded {
        a: Some(a),
        b: Some(b),
        first: None,
        done: false,
    })
}

struct ZipPadded<A, B, E> {
    a: Option<LazySeq<Result<A, E>>>,
    b: Option<LazySeq<Result<B, E>>>,
    first: Option<(A, B)>,
    done: bool,
}

/// Next item of a side, `None` once it is exhausted
fn pull<T, E>(side: &mut Option<LazySeq<Result<T, E>>>) -> Result<Option<T>, E> {
    let Some(seq) = side else {
        return Ok(None);
    };
    match seq.next() {
        Some(item) => item.map(Some),
        None => {
            *side = None;
            Ok(None)
        }
    }
}

impl<A: Clone, B: Clone, E> Iterator for ZipPadded<A, B, E> {
    type Item = Result<(A, B), E>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let step = pull(&mut self.a).and_then(|a| pull(&mut self.b).map(|b| (a, b)));
        let (a, b) = match step {
            Ok(pair) => pair,
            Err(e) => {
                self.done = true;
                return Some(Err(e));
            }
        };
        let pair = match (self.first.as_ref(), a, b) {
            (Some(_), Some(a), Some(b)) => (a, b),
            (Some((first_a, _)), None, Some(b)) => (first_a.clone(), b),
            (Some((_, first_b)), Some(a), None) => (a, first_b.clone()),
            (None, Some(a), Some(b)) => (a, b),
            (Some(_), None, None) | (None, _, _) => {
                self.done = true;
                return None;
            }
        };
        if self.first.is_none() {
            self.first = Some(pair.clone());
        }
        Some(Ok(pair))
    }
}

/// Largest number of optional keys enumerated as subsets
const MAX_SUBSET_KEYS: usize = 63;

/// Every subset of `optional`, each joined to `mandatory`, largest first.
///
/// Lazy: `2^n` subsets are never materialized. Optional keys beyond the
/// enumerable limit are always included. `cap` bounds the number produced.
#[must_use]
pub fn key_subsets(mandatory: Vec<String>, optional: Vec<String>, cap: Option<usize>) -> LazySeq<Vec<String>> {
    let (enumerated, fixed) = if optional.len() > MAX_SUBSET_KEYS {
        let mut optional = optional;
        let rest = optional.split_off(MAX_SUBSET_KEYS);
        (optional, rest)
    } else {
        (optional, Vec::new())
    };
    let count: u64 = 1u64 << enumerated.len();
    let subsets = (0..count).rev().map(move |mask| {
        let mut keys = mandatory.clone();
        keys.extend(fixed.iter().cloned());
        keys.extend(
            enumerated
                .iter()
                .enumerate()
                .filter(|(bit, _)| mask & (1u64 << bit) != 0)
                .map(|(_, key)| key.clone()),
        );
        keys
    });
    match cap {
        Some(limit) => Box::new(subsets.take(limit)),
        None => Box::new(subsets),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zips_and_pads_with_first() {
        let combos = all_or_nothing(&[vec![1, 2, 3], vec![10], vec![100, 200]]);
        assert_eq!(combos, vec![vec![1, 10, 100], vec![2, 10, 200], vec![3, 10, 100]]);
    }

    #[test]
    fn empty_position_means_no_combination() {
        assert!(all_or_nothing(&[vec![1], Vec::<i32>::new()]).is_empty());
    }

    #[test]
    fn no_positions_is_one_empty_combination() {
        assert_eq!(all_or_nothing::<i32>(&[]), vec![Vec::<i32>::new()]);
    }

    fn seq(items: Vec<i32>) -> LazySeq<Result<i32, String>> {
        Box::new(items.into_iter().map(Ok))
    }

    #[test]
    fn zip_padded_matches_eager_zip() {
        let pairs: Vec<(i32, i32)> = zip_padded(seq(vec![1, 2, 3]), seq(vec![10]))
            .collect::<Result<_, _>>()
            .unwrap();
        assert_eq!(pairs, vec![(1, 10), (2, 10), (3, 10)]);
        let pairs: Vec<(i32, i32)> = zip_padded(seq(vec![1]), seq(vec![10, 20]))
            .collect::<Result<_, _>>()
            .unwrap();
        assert_eq!(pairs, vec![(1, 10), (1, 20)]);
    }

    #[test]
    fn zip_padded_with_empty_side_is_empty() {
        assert_eq!(zip_padded(seq(vec![1, 2]), seq(Vec::new())).count(), 0);
    }

    #[test]
    fn zip_padded_pulls_on_demand() {
        let endless: LazySeq<Result<u64, String>> = Box::new((0..).map(Ok));
        let first = zip_padded(endless, seq(vec![7])).next();
        assert_eq!(first, Some(Ok((0, 7))));
    }

    #[test]
    fn zip_padded_stops_at_first_error() {
        let failing: LazySeq<Result<i32, String>> = Box::new(vec![Ok(1), Err("boom".to_string()), Ok(3)].into_iter());
        let items: Vec<_> = zip_padded(failing, seq(vec![1, 2, 3])).collect();
        assert_eq!(items, vec![Ok((1, 1)), Err("boom".to_string())]);
    }

    #[test]
    fn subsets_start_with_everything() {
        let subsets: Vec<Vec<String>> =
            key_subsets(vec!["id".into()], vec!["a".into(), "b".into()], None).collect();
        assert_eq!(subsets.len(), 4);
        assert_eq!(subsets[0], vec!["id", "a", "b"]);
        assert_eq!(subsets[3], vec!["id"]);
    }

    #[test]
    fn cap_limits_subsets() {
        let optional: Vec<String> = (0..40).map(|i| format!("k{i}")).collect();
        assert_eq!(key_subsets(Vec::new(), optional, Some(5)).count(), 5);
    }
}
