//! Card ordering.

use rand::Rng;

/// Return a uniformly shuffled copy of `items`.
pub fn shuffle<T: Clone>(items: &[T]) -> Vec<T> {
    shuffle_with(items, &mut rand::thread_rng())
}

/// Fisher-Yates over a copy of `items` using the given RNG.
pub fn shuffle_with<T: Clone, R: Rng + ?Sized>(items: &[T], rng: &mut R) -> Vec<T> {
    let mut shuffled = items.to_vec();
    for i in (1..shuffled.len()).rev() {
        let j = rng.gen_range(0..=i);
        shuffled.swap(i, j);
    }
    shuffled
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::collections::HashMap;

    #[test]
    fn test_input_left_untouched() {
        let items = vec![1, 2, 3, 4];
        let _ = shuffle(&items);
        assert_eq!(items, vec![1, 2, 3, 4]);
    }

    #[test]
    fn test_trivial_inputs() {
        assert!(shuffle::<u8>(&[]).is_empty());
        assert_eq!(shuffle(&["only"]), vec!["only"]);
    }

    #[test]
    fn test_seeded_shuffle_is_deterministic() {
        let items: Vec<u32> = (0..20).collect();
        let a = shuffle_with(&items, &mut StdRng::seed_from_u64(7));
        let b = shuffle_with(&items, &mut StdRng::seed_from_u64(7));
        assert_eq!(a, b);
    }

    #[test]
    fn test_permutations_are_uniform() {
        // 3! orderings, chi-square with 5 degrees of freedom.
        const TRIALS: usize = 60_000;
        let mut rng = StdRng::seed_from_u64(0x5eed);
        let mut counts: HashMap<Vec<u8>, usize> = HashMap::new();
        for _ in 0..TRIALS {
            *counts.entry(shuffle_with(&[0u8, 1, 2], &mut rng)).or_default() += 1;
        }

        assert_eq!(counts.len(), 6);
        let expected = TRIALS as f64 / 6.0;
        let chi_square: f64 = counts
            .values()
            .map(|&observed| {
                let diff = observed as f64 - expected;
                diff * diff / expected
            })
            .sum();
        assert!(chi_square < 30.0, "chi-square too large: {}", chi_square);
    }

    proptest! {
        #[test]
        fn output_is_a_permutation(items in prop::collection::vec(any::<u16>(), 0..64), seed in any::<u64>()) {
            let mut shuffled = shuffle_with(&items, &mut StdRng::seed_from_u64(seed));
            let mut sorted = items.clone();
            shuffled.sort_unstable();
            sorted.sort_unstable();
            prop_assert_eq!(shuffled, sorted);
        }
    }
}
