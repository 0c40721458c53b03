use chrono::Datelike;
use rand::distr::weighted::{Error as WeightError, WeightedIndex};
use rand::prelude::Distribution;
use rand::rngs::StdRng;

/// Génère un seed déterministe basé sur la date du jour (YYYYMMDD).
pub fn date_seed() -> u64 {
    let today = chrono::Local::now().date_naive();
    let y = today.year() as u64;
    let m = today.month() as u64;
    let d = today.day() as u64;
    y * 10_000 + m * 100 + d
}

/// Seed propre à un couple (tirage évalué, formule) : chaque évaluation
/// du backtest ne dépend que de son propre passé.
pub fn derive_seed(base: u64, round: u32, slot: usize) -> u64 {
    let mut x = base ^ ((round as u64) << 20) ^ (slot as u64);
    // splitmix64
    x = x.wrapping_add(0x9E37_79B9_7F4A_7C15);
    x = (x ^ (x >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    x = (x ^ (x >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    x ^ (x >> 31)
}

/// Tirage pondéré sans remise de `count` valeurs parmi `(valeur, poids)`.
pub fn sample_without_replacement(
    weighted: &[(u8, f64)],
    count: usize,
    rng: &mut StdRng,
) -> Result<Vec<u8>, WeightError> {
    let mut available = weighted.to_vec();
    let mut selected = Vec::with_capacity(count);

    for _ in 0..count.min(weighted.len()) {
        let weights: Vec<f64> = available.iter().map(|(_, w)| *w).collect();
        let dist = WeightedIndex::new(&weights)?;
        let idx = dist.sample(rng);
        let (value, _) = available.remove(idx);
        selected.push(value);
    }

    Ok(selected)
}

/// Nombre de valeurs de `a` absentes de `b`.
pub fn set_distance(a: &[u8], b: &[u8]) -> usize {
    a.iter().filter(|x| !b.contains(x)).count()
}

/// Sélection gloutonne : meilleur score + diversité minimum entre paires.
/// `candidates` doit déjà être trié par score décroissant.
pub fn select_diverse<T, F>(candidates: &[T], count: usize, min_diff: usize, numbers: F) -> Vec<T>
where
    T: Clone,
    F: Fn(&T) -> &[u8],
{
    let mut selected: Vec<T> = Vec::with_capacity(count);

    for candidate in candidates {
        if selected.len() >= count {
            break;
        }
        let dominated = selected
            .iter()
            .any(|s| set_distance(numbers(candidate), numbers(s)) < min_diff);
        if !dominated {
            selected.push(candidate.clone());
        }
    }

    selected
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    #[test]
    fn test_date_seed_format() {
        let seed = date_seed();
        let s = seed.to_string();
        assert_eq!(s.len(), 8, "seed devrait avoir 8 chiffres: {s}");
        assert_eq!(date_seed(), seed);
    }

    #[test]
    fn test_derive_seed_distinct() {
        let a = derive_seed(42, 100, 0);
        let b = derive_seed(42, 100, 1);
        let c = derive_seed(42, 101, 0);
        assert_ne!(a, b);
        assert_ne!(a, c);
        assert_eq!(a, derive_seed(42, 100, 0));
    }

    #[test]
    fn test_sample_distinct_values() {
        let weighted: Vec<(u8, f64)> = (1..=45).map(|n| (n, n as f64)).collect();
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..20 {
            let mut picked = sample_without_replacement(&weighted, 6, &mut rng).unwrap();
            picked.sort_unstable();
            picked.dedup();
            assert_eq!(picked.len(), 6);
            assert!(picked.iter().all(|&n| (1..=45).contains(&n)));
        }
    }

    #[test]
    fn test_sample_zero_weights_is_error() {
        let weighted: Vec<(u8, f64)> = (1..=10).map(|n| (n, 0.0)).collect();
        let mut rng = StdRng::seed_from_u64(7);
        assert!(sample_without_replacement(&weighted, 3, &mut rng).is_err());
    }

    #[test]
    fn test_seed_determinism() {
        let weighted: Vec<(u8, f64)> = (1..=45).map(|n| (n, 1.0)).collect();
        let a = sample_without_replacement(&weighted, 6, &mut StdRng::seed_from_u64(123)).unwrap();
        let b = sample_without_replacement(&weighted, 6, &mut StdRng::seed_from_u64(123)).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_set_distance() {
        assert_eq!(set_distance(&[1, 2, 3, 4, 5, 6], &[1, 2, 3, 4, 5, 6]), 0);
        assert_eq!(set_distance(&[1, 2, 3, 4, 5, 6], &[1, 2, 3, 4, 8, 9]), 2);
        assert_eq!(set_distance(&[1, 2, 3], &[7, 8, 9]), 3);
    }

    #[test]
    fn test_diversity_enforced() {
        let candidates: Vec<Vec<u8>> = vec![
            vec![1, 2, 3, 4, 5, 6],
            vec![1, 2, 3, 4, 5, 7],
            vec![1, 2, 3, 10, 11, 12],
            vec![20, 21, 22, 23, 24, 25],
        ];
        let selected = select_diverse(&candidates, 3, 2, |c| c.as_slice());
        assert_eq!(selected.len(), 3);
        assert_eq!(selected[0], candidates[0]);
        assert_eq!(selected[1], candidates[2]);
        assert_eq!(selected[2], candidates[3]);
    }
}
