//! Formules à filtre : une famille de numéros est choisie sur une fenêtre
//! récente, puis classée par fréquence sur tout l'historique.

use rand::rngs::StdRng;

use lottokr_db::models::{LottoDraw, LOTTO_MAX};

use super::{recent, Tally};
use crate::error::RuleError;

const BANDS: [(u8, u8); 5] = [(1, 9), (10, 19), (20, 29), (30, 39), (40, 45)];
const FIBONACCI: [u32; 9] = [1, 1, 2, 3, 5, 8, 13, 21, 34];
pub const PRIMES: [u8; 14] = [2, 3, 5, 7, 11, 13, 17, 19, 23, 29, 31, 37, 41, 43];

/// Indices des `count` plus grands comptes (égalités : plus petit index).
fn top_buckets(counts: &[u32], count: usize) -> Vec<usize> {
    let mut order: Vec<usize> = (0..counts.len()).filter(|&i| counts[i] > 0).collect();
    order.sort_by(|&a, &b| counts[b].cmp(&counts[a]).then(a.cmp(&b)));
    order.truncate(count);
    order
}

/// F6 : la dizaine la moins représentée sur 10 tirages, classée sur tout l'historique.
pub fn band_rotation(history: &[LottoDraw], _rng: &mut StdRng) -> Result<Vec<u8>, RuleError> {
    let band_of = |n: u8| BANDS.iter().position(|&(lo, hi)| (lo..=hi).contains(&n));

    let mut counts = [0u32; BANDS.len()];
    for draw in recent(history, 10) {
        for &n in draw.numbers() {
            if let Some(b) = band_of(n) {
                counts[b] += 1;
            }
        }
    }
    let min = counts.iter().copied().min().unwrap_or(0);
    let band = counts.iter().position(|&c| c == min).unwrap_or(0);
    let (lo, hi) = BANDS[band];
    Ok(Tally::of_filtered(history, |n| (lo..=hi).contains(&n)).ranked())
}

/// Valeurs `(fib[i mod 9] × (i + 1)) mod 45` pour i < 30, zéro exclu.
pub fn fibonacci_values() -> Vec<u8> {
    let mut values: Vec<u8> = (0..30u32)
        .map(|i| (FIBONACCI[i as usize % FIBONACCI.len()] * (i + 1) % LOTTO_MAX as u32) as u8)
        .filter(|&v| v >= 1)
        .collect();
    values.sort_unstable();
    values.dedup();
    values
}

/// F8 : numéros de la suite Fibonacci modulaire, classés sur 30 tirages.
pub fn fibonacci(history: &[LottoDraw], _rng: &mut StdRng) -> Result<Vec<u8>, RuleError> {
    let values = fibonacci_values();
    Ok(Tally::of_filtered(recent(history, 30), |n| values.contains(&n)).ranked())
}

/// F13 : les 4 derniers chiffres les plus fréquents sur 10 tirages.
pub fn last_digit(history: &[LottoDraw], _rng: &mut StdRng) -> Result<Vec<u8>, RuleError> {
    let mut counts = [0u32; 10];
    for draw in recent(history, 10) {
        for &n in draw.numbers() {
            counts[(n % 10) as usize] += 1;
        }
    }
    let digits = top_buckets(&counts, 4);
    Ok(Tally::of_filtered(history, |n| digits.contains(&((n % 10) as usize))).ranked())
}

pub fn digit_sum_of(n: u8) -> u8 {
    n / 10 + n % 10
}

/// F16 : les 5 sommes de chiffres les plus fréquentes sur 20 tirages.
pub fn digit_sum(history: &[LottoDraw], _rng: &mut StdRng) -> Result<Vec<u8>, RuleError> {
    let mut counts = [0u32; 13];
    for draw in recent(history, 20) {
        for &n in draw.numbers() {
            counts[digit_sum_of(n) as usize] += 1;
        }
    }
    let sums = top_buckets(&counts, 5);
    Ok(Tally::of_filtered(history, |n| sums.contains(&(digit_sum_of(n) as usize))).ranked())
}

/// F17 : 4 premiers + 2 non premiers si les premiers sont sur-représentés
/// sur 20 tirages, l'inverse sinon ; classement sur 50 tirages.
pub fn prime_bias(history: &[LottoDraw], _rng: &mut StdRng) -> Result<Vec<u8>, RuleError> {
    let is_prime = |n: u8| PRIMES.contains(&n);

    let window = recent(history, 20);
    let total = window.len() * 6;
    let primes = window
        .iter()
        .flat_map(|d| d.numbers().iter())
        .filter(|&&n| is_prime(n))
        .count();
    let rate = if total > 0 { primes as f64 / total as f64 } else { 0.0 };
    let favour_primes = rate > PRIMES.len() as f64 / LOTTO_MAX as f64;

    let candidates = Tally::of(recent(history, 50)).ranked();
    let (major, minor): (Vec<u8>, Vec<u8>) = candidates.iter().partition(|&&n| is_prime(n) == favour_primes);

    let mut picked: Vec<u8> = major.into_iter().take(4).collect();
    let room = 6 - picked.len();
    picked.extend(minor.into_iter().take(room));
    Ok(picked)
}

pub fn quadrant_of(n: u8) -> usize {
    ((n - 1) / 11) as usize
}

/// F18 : répartition par quadrant la plus fréquente sur 20 tirages,
/// remplie quadrant par quadrant avec les plus fréquents de l'historique.
pub fn quadrant(history: &[LottoDraw], _rng: &mut StdRng) -> Result<Vec<u8>, RuleError> {
    let mut patterns: Vec<([u8; 5], u32)> = Vec::new();
    for draw in recent(history, 20) {
        let mut quads = [0u8; 5];
        for &n in draw.numbers() {
            quads[quadrant_of(n)] += 1;
        }
        match patterns.iter_mut().find(|(p, _)| *p == quads) {
            Some((_, c)) => *c += 1,
            None => patterns.push((quads, 1)),
        }
    }

    // À égalité, le motif rencontré en premier
    let mut target: Option<([u8; 5], u32)> = None;
    for &(p, c) in &patterns {
        if target.map_or(true, |(_, best)| c > best) {
            target = Some((p, c));
        }
    }
    let Some((target, _)) = target else {
        return Ok(Vec::new());
    };

    let mut picked = Vec::new();
    for (q, &wanted) in target.iter().enumerate() {
        let ranked = Tally::of_filtered(history, |n| quadrant_of(n) == q).ranked();
        let chosen: Vec<u8> = ranked
            .into_iter()
            .filter(|n| !picked.contains(n))
            .take(wanted as usize)
            .collect();
        picked.extend(chosen);
    }
    Ok(picked)
}

/// F20 : classes modulo 3 et modulo 5 les plus déficitaires sur 20 tirages
/// (attendus : 40 et 24 occurrences).
pub fn modulo_deficit(history: &[LottoDraw], _rng: &mut StdRng) -> Result<Vec<u8>, RuleError> {
    let mut mod3 = [0i64; 3];
    let mut mod5 = [0i64; 5];
    for draw in recent(history, 20) {
        for &n in draw.numbers() {
            mod3[(n % 3) as usize] += 1;
            mod5[(n % 5) as usize] += 1;
        }
    }

    let most_lacking = |counts: &[i64], expected: i64| -> u8 {
        let mut best = 0usize;
        for (i, &c) in counts.iter().enumerate() {
            if expected - c > expected - counts[best] {
                best = i;
            }
        }
        best as u8
    };
    let t3 = most_lacking(&mod3, 40);
    let t5 = most_lacking(&mod5, 24);

    Ok(Tally::of_filtered(history, |n| n % 3 == t3 || n % 5 == t5).ranked())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::formulas::{lotto_draw, random_lotto_draws};
    use rand::SeedableRng;

    fn rng() -> StdRng {
        StdRng::seed_from_u64(9)
    }

    #[test]
    fn test_band_rotation_picks_least_used_band() {
        // Aucune sortie entre 20 et 29 sur les 10 derniers tirages
        let mut history = vec![lotto_draw(1, [21, 22, 23, 1, 2, 3], 45), lotto_draw(2, [21, 25, 11, 12, 31, 41], 45)];
        history.extend((3..=12).map(|r| lotto_draw(r, [1, 10, 11, 30, 31, 40], 45)));
        let ranked = band_rotation(&history, &mut rng()).unwrap();
        assert_eq!(ranked, vec![21, 22, 23, 25]);
    }

    #[test]
    fn test_fibonacci_values() {
        let values = fibonacci_values();
        assert!(values.iter().all(|&v| (1..=44).contains(&v)));
        // i = 0 : 1, i = 1 : 2, i = 2 : 6, i = 3 : 12, i = 4 : 25
        for v in [1, 2, 6, 12, 25] {
            assert!(values.contains(&v), "{v} manquant");
        }
    }

    #[test]
    fn test_fibonacci_filters() {
        let history = random_lotto_draws(40, 6);
        let values = fibonacci_values();
        let ranked = fibonacci(&history, &mut rng()).unwrap();
        assert!(ranked.iter().all(|n| values.contains(n)));
    }

    #[test]
    fn test_last_digit() {
        let history: Vec<_> = (1..=10).map(|r| lotto_draw(r, [1, 11, 21, 2, 12, 33], 45)).collect();
        let ranked = last_digit(&history, &mut rng()).unwrap();
        // Chiffres 1, 2, 3 ; 1/11/21/2/12/33 tous à 10 sorties
        assert_eq!(ranked, vec![1, 2, 11, 12, 21, 33]);
    }

    #[test]
    fn test_digit_sum() {
        assert_eq!(digit_sum_of(39), 12);
        assert_eq!(digit_sum_of(7), 7);
        let history = random_lotto_draws(30, 1);
        let ranked = digit_sum(&history, &mut rng()).unwrap();
        let mut sums: Vec<u8> = ranked.iter().map(|&n| digit_sum_of(n)).collect();
        sums.sort_unstable();
        sums.dedup();
        assert!(sums.len() <= 5);
    }

    #[test]
    fn test_prime_bias_majority() {
        let history: Vec<_> = (1..=20).map(|r| lotto_draw(r, [2, 3, 5, 7, 11, 4], 45)).collect();
        let picked = prime_bias(&history, &mut rng()).unwrap();
        assert_eq!(picked.len(), 5);
        assert_eq!(picked.iter().filter(|&&n| PRIMES.contains(&n)).count(), 4);

        let history = random_lotto_draws(50, 12);
        let picked = prime_bias(&history, &mut rng()).unwrap();
        assert_eq!(picked.len(), 6);
        let primes = picked.iter().filter(|&&n| PRIMES.contains(&n)).count();
        assert!(primes == 2 || primes == 4);
    }

    #[test]
    fn test_quadrant_matches_pattern() {
        let history: Vec<_> = (1..=20).map(|r| lotto_draw(r, [1, 2, 12, 23, 34, 45], 44)).collect();
        let picked = quadrant(&history, &mut rng()).unwrap();
        let mut quads = [0u8; 5];
        for &n in &picked {
            quads[quadrant_of(n)] += 1;
        }
        assert_eq!(quads, [2, 1, 1, 1, 1]);
    }

    #[test]
    fn test_quadrant_bounds() {
        assert_eq!(quadrant_of(1), 0);
        assert_eq!(quadrant_of(11), 0);
        assert_eq!(quadrant_of(12), 1);
        assert_eq!(quadrant_of(45), 4);
    }

    #[test]
    fn test_modulo_deficit() {
        // Que des multiples de 3 : classe mod 3 = 1 en déficit (première à égalité),
        // classe mod 5 = 0 en déficit (première à égalité)
        let history: Vec<_> = (1..=20).map(|r| lotto_draw(r, [3, 6, 9, 12, 15, 18], 45)).collect();
        assert_eq!(modulo_deficit(&history, &mut rng()).unwrap(), vec![15]);
    }
}
