use serde::Serialize;

use crate::error::AnalysisError;
use crate::stats::{Distribution, FrequencyStat};

pub const EULER_GAMMA: f64 = 0.577_215_664_901_532_9;

/// Bornes de la concentration α0 : la forme close peut diverger
/// quand son dénominateur s'approche de zéro.
pub const ALPHA0_MIN: f64 = 1e-3;
pub const ALPHA0_MAX: f64 = 1e4;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CdmScore {
    pub value: u8,
    pub frequency: u32,
    pub alpha: f64,
    /// (α + n) / Σ(α_k + n_k)
    pub posterior: f64,
    /// M × posterior
    pub predicted_count: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModelInfo {
    pub method: &'static str,
    pub distribution: Distribution,
    pub total_draws: usize,
    pub alpha0: f64,
    pub alpha_sum: f64,
    pub total_alpha_n: f64,
}

/// Prior des moments : α_k = n_k / n.
pub fn alpha_moments(frequencies: &[u32], n: usize) -> Vec<f64> {
    frequencies.iter().map(|&f| f as f64 / n as f64).collect()
}

/// Concentration α0 en forme close :
/// n(K-1)γ / (n Σ f ln f - Σ f ln x), f = fréquences relatives.
pub fn estimate_alpha0(frequencies: &[u32], n: usize) -> f64 {
    let k = frequencies.len();
    let total: u32 = frequencies.iter().sum();
    if total == 0 || k < 2 {
        return 1.0;
    }

    let mut sum_f_ln_f = 0.0;
    let mut sum_f_ln_x = 0.0;
    for &x in frequencies.iter().filter(|&&x| x > 0) {
        let f = x as f64 / total as f64;
        sum_f_ln_f += f * f.ln();
        sum_f_ln_x += f * (x as f64).ln();
    }

    let numerator = n as f64 * (k - 1) as f64 * EULER_GAMMA;
    let denominator = n as f64 * sum_f_ln_f - sum_f_ln_x;
    if !denominator.is_finite() || denominator.abs() < 1e-12 {
        return 1.0;
    }
    let alpha0 = (numerator / denominator).abs();
    if !alpha0.is_finite() {
        return 1.0;
    }
    alpha0.clamp(ALPHA0_MIN, ALPHA0_MAX)
}

/// Prior de vraisemblance : α_k = α0 × f_k.
pub fn alpha_mle(frequencies: &[u32], n: usize) -> (f64, Vec<f64>) {
    let alpha0 = estimate_alpha0(frequencies, n);
    let total: u32 = frequencies.iter().sum();
    let alphas = frequencies
        .iter()
        .map(|&x| {
            if total == 0 {
                0.0
            } else {
                alpha0 * x as f64 / total as f64
            }
        })
        .collect();
    (alpha0, alphas)
}

/// Scores CDM d'une distribution, dans l'ordre des valeurs.
pub fn score(
    dist: Distribution,
    stats: &[FrequencyStat],
    n: usize,
) -> Result<(Vec<CdmScore>, ModelInfo), AnalysisError> {
    if n == 0 {
        return Err(AnalysisError::InsufficientHistory { required: 1, available: 0 });
    }

    let frequencies: Vec<u32> = stats.iter().map(|s| s.frequency).collect();
    let mm = alpha_moments(&frequencies, n);
    let (alpha0, mle) = alpha_mle(&frequencies, n);
    let alpha: Vec<f64> = mm.iter().zip(&mle).map(|(a, b)| (a + b) / 2.0).collect();

    let total_alpha_n: f64 = alpha
        .iter()
        .zip(&frequencies)
        .map(|(a, &f)| a + f as f64)
        .sum();

    // Historique sans aucune observation : retour à l'uniforme
    let uniform = 1.0 / stats.len().max(1) as f64;
    let scores = stats
        .iter()
        .zip(&alpha)
        .map(|(stat, &a)| {
            let posterior = if total_alpha_n > 0.0 {
                (a + stat.frequency as f64) / total_alpha_n
            } else {
                uniform
            };
            CdmScore {
                value: stat.value,
                frequency: stat.frequency,
                alpha: a,
                posterior,
                predicted_count: dist.scale() * posterior,
            }
        })
        .collect();

    let info = ModelInfo {
        method: "CDM (Compound-Dirichlet-Multinomial)",
        distribution: dist,
        total_draws: n,
        alpha0,
        alpha_sum: alpha.iter().sum(),
        total_alpha_n,
    };

    Ok((scores, info))
}

/// Tri par score décroissant. Égalités : activité récente, absence courte, valeur croissante.
/// Les signaux récents et de retard départagent seulement, ils ne modifient jamais le score.
pub fn rank(scores: &[CdmScore], stats: &[FrequencyStat]) -> Vec<CdmScore> {
    let mut order: Vec<usize> = (0..scores.len()).collect();
    order.sort_by(|&a, &b| {
        scores[b]
            .posterior
            .partial_cmp(&scores[a].posterior)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| {
                let ra = stats.get(a).map_or(0, |s| s.recent_count);
                let rb = stats.get(b).map_or(0, |s| s.recent_count);
                rb.cmp(&ra)
            })
            .then_with(|| {
                let ma = stats.get(a).and_then(|s| s.consecutive_miss).unwrap_or(u32::MAX);
                let mb = stats.get(b).and_then(|s| s.consecutive_miss).unwrap_or(u32::MAX);
                ma.cmp(&mb)
            })
            .then_with(|| scores[a].value.cmp(&scores[b].value))
    });
    order.into_iter().map(|i| scores[i].clone()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::formulas::{lotto_draw, make_lotto_draws, make_pension_draws, pension_draw};
    use crate::stats::aggregate;

    fn posterior_sum(scores: &[CdmScore]) -> f64 {
        scores.iter().map(|s| s.posterior).sum()
    }

    #[test]
    fn test_posterior_sums_to_one_lotto() {
        for n in [10, 25, 60] {
            let draws = make_lotto_draws(n);
            let stats = aggregate(&draws, Distribution::LottoNumbers);
            let (scores, _) = score(Distribution::LottoNumbers, &stats, n).unwrap();
            assert!((posterior_sum(&scores) - 1.0).abs() < 1e-6);
            let predicted: f64 = scores.iter().map(|s| s.predicted_count).sum();
            assert!((predicted - 6.0).abs() < 1e-6);
        }
    }

    #[test]
    fn test_posterior_sums_to_one_pension() {
        let draws = make_pension_draws(30);
        let stats = aggregate(&draws, Distribution::PensionGroups);
        let (scores, _) = score(Distribution::PensionGroups, &stats, 30).unwrap();
        assert!((posterior_sum(&scores) - 1.0).abs() < 1e-6);

        for pos in 0..6 {
            let dist = Distribution::PensionDigits(pos);
            let stats = aggregate(&draws, dist);
            let (scores, _) = score(dist, &stats, 30).unwrap();
            assert_eq!(scores.len(), 10);
            assert!((posterior_sum(&scores) - 1.0).abs() < 1e-6);
        }
    }

    #[test]
    fn test_zero_draws_rejected() {
        let stats = aggregate::<lottokr_db::models::LottoDraw>(&[], Distribution::LottoNumbers);
        assert!(matches!(
            score(Distribution::LottoNumbers, &stats, 0),
            Err(AnalysisError::InsufficientHistory { .. })
        ));
    }

    #[test]
    fn test_unseen_category_has_positive_score() {
        let draws = make_lotto_draws(20);
        let stats = aggregate(&draws, Distribution::LottoNumbers);
        let (scores, _) = score(Distribution::LottoNumbers, &stats, 20).unwrap();
        // 45 n'apparaît jamais dans les tirages de test, mais garde un score défini
        let never = &scores[44];
        assert_eq!(never.frequency, 0);
        assert!(never.posterior >= 0.0);
        assert!(never.posterior.is_finite());
    }

    #[test]
    fn test_alpha0_guarded() {
        // Fréquences uniformes : le dénominateur reste fini, α0 borné
        let a = estimate_alpha0(&[5; 45], 10);
        assert!(a.is_finite() && (ALPHA0_MIN..=ALPHA0_MAX).contains(&a));
        assert_eq!(estimate_alpha0(&[0; 45], 10), 1.0);
        assert_eq!(estimate_alpha0(&[3], 10), 1.0);
    }

    #[test]
    fn test_number_seven_every_round_ranks_first() {
        // 7 dans chaque tirage, aucun autre numéro ne se répète
        let pool: Vec<u8> = (1..=45).filter(|&n| n != 7).collect();
        let draws: Vec<_> = (0..50)
            .map(|i| {
                let others: Vec<u8> = (0..5).map(|k| pool[(i * 5 + k) % pool.len()]).collect();
                let bonus = pool[(i * 5 + 5) % pool.len()];
                lotto_draw(i as u32 + 1, [7, others[0], others[1], others[2], others[3], others[4]], bonus)
            })
            .collect();
        let stats = aggregate(&draws, Distribution::LottoNumbers);
        let (scores, _) = score(Distribution::LottoNumbers, &stats, draws.len()).unwrap();
        let ranked = rank(&scores, &stats);
        assert_eq!(ranked[0].value, 7);
        assert!(ranked[0].posterior > 6.0 / 45.0);
    }

    #[test]
    fn test_group_three_ranks_first() {
        let groups = [3, 1, 3, 2, 3, 4, 3, 5, 3, 1, 3, 2, 3, 4, 3, 5, 3, 1, 3, 2];
        let draws: Vec<_> = groups
            .iter()
            .enumerate()
            .map(|(i, &g)| pension_draw(i as u32 + 1, g, [i as u8 % 10, 1, 2, 3, 4, 5]))
            .collect();
        let stats = aggregate(&draws, Distribution::PensionGroups);
        let (scores, _) = score(Distribution::PensionGroups, &stats, draws.len()).unwrap();
        let ranked = rank(&scores, &stats);
        assert_eq!(ranked[0].value, 3);
        assert!(ranked.windows(2).all(|w| w[0].posterior >= w[1].posterior));
    }

    #[test]
    fn test_scores_deterministic() {
        let draws = make_lotto_draws(40);
        let stats = aggregate(&draws, Distribution::LottoNumbers);
        let a = score(Distribution::LottoNumbers, &stats, 40).unwrap();
        let b = score(Distribution::LottoNumbers, &stats, 40).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_rank_signals_only_break_ties() {
        let score = |value: u8, posterior: f64| CdmScore {
            value,
            frequency: 0,
            alpha: 1.0,
            posterior,
            predicted_count: 6.0 * posterior,
        };
        let stat = |value: u8, recent_count: u32, miss: u32| FrequencyStat {
            value,
            frequency: 0,
            last_appeared_round: None,
            consecutive_miss: Some(miss),
            draws_since: None,
            avg_gap: 7.5,
            recent_count,
        };
        let scores = vec![score(1, 0.2), score(2, 0.3), score(3, 0.2), score(4, 0.2), score(5, 0.1)];
        let stats = vec![stat(1, 1, 4), stat(2, 0, 30), stat(3, 5, 9), stat(4, 1, 2), stat(5, 9, 0)];

        let values: Vec<u8> = rank(&scores, &stats).iter().map(|s| s.value).collect();
        assert_eq!(values, vec![2, 3, 4, 1, 5]);
    }
}
