use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::Serialize;

use lottokr_db::models::{LottoDraw, LOTTO_PICK};

use crate::config::AnalysisConfig;
use crate::error::{AnalysisError, RuleError};
use crate::formulas::{all_formulas, Formula};
use crate::sampler::derive_seed;
use crate::stats::prepare_history;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BacktestConfig {
    pub min_history: usize,
    /// Les tirages `round > dernier - recent_window` comptent pour le taux récent.
    pub recent_window: usize,
    /// Numéros communs nécessaires pour un succès.
    pub hit_threshold: usize,
    pub seed: u64,
}

impl Default for BacktestConfig {
    fn default() -> Self {
        Self {
            min_history: 10,
            recent_window: 30,
            hit_threshold: 2,
            seed: 0,
        }
    }
}

impl From<&AnalysisConfig> for BacktestConfig {
    fn from(config: &AnalysisConfig) -> Self {
        Self {
            min_history: config.min_history,
            recent_window: config.recent_window,
            hit_threshold: config.hit_threshold,
            seed: config.seed.unwrap_or(0),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BacktestStat {
    pub code: String,
    pub label: String,
    pub min_history: usize,
    pub tested: u32,
    /// Histogramme des numéros communs (0 à 6).
    pub match_counts: [u32; LOTTO_PICK + 1],
    pub recent_tested: u32,
    pub recent_match_counts: [u32; LOTTO_PICK + 1],
    /// Tirages où la formule a échoué, ignorés.
    pub failures: u32,
    pub hit_rate: f64,
    pub recent_hit_rate: f64,
}

impl BacktestStat {
    fn new(formula: &dyn Formula) -> Self {
        Self {
            code: formula.code().to_string(),
            label: formula.label().to_string(),
            min_history: formula.min_history(),
            tested: 0,
            match_counts: [0; LOTTO_PICK + 1],
            recent_tested: 0,
            recent_match_counts: [0; LOTTO_PICK + 1],
            failures: 0,
            hit_rate: 0.0,
            recent_hit_rate: 0.0,
        }
    }

    fn record(&mut self, matches: usize, recent: bool) {
        let slot = matches.min(LOTTO_PICK);
        self.tested += 1;
        self.match_counts[slot] += 1;
        if recent {
            self.recent_tested += 1;
            self.recent_match_counts[slot] += 1;
        }
    }

    fn finish(&mut self, hit_threshold: usize) {
        self.hit_rate = rate(hits(&self.match_counts, hit_threshold), self.tested);
        self.recent_hit_rate = rate(hits(&self.recent_match_counts, hit_threshold), self.recent_tested);
    }
}

fn hits(counts: &[u32; LOTTO_PICK + 1], threshold: usize) -> u32 {
    counts.iter().skip(threshold).sum()
}

fn rate(hits: u32, tested: u32) -> f64 {
    if tested > 0 {
        hits as f64 / tested as f64
    } else {
        0.0
    }
}

pub fn count_matches(candidate: &[u8], actual: &LottoDraw) -> usize {
    candidate.iter().filter(|&&n| actual.contains(n)).count()
}

/// Parcours walk-forward d'un historique trié : pour chaque index `i ≥ 1`,
/// `visit(i, &sorted[..i], &sorted[i])`. Le passé ne contient jamais le tirage évalué.
pub fn walk_forward<F>(sorted: &[LottoDraw], mut visit: F)
where
    F: FnMut(usize, &[LottoDraw], &LottoDraw),
{
    for i in 1..sorted.len() {
        visit(i, &sorted[..i], &sorted[i]);
    }
}

/// Grille d'une formule pour le tirage `target_round`, calculée sur `past` seulement.
pub fn candidate_for(
    formula: &dyn Formula,
    slot: usize,
    past: &[LottoDraw],
    target_round: u32,
    seed: u64,
) -> Result<[u8; LOTTO_PICK], RuleError> {
    let mut rng = StdRng::seed_from_u64(derive_seed(seed, target_round, slot));
    formula.evaluate(past, &mut rng)
}

/// Backtest des 20 formules.
pub fn run_backtest(history: &[LottoDraw], config: &BacktestConfig) -> Result<Vec<BacktestStat>, AnalysisError> {
    run_backtest_with(&all_formulas(), history, config)
}

pub fn run_backtest_with(
    formulas: &[Box<dyn Formula>],
    history: &[LottoDraw],
    config: &BacktestConfig,
) -> Result<Vec<BacktestStat>, AnalysisError> {
    let sorted = prepare_history(history, config.min_history)?;
    let latest = sorted.last().map_or(0, |d| d.round()) as u64;
    let mut stats: Vec<BacktestStat> = formulas.iter().map(|f| BacktestStat::new(f.as_ref())).collect();

    walk_forward(&sorted, |_, past, actual| {
        let recent = actual.round() as u64 + config.recent_window as u64 > latest;
        for (slot, formula) in formulas.iter().enumerate() {
            if past.len() < formula.min_history() {
                continue;
            }
            match candidate_for(formula.as_ref(), slot, past, actual.round(), config.seed) {
                Ok(candidate) => stats[slot].record(count_matches(&candidate, actual), recent),
                Err(e) => {
                    log::debug!("{} ignorée au tirage {} : {}", formula.code(), actual.round(), e);
                    stats[slot].failures += 1;
                }
            }
        }
    });

    for stat in &mut stats {
        stat.finish(config.hit_threshold);
    }

    let failures: u32 = stats.iter().map(|s| s.failures).sum();
    log::info!(
        "Backtest terminé : {} formules sur {} tirages ({} échecs ignorés)",
        stats.len(),
        sorted.len(),
        failures
    );
    Ok(stats)
}

/// Formules testées sur la fenêtre récente, meilleur taux récent d'abord.
pub fn ranked_by_recent(stats: &[BacktestStat]) -> Vec<&BacktestStat> {
    let mut ranked: Vec<&BacktestStat> = stats.iter().filter(|s| s.recent_tested > 0).collect();
    ranked.sort_by(|a, b| b.recent_hit_rate.partial_cmp(&a.recent_hit_rate).unwrap_or(std::cmp::Ordering::Equal));
    ranked
}

/// Formules testées au moins une fois, meilleur taux global d'abord.
pub fn ranked_by_all(stats: &[BacktestStat]) -> Vec<&BacktestStat> {
    let mut ranked: Vec<&BacktestStat> = stats.iter().filter(|s| s.tested > 0).collect();
    ranked.sort_by(|a, b| b.hit_rate.partial_cmp(&a.hit_rate).unwrap_or(std::cmp::Ordering::Equal));
    ranked
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    use crate::formulas::{lotto_draw, random_lotto_draws, Rule};

    struct AlwaysFails;

    impl Formula for AlwaysFails {
        fn code(&self) -> &str {
            "FX"
        }
        fn label(&self) -> &str {
            "Toujours en échec"
        }
        fn min_history(&self) -> usize {
            1
        }
        fn rank_candidates(&self, _history: &[LottoDraw], _rng: &mut StdRng) -> Result<Vec<u8>, RuleError> {
            Err(RuleError::Failed("panne simulée".into()))
        }
    }

    /// Note le dernier tirage vu à chaque appel.
    struct Recorder {
        seen: Rc<RefCell<Vec<(usize, u32)>>>,
    }

    impl Formula for Recorder {
        fn code(&self) -> &str {
            "FR"
        }
        fn label(&self) -> &str {
            "Enregistreur"
        }
        fn min_history(&self) -> usize {
            1
        }
        fn rank_candidates(&self, history: &[LottoDraw], _rng: &mut StdRng) -> Result<Vec<u8>, RuleError> {
            let last = history.last().map_or(0, |d| d.round());
            self.seen.borrow_mut().push((history.len(), last));
            Ok(vec![1, 2, 3, 4, 5, 6])
        }
    }

    fn fixed(_history: &[LottoDraw], _rng: &mut StdRng) -> Result<Vec<u8>, RuleError> {
        Ok(vec![1, 2, 3, 4, 5, 6])
    }

    #[test]
    fn test_failing_formula_does_not_stop_backtest() {
        let history = random_lotto_draws(60, 21);
        let mut formulas = all_formulas();
        formulas.push(Box::new(AlwaysFails));

        let stats = run_backtest_with(&formulas, &history, &BacktestConfig::default()).unwrap();
        assert_eq!(stats.len(), 21);

        let failing = stats.iter().find(|s| s.code == "FX").unwrap();
        assert_eq!(failing.tested, 0);
        assert_eq!(failing.failures, 59);
        assert_eq!(failing.hit_rate, 0.0);

        for stat in stats.iter().filter(|s| s.code != "FX") {
            assert_eq!(stat.tested + stat.failures, (60 - stat.min_history) as u32, "{}", stat.code);
            assert!(stat.tested > 0, "{}", stat.code);
            assert_eq!(stat.match_counts.iter().sum::<u32>(), stat.tested);
            assert!((0.0..=1.0).contains(&stat.hit_rate));
        }
    }

    #[test]
    fn test_walk_forward_never_sees_target() {
        let history = random_lotto_draws(25, 4);
        let seen = Rc::new(RefCell::new(Vec::new()));
        let formulas: Vec<Box<dyn Formula>> = vec![Box::new(Recorder { seen: Rc::clone(&seen) })];
        run_backtest_with(&formulas, &history, &BacktestConfig::default()).unwrap();

        let seen = seen.borrow();
        assert_eq!(seen.len(), 24);
        for (k, &(len, last)) in seen.iter().enumerate() {
            // Évaluation du tirage d'index k + 1 : passé = history[..k + 1]
            assert_eq!(len, k + 1);
            assert_eq!(last, history[k].round());
            assert!(last < history[k + 1].round());
        }
    }

    #[test]
    fn test_tail_sentinel_does_not_change_past_candidates() {
        let history = random_lotto_draws(60, 8);
        let mut with_sentinel = history.clone();
        with_sentinel.push(lotto_draw(61, [40, 41, 42, 43, 44, 45], 1));

        let collect = |draws: &[LottoDraw]| {
            let formulas = all_formulas();
            let mut out = Vec::new();
            walk_forward(draws, |_, past, actual| {
                for (slot, f) in formulas.iter().enumerate() {
                    if past.len() >= f.min_history() {
                        out.push((actual.round(), slot, candidate_for(f.as_ref(), slot, past, actual.round(), 7)));
                    }
                }
            });
            out
        };

        let before = collect(&history);
        let after = collect(&with_sentinel);
        assert!(after.len() > before.len());
        assert_eq!(&after[..before.len()], &before[..]);
    }

    #[test]
    fn test_min_history_boundary() {
        let config = BacktestConfig::default();
        let nine = random_lotto_draws(9, 1);
        assert_eq!(
            run_backtest(&nine, &config).unwrap_err(),
            AnalysisError::InsufficientHistory { required: 10, available: 9 }
        );
        let ten = random_lotto_draws(10, 1);
        let stats = run_backtest(&ten, &config).unwrap();
        assert_eq!(stats.len(), 20);
    }

    #[test]
    fn test_hit_threshold_and_recent_window() {
        // Index impair : 3 numéros communs avec 1-6, index pair : 2
        let history: Vec<_> = (0..11u32)
            .map(|idx| {
                let numbers = if idx % 2 == 1 { [1, 2, 3, 11, 12, 13] } else { [1, 2, 7, 8, 9, 10] };
                lotto_draw(idx + 1, numbers, 45)
            })
            .collect();
        let formulas: Vec<Box<dyn Formula>> = vec![Box::new(Rule::new("FF", "Fixe", 1, fixed))];

        let mut config = BacktestConfig {
            recent_window: 4,
            ..BacktestConfig::default()
        };
        let stats = run_backtest_with(&formulas, &history, &config).unwrap();
        let stat = &stats[0];
        assert_eq!(stat.tested, 10);
        assert_eq!(stat.match_counts[2], 5);
        assert_eq!(stat.match_counts[3], 5);
        assert_eq!(stat.hit_rate, 1.0);
        // Tirages 8 à 11
        assert_eq!(stat.recent_tested, 4);

        config.hit_threshold = 3;
        let stats = run_backtest_with(&formulas, &history, &config).unwrap();
        assert_eq!(stats[0].hit_rate, 0.5);
        assert_eq!(stats[0].recent_hit_rate, 0.5);

        config.hit_threshold = 4;
        let stats = run_backtest_with(&formulas, &history, &config).unwrap();
        assert_eq!(stats[0].hit_rate, 0.0);
    }

    #[test]
    fn test_backtest_is_reproducible_with_seed() {
        let history = random_lotto_draws(40, 3);
        let config = BacktestConfig {
            seed: 11,
            ..BacktestConfig::default()
        };
        assert_eq!(run_backtest(&history, &config).unwrap(), run_backtest(&history, &config).unwrap());
    }

    #[test]
    fn test_ranking_helpers() {
        let history = random_lotto_draws(40, 5);
        let stats = run_backtest(&history, &BacktestConfig::default()).unwrap();
        let by_recent = ranked_by_recent(&stats);
        assert!(by_recent.windows(2).all(|w| w[0].recent_hit_rate >= w[1].recent_hit_rate));
        let by_all = ranked_by_all(&stats);
        assert!(by_all.windows(2).all(|w| w[0].hit_rate >= w[1].hit_rate));
    }
}
