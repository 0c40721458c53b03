//! Analyse Lotto 6/45 : statistiques, scores CDM, backtest et grilles recommandées.

use rand::rngs::StdRng;
use serde::Serialize;

use lottokr_db::models::{LottoDraw, LOTTO_PICK};

use super::{greedy_pick, set_score, SetAssembler, SetMethod, RecommendedSet};
use crate::backtest::{ranked_by_all, ranked_by_recent, run_backtest, BacktestConfig, BacktestStat};
use crate::cdm::{self, CdmScore, ModelInfo};
use crate::config::AnalysisConfig;
use crate::error::{AnalysisError, ConstraintUnsatisfiable};
use crate::formulas::{all_formulas, Formula};
use crate::sampler::{sample_without_replacement, select_diverse};
use crate::stats::{aggregate, prepare_history, Distribution, FrequencyStat};

/// Cible d'impairs par défaut.
const DEFAULT_ODD: usize = 3;
/// Grilles tirées au hasard pour chaque grille pondérée retenue.
const OVERSAMPLE: usize = 20;
/// Numéros distincts minimum entre deux grilles pondérées.
const WEIGHTED_MIN_DIFF: usize = 2;
/// Grilles issues des meilleures formules sur la fenêtre récente.
const BACKTEST_RECENT_TOP: usize = 5;

#[derive(Debug, Clone, Serialize)]
pub struct LottoAnalysis {
    pub latest_round: u32,
    pub total_draws: usize,
    /// Un élément par numéro, dans l'ordre 1..=45.
    pub stats: Vec<FrequencyStat>,
    pub scores: Vec<CdmScore>,
    /// Scores triés (meilleur d'abord).
    pub ranked: Vec<CdmScore>,
    pub model: ModelInfo,
    pub sets: Vec<RecommendedSet>,
    /// Vide sous `backtest_min_history` tirages.
    pub backtest: Vec<BacktestStat>,
}

impl LottoAnalysis {
    pub fn top_numbers(&self, count: usize) -> Vec<u8> {
        self.ranked.iter().take(count).map(|s| s.value).collect()
    }

    pub fn stat(&self, number: u8) -> Option<&FrequencyStat> {
        self.stats.iter().find(|s| s.value == number)
    }
}

fn push_constrained(
    sets: &mut SetAssembler,
    predicted: &[f64],
    result: Result<[u8; LOTTO_PICK], ConstraintUnsatisfiable>,
    method: SetMethod,
) -> bool {
    match result {
        Ok(numbers) => sets.push_lotto(numbers, set_score(&numbers, predicted), method),
        Err(e) => {
            log::debug!("Grille « {} » abandonnée : {}", method, e);
            false
        }
    }
}

/// Analyse complète d'un historique Lotto. `history` peut être dans un ordre quelconque.
pub fn analyze(
    history: &[LottoDraw],
    config: &AnalysisConfig,
    rng: &mut StdRng,
) -> Result<LottoAnalysis, AnalysisError> {
    let sorted = prepare_history(history, config.min_history)?;
    let n = sorted.len();

    let stats = aggregate(&sorted, Distribution::LottoNumbers);
    let (scores, model) = cdm::score(Distribution::LottoNumbers, &stats, n)?;
    let ranked = cdm::rank(&scores, &stats);

    let predicted: Vec<f64> = scores.iter().map(|s| s.predicted_count).collect();
    let order: Vec<u8> = ranked.iter().map(|s| s.value).collect();

    let mut sets = SetAssembler::new();
    cdm_sets(&mut sets, &order, &stats, &predicted, config);
    weighted_sets(&mut sets, &scores, &predicted, config, rng);

    let backtest = if n >= config.backtest_min_history {
        let stats = run_backtest(&sorted, &BacktestConfig::from(config))?;
        backtest_sets(&mut sets, &sorted, &stats, &predicted, config, rng);
        stats
    } else {
        Vec::new()
    };

    Ok(LottoAnalysis {
        latest_round: sorted.last().map_or(0, |d| d.round()),
        total_draws: n,
        stats,
        scores,
        ranked,
        model,
        sets: sets.finish(),
        backtest,
    })
}

/// Grilles dérivées du classement CDM, dans l'ordre : meilleure probabilité,
/// variantes impairs/pairs, absents, paires bayésiennes, diversité.
fn cdm_sets(
    sets: &mut SetAssembler,
    order: &[u8],
    stats: &[FrequencyStat],
    predicted: &[f64],
    config: &AnalysisConfig,
) {
    push_constrained(sets, predicted, greedy_pick(order, &[], DEFAULT_ODD), SetMethod::CdmTop);

    for odd in 2..=4 {
        push_constrained(sets, predicted, greedy_pick(order, &[], odd), SetMethod::OddEven { odd });
    }

    let mut overdue: Vec<&FrequencyStat> = stats.iter().collect();
    overdue.sort_by(|a, b| {
        b.consecutive_miss
            .cmp(&a.consecutive_miss)
            .then(a.value.cmp(&b.value))
    });
    for stat in overdue.iter().take(3) {
        let number = stat.value;
        push_constrained(
            sets,
            predicted,
            greedy_pick(order, &[number], DEFAULT_ODD),
            SetMethod::Overdue { number },
        );
    }

    for pair in order.chunks(2).take(3) {
        if let &[a, b] = pair {
            push_constrained(
                sets,
                predicted,
                greedy_pick(order, &[a, b], DEFAULT_ODD),
                SetMethod::Bayesian { pair: [a, b] },
            );
        }
    }

    // Numéros encore inutilisés d'abord, puis ordre CDM
    let mut used = sets.used_numbers();
    let mut index = 0;
    for i in 0..10 {
        if sets.len() >= config.max_cdm_sets {
            break;
        }
        let mut reordered = order.to_vec();
        reordered.sort_by_key(|n| used.contains(n));
        let result = greedy_pick(&reordered, &[], 2 + i % 3);
        if let Ok(numbers) = result {
            if !sets.contains_lotto(&numbers) {
                index += 1;
                sets.push_lotto(numbers, set_score(&numbers, predicted), SetMethod::Diversity { index });
                used.extend(numbers);
            }
        }
    }
}

/// Grilles tirées proportionnellement aux probabilités a posteriori :
/// `OVERSAMPLE` tirages inédits par grille voulue, triés par score, puis
/// sélection diversifiée.
fn weighted_sets(
    sets: &mut SetAssembler,
    scores: &[CdmScore],
    predicted: &[f64],
    config: &AnalysisConfig,
    rng: &mut StdRng,
) {
    let weighted: Vec<(u8, f64)> = scores.iter().map(|s| (s.value, s.posterior)).collect();

    let mut candidates: Vec<([u8; LOTTO_PICK], f64)> = Vec::new();
    for _ in 0..config.sampled_sets * OVERSAMPLE {
        let picked = match sample_without_replacement(&weighted, LOTTO_PICK, rng) {
            Ok(p) if p.len() == LOTTO_PICK => p,
            Ok(_) => continue,
            Err(e) => {
                log::debug!("Tirage pondéré impossible : {}", e);
                break;
            }
        };
        let mut numbers = [0u8; LOTTO_PICK];
        numbers.copy_from_slice(&picked);
        numbers.sort_unstable();
        if sets.contains_lotto(&numbers) || candidates.iter().any(|(c, _)| *c == numbers) {
            continue;
        }
        candidates.push((numbers, set_score(&numbers, predicted)));
    }

    candidates.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));
    let chosen = select_diverse(&candidates, config.sampled_sets, WEIGHTED_MIN_DIFF, |c| c.0.as_slice());
    for (i, (numbers, score)) in chosen.into_iter().enumerate() {
        sets.push_lotto(numbers, score, SetMethod::Weighted { index: i + 1 });
    }
}

/// Grilles des formules : les meilleures sur la fenêtre récente, puis sur tout l'historique.
fn backtest_sets(
    sets: &mut SetAssembler,
    sorted: &[LottoDraw],
    stats: &[BacktestStat],
    predicted: &[f64],
    config: &AnalysisConfig,
    rng: &mut StdRng,
) {
    let formulas = all_formulas();
    let mut used_codes: Vec<&str> = Vec::new();

    let recent = ranked_by_recent(stats).into_iter().take(BACKTEST_RECENT_TOP);
    let overall = ranked_by_all(stats);
    for stat in recent.chain(overall) {
        if used_codes.len() >= config.backtest_sets {
            break;
        }
        if used_codes.contains(&stat.code.as_str()) {
            continue;
        }
        let Some(formula) = formulas.iter().find(|f| f.code() == stat.code) else {
            continue;
        };
        let numbers = match formula.evaluate(sorted, rng) {
            Ok(numbers) => numbers,
            Err(e) => {
                log::debug!("{} sans grille : {}", stat.code, e);
                continue;
            }
        };
        let method = SetMethod::Backtest {
            code: stat.code.clone(),
            label: stat.label.clone(),
            hit_rate: stat.hit_rate,
            recent_hit_rate: stat.recent_hit_rate,
        };
        if sets.push_lotto(numbers, set_score(&numbers, predicted), method) {
            used_codes.push(stat.code.as_str());
        }
    }
}
