//! Analyse Pension 720+ : groupe et chiffre par position.

use serde::Serialize;

use lottokr_db::models::{PensionDraw, PENSION_DIGITS};

use super::{RecommendedSet, SetAssembler, SetMethod};
use crate::cdm::{self, CdmScore, ModelInfo};
use crate::config::AnalysisConfig;
use crate::error::AnalysisError;
use crate::stats::{aggregate, prepare_history, Distribution, FrequencyStat};

/// Variantes générées par groupe (rang du chiffre retenu à chaque position).
const VARIANTS: usize = 3;
/// Chiffres chauds / froids affichés par position.
const HOT_COLD: usize = 3;

#[derive(Debug, Clone, Serialize)]
pub struct PositionAnalysis {
    pub position: usize,
    pub stats: Vec<FrequencyStat>,
    /// Scores triés (meilleur d'abord).
    pub ranked: Vec<CdmScore>,
    pub model: ModelInfo,
}

impl PositionAnalysis {
    pub fn hot(&self) -> Vec<u8> {
        self.ranked.iter().take(HOT_COLD).map(|s| s.value).collect()
    }

    /// Les moins bien classés, le plus froid en premier.
    pub fn cold(&self) -> Vec<u8> {
        self.ranked.iter().rev().take(HOT_COLD).map(|s| s.value).collect()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PensionAnalysis {
    pub latest_round: u32,
    pub total_draws: usize,
    pub group_stats: Vec<FrequencyStat>,
    /// Scores de groupe triés (meilleur d'abord).
    pub group_scores: Vec<CdmScore>,
    pub group_model: ModelInfo,
    pub positions: Vec<PositionAnalysis>,
    pub sets: Vec<RecommendedSet>,
}

pub fn analyze(history: &[PensionDraw], config: &AnalysisConfig) -> Result<PensionAnalysis, AnalysisError> {
    let sorted = prepare_history(history, config.min_history)?;
    let n = sorted.len();

    let group_stats = aggregate(&sorted, Distribution::PensionGroups);
    let (scores, group_model) = cdm::score(Distribution::PensionGroups, &group_stats, n)?;
    let group_scores = cdm::rank(&scores, &group_stats);

    let mut positions = Vec::with_capacity(PENSION_DIGITS);
    for position in 0..PENSION_DIGITS {
        let dist = Distribution::PensionDigits(position);
        let stats = aggregate(&sorted, dist);
        let (scores, model) = cdm::score(dist, &stats, n)?;
        let ranked = cdm::rank(&scores, &stats);
        positions.push(PositionAnalysis {
            position,
            stats,
            ranked,
            model,
        });
    }

    let sets = pension_sets(&group_scores, &positions, config.max_cdm_sets);

    Ok(PensionAnalysis {
        latest_round: sorted.last().map_or(0, |d| d.round()),
        total_draws: n,
        group_stats,
        group_scores,
        group_model,
        positions,
        sets,
    })
}

/// Pour chaque groupe (du mieux classé au moins bien classé), 3 variantes :
/// la variante `v` prend le chiffre de rang `v` à chaque position.
/// Score = 10 × nombre attendu du groupe + Σ nombres attendus des chiffres.
fn pension_sets(groups: &[CdmScore], positions: &[PositionAnalysis], limit: usize) -> Vec<RecommendedSet> {
    let mut sets = SetAssembler::new();

    'groups: for group in groups {
        for variant in 0..VARIANTS {
            if sets.len() >= limit {
                break 'groups;
            }
            let mut digits = [0u8; PENSION_DIGITS];
            let mut score = group.predicted_count * 10.0;
            for (slot, position) in digits.iter_mut().zip(positions) {
                let Some(choice) = position.ranked.get(variant.min(position.ranked.len().saturating_sub(1))) else {
                    continue;
                };
                *slot = choice.value;
                score += choice.predicted_count;
            }
            sets.push_pension(
                group.value,
                digits,
                score,
                SetMethod::PensionVariant {
                    group: group.value,
                    variant,
                },
            );
        }
    }

    sets.finish()
}
