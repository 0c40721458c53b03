use rand::rngs::StdRng;
use serde::Serialize;

use lottokr_db::models::LottoDraw;

use crate::config::AnalysisConfig;
use crate::error::AnalysisError;
use crate::formulas::{all_formulas, Formula};
use crate::stats::prepare_history;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConsensusEntry {
    pub number: u8,
    /// Nombre de formules dont la grille courante contient le numéro.
    pub count: usize,
    pub formulas: Vec<String>,
}

/// Numéros partagés par les grilles courantes des formules, les plus partagés d'abord.
/// Vide tant que l'historique n'atteint pas `backtest_min_history` tirages.
pub fn consensus_numbers(
    history: &[LottoDraw],
    config: &AnalysisConfig,
    rng: &mut StdRng,
) -> Result<Vec<ConsensusEntry>, AnalysisError> {
    consensus_with(&all_formulas(), history, config, rng)
}

pub fn consensus_with(
    formulas: &[Box<dyn Formula>],
    history: &[LottoDraw],
    config: &AnalysisConfig,
    rng: &mut StdRng,
) -> Result<Vec<ConsensusEntry>, AnalysisError> {
    let sorted = prepare_history(history, config.min_history)?;
    if sorted.len() < config.backtest_min_history {
        return Ok(Vec::new());
    }

    let mut entries: Vec<ConsensusEntry> = Vec::new();
    for formula in formulas {
        if sorted.len() < formula.min_history() {
            continue;
        }
        let set = match formula.evaluate(&sorted, rng) {
            Ok(set) => set,
            Err(e) => {
                log::debug!("{} exclue du consensus : {}", formula.code(), e);
                continue;
            }
        };
        for number in set {
            match entries.iter_mut().find(|e| e.number == number) {
                Some(entry) => {
                    entry.count += 1;
                    entry.formulas.push(formula.code().to_string());
                }
                None => entries.push(ConsensusEntry {
                    number,
                    count: 1,
                    formulas: vec![formula.code().to_string()],
                }),
            }
        }
    }

    entries.sort_by(|a, b| b.count.cmp(&a.count).then(a.number.cmp(&b.number)));
    Ok(entries)
}
