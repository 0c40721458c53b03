use serde::Serialize;

use lottokr_db::models::{DrawError, LottoDraw, PensionDraw, LOTTO_MAX, PENSION_DIGITS, PENSION_GROUPS};

use crate::error::AnalysisError;

/// Écart moyen attribué aux catégories vues moins de deux fois.
pub const DEFAULT_GAP: f64 = 7.0;

/// Nombre de tirages considérés pour l'activité récente.
pub const RECENT_DRAWS: usize = 20;

/// Une famille de catégories scorées ensemble.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Distribution {
    LottoNumbers,
    PensionGroups,
    /// Chiffres 0-9 d'une position (0 = première).
    PensionDigits(usize),
}

impl Distribution {
    pub fn size(&self) -> usize {
        match self {
            Distribution::LottoNumbers => LOTTO_MAX as usize,
            Distribution::PensionGroups => PENSION_GROUPS as usize,
            Distribution::PensionDigits(_) => 10,
        }
    }

    pub fn min_value(&self) -> u8 {
        match self {
            Distribution::LottoNumbers | Distribution::PensionGroups => 1,
            Distribution::PensionDigits(_) => 0,
        }
    }

    /// Facteur M du score CDM (numéros tirés par événement).
    pub fn scale(&self) -> f64 {
        match self {
            Distribution::LottoNumbers => 6.0,
            Distribution::PensionGroups => 5.0,
            Distribution::PensionDigits(_) => 10.0,
        }
    }

    pub fn values(&self) -> impl Iterator<Item = u8> {
        let min = self.min_value();
        (0..self.size() as u8).map(move |i| min + i)
    }

    pub fn index(&self, value: u8) -> Option<usize> {
        let idx = value.checked_sub(self.min_value())? as usize;
        (idx < self.size()).then_some(idx)
    }
}

impl std::fmt::Display for Distribution {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Distribution::LottoNumbers => write!(f, "Numéros 1-45"),
            Distribution::PensionGroups => write!(f, "Groupes 1-5"),
            Distribution::PensionDigits(pos) => write!(f, "Position {}", pos + 1),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FrequencyStat {
    pub value: u8,
    pub frequency: u32,
    pub last_appeared_round: Option<u32>,
    /// Dernier tirage de l'historique moins `last_appeared_round`.
    /// `None` uniquement pour un historique vide.
    pub consecutive_miss: Option<u32>,
    /// Nombre de tirages (par index) depuis la dernière apparition.
    pub draws_since: Option<usize>,
    /// Moyenne des écarts entre index d'apparition, `DEFAULT_GAP` sinon.
    pub avg_gap: f64,
    /// Apparitions dans les `RECENT_DRAWS` derniers tirages.
    pub recent_count: u32,
}

/// Tirage réduit à ce qu'une distribution observe.
pub trait Observed {
    fn round(&self) -> u32;
    fn observe(&self, dist: Distribution) -> Vec<u8>;
}

impl Observed for LottoDraw {
    fn round(&self) -> u32 {
        LottoDraw::round(self)
    }

    fn observe(&self, dist: Distribution) -> Vec<u8> {
        match dist {
            Distribution::LottoNumbers => self.numbers().to_vec(),
            _ => Vec::new(),
        }
    }
}

impl Observed for PensionDraw {
    fn round(&self) -> u32 {
        PensionDraw::round(self)
    }

    fn observe(&self, dist: Distribution) -> Vec<u8> {
        match dist {
            Distribution::PensionGroups => vec![self.group()],
            Distribution::PensionDigits(pos) if pos < PENSION_DIGITS => vec![self.digits()[pos]],
            _ => Vec::new(),
        }
    }
}

/// Trie par numéro de tirage croissant, rejette les doublons et les historiques trop courts.
pub fn prepare_history<T: Observed + Clone>(draws: &[T], min_history: usize) -> Result<Vec<T>, AnalysisError> {
    if draws.len() < min_history {
        return Err(AnalysisError::InsufficientHistory {
            required: min_history,
            available: draws.len(),
        });
    }
    let mut sorted = draws.to_vec();
    sorted.sort_by_key(|d| d.round());
    if let Some(w) = sorted.windows(2).find(|w| w[0].round() == w[1].round()) {
        return Err(DrawError::DuplicateRound { round: w[0].round() }.into());
    }
    Ok(sorted)
}

/// Passe unique sur un historique trié. Ne peut pas échouer : un historique vide
/// donne des fréquences nulles et des absences `None`.
pub fn aggregate<T: Observed>(draws: &[T], dist: Distribution) -> Vec<FrequencyStat> {
    let size = dist.size();
    let mut appearances: Vec<Vec<usize>> = vec![Vec::new(); size];
    let mut last_round: Vec<Option<u32>> = vec![None; size];
    let recent_start = draws.len().saturating_sub(RECENT_DRAWS);
    let mut recent = vec![0u32; size];

    for (idx, draw) in draws.iter().enumerate() {
        for value in draw.observe(dist) {
            if let Some(i) = dist.index(value) {
                appearances[i].push(idx);
                last_round[i] = Some(draw.round());
                if idx >= recent_start {
                    recent[i] += 1;
                }
            }
        }
    }

    let first_round = draws.first().map(|d| d.round());
    let latest_round = draws.last().map(|d| d.round());
    let last_idx = draws.len().checked_sub(1);

    dist.values()
        .enumerate()
        .map(|(i, value)| {
            let app = &appearances[i];
            let avg_gap = if app.len() > 1 {
                let total: usize = app.windows(2).map(|w| w[1] - w[0]).sum();
                total as f64 / (app.len() - 1) as f64
            } else {
                DEFAULT_GAP
            };

            // Jamais vu : absence comptée depuis le début de l'historique
            let consecutive_miss = match (latest_round, last_round[i], first_round) {
                (Some(latest), Some(last), _) => Some(latest - last),
                (Some(latest), None, Some(first)) => Some(latest - first + 1),
                _ => None,
            };
            let draws_since = match (last_idx, app.last()) {
                (Some(l), Some(&a)) => Some(l - a),
                _ => None,
            };

            FrequencyStat {
                value,
                frequency: app.len() as u32,
                last_appeared_round: last_round[i],
                consecutive_miss,
                draws_since,
                avg_gap,
                recent_count: recent[i],
            }
        })
        .collect()
}

/// Agrégation contrôlée : historique validé puis passe unique.
pub fn frequency_stats<T: Observed + Clone>(
    draws: &[T],
    dist: Distribution,
    min_history: usize,
) -> Result<Vec<FrequencyStat>, AnalysisError> {
    let sorted = prepare_history(draws, min_history)?;
    Ok(aggregate(&sorted, dist))
}
