pub mod lotto;
pub mod pension;

use std::collections::HashSet;

use serde::Serialize;

use lottokr_db::models::{LOTTO_PICK, PENSION_DIGITS};

use crate::error::ConstraintUnsatisfiable;

/// Plus grand numéro considéré comme « bas ».
pub const LOW_MAX: u8 = 22;

/// Nombre de numéros bas admis dans une grille construite.
const LOW_MIN_COUNT: usize = 2;
const LOW_MAX_COUNT: usize = 4;

/// Chemin de construction d'une grille.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum SetMethod {
    CdmTop,
    OddEven { odd: usize },
    Overdue { number: u8 },
    Bayesian { pair: [u8; 2] },
    Diversity { index: usize },
    Weighted { index: usize },
    Backtest {
        code: String,
        label: String,
        hit_rate: f64,
        recent_hit_rate: f64,
    },
    PensionVariant { group: u8, variant: usize },
}

impl std::fmt::Display for SetMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SetMethod::CdmTop => write!(f, "CDM meilleure probabilité"),
            SetMethod::OddEven { odd } => write!(f, "CDM impairs {} / pairs {}", odd, LOTTO_PICK - odd),
            SetMethod::Overdue { number } => write!(f, "Absent {number} inclus"),
            SetMethod::Bayesian { pair } => write!(f, "Bayésien {},{}", pair[0], pair[1]),
            SetMethod::Diversity { index } => write!(f, "CDM diversité #{index}"),
            SetMethod::Weighted { index } => write!(f, "Tirage pondéré #{index}"),
            SetMethod::Backtest { code, label, .. } => write!(f, "{code} {label}"),
            SetMethod::PensionVariant { group, variant } => write!(f, "Groupe {group} variante {}", variant + 1),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecommendedSet {
    pub rank: usize,
    /// Lotto : 6 numéros triés. Pension : 6 chiffres dans l'ordre des positions.
    pub numbers: [u8; LOTTO_PICK],
    /// Groupe (Pension uniquement).
    pub group: Option<u8>,
    /// Propre à chaque jeu, comparable seulement au sein d'une même analyse.
    pub score: f64,
    pub method: SetMethod,
}

pub fn lotto_key(numbers: &[u8]) -> String {
    let mut sorted = numbers.to_vec();
    sorted.sort_unstable();
    sorted.iter().map(|n| n.to_string()).collect::<Vec<_>>().join(",")
}

/// La position compte : pas de tri.
pub fn pension_key(group: u8, digits: &[u8]) -> String {
    let digits: String = digits.iter().map(|d| d.to_string()).collect();
    format!("{group}-{digits}")
}

/// Collecte des grilles sans doublon de combinaison.
#[derive(Debug, Default)]
pub struct SetAssembler {
    seen: HashSet<String>,
    sets: Vec<RecommendedSet>,
}

impl SetAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.sets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sets.is_empty()
    }

    pub fn contains_lotto(&self, numbers: &[u8]) -> bool {
        self.seen.contains(&lotto_key(numbers))
    }

    /// Ajoute une grille Lotto ; `false` si la combinaison est déjà présente.
    pub fn push_lotto(&mut self, mut numbers: [u8; LOTTO_PICK], score: f64, method: SetMethod) -> bool {
        if !self.seen.insert(lotto_key(&numbers)) {
            return false;
        }
        numbers.sort_unstable();
        self.sets.push(RecommendedSet {
            rank: 0,
            numbers,
            group: None,
            score,
            method,
        });
        true
    }

    pub fn push_pension(&mut self, group: u8, digits: [u8; PENSION_DIGITS], score: f64, method: SetMethod) -> bool {
        if !self.seen.insert(pension_key(group, &digits)) {
            return false;
        }
        self.sets.push(RecommendedSet {
            rank: 0,
            numbers: digits,
            group: Some(group),
            score,
            method,
        });
        true
    }

    /// Numéros déjà utilisés par les grilles collectées.
    pub fn used_numbers(&self) -> HashSet<u8> {
        self.sets.iter().flat_map(|s| s.numbers.iter().copied()).collect()
    }

    /// Tri par score décroissant (stable) et attribution des rangs.
    pub fn finish(mut self) -> Vec<RecommendedSet> {
        self.sets
            .sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        for (i, set) in self.sets.iter_mut().enumerate() {
            set.rank = i + 1;
        }
        self.sets
    }
}

/// Score d'une grille Lotto : Σ(nombre attendu × 100), +20 si la somme est dans 115..=160,
/// +15 pour 3 impairs (+10 pour 2 ou 4), +10 pour exactement 3 numéros bas.
/// `predicted[n - 1]` = nombre attendu du numéro `n`.
pub fn set_score(numbers: &[u8], predicted: &[f64]) -> f64 {
    let mut score: f64 = numbers
        .iter()
        .filter_map(|&n| predicted.get((n as usize).checked_sub(1)?))
        .map(|p| p * 100.0)
        .sum();

    let sum: u32 = numbers.iter().map(|&n| n as u32).sum();
    if (115..=160).contains(&sum) {
        score += 20.0;
    }

    score += match odd_count(numbers) {
        3 => 15.0,
        2 | 4 => 10.0,
        _ => 0.0,
    };

    if low_count(numbers) == 3 {
        score += 10.0;
    }
    score
}

pub fn odd_count(numbers: &[u8]) -> usize {
    numbers.iter().filter(|&&n| n % 2 == 1).count()
}

pub fn low_count(numbers: &[u8]) -> usize {
    numbers.iter().filter(|&&n| n <= LOW_MAX).count()
}

/// Les cibles restent atteignables avec les places restantes.
fn reachable(picked: &[u8], target_odd: usize) -> bool {
    let room = LOTTO_PICK.saturating_sub(picked.len());
    let odd = odd_count(picked);
    let low = low_count(picked);
    picked.len() <= LOTTO_PICK
        && odd <= target_odd
        && target_odd - odd <= room
        && low <= LOW_MAX_COUNT
        && low + room >= LOW_MIN_COUNT
}

/// Marche gloutonne : part de `must_include`, puis admet chaque candidat (dans l'ordre)
/// tant que `target_odd` impairs et 2 à 4 numéros bas restent atteignables.
pub fn greedy_pick(
    candidates: &[u8],
    must_include: &[u8],
    target_odd: usize,
) -> Result<[u8; LOTTO_PICK], ConstraintUnsatisfiable> {
    let mut picked: Vec<u8> = Vec::with_capacity(LOTTO_PICK);
    for &n in must_include {
        if !picked.contains(&n) {
            picked.push(n);
        }
    }
    if !reachable(&picked, target_odd) {
        return Err(ConstraintUnsatisfiable);
    }

    for &n in candidates {
        if picked.len() == LOTTO_PICK {
            break;
        }
        if picked.contains(&n) {
            continue;
        }
        picked.push(n);
        if !reachable(&picked, target_odd) {
            picked.pop();
        }
    }

    if picked.len() < LOTTO_PICK {
        return Err(ConstraintUnsatisfiable);
    }
    picked.sort_unstable();
    let mut out = [0u8; LOTTO_PICK];
    out.copy_from_slice(&picked);
    Ok(out)
}
