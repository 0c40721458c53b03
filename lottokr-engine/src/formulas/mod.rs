pub mod filters;
pub mod recency;
pub mod structure;

use rand::rngs::StdRng;

use lottokr_db::models::{LottoDraw, LOTTO_MAX, LOTTO_PICK};

use crate::error::RuleError;
use crate::stats::{aggregate, Distribution};

/// Valeur de `last_seen` d'un numéro jamais sorti.
pub const NEVER_SEEN: usize = 999;

/// Fenêtre utilisée pour compléter une grille incomplète.
pub const FILL_WINDOW: usize = 50;

pub trait Formula {
    fn code(&self) -> &str;
    fn label(&self) -> &str;
    fn min_history(&self) -> usize;

    /// Candidats classés, éventuellement moins de 6.
    /// `history` est trié par tirage croissant ; le dernier élément est le plus récent.
    fn rank_candidates(&self, history: &[LottoDraw], rng: &mut StdRng) -> Result<Vec<u8>, RuleError>;

    /// Grille complète de 6 numéros triés.
    fn evaluate(&self, history: &[LottoDraw], rng: &mut StdRng) -> Result<[u8; LOTTO_PICK], RuleError> {
        if history.len() < self.min_history() {
            return Err(RuleError::BelowMinHistory {
                required: self.min_history(),
                available: history.len(),
            });
        }
        let ranked = self.rank_candidates(history, rng)?;
        fill_to_six(&ranked, history)
    }
}

pub type RankFn = fn(&[LottoDraw], &mut StdRng) -> Result<Vec<u8>, RuleError>;

/// Formule décrite par ses métadonnées et son étape de classement.
pub struct Rule {
    code: &'static str,
    label: &'static str,
    min_history: usize,
    rank: RankFn,
}

impl Rule {
    pub const fn new(code: &'static str, label: &'static str, min_history: usize, rank: RankFn) -> Self {
        Self {
            code,
            label,
            min_history,
            rank,
        }
    }
}

impl Formula for Rule {
    fn code(&self) -> &str {
        self.code
    }

    fn label(&self) -> &str {
        self.label
    }

    fn min_history(&self) -> usize {
        self.min_history
    }

    fn rank_candidates(&self, history: &[LottoDraw], rng: &mut StdRng) -> Result<Vec<u8>, RuleError> {
        (self.rank)(history, rng)
    }
}

pub fn all_formulas() -> Vec<Box<dyn Formula>> {
    vec![
        Box::new(Rule::new("F1", "Écho récent", 5, recency::echo)),
        Box::new(Rule::new("F2", "Somme cible", 10, structure::sum_target)),
        Box::new(Rule::new("F3", "Cycle d'écart", 20, recency::gap_due)),
        Box::new(Rule::new("F4", "Série chaude", 7, recency::hot_streak)),
        Box::new(Rule::new("F5", "Miroir", 1, structure::mirror)),
        Box::new(Rule::new("F6", "Rotation des dizaines", 10, filters::band_rotation)),
        Box::new(Rule::new("F7", "Projection des deltas", 3, structure::delta_projection)),
        Box::new(Rule::new("F8", "Filtre Fibonacci", 30, filters::fibonacci)),
        Box::new(Rule::new("F9", "Paires fréquentes", 30, structure::pair_partners)),
        Box::new(Rule::new("F10", "Fréquence par position", 50, structure::position_frequency)),
        Box::new(Rule::new("F11", "Chaud/froid", 10, recency::hot_cold)),
        Box::new(Rule::new("F12", "Consécutifs", 10, structure::consecutive_pair)),
        Box::new(Rule::new("F13", "Dernier chiffre", 10, filters::last_digit)),
        Box::new(Rule::new("F14", "Croisement de moyennes", 20, recency::moving_average_cross)),
        Box::new(Rule::new("F15", "Voisins des absents", 10, recency::boundary)),
        Box::new(Rule::new("F16", "Somme des chiffres", 10, filters::digit_sum)),
        Box::new(Rule::new("F17", "Biais des premiers", 20, filters::prime_bias)),
        Box::new(Rule::new("F18", "Quadrants", 20, filters::quadrant)),
        Box::new(Rule::new("F19", "Corrélation lag-1", 30, structure::lag_correlation)),
        Box::new(Rule::new("F20", "Déficit modulo", 20, filters::modulo_deficit)),
    ]
}

/// Les `n` tirages les plus récents.
pub fn recent(history: &[LottoDraw], n: usize) -> &[LottoDraw] {
    &history[history.len().saturating_sub(n)..]
}

/// Comptage par numéro sur une fenêtre de tirages.
#[derive(Debug, Clone)]
pub struct Tally {
    counts: [u32; LOTTO_MAX as usize + 1],
}

impl Tally {
    pub fn new() -> Self {
        Self {
            counts: [0; LOTTO_MAX as usize + 1],
        }
    }

    pub fn of(draws: &[LottoDraw]) -> Self {
        Self::of_filtered(draws, |_| true)
    }

    pub fn of_filtered<F: Fn(u8) -> bool>(draws: &[LottoDraw], keep: F) -> Self {
        let mut tally = Self::new();
        for draw in draws {
            for &n in draw.numbers() {
                if keep(n) {
                    tally.add(n, 1);
                }
            }
        }
        tally
    }

    pub fn add(&mut self, number: u8, amount: u32) {
        if let Some(c) = self.counts.get_mut(number as usize) {
            *c += amount;
        }
    }

    pub fn get(&self, number: u8) -> u32 {
        self.counts.get(number as usize).copied().unwrap_or(0)
    }

    /// Numéros vus, par compte décroissant puis numéro croissant.
    pub fn ranked(&self) -> Vec<u8> {
        let mut seen: Vec<u8> = (1..=LOTTO_MAX).filter(|&n| self.get(n) > 0).collect();
        seen.sort_by(|&a, &b| self.get(b).cmp(&self.get(a)).then(a.cmp(&b)));
        seen
    }

    /// Numéros vus au moins `min` fois, classés.
    pub fn at_least(&self, min: u32) -> Vec<u8> {
        self.ranked().into_iter().filter(|&n| self.get(n) >= min).collect()
    }
}

impl Default for Tally {
    fn default() -> Self {
        Self::new()
    }
}

/// Les `count` numéros les plus fréquents sur les `window` derniers tirages.
pub fn top_frequency(history: &[LottoDraw], window: usize, count: usize) -> Vec<u8> {
    let mut ranked = Tally::of(recent(history, window)).ranked();
    ranked.truncate(count);
    ranked
}

#[derive(Debug, Clone, Copy)]
pub struct Gap {
    pub number: u8,
    /// Tirages écoulés depuis la dernière sortie, `NEVER_SEEN` sinon.
    pub last_seen: usize,
    pub avg_gap: f64,
}

pub fn gap_table(history: &[LottoDraw]) -> Vec<Gap> {
    aggregate(history, Distribution::LottoNumbers)
        .into_iter()
        .map(|s| Gap {
            number: s.value,
            last_seen: s.draws_since.unwrap_or(NEVER_SEEN),
            avg_gap: s.avg_gap,
        })
        .collect()
}

/// Dédoublonne, garde les 6 premiers et complète avec les plus fréquents
/// des `FILL_WINDOW` derniers tirages.
pub fn fill_to_six(ranked: &[u8], history: &[LottoDraw]) -> Result<[u8; LOTTO_PICK], RuleError> {
    if ranked.iter().any(|&n| n < 1 || n > LOTTO_MAX) {
        return Err(RuleError::Malformed(ranked.to_vec()));
    }

    let mut picked: Vec<u8> = Vec::with_capacity(LOTTO_PICK);
    let fill = top_frequency(history, FILL_WINDOW, LOTTO_MAX as usize);
    for &n in ranked.iter().chain(fill.iter()) {
        if picked.len() >= LOTTO_PICK {
            break;
        }
        if !picked.contains(&n) {
            picked.push(n);
        }
    }

    if picked.len() < LOTTO_PICK {
        return Err(RuleError::InsufficientCandidates { found: picked.len() });
    }
    picked.sort_unstable();
    let mut out = [0u8; LOTTO_PICK];
    out.copy_from_slice(&picked);
    Ok(out)
}

#[cfg(test)]
pub(crate) fn draw_date(round: u32) -> chrono::NaiveDate {
    chrono::NaiveDate::from_ymd_opt(2002, 12, 7).unwrap() + chrono::Days::new(7 * round as u64)
}

#[cfg(test)]
pub(crate) fn lotto_draw(round: u32, numbers: [u8; 6], bonus: u8) -> LottoDraw {
    LottoDraw::new(round, draw_date(round), &numbers, bonus).unwrap()
}

#[cfg(test)]
pub(crate) fn pension_draw(round: u32, group: u8, digits: [u8; 6]) -> lottokr_db::models::PensionDraw {
    lottokr_db::models::PensionDraw::new(round, draw_date(round), group, &digits).unwrap()
}

/// Tirages 1..=n réguliers : blocs de 5 consécutifs (1-40) plus un numéro 41-44.
/// Le 45 ne sort jamais (il sert de bonus).
#[cfg(test)]
pub(crate) fn make_lotto_draws(n: usize) -> Vec<LottoDraw> {
    (0..n)
        .map(|i| {
            let base = (i % 8) as u8 * 5;
            let extra = 41 + (i % 4) as u8;
            lotto_draw(
                i as u32 + 1,
                [base + 1, base + 2, base + 3, base + 4, base + 5, extra],
                45,
            )
        })
        .collect()
}

/// Tirages 1..=n pseudo-aléatoires reproductibles.
#[cfg(test)]
pub(crate) fn random_lotto_draws(n: usize, seed: u64) -> Vec<LottoDraw> {
    use rand::SeedableRng;
    let mut rng = StdRng::seed_from_u64(seed);
    (0..n)
        .map(|i| {
            let picks: Vec<u8> = rand::seq::index::sample(&mut rng, 45, 7)
                .iter()
                .map(|x| x as u8 + 1)
                .collect();
            lotto_draw(
                i as u32 + 1,
                [picks[0], picks[1], picks[2], picks[3], picks[4], picks[5]],
                picks[6],
            )
        })
        .collect()
}

#[cfg(test)]
pub(crate) fn make_pension_draws(n: usize) -> Vec<lottokr_db::models::PensionDraw> {
    (0..n)
        .map(|i| {
            let d = |k: usize| ((i * k + k) % 10) as u8;
            pension_draw(i as u32 + 1, (i % 5) as u8 + 1, [d(1), d(3), d(7), d(2), d(9), d(4)])
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    fn rng() -> StdRng {
        StdRng::seed_from_u64(42)
    }

    fn is_valid(set: &[u8; 6]) -> bool {
        set.windows(2).all(|w| w[0] < w[1]) && set.iter().all(|&n| (1..=45).contains(&n))
    }

    #[test]
    fn test_twenty_formulas_with_unique_codes() {
        let formulas = all_formulas();
        assert_eq!(formulas.len(), 20);
        let mut codes: Vec<&str> = formulas.iter().map(|f| f.code()).collect();
        codes.sort_unstable();
        codes.dedup();
        assert_eq!(codes.len(), 20);
        assert!(formulas.iter().all(|f| (1..=50).contains(&f.min_history())));
    }

    #[test]
    fn test_every_formula_returns_valid_set() {
        let history = random_lotto_draws(80, 3);
        let mut rng = rng();
        for formula in all_formulas() {
            let set = formula.evaluate(&history, &mut rng).unwrap();
            assert!(is_valid(&set), "{} : {:?}", formula.code(), set);
        }
    }

    #[test]
    fn test_every_formula_valid_at_min_history() {
        let mut rng = rng();
        for formula in all_formulas() {
            let history = random_lotto_draws(formula.min_history(), 11);
            let set = formula.evaluate(&history, &mut rng).unwrap();
            assert!(is_valid(&set), "{} : {:?}", formula.code(), set);
        }
    }

    #[test]
    fn test_every_formula_on_regular_history() {
        let history = make_lotto_draws(60);
        let mut rng = rng();
        for formula in all_formulas() {
            let set = formula.evaluate(&history, &mut rng).unwrap();
            assert!(is_valid(&set), "{} : {:?}", formula.code(), set);
        }
    }

    #[test]
    fn test_below_min_history_rejected() {
        let formulas = all_formulas();
        let f10 = formulas.iter().find(|f| f.code() == "F10").unwrap();
        let history = random_lotto_draws(49, 1);
        assert_eq!(
            f10.evaluate(&history, &mut rng()).unwrap_err(),
            RuleError::BelowMinHistory { required: 50, available: 49 }
        );
    }

    #[test]
    fn test_tally_ranking_ties_by_number() {
        let mut tally = Tally::new();
        tally.add(9, 2);
        tally.add(3, 2);
        tally.add(5, 4);
        assert_eq!(tally.ranked(), vec![5, 3, 9]);
        assert_eq!(tally.at_least(3), vec![5]);
        assert_eq!(tally.get(1), 0);
    }

    #[test]
    fn test_fill_to_six_dedupes_and_fills() {
        let history = make_lotto_draws(10);
        let set = fill_to_six(&[40, 40, 2], &history).unwrap();
        assert!(is_valid(&set));
        assert!(set.contains(&40) && set.contains(&2));
    }

    #[test]
    fn test_fill_to_six_truncates_in_rank_order() {
        let history = make_lotto_draws(10);
        let set = fill_to_six(&[30, 20, 10, 9, 8, 7, 6, 5], &history).unwrap();
        assert_eq!(set, [7, 8, 9, 10, 20, 30]);
    }

    #[test]
    fn test_fill_to_six_rejects_out_of_range() {
        let history = make_lotto_draws(10);
        assert_eq!(fill_to_six(&[0, 1], &history).unwrap_err(), RuleError::Malformed(vec![0, 1]));
        assert_eq!(fill_to_six(&[46], &history).unwrap_err(), RuleError::Malformed(vec![46]));
    }

    #[test]
    fn test_fill_to_six_empty_history() {
        assert_eq!(
            fill_to_six(&[1, 2], &[]).unwrap_err(),
            RuleError::InsufficientCandidates { found: 2 }
        );
    }

    #[test]
    fn test_gap_table_sentinel() {
        let history = make_lotto_draws(12);
        let gaps = gap_table(&history);
        assert_eq!(gaps.len(), 45);
        assert_eq!(gaps[44].last_seen, NEVER_SEEN);
        // Le 1 sort aux index 0 et 8 ; dernier index = 11
        assert_eq!(gaps[0].last_seen, 3);
        assert!((gaps[0].avg_gap - 8.0).abs() < 1e-12);
    }

    #[test]
    fn test_fixtures_are_valid() {
        assert_eq!(make_lotto_draws(30).len(), 30);
        assert_eq!(random_lotto_draws(30, 9).len(), 30);
        let pension = make_pension_draws(12);
        assert!(pension.iter().all(|d| (1..=5).contains(&d.group())));
    }
}
