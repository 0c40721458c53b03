//! Comparaison des grilles recommandées avec un tirage réel.

use serde::Serialize;

use lottokr_db::models::{LottoDraw, PensionDraw, LOTTO_PICK, PENSION_DIGITS};

use crate::recommend::lotto::LottoAnalysis;
use crate::recommend::pension::PensionAnalysis;
use crate::recommend::{RecommendedSet, SetMethod};

/// Numéros du classement CDM comparés au tirage réel.
pub const TOP_NUMBERS: usize = 15;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub enum LottoPrize {
    First,
    Second,
    Third,
    Fourth,
    Fifth,
}

impl std::fmt::Display for LottoPrize {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LottoPrize::First => write!(f, "1er rang"),
            LottoPrize::Second => write!(f, "2e rang"),
            LottoPrize::Third => write!(f, "3e rang"),
            LottoPrize::Fourth => write!(f, "4e rang"),
            LottoPrize::Fifth => write!(f, "5e rang"),
        }
    }
}

/// 6 → 1er, 5 + bonus → 2e, 5 → 3e, 4 → 4e, 3 → 5e.
pub fn lotto_prize(matches: usize, bonus_hit: bool) -> Option<LottoPrize> {
    match (matches, bonus_hit) {
        (6, _) => Some(LottoPrize::First),
        (5, true) => Some(LottoPrize::Second),
        (5, false) => Some(LottoPrize::Third),
        (4, _) => Some(LottoPrize::Fourth),
        (3, _) => Some(LottoPrize::Fifth),
        _ => None,
    }
}

/// Rang Pension (1 à 6) selon les chiffres trouvés depuis la dernière position.
pub fn pension_prize(trailing: usize) -> Option<u8> {
    (1..=PENSION_DIGITS).contains(&trailing).then(|| (PENSION_DIGITS + 1 - trailing) as u8)
}

/// Chiffres identiques consécutifs en partant de la dernière position.
pub fn trailing_matches(candidate: &[u8], actual: &[u8]) -> usize {
    candidate
        .iter()
        .rev()
        .zip(actual.iter().rev())
        .take_while(|(a, b)| a == b)
        .count()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LottoSetMatch {
    pub rank: usize,
    pub method: SetMethod,
    pub numbers: [u8; LOTTO_PICK],
    pub matched: Vec<u8>,
    pub bonus_hit: bool,
    pub prize: Option<LottoPrize>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LottoMatchReport {
    pub target_round: u32,
    pub actual: [u8; LOTTO_PICK],
    pub bonus: u8,
    /// Numéros du tirage présents dans le top 15 CDM.
    pub top_matched: Vec<u8>,
    /// Par nombre de numéros trouvés décroissant.
    pub sets: Vec<LottoSetMatch>,
    pub best: usize,
}

pub fn match_lotto_set(set: &RecommendedSet, actual: &LottoDraw) -> LottoSetMatch {
    let matched: Vec<u8> = actual.numbers().iter().copied().filter(|n| set.numbers.contains(n)).collect();
    let bonus_hit = set.numbers.contains(&actual.bonus());
    LottoSetMatch {
        rank: set.rank,
        method: set.method.clone(),
        numbers: set.numbers,
        prize: lotto_prize(matched.len(), bonus_hit),
        matched,
        bonus_hit,
    }
}

pub fn match_lotto(analysis: &LottoAnalysis, actual: &LottoDraw) -> LottoMatchReport {
    let top = analysis.top_numbers(TOP_NUMBERS);
    let top_matched: Vec<u8> = actual.numbers().iter().copied().filter(|n| top.contains(n)).collect();

    let mut sets: Vec<LottoSetMatch> = analysis.sets.iter().map(|s| match_lotto_set(s, actual)).collect();
    sets.sort_by(|a, b| b.matched.len().cmp(&a.matched.len()));
    let best = sets.first().map_or(0, |s| s.matched.len());

    LottoMatchReport {
        target_round: actual.round(),
        actual: *actual.numbers(),
        bonus: actual.bonus(),
        top_matched,
        sets,
        best,
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PensionSetMatch {
    pub rank: usize,
    pub group: Option<u8>,
    pub digits: [u8; PENSION_DIGITS],
    pub group_hit: bool,
    /// Positions (1 à 6) où le chiffre est identique.
    pub matched_positions: Vec<usize>,
    pub trailing: usize,
    pub prize: Option<u8>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PensionMatchReport {
    pub target_round: u32,
    pub actual_group: u8,
    pub actual: [u8; PENSION_DIGITS],
    /// Par chiffres finaux trouvés décroissant.
    pub sets: Vec<PensionSetMatch>,
    pub best: usize,
}

pub fn match_pension_set(set: &RecommendedSet, actual: &PensionDraw) -> PensionSetMatch {
    let digits = actual.digits();
    let matched_positions = (0..PENSION_DIGITS)
        .filter(|&i| set.numbers[i] == digits[i])
        .map(|i| i + 1)
        .collect();
    let trailing = trailing_matches(&set.numbers, digits);
    PensionSetMatch {
        rank: set.rank,
        group: set.group,
        digits: set.numbers,
        group_hit: set.group == Some(actual.group()),
        matched_positions,
        trailing,
        prize: pension_prize(trailing),
    }
}

pub fn match_pension(analysis: &PensionAnalysis, actual: &PensionDraw) -> PensionMatchReport {
    let mut sets: Vec<PensionSetMatch> = analysis.sets.iter().map(|s| match_pension_set(s, actual)).collect();
    sets.sort_by(|a, b| b.trailing.cmp(&a.trailing));
    let best = sets.first().map_or(0, |s| s.trailing);

    PensionMatchReport {
        target_round: actual.round(),
        actual_group: actual.group(),
        actual: *actual.digits(),
        sets,
        best,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::formulas::{lotto_draw, pension_draw};

    fn set(numbers: [u8; 6], group: Option<u8>) -> RecommendedSet {
        RecommendedSet {
            rank: 1,
            numbers,
            group,
            score: 0.0,
            method: SetMethod::CdmTop,
        }
    }

    #[test]
    fn test_lotto_prize_tiers() {
        assert_eq!(lotto_prize(6, false), Some(LottoPrize::First));
        assert_eq!(lotto_prize(5, true), Some(LottoPrize::Second));
        assert_eq!(lotto_prize(5, false), Some(LottoPrize::Third));
        assert_eq!(lotto_prize(4, true), Some(LottoPrize::Fourth));
        assert_eq!(lotto_prize(3, false), Some(LottoPrize::Fifth));
        assert_eq!(lotto_prize(2, true), None);
    }

    #[test]
    fn test_lotto_set_match() {
        let actual = lotto_draw(100, [3, 11, 17, 25, 33, 40], 8);
        let m = match_lotto_set(&set([3, 8, 11, 17, 25, 33], None), &actual);
        assert_eq!(m.matched, vec![3, 11, 17, 25, 33]);
        assert!(m.bonus_hit);
        assert_eq!(m.prize, Some(LottoPrize::Second));
    }

    #[test]
    fn test_trailing_matches() {
        assert_eq!(trailing_matches(&[1, 2, 3, 4, 5, 6], &[9, 9, 9, 4, 5, 6]), 3);
        assert_eq!(trailing_matches(&[1, 2, 3, 4, 5, 6], &[1, 2, 3, 4, 5, 7]), 0);
        assert_eq!(trailing_matches(&[1, 2, 3, 4, 5, 6], &[1, 2, 3, 4, 5, 6]), 6);
    }

    #[test]
    fn test_pension_prize() {
        assert_eq!(pension_prize(6), Some(1));
        assert_eq!(pension_prize(1), Some(6));
        assert_eq!(pension_prize(0), None);
    }

    #[test]
    fn test_pension_set_match() {
        let actual = pension_draw(50, 2, [4, 0, 7, 1, 5, 9]);
        let m = match_pension_set(&set([4, 3, 7, 2, 5, 9], Some(2)), &actual);
        assert!(m.group_hit);
        assert_eq!(m.matched_positions, vec![1, 3, 5, 6]);
        assert_eq!(m.trailing, 2);
        assert_eq!(m.prize, Some(5));
    }
}
