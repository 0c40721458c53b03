//! Formules fondées sur la récence : écho, séries, écarts, moyennes mobiles.

use rand::rngs::StdRng;

use lottokr_db::models::{LottoDraw, LOTTO_MAX};

use super::{gap_table, recent, Tally};
use crate::error::RuleError;

/// F1 : numéros sortis au moins deux fois sur les 5 derniers tirages.
pub fn echo(history: &[LottoDraw], _rng: &mut StdRng) -> Result<Vec<u8>, RuleError> {
    Ok(Tally::of(recent(history, 5)).at_least(2))
}

/// F4 : numéros sortis au moins trois fois sur les 7 derniers tirages.
pub fn hot_streak(history: &[LottoDraw], _rng: &mut StdRng) -> Result<Vec<u8>, RuleError> {
    Ok(Tally::of(recent(history, 7)).at_least(3))
}

/// F3 : absence actuelle entre 0.9 et 1.5 fois l'écart moyen, au plus près de 1.
pub fn gap_due(history: &[LottoDraw], _rng: &mut StdRng) -> Result<Vec<u8>, RuleError> {
    let mut due: Vec<(u8, f64)> = gap_table(history)
        .into_iter()
        .filter(|g| g.avg_gap > 0.0)
        .filter_map(|g| {
            let ratio = g.last_seen as f64 / g.avg_gap;
            (0.9..=1.5).contains(&ratio).then_some((g.number, (ratio - 1.0).abs()))
        })
        .collect();
    due.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal).then(a.0.cmp(&b.0)));
    Ok(due.into_iter().map(|(n, _)| n).collect())
}

/// F11 : 3 numéros chauds (10 derniers tirages) puis 3 froids
/// dont l'absence est comprise entre 1 et 2 écarts moyens.
pub fn hot_cold(history: &[LottoDraw], _rng: &mut StdRng) -> Result<Vec<u8>, RuleError> {
    let mut picked: Vec<u8> = Tally::of(recent(history, 10)).ranked();
    picked.truncate(3);

    let mut cold: Vec<(u8, usize)> = gap_table(history)
        .into_iter()
        .filter(|g| g.last_seen as f64 >= g.avg_gap && g.last_seen as f64 <= g.avg_gap * 2.0)
        .map(|g| (g.number, g.last_seen))
        .collect();
    cold.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));
    picked.extend(cold.into_iter().take(3).map(|(n, _)| n));
    Ok(picked)
}

/// F14 : taux sur 5 tirages supérieur au taux sur 20 tirages.
pub fn moving_average_cross(history: &[LottoDraw], _rng: &mut StdRng) -> Result<Vec<u8>, RuleError> {
    let short = Tally::of(recent(history, 5));
    let long = Tally::of(recent(history, 20));

    let mut bullish: Vec<(u8, f64)> = (1..=LOTTO_MAX)
        .filter_map(|n| {
            let rate5 = short.get(n) as f64 / 5.0;
            let rate20 = long.get(n) as f64 / 20.0;
            (rate5 > rate20).then_some((n, rate5 - rate20))
        })
        .collect();
    bullish.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal).then(a.0.cmp(&b.0)));
    Ok(bullish.into_iter().map(|(n, _)| n).collect())
}

/// F15 : voisins (±1) des 10 numéros absents depuis le plus longtemps.
pub fn boundary(history: &[LottoDraw], _rng: &mut StdRng) -> Result<Vec<u8>, RuleError> {
    let mut gaps = gap_table(history);
    gaps.sort_by(|a, b| b.last_seen.cmp(&a.last_seen).then(a.number.cmp(&b.number)));

    let mut picked: Vec<u8> = Vec::new();
    for g in gaps.iter().take(10) {
        if g.number > 1 && !picked.contains(&(g.number - 1)) {
            picked.push(g.number - 1);
        }
        if g.number < LOTTO_MAX && !picked.contains(&(g.number + 1)) {
            picked.push(g.number + 1);
        }
    }
    Ok(picked)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::formulas::{lotto_draw, make_lotto_draws, random_lotto_draws};
    use rand::SeedableRng;

    fn rng() -> StdRng {
        StdRng::seed_from_u64(1)
    }

    #[test]
    fn test_echo_keeps_repeated_numbers() {
        let history = vec![
            lotto_draw(1, [1, 2, 3, 4, 5, 6], 45),
            lotto_draw(2, [1, 2, 3, 7, 8, 9], 45),
            lotto_draw(3, [1, 10, 11, 12, 13, 14], 45),
            lotto_draw(4, [15, 16, 17, 18, 19, 20], 45),
            lotto_draw(5, [21, 22, 23, 24, 25, 26], 45),
        ];
        assert_eq!(echo(&history, &mut rng()).unwrap(), vec![1, 2, 3]);
    }

    #[test]
    fn test_echo_ignores_older_draws() {
        let mut history = vec![lotto_draw(1, [30, 31, 32, 33, 34, 35], 45)];
        history.extend((2..=6).map(|r| lotto_draw(r, [r as u8, 10, 11, 12, 13, 14], 45)));
        history.push(lotto_draw(7, [30, 31, 40, 41, 42, 43], 45));
        let ranked = echo(&history, &mut rng()).unwrap();
        assert!(!ranked.contains(&30));
        assert_eq!(&ranked[..5], &[10, 11, 12, 13, 14]);
    }

    #[test]
    fn test_hot_streak_threshold() {
        let history = make_lotto_draws(8);
        // Tirages 2..8 : 41-44 reviennent tous les 4 tirages, pas 3 fois
        assert!(hot_streak(&history, &mut rng()).unwrap().is_empty());

        let history: Vec<_> = (1..=7).map(|r| lotto_draw(r, [5, 6, 7, 20 + r as u8, 30, 40], 45)).collect();
        assert_eq!(hot_streak(&history, &mut rng()).unwrap(), vec![5, 6, 7, 30, 40]);
    }

    #[test]
    fn test_gap_due_ratio_window() {
        // 1 : écart moyen 4, absent depuis 4 (ratio 1.0)
        // 2 : écart moyen 5, absent depuis 6 (ratio 1.2)
        let history: Vec<_> = (0..17usize)
            .map(|idx| {
                let a = if idx % 4 == 0 && idx <= 12 { 1 } else { 20 };
                let b = if idx % 5 == 0 && idx <= 10 { 2 } else { 21 };
                lotto_draw(idx as u32 + 1, [a, b, 30, 31, 32, 33], 45)
            })
            .collect();
        assert_eq!(gap_due(&history, &mut rng()).unwrap(), vec![1, 2]);

        let history = random_lotto_draws(60, 8);
        let gaps = gap_table(&history);
        for n in gap_due(&history, &mut rng()).unwrap() {
            let g = gaps[n as usize - 1];
            let ratio = g.last_seen as f64 / g.avg_gap;
            assert!((0.9..=1.5).contains(&ratio));
        }
    }

    #[test]
    fn test_hot_cold_shape() {
        let history = random_lotto_draws(60, 5);
        let ranked = hot_cold(&history, &mut rng()).unwrap();
        assert!(ranked.len() <= 6);
        let hot = Tally::of(recent(&history, 10)).ranked();
        assert_eq!(&ranked[..3], &hot[..3]);
    }

    #[test]
    fn test_moving_average_cross_prefers_recent() {
        let mut history: Vec<_> = (1..=15).map(|r| lotto_draw(r, [1, 2, 3, 4, 5, 6], 45)).collect();
        history.extend((16..=20).map(|r| lotto_draw(r, [40, 41, 42, 43, 44, 45], 1)));
        let ranked = moving_average_cross(&history, &mut rng()).unwrap();
        assert_eq!(ranked, vec![40, 41, 42, 43, 44, 45]);
    }

    #[test]
    fn test_boundary_neighbors() {
        let history = make_lotto_draws(10);
        let ranked = boundary(&history, &mut rng()).unwrap();
        // 45 jamais vu : seul son voisin 44 est proposé
        assert_eq!(ranked[0], 44);
        assert!(ranked.iter().all(|&n| (1..=45).contains(&n)));
        let mut dedup = ranked.clone();
        dedup.sort_unstable();
        dedup.dedup();
        assert_eq!(dedup.len(), ranked.len());
    }
}
