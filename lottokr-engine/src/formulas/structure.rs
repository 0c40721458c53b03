//! Formules fondées sur la structure des tirages : sommes, écarts internes,
//! paires et positions.

use rand::rngs::StdRng;
use rand::seq::SliceRandom;

use lottokr_db::models::{LottoDraw, LOTTO_MAX, LOTTO_PICK};

use super::{recent, top_frequency, Tally};
use crate::error::RuleError;

const SIZE: usize = LOTTO_MAX as usize + 1;

fn last_draw(history: &[LottoDraw]) -> Result<&LottoDraw, RuleError> {
    history.last().ok_or(RuleError::InsufficientCandidates { found: 0 })
}

fn draw_sum(draw: &LottoDraw) -> u32 {
    draw.numbers().iter().map(|&n| n as u32).sum()
}

fn push_unique(list: &mut Vec<u8>, n: u8) {
    if !list.contains(&n) {
        list.push(n);
    }
}

/// F2 : parmi 100 mélanges des 20 numéros les plus fréquents (20 derniers tirages),
/// la grille dont la somme est la plus proche de la somme moyenne des 10 derniers.
/// Résultat aléatoire.
pub fn sum_target(history: &[LottoDraw], rng: &mut StdRng) -> Result<Vec<u8>, RuleError> {
    let window = recent(history, 10);
    if window.is_empty() {
        return Err(RuleError::InsufficientCandidates { found: 0 });
    }
    let avg_sum = window.iter().map(draw_sum).sum::<u32>() as f64 / window.len() as f64;

    let mut candidates = top_frequency(history, 20, 20);
    let mut best: Vec<u8> = Vec::new();
    let mut best_diff = f64::INFINITY;

    for _ in 0..100 {
        candidates.shuffle(rng);
        let combo = &candidates[..LOTTO_PICK.min(candidates.len())];
        let sum: u32 = combo.iter().map(|&n| n as u32).sum();
        let diff = (sum as f64 - avg_sum).abs();
        if diff < best_diff {
            best_diff = diff;
            best = combo.to_vec();
        }
    }
    Ok(best)
}

/// F5 : symétrique de chaque numéro du dernier tirage autour de sa médiane,
/// `((n + médiane) mod 45) + 1`.
pub fn mirror(history: &[LottoDraw], _rng: &mut StdRng) -> Result<Vec<u8>, RuleError> {
    let last = last_draw(history)?;
    let median = last.numbers()[2];
    let mut picked = Vec::with_capacity(LOTTO_PICK);
    for &n in last.numbers() {
        push_unique(&mut picked, (n + median) % LOTTO_MAX + 1);
    }
    Ok(picked)
}

/// F7 : projection depuis le plus petit numéro du dernier tirage
/// avec les écarts moyens par rang des 3 derniers tirages.
pub fn delta_projection(history: &[LottoDraw], _rng: &mut StdRng) -> Result<Vec<u8>, RuleError> {
    let window = recent(history, 3);
    let last = last_draw(history)?;

    let mut avg_deltas = [7u32; LOTTO_PICK - 1];
    for (i, slot) in avg_deltas.iter_mut().enumerate() {
        let deltas: Vec<u32> = window
            .iter()
            .map(|d| (d.numbers()[i + 1] - d.numbers()[i]) as u32)
            .collect();
        if !deltas.is_empty() {
            let mean = (deltas.iter().sum::<u32>() as f64 / deltas.len() as f64).round() as u32;
            if mean > 0 {
                *slot = mean;
            }
        }
    }

    let mut picked = vec![last.numbers()[0]];
    let mut current = last.numbers()[0] as u32;
    for delta in avg_deltas {
        let next = current + delta;
        if next <= LOTTO_MAX as u32 && !picked.contains(&(next as u8)) {
            picked.push(next as u8);
            current = next;
        }
    }
    Ok(picked)
}

/// F9 : partenaires absents des 10 derniers tirages pour les 20 paires
/// les plus fréquentes dont l'autre membre est récent.
pub fn pair_partners(history: &[LottoDraw], _rng: &mut StdRng) -> Result<Vec<u8>, RuleError> {
    let mut pairs = vec![[0u32; SIZE]; SIZE];
    for draw in history {
        let nums = draw.numbers();
        for i in 0..nums.len() {
            for j in (i + 1)..nums.len() {
                pairs[nums[i] as usize][nums[j] as usize] += 1;
            }
        }
    }

    let mut ranked: Vec<(u8, u8, u32)> = Vec::new();
    for a in 1..=LOTTO_MAX {
        for b in (a + 1)..=LOTTO_MAX {
            let count = pairs[a as usize][b as usize];
            if count > 0 {
                ranked.push((a, b, count));
            }
        }
    }
    ranked.sort_by(|x, y| y.2.cmp(&x.2).then((x.0, x.1).cmp(&(y.0, y.1))));

    let recent_tally = Tally::of(recent(history, 10));
    let is_recent = |n: u8| recent_tally.get(n) > 0;

    let mut picked = Vec::new();
    for &(a, b, _) in ranked.iter().take(20) {
        if is_recent(a) && !is_recent(b) {
            push_unique(&mut picked, b);
        }
        if is_recent(b) && !is_recent(a) {
            push_unique(&mut picked, a);
        }
    }
    Ok(picked)
}

/// F10 : numéro le plus fréquent à chaque rang (grille triée), 50 derniers tirages.
pub fn position_frequency(history: &[LottoDraw], _rng: &mut StdRng) -> Result<Vec<u8>, RuleError> {
    let window = recent(history, 50);
    let mut picked = Vec::with_capacity(LOTTO_PICK);

    for pos in 0..LOTTO_PICK {
        let mut tally = Tally::new();
        for draw in window {
            tally.add(draw.numbers()[pos], 1);
        }
        if let Some(n) = tally.ranked().into_iter().find(|n| !picked.contains(n)) {
            picked.push(n);
        }
    }
    Ok(picked)
}

/// F12 : la paire consécutive la plus fréquente, puis les plus fréquents des 30 derniers tirages.
pub fn consecutive_pair(history: &[LottoDraw], _rng: &mut StdRng) -> Result<Vec<u8>, RuleError> {
    let mut consecutive = Tally::new();
    for draw in history {
        for w in draw.numbers().windows(2) {
            if w[1] - w[0] == 1 {
                consecutive.add(w[0], 1);
            }
        }
    }

    let mut picked = Vec::new();
    if let Some(&low) = consecutive.ranked().first() {
        picked.push(low);
        picked.push(low + 1);
    }
    for n in top_frequency(history, 30, LOTTO_MAX as usize) {
        push_unique(&mut picked, n);
    }
    Ok(picked)
}

/// F19 : co-occurrences décalées d'un tirage avec les numéros du dernier tirage.
pub fn lag_correlation(history: &[LottoDraw], _rng: &mut StdRng) -> Result<Vec<u8>, RuleError> {
    let last = last_draw(history)?;

    let mut lag = vec![[0u32; SIZE]; SIZE];
    for w in history.windows(2) {
        for &p in w[0].numbers() {
            for &c in w[1].numbers() {
                lag[p as usize][c as usize] += 1;
            }
        }
    }

    let mut tally = Tally::new();
    for &p in last.numbers() {
        for c in 1..=LOTTO_MAX {
            tally.add(c, lag[p as usize][c as usize]);
        }
    }
    Ok(tally.ranked())
}
