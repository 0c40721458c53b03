use serde::Serialize;

use lottokr_db::models::{LottoDraw, LOTTO_PICK};

use crate::recommend::{low_count, odd_count};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SumRange {
    pub min: u32,
    pub max: u32,
    pub avg: f64,
}

/// Répartition `k:(6-k)` sur l'historique, dans l'ordre de première apparition.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SplitDistribution {
    pub counts: Vec<(usize, u32)>,
}

impl SplitDistribution {
    fn add(&mut self, k: usize) {
        match self.counts.iter_mut().find(|(split, _)| *split == k) {
            Some((_, c)) => *c += 1,
            None => self.counts.push((k, 1)),
        }
    }

    /// Répartition la plus fréquente ; à égalité, la première rencontrée.
    pub fn most_common(&self) -> Option<usize> {
        let mut best: Option<(usize, u32)> = None;
        for &(split, count) in &self.counts {
            if best.map_or(true, |(_, c)| count > c) {
                best = Some((split, count));
            }
        }
        best.map(|(split, _)| split)
    }

    pub fn label(split: usize) -> String {
        format!("{}:{}", split, LOTTO_PICK - split)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PatternSummary {
    pub draws: usize,
    pub sum_range: SumRange,
    /// Impairs : pairs.
    pub odd_even: SplitDistribution,
    /// Bas (≤ 22) : hauts.
    pub low_high: SplitDistribution,
    /// Pourcentage arrondi des tirages avec au moins deux numéros consécutifs.
    pub consecutive_percent: u32,
}

pub fn has_consecutive_pair(numbers: &[u8]) -> bool {
    let mut sorted = numbers.to_vec();
    sorted.sort_unstable();
    sorted.windows(2).any(|w| w[1] == w[0] + 1)
}

/// `None` pour un historique vide.
pub fn summarize(history: &[LottoDraw]) -> Option<PatternSummary> {
    if history.is_empty() {
        return None;
    }

    let mut min = u32::MAX;
    let mut max = 0u32;
    let mut total = 0u64;
    let mut odd_even = SplitDistribution { counts: Vec::new() };
    let mut low_high = SplitDistribution { counts: Vec::new() };
    let mut consecutive = 0usize;

    for draw in history {
        let numbers = draw.numbers();
        let sum: u32 = numbers.iter().map(|&n| n as u32).sum();
        min = min.min(sum);
        max = max.max(sum);
        total += sum as u64;

        odd_even.add(odd_count(numbers));
        low_high.add(low_count(numbers));
        if has_consecutive_pair(numbers) {
            consecutive += 1;
        }
    }

    let n = history.len();
    Some(PatternSummary {
        draws: n,
        sum_range: SumRange {
            min,
            max,
            avg: total as f64 / n as f64,
        },
        odd_even,
        low_high,
        consecutive_percent: ((consecutive as f64 / n as f64) * 100.0).round() as u32,
    })
}
