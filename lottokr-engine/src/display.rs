use comfy_table::{presets::UTF8_FULL, Cell, Color, ContentArrangement, Table};

use lottokr_db::models::{LottoDraw, PensionDraw};

use crate::backtest::BacktestStat;
use crate::cdm::{CdmScore, ModelInfo};
use crate::consensus::ConsensusEntry;
use crate::matching::{LottoMatchReport, PensionMatchReport};
use crate::patterns::{PatternSummary, SplitDistribution};
use crate::recommend::lotto::LottoAnalysis;
use crate::recommend::pension::PensionAnalysis;
use crate::recommend::RecommendedSet;
use crate::stats::FrequencyStat;

/// Numéros affichés dans le classement Lotto.
const TOP_DISPLAYED: usize = 15;
/// Apparitions récentes à partir desquelles un numéro est dit actif.
const HOT_RECENT: u32 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reason {
    AboveAverage,
    Overdue,
    RecentlyActive,
}

impl std::fmt::Display for Reason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Reason::AboveAverage => write!(f, "Fréquence au-dessus de la moyenne"),
            Reason::Overdue => write!(f, "En retard sur son écart moyen"),
            Reason::RecentlyActive => write!(f, "Actif récemment"),
        }
    }
}

/// Raisons affichées pour une catégorie, recalculées depuis ses statistiques.
/// `avg_frequency` : fréquence moyenne de la distribution.
pub fn reasons(stat: &FrequencyStat, avg_frequency: f64) -> Vec<Reason> {
    let mut out = Vec::new();
    if stat.recent_count >= HOT_RECENT {
        out.push(Reason::RecentlyActive);
    }
    if let Some(since) = stat.draws_since {
        let ratio = since as f64 / stat.avg_gap.max(1.0);
        if ratio > 1.2 && ratio < 3.0 {
            out.push(Reason::Overdue);
        }
    }
    if stat.frequency as f64 > avg_frequency {
        out.push(Reason::AboveAverage);
    }
    out
}

fn average_frequency(stats: &[FrequencyStat]) -> f64 {
    if stats.is_empty() {
        return 0.0;
    }
    stats.iter().map(|s| s.frequency as f64).sum::<f64>() / stats.len() as f64
}

fn new_table() -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic);
    table
}

fn join_numbers(numbers: &[u8]) -> String {
    numbers
        .iter()
        .map(|n| format!("{:2}", n))
        .collect::<Vec<_>>()
        .join(" - ")
}

fn rank_label(rank: u8) -> String {
    if rank == 1 {
        "1er rang".to_string()
    } else {
        format!("{rank}e rang")
    }
}

fn display_model(model: &ModelInfo) {
    println!(
        "  Modèle {} ({}) sur {} tirages : α0 = {:.3}, Σα = {:.3}",
        model.method, model.distribution, model.total_draws, model.alpha0, model.alpha_sum
    );
}

fn display_ranked(ranked: &[CdmScore], stats: &[FrequencyStat], limit: usize) {
    let avg = average_frequency(stats);
    let mut table = new_table();
    table.set_header(vec!["#", "Numéro", "Fréquence", "Retard", "Postérieure", "Attendu", "Raisons"]);

    for (i, score) in ranked.iter().take(limit).enumerate() {
        let stat = stats.iter().find(|s| s.value == score.value);
        let miss = stat
            .and_then(|s| s.consecutive_miss)
            .map_or_else(|| "—".to_string(), |m| m.to_string());
        let why = stat
            .map(|s| reasons(s, avg).iter().map(|r| r.to_string()).collect::<Vec<_>>().join(", "))
            .unwrap_or_default();
        table.add_row(vec![
            Cell::new(i + 1),
            Cell::new(format!("{:2}", score.value)).fg(Color::Green),
            Cell::new(score.frequency),
            Cell::new(miss),
            Cell::new(format!("{:.4}", score.posterior)),
            Cell::new(format!("{:.3}", score.predicted_count)),
            Cell::new(why),
        ]);
    }
    println!("{table}");
}

pub fn display_lotto_draws(draws: &[LottoDraw]) {
    if draws.is_empty() {
        println!("Aucun tirage à afficher.");
        return;
    }
    let mut table = new_table();
    table.set_header(vec!["Tirage", "Date", "Numéros", "Bonus", "Gagnants 1er", "Gain 1er"]);

    for draw in draws {
        let prize = if draw.first_prize() > 0 {
            format!("{} ₩", draw.first_prize())
        } else {
            "—".to_string()
        };
        table.add_row(vec![
            draw.round().to_string(),
            draw.date().to_string(),
            join_numbers(draw.numbers()),
            draw.bonus().to_string(),
            draw.first_winners().to_string(),
            prize,
        ]);
    }
    println!("{table}");
}

pub fn display_pension_draws(draws: &[PensionDraw]) {
    if draws.is_empty() {
        println!("Aucun tirage à afficher.");
        return;
    }
    let mut table = new_table();
    table.set_header(vec!["Tirage", "Date", "Groupe", "Numéro"]);

    for draw in draws {
        table.add_row(vec![
            draw.round().to_string(),
            draw.date().to_string(),
            draw.group().to_string(),
            draw.digit_string(),
        ]);
    }
    println!("{table}");
}

pub fn display_sets(sets: &[RecommendedSet]) {
    if sets.is_empty() {
        println!("Aucune grille construite.");
        return;
    }
    let mut table = new_table();
    table.set_header(vec!["#", "Groupe", "Grille", "Score", "Méthode"]);

    for set in sets {
        let group = set.group.map_or_else(|| "—".to_string(), |g| g.to_string());
        let numbers = match set.group {
            Some(_) => set.numbers.iter().map(|d| d.to_string()).collect::<String>(),
            None => join_numbers(&set.numbers),
        };
        table.add_row(vec![
            Cell::new(set.rank),
            Cell::new(group),
            Cell::new(numbers).fg(Color::Cyan),
            Cell::new(format!("{:.2}", set.score)),
            Cell::new(set.method.to_string()),
        ]);
    }
    println!("{table}");
}

pub fn display_lotto_analysis(analysis: &LottoAnalysis) {
    println!(
        "\n== Lotto 6/45 : analyse de {} tirages (dernier : {}) ==\n",
        analysis.total_draws, analysis.latest_round
    );
    display_model(&analysis.model);

    println!("\n── Top {} numéros ──", TOP_DISPLAYED);
    display_ranked(&analysis.ranked, &analysis.stats, TOP_DISPLAYED);

    println!("\n── Grilles recommandées ──");
    display_sets(&analysis.sets);

    if analysis.backtest.is_empty() {
        println!("\n(Backtest non disponible : historique trop court)");
    }
}

pub fn display_pension_analysis(analysis: &PensionAnalysis) {
    println!(
        "\n== Pension 720+ : analyse de {} tirages (dernier : {}) ==\n",
        analysis.total_draws, analysis.latest_round
    );
    display_model(&analysis.group_model);

    println!("\n── Groupes ──");
    display_ranked(&analysis.group_scores, &analysis.group_stats, analysis.group_scores.len());

    println!("\n── Chiffres par position ──");
    let mut table = new_table();
    table.set_header(vec!["Position", "Chauds", "Froids", "Meilleur", "Postérieure"]);
    for position in &analysis.positions {
        let (best, posterior) = position
            .ranked
            .first()
            .map_or(("—".to_string(), 0.0), |s| (s.value.to_string(), s.posterior));
        table.add_row(vec![
            Cell::new(position.position + 1),
            Cell::new(join_numbers(&position.hot())).fg(Color::Red),
            Cell::new(join_numbers(&position.cold())).fg(Color::Blue),
            Cell::new(best),
            Cell::new(format!("{:.4}", posterior)),
        ]);
    }
    println!("{table}");

    println!("\n── Combinaisons recommandées ──");
    display_sets(&analysis.sets);
}

pub fn display_backtest(stats: &[&BacktestStat], threshold: usize) {
    println!("\n== Backtest walk-forward (succès : ≥ {} numéros) ==\n", threshold);
    let mut table = new_table();
    table.set_header(vec![
        "Formule", "Nom", "Testés", "0", "1", "2", "3", "4", "5", "6", "Échecs", "Taux", "Taux récent",
    ]);

    for stat in stats {
        let mut row = vec![
            Cell::new(&stat.code),
            Cell::new(&stat.label),
            Cell::new(stat.tested),
        ];
        row.extend(stat.match_counts.iter().map(Cell::new));
        row.push(Cell::new(stat.failures));
        row.push(Cell::new(format!("{:.1}%", stat.hit_rate * 100.0)));
        let color = if stat.recent_hit_rate > stat.hit_rate { Color::Green } else { Color::White };
        row.push(Cell::new(format!("{:.1}%", stat.recent_hit_rate * 100.0)).fg(color));
        table.add_row(row);
    }
    println!("{table}");
}

pub fn display_consensus(entries: &[ConsensusEntry], limit: usize) {
    println!("\n== Consensus des formules ==\n");
    if entries.is_empty() {
        println!("Aucun consensus (historique trop court).");
        return;
    }
    let mut table = new_table();
    table.set_header(vec!["Numéro", "Formules", "Détail"]);
    for entry in entries.iter().take(limit) {
        table.add_row(vec![
            Cell::new(format!("{:2}", entry.number)),
            Cell::new(entry.count),
            Cell::new(entry.formulas.join(", ")),
        ]);
    }
    println!("{table}");
}

fn split_row(name: &str, dist: &SplitDistribution, draws: usize) -> Vec<String> {
    let most = dist
        .most_common()
        .map_or_else(|| "—".to_string(), SplitDistribution::label);
    let detail = dist
        .counts
        .iter()
        .map(|&(split, count)| {
            format!("{} ({:.0}%)", SplitDistribution::label(split), count as f64 * 100.0 / draws as f64)
        })
        .collect::<Vec<_>>()
        .join(", ");
    vec![name.to_string(), most, detail]
}

pub fn display_patterns(summary: &PatternSummary) {
    println!("\n── Motifs sur {} tirages ──", summary.draws);
    println!(
        "  Somme : min {} / max {} / moyenne {:.1}",
        summary.sum_range.min, summary.sum_range.max, summary.sum_range.avg
    );
    println!("  Tirages avec numéros consécutifs : {}%", summary.consecutive_percent);

    let mut table = new_table();
    table.set_header(vec!["Répartition", "Plus fréquente", "Détail"]);
    table.add_row(split_row("Impairs:Pairs", &summary.odd_even, summary.draws));
    table.add_row(split_row("Bas:Hauts", &summary.low_high, summary.draws));
    println!("{table}");
}

pub fn display_lotto_match(report: &LottoMatchReport) {
    println!(
        "\n== Tirage {} : {} + bonus {} ==\n",
        report.target_round,
        join_numbers(&report.actual),
        report.bonus
    );
    println!(
        "  Top 15 CDM : {}/6 numéros trouvés ({})",
        report.top_matched.len(),
        join_numbers(&report.top_matched)
    );
    println!("  Meilleure grille : {} numéro(s)", report.best);

    let mut table = new_table();
    table.set_header(vec!["#", "Grille", "Trouvés", "Bonus", "Rang", "Méthode"]);
    for set in &report.sets {
        let prize = set.prize.map_or_else(|| "—".to_string(), |p| p.to_string());
        let color = if set.prize.is_some() { Color::Green } else { Color::White };
        table.add_row(vec![
            Cell::new(set.rank),
            Cell::new(join_numbers(&set.numbers)),
            Cell::new(format!("{} ({})", set.matched.len(), join_numbers(&set.matched))),
            Cell::new(if set.bonus_hit { "oui" } else { "non" }),
            Cell::new(prize).fg(color),
            Cell::new(set.method.to_string()),
        ]);
    }
    println!("{table}");
}

pub fn display_pension_match(report: &PensionMatchReport) {
    let actual: String = report.actual.iter().map(|d| d.to_string()).collect();
    println!("\n== Tirage {} : groupe {} - {} ==\n", report.target_round, report.actual_group, actual);
    println!("  Meilleure combinaison : {} chiffre(s) en fin de numéro", report.best);

    let mut table = new_table();
    table.set_header(vec!["#", "Combinaison", "Groupe", "Positions", "Fin", "Rang"]);
    for set in &report.sets {
        let digits: String = set.digits.iter().map(|d| d.to_string()).collect();
        let group = set.group.map_or_else(|| "—".to_string(), |g| g.to_string());
        let positions = set
            .matched_positions
            .iter()
            .map(|p| p.to_string())
            .collect::<Vec<_>>()
            .join(",");
        let prize = set.prize.map_or_else(|| "—".to_string(), rank_label);
        table.add_row(vec![
            Cell::new(set.rank),
            Cell::new(digits),
            Cell::new(group).fg(if set.group_hit { Color::Green } else { Color::White }),
            Cell::new(positions),
            Cell::new(set.trailing),
            Cell::new(prize),
        ]);
    }
    println!("{table}");
}
