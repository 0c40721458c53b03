use comfy_table::{presets::UTF8_FULL, Cell, Color, ContentArrangement, Table};

use crate::import::ImportResult;
use lottokr_engine::stats::{Distribution, FrequencyStat};

pub fn display_import_summary(result: &ImportResult) {
    println!("Import terminé :");
    println!("  Total lignes lues : {}", result.total_records);
    println!("  Insérés           : {}", result.inserted);
    println!("  Doublons ignorés  : {}", result.skipped);
    if result.errors > 0 {
        println!("  Erreurs           : {} (détail avec RUST_LOG=warn)", result.errors);
    }
}

/// Fréquences d'une distribution, les plus fréquentes d'abord.
pub fn display_stats(stats: &[FrequencyStat], dist: Distribution, window: usize) {
    println!("\n── {} ({} derniers tirages) ──", dist, window);

    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec!["Valeur", "Fréquence", "Retard", "Écart moyen", "Récents"]);

    let mut sorted = stats.to_vec();
    sorted.sort_by(|a, b| b.frequency.cmp(&a.frequency).then(a.value.cmp(&b.value)));

    for stat in &sorted {
        let miss = stat
            .consecutive_miss
            .map_or_else(|| "—".to_string(), |m| m.to_string());
        let recent = Cell::new(stat.recent_count);
        let recent = if stat.recent_count == 0 { recent.fg(Color::Red) } else { recent };
        table.add_row(vec![
            Cell::new(format!("{:2}", stat.value)),
            Cell::new(stat.frequency),
            Cell::new(miss),
            Cell::new(format!("{:.1}", stat.avg_gap)),
            recent,
        ]);
    }
    println!("{table}");
}
