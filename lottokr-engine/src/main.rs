mod interactive;

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use rand::rngs::StdRng;
use rand::SeedableRng;

use lottokr_db::db::{
    count_draws, db_path, fetch_lotto_draw, fetch_lotto_draws, fetch_pension_draw, fetch_pension_draws,
    latest_round, migrate, open_db,
};
use lottokr_db::models::{Game, LottoDraw, PensionDraw, LOTTO_MAX, LOTTO_PICK};
use lottokr_db::rusqlite::Connection;
use lottokr_engine::backtest::{ranked_by_all, ranked_by_recent, run_backtest, BacktestConfig};
use lottokr_engine::config::{load_config, save_config, AnalysisConfig};
use lottokr_engine::consensus::consensus_numbers;
use lottokr_engine::display;
use lottokr_engine::matching::{lotto_prize, match_lotto, match_pension};
use lottokr_engine::patterns::summarize;
use lottokr_engine::recommend::lotto::{self, LottoAnalysis};
use lottokr_engine::recommend::pension::{self, PensionAnalysis};
use lottokr_engine::recommend::{low_count, odd_count, set_score};

/// Numéros affichés par la commande consensus.
const CONSENSUS_DISPLAYED: usize = 20;

#[derive(Parser)]
#[command(name = "lottokr-engine", about = "Analyse statistique Lotto 6/45 et Pension 720+")]
struct Cli {
    /// Base de données (défaut : ./data/lottokr.db)
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    /// Fichier de configuration JSON
    #[arg(long, global = true, default_value = "lottokr.json")]
    config: PathBuf,

    /// Seed pour la reproductibilité (défaut : date du jour YYYYMMDD)
    #[arg(long, global = true)]
    seed: Option<u64>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Analyser l'historique et recommander des grilles
    Analyze {
        #[arg(short, long, default_value = "lotto")]
        game: Game,

        /// Analyse « et si » : seuls les tirages antérieurs sont utilisés,
        /// puis les grilles sont comparées au tirage réel
        #[arg(short, long)]
        round: Option<u32>,

        /// Sortie JSON
        #[arg(long)]
        json: bool,
    },

    /// Backtest walk-forward des 20 formules (Lotto)
    Backtest {
        /// Trier par taux récent plutôt que global
        #[arg(long)]
        recent: bool,

        #[arg(long)]
        json: bool,
    },

    /// Comparer une grille Lotto avec un tirage et le classement CDM
    Compare {
        /// 6 numéros (1-45)
        numbers: Vec<u8>,

        /// Tirage de référence (défaut : le dernier)
        #[arg(short, long)]
        round: Option<u32>,
    },

    /// Numéros partagés par les formules
    Consensus,

    /// Afficher la configuration effective
    Config {
        /// L'écrire dans le fichier de configuration
        #[arg(long)]
        save: bool,
    },

    /// Mode interactif (REPL)
    Interactive,
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();
    let path = cli.db.unwrap_or_else(db_path);
    let conn = open_db(&path)?;
    migrate(&conn)?;
    let config = load_config(&cli.config)?.with_seed(cli.seed);

    match cli.command {
        Command::Analyze { game, round, json } => cmd_analyze(&conn, &config, game, round, json),
        Command::Backtest { recent, json } => cmd_backtest(&conn, &config, recent, json),
        Command::Compare { numbers, round } => cmd_compare(&conn, &config, &numbers, round),
        Command::Consensus => cmd_consensus(&conn, &config),
        Command::Config { save } => cmd_config(&config, &cli.config, save),
        Command::Interactive => interactive::run_interactive(&conn, config),
    }
}

pub(crate) fn ensure_not_empty(conn: &Connection, game: Game) -> Result<()> {
    if count_draws(conn, game)? == 0 {
        bail!("Base vide. Lancez d'abord : lottokr import --game {game} <fichier>");
    }
    Ok(())
}

/// Un tirage cible doit exister ou être le prochain à venir.
pub(crate) fn check_round(conn: &Connection, game: Game, round: u32) -> Result<()> {
    let latest = latest_round(conn, game)?.unwrap_or(0);
    if round == 0 || round > latest + 1 {
        bail!("Tirage {} invalide : la base s'arrête au tirage {}", round, latest);
    }
    Ok(())
}

fn cmd_config(config: &AnalysisConfig, path: &Path, save: bool) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(config)?);
    if save {
        save_config(config, path)?;
        println!("Configuration écrite dans {}", path.display());
    }
    Ok(())
}

fn spinner(msg: &str) -> Result<ProgressBar> {
    let pb = ProgressBar::new_spinner();
    pb.set_style(ProgressStyle::default_spinner().template("{spinner:.green} [{elapsed_precise}] {msg}")?);
    pb.set_message(msg.to_string());
    pb.enable_steady_tick(Duration::from_millis(120));
    Ok(pb)
}

pub(crate) fn analyze_lotto(history: &[LottoDraw], config: &AnalysisConfig) -> Result<LottoAnalysis> {
    let mut rng = StdRng::seed_from_u64(config.effective_seed());
    let pb = spinner(&format!("Analyse de {} tirages Lotto...", history.len()))?;
    let analysis = lotto::analyze(history, config, &mut rng);
    pb.finish_and_clear();
    Ok(analysis?)
}

pub(crate) fn analyze_pension(history: &[PensionDraw], config: &AnalysisConfig) -> Result<PensionAnalysis> {
    Ok(pension::analyze(history, config)?)
}

pub(crate) fn show_lotto(conn: &Connection, analysis: &LottoAnalysis, history: &[LottoDraw], round: Option<u32>) -> Result<()> {
    display::display_lotto_analysis(analysis);
    if let Some(summary) = summarize(history) {
        display::display_patterns(&summary);
    }
    if let Some(round) = round {
        match fetch_lotto_draw(conn, round)? {
            Some(actual) => display::display_lotto_match(&match_lotto(analysis, &actual)),
            None => println!("\n(Tirage {round} pas encore enregistré : pas de comparaison)"),
        }
    }
    Ok(())
}

pub(crate) fn show_pension(conn: &Connection, analysis: &PensionAnalysis, round: Option<u32>) -> Result<()> {
    display::display_pension_analysis(analysis);
    if let Some(round) = round {
        match fetch_pension_draw(conn, round)? {
            Some(actual) => display::display_pension_match(&match_pension(analysis, &actual)),
            None => println!("\n(Tirage {round} pas encore enregistré : pas de comparaison)"),
        }
    }
    Ok(())
}

pub(crate) fn cmd_analyze(conn: &Connection, config: &AnalysisConfig, game: Game, round: Option<u32>, json: bool) -> Result<()> {
    ensure_not_empty(conn, game)?;
    if let Some(round) = round {
        check_round(conn, game, round)?;
    }

    match game {
        Game::Lotto => {
            let history = fetch_lotto_draws(conn, round)?;
            let analysis = analyze_lotto(&history, config)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&analysis)?);
                return Ok(());
            }
            if config.seed.is_none() {
                println!("(Seed du jour : {})", config.effective_seed());
            }
            show_lotto(conn, &analysis, &history, round)
        }
        Game::Pension => {
            let history = fetch_pension_draws(conn, round)?;
            let analysis = analyze_pension(&history, config)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&analysis)?);
                return Ok(());
            }
            show_pension(conn, &analysis, round)
        }
    }
}

pub(crate) fn cmd_backtest(conn: &Connection, config: &AnalysisConfig, recent: bool, json: bool) -> Result<()> {
    ensure_not_empty(conn, Game::Lotto)?;
    let history = fetch_lotto_draws(conn, None)?;

    let pb = spinner(&format!("Backtest des formules sur {} tirages...", history.len()))?;
    let stats = run_backtest(&history, &BacktestConfig::from(config));
    pb.finish_with_message("Backtest terminé");
    let stats = stats?;

    if json {
        println!("{}", serde_json::to_string_pretty(&stats)?);
        return Ok(());
    }
    let ranked = if recent { ranked_by_recent(&stats) } else { ranked_by_all(&stats) };
    display::display_backtest(&ranked, config.hit_threshold);
    Ok(())
}

fn parse_grid(numbers: &[u8]) -> Result<[u8; LOTTO_PICK]> {
    let grid: [u8; LOTTO_PICK] = numbers
        .try_into()
        .map_err(|_| anyhow::anyhow!("Attendu {} numéros, reçu : {}", LOTTO_PICK, numbers.len()))?;
    if grid.iter().any(|&n| n == 0 || n > LOTTO_MAX) {
        bail!("Numéros hors de 1-{}", LOTTO_MAX);
    }
    let mut sorted = grid;
    sorted.sort_unstable();
    if sorted.windows(2).any(|w| w[0] == w[1]) {
        bail!("Numéros en double dans la grille");
    }
    Ok(sorted)
}

pub(crate) fn cmd_compare(conn: &Connection, config: &AnalysisConfig, numbers: &[u8], round: Option<u32>) -> Result<()> {
    let grid = parse_grid(numbers)?;
    ensure_not_empty(conn, Game::Lotto)?;

    let round = match round {
        Some(r) => r,
        None => latest_round(conn, Game::Lotto)?.context("Aucun tirage Lotto en base")?,
    };
    let actual = fetch_lotto_draw(conn, round)?.with_context(|| format!("Tirage {round} absent de la base"))?;
    let history = fetch_lotto_draws(conn, Some(round))?;
    let analysis = analyze_lotto(&history, config)?;

    let matched: Vec<u8> = grid.iter().copied().filter(|&n| actual.contains(n)).collect();
    let bonus_hit = grid.contains(&actual.bonus());
    let predicted: Vec<f64> = analysis.scores.iter().map(|s| s.predicted_count).collect();

    println!("\nGrille : {:?}", grid);
    println!(
        "Tirage {} : {:?} + bonus {}",
        actual.round(),
        actual.numbers(),
        actual.bonus()
    );
    match lotto_prize(matched.len(), bonus_hit) {
        Some(prize) => println!("  {} numéro(s) trouvé(s) {:?} : {}", matched.len(), matched, prize),
        None => println!("  {} numéro(s) trouvé(s) {:?} : pas de gain", matched.len(), matched),
    }
    println!(
        "  Score {:.2} (impairs {}, bas {}) sur l'historique avant le tirage {}",
        set_score(&grid, &predicted),
        odd_count(&grid),
        low_count(&grid),
        round
    );
    for n in grid {
        if let Some(pos) = analysis.ranked.iter().position(|s| s.value == n) {
            println!("  {:2} : rang CDM {}/{}", n, pos + 1, analysis.ranked.len());
        }
    }
    Ok(())
}

pub(crate) fn cmd_consensus(conn: &Connection, config: &AnalysisConfig) -> Result<()> {
    ensure_not_empty(conn, Game::Lotto)?;
    let history = fetch_lotto_draws(conn, None)?;
    let mut rng = StdRng::seed_from_u64(config.effective_seed());
    let entries = consensus_numbers(&history, config, &mut rng)?;
    display::display_consensus(&entries, CONSENSUS_DISPLAYED);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_grid() {
        assert_eq!(parse_grid(&[40, 3, 17, 8, 22, 31]).unwrap(), [3, 8, 17, 22, 31, 40]);
        assert!(parse_grid(&[1, 2, 3, 4, 5]).is_err());
        assert!(parse_grid(&[1, 2, 3, 4, 5, 46]).is_err());
        assert!(parse_grid(&[1, 2, 3, 4, 5, 5]).is_err());
    }

    #[test]
    fn test_config_saved_with_seed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("lottokr.json");
        let config = load_config(&path).unwrap().with_seed(Some(20240316));

        cmd_config(&config, &path, false).unwrap();
        assert!(!path.exists());

        cmd_config(&config, &path, true).unwrap();
        assert_eq!(load_config(&path).unwrap(), config);
        assert_eq!(load_config(&path).unwrap().effective_seed(), 20240316);
    }

    #[test]
    fn test_check_round() {
        let conn = Connection::open_in_memory().unwrap();
        migrate(&conn).unwrap();
        let date = chrono::NaiveDate::from_ymd_opt(2024, 1, 6).unwrap();
        let draw = LottoDraw::new(1, date, &[1, 2, 3, 4, 5, 6], 7).unwrap();
        lottokr_db::db::insert_lotto_draw(&conn, &draw).unwrap();

        assert!(check_round(&conn, Game::Lotto, 1).is_ok());
        assert!(check_round(&conn, Game::Lotto, 2).is_ok());
        assert!(check_round(&conn, Game::Lotto, 3).is_err());
        assert!(check_round(&conn, Game::Lotto, 0).is_err());
        assert!(ensure_not_empty(&conn, Game::Pension).is_err());
    }
}
