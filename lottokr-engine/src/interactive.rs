use std::io::{self, Write};
use std::time::{Duration, Instant};

use anyhow::{bail, Context, Result};
use lottokr_db::db::{fetch_lotto_draws, fetch_pension_draws, insert_record, latest_round};
use lottokr_db::models::{parse_date, DrawRecord, Game, LottoDraw, PensionDraw};
use lottokr_db::rusqlite::Connection;
use lottokr_engine::cache::{AnalysisCache, CacheKey};
use lottokr_engine::config::AnalysisConfig;
use lottokr_engine::display;
use lottokr_engine::recommend::lotto::LottoAnalysis;
use lottokr_engine::recommend::pension::PensionAnalysis;

#[derive(Debug, PartialEq)]
enum InteractiveCommand {
    Add,
    Analyze,
    Backtest,
    Consensus,
    History,
    Compare,
    Quit,
}

fn parse_command(input: &str) -> Option<InteractiveCommand> {
    match input.trim().to_lowercase().as_str() {
        "1" | "ajouter" | "add" => Some(InteractiveCommand::Add),
        "2" | "analyser" | "analyze" | "an" => Some(InteractiveCommand::Analyze),
        "3" | "backtest" | "bt" => Some(InteractiveCommand::Backtest),
        "4" | "consensus" | "cons" => Some(InteractiveCommand::Consensus),
        "5" | "historique" | "history" | "hist" => Some(InteractiveCommand::History),
        "6" | "comparer" | "compare" | "comp" => Some(InteractiveCommand::Compare),
        "7" | "quitter" | "quit" | "q" | "exit" => Some(InteractiveCommand::Quit),
        _ => None,
    }
}

fn parse_game(input: &str) -> Option<Game> {
    match input.trim().to_lowercase().as_str() {
        "" | "l" | "lotto" => Some(Game::Lotto),
        "p" | "pension" => Some(Game::Pension),
        _ => None,
    }
}

fn parse_values(input: &str) -> Option<Vec<u8>> {
    input
        .split(|c: char| c.is_whitespace() || c == ',')
        .filter(|s| !s.is_empty())
        .map(|s| s.parse::<u8>().ok())
        .collect()
}

fn display_menu() {
    println!();
    println!("── Mode interactif ──");
    println!("  1. ajouter    Ajouter un tirage");
    println!("  2. analyser   Analyse et grilles recommandées");
    println!("  3. backtest   Backtest des formules");
    println!("  4. consensus  Numéros partagés par les formules");
    println!("  5. historique Derniers tirages");
    println!("  6. comparer   Comparer une grille à un tirage");
    println!("  7. quitter    Quitter");
    println!();
}

fn prompt(msg: &str) -> Result<String> {
    print!("{}", msg);
    io::stdout().flush()?;
    let mut input = String::new();
    let read = io::stdin()
        .read_line(&mut input)
        .context("Erreur de lecture")?;
    if read == 0 {
        bail!("Fin de l'entrée");
    }
    Ok(input.trim().to_string())
}

fn prompt_with_default(msg: &str, default: &str) -> Result<String> {
    let input = prompt(&format!("{} [{}] : ", msg, default))?;
    if input.is_empty() {
        Ok(default.to_string())
    } else {
        Ok(input)
    }
}

fn prompt_game() -> Result<Game> {
    loop {
        let input = prompt_with_default("Jeu (lotto/pension)", "lotto")?;
        match parse_game(&input) {
            Some(game) => return Ok(game),
            None => println!("Jeu inconnu : '{}'. Réessayez.", input),
        }
    }
}

fn prompt_optional_round(msg: &str) -> Result<Option<u32>> {
    let input = prompt_with_default(msg, "")?;
    if input.is_empty() {
        return Ok(None);
    }
    Ok(Some(input.parse().context("Numéro de tirage invalide")?))
}

/// Session REPL : possède les caches d'analyse, vidés à chaque ajout de tirage.
struct Session<'a> {
    conn: &'a Connection,
    config: AnalysisConfig,
    lotto_cache: AnalysisCache<LottoAnalysis>,
    pension_cache: AnalysisCache<PensionAnalysis>,
}

impl<'a> Session<'a> {
    fn new(conn: &'a Connection, config: AnalysisConfig) -> Self {
        let ttl = Duration::from_secs(config.cache_ttl_secs);
        Self {
            conn,
            config,
            lotto_cache: AnalysisCache::new(ttl),
            pension_cache: AnalysisCache::new(ttl),
        }
    }

    fn target_round(&self, game: Game, round: Option<u32>) -> Result<u32> {
        match round {
            Some(r) => Ok(r),
            None => Ok(latest_round(self.conn, game)?.unwrap_or(0) + 1),
        }
    }

    fn add(&mut self) -> Result<()> {
        let game = prompt_game()?;
        let round: u32 = prompt("Numéro du tirage : ")?.parse().context("Numéro de tirage invalide")?;
        let date = parse_date(&prompt("Date (AAAA-MM-JJ) : ")?)?;

        let record = match game {
            Game::Lotto => {
                let numbers = parse_values(&prompt("6 numéros (1-45) : ")?).context("Numéros invalides")?;
                let bonus: u8 = prompt("Numéro bonus : ")?.parse().context("Bonus invalide")?;
                let draw = LottoDraw::new(round, date, &numbers, bonus)?;
                println!("\nTirage à insérer :");
                display::display_lotto_draws(std::slice::from_ref(&draw));
                DrawRecord::Lotto(draw)
            }
            Game::Pension => {
                let group: u8 = prompt("Groupe (1-5) : ")?.parse().context("Groupe invalide")?;
                let digits = prompt("6 chiffres (ex: 407159) : ")?;
                let draw = PensionDraw::from_digit_str(round, date, group, &digits)?;
                println!("\nTirage à insérer :");
                display::display_pension_draws(std::slice::from_ref(&draw));
                DrawRecord::Pension(draw)
            }
        };
        if !confirm()? {
            println!("Insertion annulée.");
            return Ok(());
        }

        if self.record_draw(&record)? {
            println!("Tirage inséré avec succès.");
        } else {
            println!("Ce tirage existe déjà (doublon ignoré).");
        }
        Ok(())
    }

    fn purge_expired(&mut self, now: Instant) {
        self.lotto_cache.purge_expired(now);
        self.pension_cache.purge_expired(now);
    }

    /// Insère le tirage et vide le cache du jeu concerné s'il est nouveau.
    fn record_draw(&mut self, record: &DrawRecord) -> Result<bool> {
        let inserted = insert_record(self.conn, record)?;
        if inserted {
            let game = record.game();
            let removed = match game {
                Game::Lotto => self.lotto_cache.invalidate(game),
                Game::Pension => self.pension_cache.invalidate(game),
            };
            log::debug!("{} analyse(s) {} retirée(s) du cache", removed, game);
        }
        Ok(inserted)
    }

    fn analyze(&mut self) -> Result<()> {
        let game = prompt_game()?;
        let round = prompt_optional_round("Tirage visé (vide = prochain)")?;
        super::ensure_not_empty(self.conn, game)?;
        if let Some(round) = round {
            super::check_round(self.conn, game, round)?;
        }
        let target = self.target_round(game, round)?;
        let now = Instant::now();
        self.purge_expired(now);

        match game {
            Game::Lotto => {
                let history = fetch_lotto_draws(self.conn, round)?;
                let key = CacheKey::new(game, target, &history);
                let config = &self.config;
                let analysis = self
                    .lotto_cache
                    .get_or_try_insert_with(key, now, || super::analyze_lotto(&history, config))?;
                super::show_lotto(self.conn, &analysis, &history, round)
            }
            Game::Pension => {
                let history = fetch_pension_draws(self.conn, round)?;
                let key = CacheKey::new(game, target, &history);
                let config = &self.config;
                let analysis = self
                    .pension_cache
                    .get_or_try_insert_with(key, now, || super::analyze_pension(&history, config))?;
                super::show_pension(self.conn, &analysis, round)
            }
        }
    }

    fn backtest(&self) -> Result<()> {
        let recent = prompt_with_default("Trier par taux récent ? (o/n)", "n")?;
        super::cmd_backtest(self.conn, &self.config, recent.to_lowercase() == "o", false)
    }

    fn history(&self) -> Result<()> {
        let game = prompt_game()?;
        let n: usize = prompt_with_default("Nombre de tirages", "10")?
            .parse()
            .context("Nombre invalide")?;
        match game {
            Game::Lotto => {
                let draws = fetch_lotto_draws(self.conn, None)?;
                let mut last: Vec<LottoDraw> = draws.into_iter().rev().take(n).collect();
                last.reverse();
                display::display_lotto_draws(&last);
            }
            Game::Pension => {
                let draws = fetch_pension_draws(self.conn, None)?;
                let mut last: Vec<PensionDraw> = draws.into_iter().rev().take(n).collect();
                last.reverse();
                display::display_pension_draws(&last);
            }
        }
        Ok(())
    }

    fn compare(&self) -> Result<()> {
        let numbers = parse_values(&prompt("6 numéros (1-45) : ")?).context("Numéros invalides")?;
        let round = prompt_optional_round("Tirage de référence (vide = dernier)")?;
        super::cmd_compare(self.conn, &self.config, &numbers, round)
    }
}

fn confirm() -> Result<bool> {
    let answer = prompt("\nConfirmer l'insertion ? (o/n) : ")?;
    Ok(answer.to_lowercase() == "o")
}

pub fn run_interactive(conn: &Connection, config: AnalysisConfig) -> Result<()> {
    println!("Bienvenue dans le mode interactif de lottokr-engine !");
    let mut session = Session::new(conn, config);

    loop {
        display_menu();
        let input = match prompt("> ") {
            Ok(s) => s,
            Err(_) => break, // EOF / Ctrl+D
        };

        if input.is_empty() {
            continue;
        }

        let result = match parse_command(&input) {
            Some(InteractiveCommand::Quit) => {
                println!("Au revoir !");
                break;
            }
            Some(InteractiveCommand::Add) => session.add(),
            Some(InteractiveCommand::Analyze) => session.analyze(),
            Some(InteractiveCommand::Backtest) => session.backtest(),
            Some(InteractiveCommand::Consensus) => super::cmd_consensus(session.conn, &session.config),
            Some(InteractiveCommand::History) => session.history(),
            Some(InteractiveCommand::Compare) => session.compare(),
            None => {
                println!("Commande inconnue : '{}'. Tapez un numéro (1-7) ou un nom de commande.", input);
                Ok(())
            }
        };

        if let Err(e) = result {
            println!("Erreur: {e:#}");
        }
    }

    Ok(())
}
