mod display;
mod import;

use std::io::{self, Write};
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use crate::display::{display_import_summary, display_stats};
use crate::import::ImportFormat;
use lottokr_db::db::{count_draws, db_path, fetch_lotto_draws, fetch_pension_draws, insert_record, migrate, open_db};
use lottokr_db::models::{parse_date, DrawRecord, Game, LottoDraw, PensionDraw, LOTTO_PICK, PENSION_DIGITS};
use lottokr_engine::display::{display_lotto_draws, display_pension_draws};
use lottokr_engine::stats::{frequency_stats, Distribution};

#[derive(Parser)]
#[command(name = "lottokr", about = "Historique des tirages Lotto 6/45 et Pension 720+")]
struct Cli {
    /// Base de données (défaut : ./data/lottokr.db)
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Importer des tirages depuis un fichier CSV ou JSON Lines
    Import {
        #[arg(short, long, default_value = "lotto")]
        game: Game,

        /// Chemin vers le fichier
        file: PathBuf,

        #[arg(long, default_value = "csv")]
        format: ImportFormat,
    },

    /// Ajouter un tirage manuellement
    Add {
        #[arg(short, long, default_value = "lotto")]
        game: Game,
    },

    /// Lister les derniers tirages
    List {
        #[arg(short, long, default_value = "lotto")]
        game: Game,

        /// Nombre de tirages à afficher
        #[arg(short, long, default_value = "10")]
        last: usize,
    },

    /// Afficher les statistiques (fréquences et retards)
    Stats {
        #[arg(short, long, default_value = "lotto")]
        game: Game,

        /// Fenêtre d'analyse (nombre de tirages)
        #[arg(short, long, default_value = "100")]
        window: usize,
    },

    /// Afficher le chemin de la base de données
    DbPath,
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();
    let path = cli.db.unwrap_or_else(db_path);
    let conn = open_db(&path)?;
    migrate(&conn)?;

    match cli.command {
        Command::Import { game, file, format } => cmd_import(&conn, game, format, &file),
        Command::Add { game } => cmd_add(&conn, game),
        Command::List { game, last } => cmd_list(&conn, game, last),
        Command::Stats { game, window } => cmd_stats(&conn, game, window),
        Command::DbPath => {
            println!("{}", path.display());
            Ok(())
        }
    }
}

fn cmd_import(conn: &lottokr_db::rusqlite::Connection, game: Game, format: ImportFormat, file: &PathBuf) -> Result<()> {
    let result = import::import_file(conn, game, format, file)?;
    display_import_summary(&result);
    Ok(())
}

fn last_n<T>(mut draws: Vec<T>, n: usize) -> Vec<T> {
    let start = draws.len().saturating_sub(n);
    draws.split_off(start)
}

fn cmd_list(conn: &lottokr_db::rusqlite::Connection, game: Game, last: usize) -> Result<()> {
    if count_draws(conn, game)? == 0 {
        println!("Base vide. Lancez d'abord : lottokr import --game {game} <fichier>");
        return Ok(());
    }
    match game {
        Game::Lotto => display_lotto_draws(&last_n(fetch_lotto_draws(conn, None)?, last)),
        Game::Pension => display_pension_draws(&last_n(fetch_pension_draws(conn, None)?, last)),
    }
    Ok(())
}

fn cmd_stats(conn: &lottokr_db::rusqlite::Connection, game: Game, window: usize) -> Result<()> {
    if count_draws(conn, game)? == 0 {
        println!("Base vide. Lancez d'abord : lottokr import --game {game} <fichier>");
        return Ok(());
    }
    match game {
        Game::Lotto => {
            let draws = last_n(fetch_lotto_draws(conn, None)?, window);
            let dist = Distribution::LottoNumbers;
            display_stats(&frequency_stats(&draws, dist, 1)?, dist, draws.len());
        }
        Game::Pension => {
            let draws = last_n(fetch_pension_draws(conn, None)?, window);
            let dists = std::iter::once(Distribution::PensionGroups)
                .chain((0..PENSION_DIGITS).map(Distribution::PensionDigits));
            for dist in dists {
                display_stats(&frequency_stats(&draws, dist, 1)?, dist, draws.len());
            }
        }
    }
    Ok(())
}

fn cmd_add(conn: &lottokr_db::rusqlite::Connection, game: Game) -> Result<()> {
    println!("Ajout d'un tirage {} manuellement\n", game.label());

    let round: u32 = prompt("Numéro du tirage (ex: 1150) : ")?
        .parse()
        .context("Numéro de tirage invalide")?;
    let date = parse_date(&prompt("Date (AAAA-MM-JJ) : ")?)?;

    let record = match game {
        Game::Lotto => {
            let draw = prompt_lotto(round, date)?;
            println!("\nTirage à insérer :");
            display_lotto_draws(std::slice::from_ref(&draw));
            DrawRecord::Lotto(draw)
        }
        Game::Pension => {
            let draw = prompt_pension(round, date)?;
            println!("\nTirage à insérer :");
            display_pension_draws(std::slice::from_ref(&draw));
            DrawRecord::Pension(draw)
        }
    };

    let confirm = prompt("\nConfirmer l'insertion ? (o/n) : ")?;
    if confirm.trim().to_lowercase() == "o" {
        if insert_record(conn, &record)? {
            println!("Tirage inséré avec succès.");
        } else {
            println!("Ce tirage existe déjà (doublon ignoré).");
        }
    } else {
        println!("Insertion annulée.");
    }
    Ok(())
}

fn prompt(msg: &str) -> Result<String> {
    print!("{}", msg);
    io::stdout().flush()?;
    let mut input = String::new();
    io::stdin()
        .read_line(&mut input)
        .context("Erreur de lecture")?;
    Ok(input.trim().to_string())
}

fn prompt_lotto(round: u32, date: chrono::NaiveDate) -> Result<LottoDraw> {
    loop {
        let input = prompt(&format!("{} numéros puis le bonus (1-45, séparés par des espaces) : ", LOTTO_PICK))?;
        let nums: Result<Vec<u8>, _> = input.split_whitespace().map(|s| s.parse::<u8>()).collect();
        match nums {
            Ok(v) if v.len() == LOTTO_PICK + 1 => match LottoDraw::new(round, date, &v[..LOTTO_PICK], v[LOTTO_PICK]) {
                Ok(draw) => return Ok(draw),
                Err(e) => println!("Tirage invalide : {e}. Réessayez."),
            },
            _ => println!("Entrez exactement {} nombres. Réessayez.", LOTTO_PICK + 1),
        }
    }
}

fn prompt_pension(round: u32, date: chrono::NaiveDate) -> Result<PensionDraw> {
    loop {
        let group = prompt("Groupe (1-5) : ")?;
        let digits = prompt("Numéro à 6 chiffres : ")?;
        let parsed = group
            .parse::<u8>()
            .context("Groupe invalide")
            .and_then(|g| Ok(PensionDraw::from_digit_str(round, date, g, &digits)?));
        match parsed {
            Ok(draw) => return Ok(draw),
            Err(e) => println!("Tirage invalide : {e:#}. Réessayez."),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stats_on_empty_and_filled_db() {
        let conn = lottokr_db::rusqlite::Connection::open_in_memory().unwrap();
        migrate(&conn).unwrap();
        assert!(cmd_stats(&conn, Game::Lotto, 10).is_ok());

        let date = parse_date("2024-01-06").unwrap();
        for round in 1..=3u32 {
            let base = round as u8;
            let draw = LottoDraw::new(round, date, &[base, base + 5, base + 10, base + 15, base + 20, base + 25], 45).unwrap();
            insert_record(&conn, &DrawRecord::Lotto(draw)).unwrap();
        }
        assert!(cmd_stats(&conn, Game::Lotto, 2).is_ok());
        assert!(cmd_stats(&conn, Game::Pension, 10).is_ok());
    }

    #[test]
    fn test_last_n() {
        assert_eq!(last_n(vec![1, 2, 3, 4, 5], 2), vec![4, 5]);
        assert_eq!(last_n(vec![1, 2], 10), vec![1, 2]);
        assert!(last_n(Vec::<u8>::new(), 3).is_empty());
    }
}
