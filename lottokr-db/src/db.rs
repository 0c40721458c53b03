use anyhow::{Context, Result};
use rusqlite::{Connection, OptionalExtension};
use std::path::Path;

use crate::models::{parse_date, DrawRecord, Game, LottoDraw, PensionDraw};

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS lotto_draws (
    round          INTEGER PRIMARY KEY,
    date           TEXT NOT NULL,
    num_1          INTEGER NOT NULL,
    num_2          INTEGER NOT NULL,
    num_3          INTEGER NOT NULL,
    num_4          INTEGER NOT NULL,
    num_5          INTEGER NOT NULL,
    num_6          INTEGER NOT NULL,
    bonus          INTEGER NOT NULL,
    first_prize    INTEGER NOT NULL DEFAULT 0,
    first_winners  INTEGER NOT NULL DEFAULT 0
);

CREATE TABLE IF NOT EXISTS pension_draws (
    round    INTEGER PRIMARY KEY,
    date     TEXT NOT NULL,
    grp      INTEGER NOT NULL,
    digit_1  INTEGER NOT NULL,
    digit_2  INTEGER NOT NULL,
    digit_3  INTEGER NOT NULL,
    digit_4  INTEGER NOT NULL,
    digit_5  INTEGER NOT NULL,
    digit_6  INTEGER NOT NULL
);
";

const LOTTO_COLUMNS: &str =
    "round, date, num_1, num_2, num_3, num_4, num_5, num_6, bonus, first_prize, first_winners";
const PENSION_COLUMNS: &str = "round, date, grp, digit_1, digit_2, digit_3, digit_4, digit_5, digit_6";

pub fn db_path() -> std::path::PathBuf {
    let mut path = std::env::current_dir().unwrap_or_default();
    path.push("data");
    path.push("lottokr.db");
    path
}

pub fn open_db(path: &Path) -> Result<Connection> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Impossible de créer le répertoire {:?}", parent))?;
    }
    let conn = Connection::open(path)
        .with_context(|| format!("Impossible d'ouvrir la base {:?}", path))?;
    Ok(conn)
}

pub fn migrate(conn: &Connection) -> Result<()> {
    conn.execute_batch(SCHEMA).context("Échec de la migration")?;
    Ok(())
}

fn lotto_params(draw: &LottoDraw) -> [Box<dyn rusqlite::ToSql>; 11] {
    let n = draw.numbers();
    [
        Box::new(draw.round()),
        Box::new(draw.date().to_string()),
        Box::new(n[0]),
        Box::new(n[1]),
        Box::new(n[2]),
        Box::new(n[3]),
        Box::new(n[4]),
        Box::new(n[5]),
        Box::new(draw.bonus()),
        Box::new(i64::try_from(draw.first_prize()).unwrap_or(i64::MAX)),
        Box::new(draw.first_winners()),
    ]
}

fn pension_params(draw: &PensionDraw) -> [Box<dyn rusqlite::ToSql>; 9] {
    let d = draw.digits();
    [
        Box::new(draw.round()),
        Box::new(draw.date().to_string()),
        Box::new(draw.group()),
        Box::new(d[0]),
        Box::new(d[1]),
        Box::new(d[2]),
        Box::new(d[3]),
        Box::new(d[4]),
        Box::new(d[5]),
    ]
}

pub fn insert_lotto_draw(conn: &Connection, draw: &LottoDraw) -> Result<bool> {
    let params = lotto_params(draw);
    let changed = conn
        .execute(
            &format!(
                "INSERT OR IGNORE INTO lotto_draws ({LOTTO_COLUMNS})
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)"
            ),
            rusqlite::params_from_iter(params.iter()),
        )
        .with_context(|| format!("Échec de l'insertion du tirage lotto {}", draw.round()))?;
    Ok(changed > 0)
}

/// Insère ou remplace le tirage ayant le même numéro.
pub fn upsert_lotto_draw(conn: &Connection, draw: &LottoDraw) -> Result<()> {
    let params = lotto_params(draw);
    conn.execute(
        &format!(
            "INSERT OR REPLACE INTO lotto_draws ({LOTTO_COLUMNS})
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)"
        ),
        rusqlite::params_from_iter(params.iter()),
    )
    .with_context(|| format!("Échec de la mise à jour du tirage lotto {}", draw.round()))?;
    Ok(())
}

pub fn insert_pension_draw(conn: &Connection, draw: &PensionDraw) -> Result<bool> {
    let params = pension_params(draw);
    let changed = conn
        .execute(
            &format!(
                "INSERT OR IGNORE INTO pension_draws ({PENSION_COLUMNS})
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)"
            ),
            rusqlite::params_from_iter(params.iter()),
        )
        .with_context(|| format!("Échec de l'insertion du tirage pension {}", draw.round()))?;
    Ok(changed > 0)
}

pub fn upsert_pension_draw(conn: &Connection, draw: &PensionDraw) -> Result<()> {
    let params = pension_params(draw);
    conn.execute(
        &format!(
            "INSERT OR REPLACE INTO pension_draws ({PENSION_COLUMNS})
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)"
        ),
        rusqlite::params_from_iter(params.iter()),
    )
    .with_context(|| format!("Échec de la mise à jour du tirage pension {}", draw.round()))?;
    Ok(())
}

pub fn insert_record(conn: &Connection, record: &DrawRecord) -> Result<bool> {
    match record {
        DrawRecord::Lotto(d) => insert_lotto_draw(conn, d),
        DrawRecord::Pension(d) => insert_pension_draw(conn, d),
    }
}

struct LottoRow {
    round: u32,
    date: String,
    numbers: [u8; 6],
    bonus: u8,
    first_prize: i64,
    first_winners: u32,
}

fn read_lotto_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<LottoRow> {
    Ok(LottoRow {
        round: row.get(0)?,
        date: row.get(1)?,
        numbers: [
            row.get::<_, u8>(2)?,
            row.get::<_, u8>(3)?,
            row.get::<_, u8>(4)?,
            row.get::<_, u8>(5)?,
            row.get::<_, u8>(6)?,
            row.get::<_, u8>(7)?,
        ],
        bonus: row.get(8)?,
        first_prize: row.get(9)?,
        first_winners: row.get(10)?,
    })
}

// Les lignes relues repassent par le constructeur : une ligne corrompue
// ne doit jamais atteindre l'analyse.
fn lotto_from_row(row: LottoRow) -> Result<LottoDraw> {
    let date = parse_date(&row.date)?;
    let draw = LottoDraw::new(row.round, date, &row.numbers, row.bonus)?
        .with_prize(row.first_prize.max(0) as u64, row.first_winners);
    Ok(draw)
}

struct PensionRow {
    round: u32,
    date: String,
    group: u8,
    digits: [u8; 6],
}

fn read_pension_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<PensionRow> {
    Ok(PensionRow {
        round: row.get(0)?,
        date: row.get(1)?,
        group: row.get(2)?,
        digits: [
            row.get::<_, u8>(3)?,
            row.get::<_, u8>(4)?,
            row.get::<_, u8>(5)?,
            row.get::<_, u8>(6)?,
            row.get::<_, u8>(7)?,
            row.get::<_, u8>(8)?,
        ],
    })
}

fn pension_from_row(row: PensionRow) -> Result<PensionDraw> {
    let date = parse_date(&row.date)?;
    Ok(PensionDraw::new(row.round, date, row.group, &row.digits)?)
}

/// Tirages lotto par ordre croissant de numéro, en excluant `round >= before_round`.
pub fn fetch_lotto_draws(conn: &Connection, before_round: Option<u32>) -> Result<Vec<LottoDraw>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {LOTTO_COLUMNS} FROM lotto_draws
         WHERE ?1 IS NULL OR round < ?1
         ORDER BY round ASC"
    ))?;
    let rows = stmt
        .query_map([before_round], read_lotto_row)?
        .collect::<Result<Vec<_>, _>>()?;
    rows.into_iter().map(lotto_from_row).collect()
}

pub fn fetch_lotto_draw(conn: &Connection, round: u32) -> Result<Option<LottoDraw>> {
    let row = conn
        .query_row(
            &format!("SELECT {LOTTO_COLUMNS} FROM lotto_draws WHERE round = ?1"),
            [round],
            read_lotto_row,
        )
        .optional()?;
    row.map(lotto_from_row).transpose()
}

/// Tirages pension par ordre croissant de numéro, en excluant `round >= before_round`.
pub fn fetch_pension_draws(conn: &Connection, before_round: Option<u32>) -> Result<Vec<PensionDraw>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {PENSION_COLUMNS} FROM pension_draws
         WHERE ?1 IS NULL OR round < ?1
         ORDER BY round ASC"
    ))?;
    let rows = stmt
        .query_map([before_round], read_pension_row)?
        .collect::<Result<Vec<_>, _>>()?;
    rows.into_iter().map(pension_from_row).collect()
}

pub fn fetch_pension_draw(conn: &Connection, round: u32) -> Result<Option<PensionDraw>> {
    let row = conn
        .query_row(
            &format!("SELECT {PENSION_COLUMNS} FROM pension_draws WHERE round = ?1"),
            [round],
            read_pension_row,
        )
        .optional()?;
    row.map(pension_from_row).transpose()
}

fn table(game: Game) -> &'static str {
    match game {
        Game::Lotto => "lotto_draws",
        Game::Pension => "pension_draws",
    }
}

pub fn count_draws(conn: &Connection, game: Game) -> Result<u32> {
    let count: u32 = conn.query_row(&format!("SELECT COUNT(*) FROM {}", table(game)), [], |row| {
        row.get(0)
    })?;
    Ok(count)
}

pub fn latest_round(conn: &Connection, game: Game) -> Result<Option<u32>> {
    let round: Option<u32> = conn.query_row(&format!("SELECT MAX(round) FROM {}", table(game)), [], |row| {
        row.get(0)
    })?;
    Ok(round)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn lotto(round: u32, numbers: [u8; 6], bonus: u8) -> LottoDraw {
        let date = NaiveDate::from_ymd_opt(2024, 1, 6).unwrap() + chrono::Days::new(7 * round as u64);
        LottoDraw::new(round, date, &numbers, bonus).unwrap()
    }

    fn pension(round: u32, group: u8, digits: [u8; 6]) -> PensionDraw {
        let date = NaiveDate::from_ymd_opt(2024, 1, 4).unwrap() + chrono::Days::new(7 * round as u64);
        PensionDraw::new(round, date, group, &digits).unwrap()
    }

    fn memory_db() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        migrate(&conn).unwrap();
        conn
    }

    #[test]
    fn test_insert_and_count() {
        let conn = memory_db();
        assert_eq!(count_draws(&conn, Game::Lotto).unwrap(), 0);
        assert_eq!(latest_round(&conn, Game::Lotto).unwrap(), None);

        insert_lotto_draw(&conn, &lotto(1, [1, 2, 3, 4, 5, 6], 7)).unwrap();
        assert_eq!(count_draws(&conn, Game::Lotto).unwrap(), 1);
        assert_eq!(count_draws(&conn, Game::Pension).unwrap(), 0);
        assert_eq!(latest_round(&conn, Game::Lotto).unwrap(), Some(1));
    }

    #[test]
    fn test_duplicate_ignored() {
        let conn = memory_db();
        assert!(insert_lotto_draw(&conn, &lotto(1, [1, 2, 3, 4, 5, 6], 7)).unwrap());
        assert!(!insert_lotto_draw(&conn, &lotto(1, [8, 9, 10, 11, 12, 13], 7)).unwrap());
        let stored = fetch_lotto_draw(&conn, 1).unwrap().unwrap();
        assert_eq!(stored.numbers(), &[1, 2, 3, 4, 5, 6]);
    }

    #[test]
    fn test_upsert_replaces() {
        let conn = memory_db();
        upsert_lotto_draw(&conn, &lotto(1, [1, 2, 3, 4, 5, 6], 7)).unwrap();
        upsert_lotto_draw(&conn, &lotto(1, [8, 9, 10, 11, 12, 13], 7).with_prize(2_000_000_000, 11)).unwrap();
        assert_eq!(count_draws(&conn, Game::Lotto).unwrap(), 1);
        let stored = fetch_lotto_draw(&conn, 1).unwrap().unwrap();
        assert_eq!(stored.numbers(), &[8, 9, 10, 11, 12, 13]);
        assert_eq!(stored.first_prize(), 2_000_000_000);
        assert_eq!(stored.first_winners(), 11);
    }

    #[test]
    fn test_fetch_order_and_cutoff() {
        let conn = memory_db();
        insert_lotto_draw(&conn, &lotto(3, [1, 2, 3, 4, 5, 6], 7)).unwrap();
        insert_lotto_draw(&conn, &lotto(1, [1, 2, 3, 4, 5, 6], 7)).unwrap();
        insert_lotto_draw(&conn, &lotto(2, [1, 2, 3, 4, 5, 6], 7)).unwrap();

        let all = fetch_lotto_draws(&conn, None).unwrap();
        let rounds: Vec<u32> = all.iter().map(|d| d.round()).collect();
        assert_eq!(rounds, vec![1, 2, 3]);

        let before = fetch_lotto_draws(&conn, Some(3)).unwrap();
        let rounds: Vec<u32> = before.iter().map(|d| d.round()).collect();
        assert_eq!(rounds, vec![1, 2]);

        assert!(fetch_lotto_draw(&conn, 9).unwrap().is_none());
    }

    #[test]
    fn test_pension_roundtrip_keeps_positions() {
        let conn = memory_db();
        let record = DrawRecord::Pension(pension(290, 3, [9, 0, 4, 4, 1, 7]));
        assert!(insert_record(&conn, &record).unwrap());

        let stored = fetch_pension_draw(&conn, 290).unwrap().unwrap();
        assert_eq!(stored.group(), 3);
        assert_eq!(stored.digits(), &[9, 0, 4, 4, 1, 7]);

        upsert_pension_draw(&conn, &pension(290, 4, [1, 1, 1, 1, 1, 1])).unwrap();
        insert_pension_draw(&conn, &pension(289, 1, [0, 0, 0, 0, 0, 0])).unwrap();
        let all = fetch_pension_draws(&conn, None).unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].round(), 289);
        assert_eq!(all[1].group(), 4);
        assert_eq!(fetch_pension_draws(&conn, Some(290)).unwrap().len(), 1);
    }

    #[test]
    fn test_corrupted_row_rejected_on_read() {
        let conn = memory_db();
        conn.execute(
            "INSERT INTO lotto_draws (round, date, num_1, num_2, num_3, num_4, num_5, num_6, bonus)
             VALUES (1, '2024-01-06', 1, 1, 2, 3, 4, 5, 6)",
            [],
        )
        .unwrap();
        assert!(fetch_lotto_draws(&conn, None).is_err());
    }
}
