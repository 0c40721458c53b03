use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::path::Path;

use anyhow::{bail, Context, Result};
use lottokr_db::db::insert_record;
use lottokr_db::models::{parse_date, DrawRecord, Game, LottoDraw, PensionDraw};
use lottokr_db::rusqlite::Connection;
use serde::Deserialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum ImportFormat {
    /// CSV avec ligne d'en-tête
    Csv,
    /// Un objet JSON par ligne
    Jsonl,
}

/// Ligne JSON au format de l'API de l'opérateur (Lotto).
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OperatorLotto {
    #[serde(default)]
    return_value: Option<String>,
    drw_no: u32,
    drw_no_date: String,
    drwt_no1: u8,
    drwt_no2: u8,
    drwt_no3: u8,
    drwt_no4: u8,
    drwt_no5: u8,
    drwt_no6: u8,
    bnus_no: u8,
    #[serde(default)]
    first_winamnt: u64,
    #[serde(default)]
    first_przwner_co: u32,
}

impl TryFrom<OperatorLotto> for LottoDraw {
    type Error = anyhow::Error;

    fn try_from(raw: OperatorLotto) -> Result<Self> {
        if raw.return_value.as_deref() == Some("fail") {
            bail!("tirage {} : réponse en échec", raw.drw_no);
        }
        let numbers = [raw.drwt_no1, raw.drwt_no2, raw.drwt_no3, raw.drwt_no4, raw.drwt_no5, raw.drwt_no6];
        let date = parse_date(&raw.drw_no_date)?;
        Ok(LottoDraw::new(raw.drw_no, date, &numbers, raw.bnus_no)?.with_prize(raw.first_winamnt, raw.first_przwner_co))
    }
}

fn field<'a>(record: &'a csv::StringRecord, idx: usize) -> Result<&'a str> {
    record
        .get(idx)
        .map(str::trim)
        .with_context(|| format!("Champ manquant à l'index {}", idx))
}

fn parse_u8(raw: &str) -> Result<u8> {
    raw.parse::<u8>()
        .with_context(|| format!("Impossible de parser '{}'", raw))
}

/// Colonne facultative : vide ou absente vaut 0, sinon elle doit être valide.
fn parse_optional<T>(record: &csv::StringRecord, idx: usize, round: u32) -> Result<T>
where
    T: std::str::FromStr + Default,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match record.get(idx).map(str::trim) {
        None | Some("") => Ok(T::default()),
        Some(raw) => raw
            .parse()
            .with_context(|| format!("tirage {} : gain invalide '{}'", round, raw)),
    }
}

/// `round,date,n1..n6,bonus[,first_prize,first_winners]`.
/// Le bonus est la dernière colonne avant les gains : un nombre de numéros
/// incorrect remonte comme tirage invalide.
fn parse_lotto_record(record: &csv::StringRecord) -> Result<LottoDraw> {
    let round: u32 = field(record, 0)?.parse().context("Numéro de tirage invalide")?;
    let date = parse_date(field(record, 1)?)?;

    let with_prize = record.len() >= 11;
    let end = if with_prize { record.len() - 2 } else { record.len() };
    if end < 4 {
        bail!("tirage {} : colonnes insuffisantes", round);
    }
    let values = (2..end)
        .map(|i| field(record, i).and_then(parse_u8))
        .collect::<Result<Vec<u8>>>()?;
    let Some((&bonus, numbers)) = values.split_last() else {
        bail!("tirage {} : colonnes insuffisantes", round);
    };

    let draw = LottoDraw::new(round, date, numbers, bonus)?;
    if !with_prize {
        return Ok(draw);
    }
    let prize: u64 = parse_optional(record, end, round)?;
    let winners: u32 = parse_optional(record, end + 1, round)?;
    Ok(draw.with_prize(prize, winners))
}

/// `round,date,group,digits` (chaîne de 6 chiffres) ou `round,date,group,d1..d6`.
fn parse_pension_record(record: &csv::StringRecord) -> Result<PensionDraw> {
    let round: u32 = field(record, 0)?.parse().context("Numéro de tirage invalide")?;
    let date = parse_date(field(record, 1)?)?;
    let group = parse_u8(field(record, 2)?)?;

    if record.len() == 4 {
        return Ok(PensionDraw::from_digit_str(round, date, group, field(record, 3)?)?);
    }
    let digits = (3..record.len())
        .map(|i| field(record, i).and_then(parse_u8))
        .collect::<Result<Vec<u8>>>()?;
    Ok(PensionDraw::new(round, date, group, &digits)?)
}

fn parse_json_line(game: Game, line: &str) -> Result<DrawRecord> {
    match game {
        Game::Lotto => {
            let raw: OperatorLotto = serde_json::from_str(line).context("JSON invalide")?;
            Ok(DrawRecord::Lotto(LottoDraw::try_from(raw)?))
        }
        Game::Pension => {
            let draw: PensionDraw = serde_json::from_str(line).context("JSON invalide")?;
            Ok(DrawRecord::Pension(draw))
        }
    }
}

fn parse_csv_record(game: Game, record: &csv::StringRecord) -> Result<DrawRecord> {
    match game {
        Game::Lotto => Ok(DrawRecord::Lotto(parse_lotto_record(record)?)),
        Game::Pension => Ok(DrawRecord::Pension(parse_pension_record(record)?)),
    }
}

#[derive(Debug, Default, PartialEq, Eq)]
pub struct ImportResult {
    pub total_records: u32,
    pub inserted: u32,
    pub skipped: u32,
    pub errors: u32,
}

impl ImportResult {
    fn record(&mut self, conn: &Connection, parsed: Result<DrawRecord>) {
        self.total_records += 1;
        let line = self.total_records;
        match parsed {
            Ok(record) => match insert_record(conn, &record) {
                Ok(true) => self.inserted += 1,
                Ok(false) => self.skipped += 1,
                Err(e) => {
                    log::warn!("Erreur insertion tirage {} (ligne {}) : {:#}", record.round(), line, e);
                    self.errors += 1;
                }
            },
            Err(e) => {
                log::warn!("Erreur parsing ligne {} : {:#}", line, e);
                self.errors += 1;
            }
        }
    }
}

pub fn import_file(conn: &Connection, game: Game, format: ImportFormat, path: &Path) -> Result<ImportResult> {
    let file = File::open(path).with_context(|| format!("Impossible d'ouvrir {:?}", path))?;
    import_reader(conn, game, format, file)
}

/// Importe tous les enregistrements dans une seule transaction.
/// Un enregistrement invalide est compté en erreur et n'est jamais inséré.
pub fn import_reader<R: Read>(conn: &Connection, game: Game, format: ImportFormat, reader: R) -> Result<ImportResult> {
    let tx = conn
        .unchecked_transaction()
        .context("Impossible de démarrer la transaction")?;
    let mut result = ImportResult::default();

    match format {
        ImportFormat::Csv => {
            let mut csv_reader = csv::ReaderBuilder::new()
                .flexible(true)
                .trim(csv::Trim::All)
                .from_reader(reader);
            for record in csv_reader.records() {
                let parsed = record
                    .context("Erreur de lecture CSV")
                    .and_then(|r| parse_csv_record(game, &r));
                result.record(&tx, parsed);
            }
        }
        ImportFormat::Jsonl => {
            for line in BufReader::new(reader).lines() {
                let line = line.context("Erreur de lecture")?;
                if line.trim().is_empty() {
                    continue;
                }
                result.record(&tx, parse_json_line(game, &line));
            }
        }
    }

    tx.commit().context("Échec du commit")?;
    log::info!(
        "Import {} : {} insérés, {} doublons, {} erreurs",
        game,
        result.inserted,
        result.skipped,
        result.errors
    );
    Ok(result)
}
