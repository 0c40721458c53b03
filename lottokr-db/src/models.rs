use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const LOTTO_MAX: u8 = 45;
pub const LOTTO_PICK: usize = 6;
pub const PENSION_DIGITS: usize = 6;
pub const PENSION_GROUPS: u8 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Game {
    /// Lotto 6/45
    Lotto,
    /// Pension 720+
    Pension,
}

impl Game {
    pub fn label(&self) -> &'static str {
        match self {
            Game::Lotto => "Lotto 6/45",
            Game::Pension => "Pension 720+",
        }
    }
}

impl std::fmt::Display for Game {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Game::Lotto => write!(f, "lotto"),
            Game::Pension => write!(f, "pension"),
        }
    }
}

/// Violation des invariants d'un tirage (condition `InvalidDrawRecord`).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DrawError {
    #[error("numéro de tirage invalide : {0}")]
    InvalidRound(u32),

    #[error("tirage {round} : {expected} numéros attendus, {found} reçus")]
    WrongCount { round: u32, expected: usize, found: usize },

    #[error("tirage {round} : valeur {value} hors limites ({min}-{max})")]
    OutOfRange { round: u32, value: u8, min: u8, max: u8 },

    #[error("tirage {round} : numéro en double {value}")]
    Duplicate { round: u32, value: u8 },

    #[error("tirage {round} : bonus {bonus} déjà parmi les numéros")]
    BonusCollision { round: u32, bonus: u8 },

    #[error("tirage {round} : groupe {group} hors limites (1-{max})", max = PENSION_GROUPS)]
    GroupOutOfRange { round: u32, group: u8 },

    #[error("tirage {round} : chiffres invalides '{raw}'")]
    InvalidDigits { round: u32, raw: String },

    #[error("tirage {round} présent plusieurs fois dans l'historique")]
    DuplicateRound { round: u32 },

    #[error("date invalide : '{0}'")]
    InvalidDate(String),
}

/// Accepte `AAAA-MM-JJ`, `AAAA.MM.JJ` et `AAAAMMJJ`.
pub fn parse_date(raw: &str) -> Result<NaiveDate, DrawError> {
    let s = raw.trim();
    ["%Y-%m-%d", "%Y.%m.%d", "%Y%m%d"]
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(s, fmt).ok())
        .ok_or_else(|| DrawError::InvalidDate(raw.to_string()))
}

fn check_round(round: u32) -> Result<(), DrawError> {
    if round == 0 {
        return Err(DrawError::InvalidRound(round));
    }
    Ok(())
}

fn check_range(round: u32, value: u8, min: u8, max: u8) -> Result<(), DrawError> {
    if value < min || value > max {
        return Err(DrawError::OutOfRange { round, value, min, max });
    }
    Ok(())
}

fn validate_lotto_numbers(round: u32, numbers: &[u8]) -> Result<[u8; LOTTO_PICK], DrawError> {
    if numbers.len() != LOTTO_PICK {
        return Err(DrawError::WrongCount {
            round,
            expected: LOTTO_PICK,
            found: numbers.len(),
        });
    }
    let mut sorted = [0u8; LOTTO_PICK];
    for (i, &n) in numbers.iter().enumerate() {
        check_range(round, n, 1, LOTTO_MAX)?;
        sorted[i] = n;
    }
    sorted.sort_unstable();
    if let Some(w) = sorted.windows(2).find(|w| w[0] == w[1]) {
        return Err(DrawError::Duplicate { round, value: w[0] });
    }
    Ok(sorted)
}

/// Tirage Lotto 6/45. Les numéros sont conservés triés par ordre croissant.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "RawLottoDraw", into = "RawLottoDraw")]
pub struct LottoDraw {
    round: u32,
    date: NaiveDate,
    numbers: [u8; LOTTO_PICK],
    bonus: u8,
    first_prize: u64,
    first_winners: u32,
}

impl LottoDraw {
    pub fn new(round: u32, date: NaiveDate, numbers: &[u8], bonus: u8) -> Result<Self, DrawError> {
        check_round(round)?;
        let numbers = validate_lotto_numbers(round, numbers)?;
        check_range(round, bonus, 1, LOTTO_MAX)?;
        if numbers.contains(&bonus) {
            return Err(DrawError::BonusCollision { round, bonus });
        }
        Ok(Self {
            round,
            date,
            numbers,
            bonus,
            first_prize: 0,
            first_winners: 0,
        })
    }

    pub fn with_prize(mut self, first_prize: u64, first_winners: u32) -> Self {
        self.first_prize = first_prize;
        self.first_winners = first_winners;
        self
    }

    pub fn round(&self) -> u32 {
        self.round
    }

    pub fn date(&self) -> NaiveDate {
        self.date
    }

    pub fn numbers(&self) -> &[u8; LOTTO_PICK] {
        &self.numbers
    }

    pub fn bonus(&self) -> u8 {
        self.bonus
    }

    pub fn first_prize(&self) -> u64 {
        self.first_prize
    }

    pub fn first_winners(&self) -> u32 {
        self.first_winners
    }

    pub fn contains(&self, number: u8) -> bool {
        self.numbers.contains(&number)
    }
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawLottoDraw {
    round: u32,
    date: NaiveDate,
    numbers: Vec<u8>,
    bonus: u8,
    #[serde(default)]
    first_prize: u64,
    #[serde(default)]
    first_winners: u32,
}

impl TryFrom<RawLottoDraw> for LottoDraw {
    type Error = DrawError;

    fn try_from(raw: RawLottoDraw) -> Result<Self, Self::Error> {
        Ok(LottoDraw::new(raw.round, raw.date, &raw.numbers, raw.bonus)?
            .with_prize(raw.first_prize, raw.first_winners))
    }
}

impl From<LottoDraw> for RawLottoDraw {
    fn from(d: LottoDraw) -> Self {
        Self {
            round: d.round,
            date: d.date,
            numbers: d.numbers.to_vec(),
            bonus: d.bonus,
            first_prize: d.first_prize,
            first_winners: d.first_winners,
        }
    }
}

/// Tirage Pension 720+ : un groupe (1-5) et six chiffres positionnels (0-9).
/// L'ordre des chiffres a un sens (positions), il n'est jamais trié.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "RawPensionDraw", into = "RawPensionDraw")]
pub struct PensionDraw {
    round: u32,
    date: NaiveDate,
    group: u8,
    digits: [u8; PENSION_DIGITS],
}

impl PensionDraw {
    pub fn new(round: u32, date: NaiveDate, group: u8, digits: &[u8]) -> Result<Self, DrawError> {
        check_round(round)?;
        if group < 1 || group > PENSION_GROUPS {
            return Err(DrawError::GroupOutOfRange { round, group });
        }
        if digits.len() != PENSION_DIGITS {
            return Err(DrawError::WrongCount {
                round,
                expected: PENSION_DIGITS,
                found: digits.len(),
            });
        }
        let mut arr = [0u8; PENSION_DIGITS];
        for (i, &d) in digits.iter().enumerate() {
            check_range(round, d, 0, 9)?;
            arr[i] = d;
        }
        Ok(Self {
            round,
            date,
            group,
            digits: arr,
        })
    }

    /// Construit à partir d'une chaîne de 6 chiffres ("012345").
    pub fn from_digit_str(round: u32, date: NaiveDate, group: u8, digits: &str) -> Result<Self, DrawError> {
        let parsed: Vec<u8> = digits
            .trim()
            .chars()
            .map(|c| c.to_digit(10).map(|d| d as u8))
            .collect::<Option<_>>()
            .ok_or_else(|| DrawError::InvalidDigits {
                round,
                raw: digits.to_string(),
            })?;
        Self::new(round, date, group, &parsed)
    }

    pub fn round(&self) -> u32 {
        self.round
    }

    pub fn date(&self) -> NaiveDate {
        self.date
    }

    pub fn group(&self) -> u8 {
        self.group
    }

    pub fn digits(&self) -> &[u8; PENSION_DIGITS] {
        &self.digits
    }

    pub fn digit_string(&self) -> String {
        self.digits.iter().map(|d| char::from(b'0' + d)).collect()
    }
}

#[derive(Serialize, Deserialize)]
struct RawPensionDraw {
    round: u32,
    date: NaiveDate,
    group: u8,
    numbers: Vec<u8>,
}

impl TryFrom<RawPensionDraw> for PensionDraw {
    type Error = DrawError;

    fn try_from(raw: RawPensionDraw) -> Result<Self, Self::Error> {
        PensionDraw::new(raw.round, raw.date, raw.group, &raw.numbers)
    }
}

impl From<PensionDraw> for RawPensionDraw {
    fn from(d: PensionDraw) -> Self {
        Self {
            round: d.round,
            date: d.date,
            group: d.group,
            numbers: d.digits.to_vec(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DrawRecord {
    Lotto(LottoDraw),
    Pension(PensionDraw),
}

impl DrawRecord {
    pub fn game(&self) -> Game {
        match self {
            DrawRecord::Lotto(_) => Game::Lotto,
            DrawRecord::Pension(_) => Game::Pension,
        }
    }

    pub fn round(&self) -> u32 {
        match self {
            DrawRecord::Lotto(d) => d.round(),
            DrawRecord::Pension(d) => d.round(),
        }
    }

    pub fn date(&self) -> NaiveDate {
        match self {
            DrawRecord::Lotto(d) => d.date(),
            DrawRecord::Pension(d) => d.date(),
        }
    }
}
