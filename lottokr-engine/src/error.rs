use lottokr_db::models::DrawError;
use thiserror::Error;

/// Erreurs visibles par l'appelant d'une analyse.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AnalysisError {
    #[error("historique insuffisant : {required} tirages requis, {available} disponibles")]
    InsufficientHistory { required: usize, available: usize },

    #[error("tirage invalide : {0}")]
    InvalidDrawRecord(#[from] DrawError),
}

/// Échec local d'une formule. Absorbé par le backtest et le recommandeur.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RuleError {
    #[error("historique trop court pour la formule ({available}/{required})")]
    BelowMinHistory { required: usize, available: usize },

    #[error("candidats insuffisants ({found}/6)")]
    InsufficientCandidates { found: usize },

    #[error("candidat malformé : {0:?}")]
    Malformed(Vec<u8>),

    #[error("échec de la formule : {0}")]
    Failed(String),
}

/// La marche gloutonne contrainte n'a pas atteint 6 valeurs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("contrainte de composition impossible à satisfaire")]
pub struct ConstraintUnsatisfiable;
