use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::time::{Duration, Instant};

use lottokr_db::models::Game;

/// Identifie une analyse : jeu, tirage visé et empreinte de l'historique utilisé.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub game: Game,
    pub target_round: u32,
    pub history_len: usize,
    pub checksum: u64,
}

impl CacheKey {
    pub fn new<T: Hash>(game: Game, target_round: u32, history: &[T]) -> Self {
        let mut hasher = DefaultHasher::new();
        history.hash(&mut hasher);
        Self {
            game,
            target_round,
            history_len: history.len(),
            checksum: hasher.finish(),
        }
    }
}

/// Cache d'analyses possédé par l'appelant. L'heure courante est toujours fournie
/// par l'appelant, pour l'expiration comme pour l'insertion.
#[derive(Debug)]
pub struct AnalysisCache<T> {
    ttl: Duration,
    entries: HashMap<CacheKey, (Instant, T)>,
}

impl<T: Clone> AnalysisCache<T> {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: HashMap::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn is_fresh(&self, stored: Instant, now: Instant) -> bool {
        now.saturating_duration_since(stored) <= self.ttl
    }

    pub fn get(&self, key: &CacheKey, now: Instant) -> Option<&T> {
        self.entries
            .get(key)
            .filter(|(stored, _)| self.is_fresh(*stored, now))
            .map(|(_, value)| value)
    }

    pub fn insert(&mut self, key: CacheKey, value: T, now: Instant) {
        self.entries.insert(key, (now, value));
    }

    /// Valeur en cache si elle est encore valide, sinon calculée puis stockée.
    pub fn get_or_try_insert_with<E, F>(&mut self, key: CacheKey, now: Instant, compute: F) -> Result<T, E>
    where
        F: FnOnce() -> Result<T, E>,
    {
        if let Some(value) = self.get(&key, now) {
            log::info!("Analyse {} (tirage {}) servie depuis le cache", key.game, key.target_round);
            return Ok(value.clone());
        }
        let value = compute()?;
        self.insert(key, value.clone(), now);
        Ok(value)
    }

    /// À appeler après tout ajout de tirage. Retourne le nombre d'entrées retirées.
    pub fn invalidate(&mut self, game: Game) -> usize {
        let before = self.entries.len();
        self.entries.retain(|key, _| key.game != game);
        let removed = before - self.entries.len();
        if removed > 0 {
            log::debug!("Cache {} invalidé ({} entrées)", game, removed);
        }
        removed
    }

    pub fn purge_expired(&mut self, now: Instant) {
        let ttl = self.ttl;
        self.entries
            .retain(|_, (stored, _)| now.saturating_duration_since(*stored) <= ttl);
    }
}
