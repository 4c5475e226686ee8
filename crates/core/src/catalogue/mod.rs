//! The keyed, ordered set of games for the current run.

/// `games.json` loader for titles the account does not own.
pub mod extra;

pub use extra::{load_extra_games, merge_extra_games};

use tracing::debug;

use crate::models::{Game, GameStatus};

/// Games keyed by title identifier, kept in display order.
///
/// No two entries ever share a title identifier. Inserting a game that is
/// already present replaces the whole record and moves it to the end, the
/// position where it was last seen.
#[derive(Debug, Clone, Default)]
pub struct Catalogue {
    games: Vec<Game>,
}

impl Catalogue {
    /// Empty catalogue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of games.
    pub fn len(&self) -> usize {
        self.games.len()
    }

    /// Whether the catalogue has no games.
    pub fn is_empty(&self) -> bool {
        self.games.is_empty()
    }

    /// Iterate games in display order.
    pub fn iter(&self) -> impl Iterator<Item = &Game> {
        self.games.iter()
    }

    /// Look up a game by title identifier.
    pub fn get(&self, title_id: &str) -> Option<&Game> {
        self.games.iter().find(|game| game.title_id == title_id)
    }

    /// Mutable lookup by title identifier.
    pub fn get_mut(&mut self, title_id: &str) -> Option<&mut Game> {
        self.games.iter_mut().find(|game| game.title_id == title_id)
    }

    /// Insert `game`, replacing any record with the same title identifier.
    ///
    /// Returns the replaced record.
    pub fn upsert(&mut self, game: Game) -> Option<Game> {
        let replaced = self
            .games
            .iter()
            .position(|existing| existing.title_id == game.title_id)
            .map(|index| self.games.remove(index));
        if replaced.is_some() {
            debug!(title_id = %game.title_id, "replaced existing game");
        }
        self.games.push(game);
        replaced
    }

    /// Upsert every game in order, returning how many were applied.
    pub fn extend(&mut self, games: impl IntoIterator<Item = Game>) -> usize {
        let mut applied = 0;
        for game in games {
            self.upsert(game);
            applied += 1;
        }
        applied
    }

    /// Title identifiers of games currently in `status`, in display order.
    ///
    /// The engines walk this snapshot and write transitions back through
    /// [`Catalogue::get_mut`].
    pub fn title_ids_with(&self, status: GameStatus) -> Vec<String> {
        self.games
            .iter()
            .filter(|game| game.status == status)
            .map(|game| game.title_id.clone())
            .collect()
    }

    /// Games that still have achievements to unlock.
    pub fn unlockable(&self) -> impl Iterator<Item = &Game> {
        self.games
            .iter()
            .filter(|game| game.status == GameStatus::AchievementsFetched)
    }

    /// Keep only the games matching `keep`.
    pub fn retain(&mut self, keep: impl FnMut(&Game) -> bool) {
        self.games.retain(keep);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upsert_replaces_whole_record_and_moves_it_last() {
        let mut catalogue = Catalogue::new();
        catalogue.upsert(Game::new("100").with_name("First"));
        catalogue.upsert(Game::new("200").with_name("Second"));

        let mut replacement = Game::new("100");
        replacement.image = Some("https://example.com/100.png".to_string());
        let replaced = catalogue.upsert(replacement).expect("previous record");
        assert_eq!(replaced.name.as_deref(), Some("First"));

        let ids: Vec<_> = catalogue.iter().map(|game| game.title_id.as_str()).collect();
        assert_eq!(ids, ["200", "100"]);
        let game = catalogue.get("100").expect("game");
        assert_eq!(game.name, None, "fields are not merged");
        assert!(game.image.is_some());
    }

    #[test]
    fn snapshots_filter_by_status() {
        let mut catalogue = Catalogue::new();
        catalogue.extend([Game::new("1"), Game::new("2"), Game::new("3")]);
        if let Some(game) = catalogue.get_mut("2") {
            game.status = GameStatus::AchievementsFetched;
        }

        assert_eq!(catalogue.title_ids_with(GameStatus::Discovered), ["1", "3"]);
        assert_eq!(catalogue.unlockable().count(), 1);

        catalogue.retain(|game| game.title_id != "1");
        assert_eq!(catalogue.len(), 2);
    }
}
