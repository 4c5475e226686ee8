use std::{fs, path::Path};

use anyhow::{Context, Result};
use serde::Deserialize;
use tracing::{error, info, warn};

use super::Catalogue;
use crate::models::Game;

/// One entry of `games.json`.
#[derive(Debug, Deserialize)]
struct ExtraTitle {
    #[serde(rename = "displayImage", default)]
    display_image: Option<String>,
    title_id: String,
    #[serde(default)]
    name: Option<String>,
}

impl From<ExtraTitle> for Game {
    fn from(title: ExtraTitle) -> Self {
        Game {
            name: title.name.filter(|name| !name.trim().is_empty()),
            image: title.display_image.filter(|image| !image.trim().is_empty()),
            ..Game::new(title.title_id)
        }
    }
}

/// Read extra titles from `path`.
///
/// A missing file yields an empty list. A file that cannot be parsed is
/// deleted and reported as an error so it is not read again.
pub fn load_extra_games(path: impl AsRef<Path>) -> Result<Vec<Game>> {
    let path = path.as_ref();
    if !path.exists() {
        warn!("extra games file {} not found", path.display());
        return Ok(Vec::new());
    }

    info!("found {}, checking its content", path.display());
    let parsed = fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))
        .and_then(|content| {
            serde_json::from_str::<Vec<ExtraTitle>>(&content)
                .with_context(|| format!("{} contains improperly formatted content", path.display()))
        });

    match parsed {
        Ok(titles) => Ok(titles.into_iter().map(Game::from).collect()),
        Err(err) => {
            error!("error while reading the games file: {err:#}");
            if let Err(remove_err) = fs::remove_file(path) {
                warn!("failed to delete {}: {remove_err}", path.display());
            }
            Err(err)
        }
    }
}

/// Load `path` and upsert its titles into `catalogue`, returning how many were added.
pub fn merge_extra_games(catalogue: &mut Catalogue, path: impl AsRef<Path>) -> Result<usize> {
    let games = load_extra_games(path)?;
    let added = catalogue.extend(games);
    info!("{added} extra games added");
    Ok(added)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn extra_games_are_merged_without_duplicates() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("games.json");
        fs::write(
            &path,
            r#"[
                { "displayImage": "https://example.com/image.png", "title_id": "1234", "name": "Super Game" },
                { "displayImage": null, "title_id": "5678", "name": null },
                { "title_id": "1234", "name": "Super Game Deluxe" }
            ]"#,
        )?;

        let mut catalogue = Catalogue::new();
        catalogue.upsert(Game::new("5678").with_name("Owned"));
        assert_eq!(merge_extra_games(&mut catalogue, &path)?, 3);

        assert_eq!(catalogue.len(), 2);
        let game = catalogue.get("1234").expect("game");
        assert_eq!(game.name.as_deref(), Some("Super Game Deluxe"));
        assert_eq!(game.image, None);
        assert_eq!(catalogue.get("5678").and_then(|g| g.name.as_deref()), None);
        assert!(path.exists());
        Ok(())
    }

    #[test]
    fn invalid_file_is_deleted() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("games.json");
        fs::write(&path, r#"[{ "name": "missing id" }]"#)?;

        assert!(load_extra_games(&path).is_err());
        assert!(!path.exists());
        Ok(())
    }

    #[test]
    fn missing_file_adds_nothing() -> Result<()> {
        let dir = tempdir()?;
        assert!(load_extra_games(dir.path().join("games.json"))?.is_empty());
        Ok(())
    }
}
