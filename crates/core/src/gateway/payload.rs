use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{ProgressUpdate, RemoteAchievement, RemoteTitle, UserProfile};
use crate::error::{ApiError, ApiResult};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProfileResponse {
    profile_users: Vec<ProfileUser>,
}

#[derive(Debug, Deserialize)]
struct ProfileUser {
    id: String,
    #[serde(default)]
    settings: Vec<ProfileSetting>,
}

#[derive(Debug, Deserialize)]
struct ProfileSetting {
    #[serde(default)]
    id: Option<String>,
    value: String,
}

#[derive(Debug, Deserialize)]
struct TitleHistoryResponse {
    titles: Vec<TitleEntry>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TitleEntry {
    #[serde(default)]
    title_id: Option<String>,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    display_image: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AchievementsResponse {
    achievements: Vec<AchievementEntry>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AchievementEntry {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    service_config_id: Option<String>,
    #[serde(default)]
    progress_state: Option<String>,
    #[serde(default)]
    progression: Option<Progression>,
    #[serde(default)]
    media_assets: Vec<MediaAsset>,
}

#[derive(Debug, Deserialize)]
struct Progression {
    #[serde(default)]
    requirements: Vec<Requirement>,
}

#[derive(Debug, Deserialize)]
struct Requirement {
    #[serde(default)]
    id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct MediaAsset {
    #[serde(default)]
    url: Option<String>,
}

fn malformed(what: &str, err: serde_json::Error) -> ApiError {
    ApiError::Malformed(format!("{what}: {err}"))
}

/// Parse the profile settings response into gamertag and user id.
pub fn parse_profile(body: &str) -> ApiResult<UserProfile> {
    let response: ProfileResponse =
        serde_json::from_str(body).map_err(|err| malformed("profile", err))?;
    let user = response
        .profile_users
        .into_iter()
        .next()
        .ok_or_else(|| ApiError::Malformed("profile: no user in response".to_string()))?;
    let gamertag = user
        .settings
        .iter()
        .find(|setting| setting.id.as_deref() == Some("Gamertag"))
        .or_else(|| user.settings.first())
        .map(|setting| setting.value.clone())
        .ok_or_else(|| ApiError::Malformed("profile: gamertag setting missing".to_string()))?;

    Ok(UserProfile {
        xuid: user.id,
        gamertag,
    })
}

/// Parse the title history; entries without a title id are skipped.
pub fn parse_title_history(body: &str) -> ApiResult<Vec<RemoteTitle>> {
    let response: TitleHistoryResponse =
        serde_json::from_str(body).map_err(|err| malformed("title history", err))?;
    Ok(response
        .titles
        .into_iter()
        .filter_map(|entry| {
            let title_id = entry.title_id?;
            Some(RemoteTitle {
                title_id,
                name: entry.name,
                image: entry.display_image,
            })
        })
        .collect())
}

/// Flatten the achievements tree; entries without an id are skipped.
pub fn parse_achievements(body: &str) -> ApiResult<Vec<RemoteAchievement>> {
    let response: AchievementsResponse =
        serde_json::from_str(body).map_err(|err| malformed("achievements", err))?;
    Ok(response
        .achievements
        .into_iter()
        .filter_map(|entry| {
            let Some(id) = entry.id else {
                debug!(name = ?entry.name, "skipping achievement without id");
                return None;
            };
            let requirement_id = entry
                .progression
                .and_then(|progression| progression.requirements.into_iter().next())
                .and_then(|requirement| requirement.id);
            Some(RemoteAchievement {
                id,
                name: entry.name,
                description: entry.description,
                service_config_id: entry.service_config_id,
                progress_state: entry.progress_state,
                requirement_id,
                image: entry.media_assets.into_iter().next().and_then(|asset| asset.url),
            })
        })
        .collect())
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct AchievementProgress<'a> {
    id: &'a str,
    percent_complete: &'static str,
}

/// Body of the progress update request.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressUpdateBody<'a> {
    action: &'static str,
    service_config_id: &'a str,
    title_id: &'a str,
    user_id: &'a str,
    achievements: Vec<AchievementProgress<'a>>,
}

impl<'a> From<&'a ProgressUpdate> for ProgressUpdateBody<'a> {
    fn from(update: &'a ProgressUpdate) -> Self {
        Self {
            action: "progressUpdate",
            service_config_id: &update.service_config_id,
            title_id: &update.title_id,
            user_id: &update.xuid,
            achievements: vec![AchievementProgress {
                id: &update.achievement_id,
                percent_complete: "100",
            }],
        }
    }
}
