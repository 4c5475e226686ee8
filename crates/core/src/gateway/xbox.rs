use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::{
    blocking::{Client, RequestBuilder},
    header::{ACCEPT, ACCEPT_LANGUAGE, AUTHORIZATION, USER_AGENT},
    StatusCode,
};
use tracing::{debug, info, warn};

use super::{
    payload::{self, ProgressUpdateBody},
    ProgressUpdate, RemoteAchievement, RemoteGateway, RemoteTitle, UserProfile,
};
use crate::{
    auth::CredentialStore,
    config::AppConfig,
    error::{ApiError, ApiResult},
};

const CONTRACT_HEADER: &str = "x-xbl-contract-version";
const UPDATE_USER_AGENT: &str = "XboxServicesAPI/2021.04.20210610.3 c";

/// Which kind of call a status code belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallKind {
    /// GET of profile, titles or achievements.
    Read,
    /// Progress update POST.
    Write,
}

/// Map an HTTP status onto the call outcome.
pub fn classify(status: StatusCode, kind: CallKind) -> ApiResult<()> {
    match status.as_u16() {
        _ if status.is_success() => Ok(()),
        304 if kind == CallKind::Write => Err(ApiError::AlreadyDone),
        401 | 403 => Err(ApiError::AuthExpired),
        429 => Err(ApiError::RateLimited),
        code => Err(ApiError::Unexpected(code)),
    }
}

fn transient(err: reqwest::Error) -> ApiError {
    ApiError::Transient(err.to_string())
}

/// Blocking HTTP gateway owning the credential store.
pub struct XboxGateway {
    client: Client,
    credentials: CredentialStore,
    profile_url: String,
    titlehub_url: String,
    achievements_url: String,
    accept_language: String,
}

impl XboxGateway {
    /// Build a gateway from configuration.
    pub fn new(config: &AppConfig, credentials: CredentialStore) -> Result<Self> {
        let client = Client::builder()
            .gzip(true)
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .context("failed to build HTTP client")?;

        Ok(Self {
            client,
            credentials,
            profile_url: config.profile_url.clone(),
            titlehub_url: config.titlehub_url.trim_end_matches('/').to_string(),
            achievements_url: config.achievements_url.trim_end_matches('/').to_string(),
            accept_language: config.accept_language.clone(),
        })
    }

    fn get_body(&mut self, url: &str, contract: &'static str) -> ApiResult<String> {
        let request = self
            .client
            .get(url)
            .header(CONTRACT_HEADER, contract)
            .header(ACCEPT, "application/json")
            .header(ACCEPT_LANGUAGE, self.accept_language.as_str());
        self.send(request, CallKind::Read)
    }

    /// Attach the renewed credential, send, classify and read the body.
    fn send(&mut self, request: RequestBuilder, kind: CallKind) -> ApiResult<String> {
        self.credentials.with_auth(|authorization| {
            let response = request
                .header(AUTHORIZATION, authorization)
                .send()
                .map_err(transient)?;
            let status = response.status();
            debug!(%status, url = %response.url(), "response received");
            classify(status, kind)?;
            response.text().map_err(transient)
        })
    }
}

impl RemoteGateway for XboxGateway {
    fn profile(&mut self) -> ApiResult<UserProfile> {
        let url = self.profile_url.clone();
        let body = self.get_body(&url, "2")?;
        let profile = payload::parse_profile(&body)?;
        info!(xuid = %profile.xuid, "user id retrieved");
        Ok(profile)
    }

    fn title_history(&mut self, xuid: &str) -> ApiResult<Vec<RemoteTitle>> {
        let url = format!(
            "{}/users/xuid({xuid})/titles/titleHistory/decoration/Achievement,scid",
            self.titlehub_url
        );
        let body = self.get_body(&url, "2")?;
        payload::parse_title_history(&body)
    }

    fn achievements(&mut self, xuid: &str, title_id: &str) -> ApiResult<Vec<RemoteAchievement>> {
        let url = format!(
            "{}/users/xuid({xuid})/achievements?titleId={title_id}",
            self.achievements_url
        );
        let body = self.get_body(&url, "4")?;
        payload::parse_achievements(&body)
    }

    fn update_progress(&mut self, update: &ProgressUpdate) -> ApiResult<()> {
        let url = format!(
            "{}/users/xuid({})/achievements/{}/update",
            self.achievements_url, update.xuid, update.service_config_id
        );
        let request = self
            .client
            .post(url)
            .header(CONTRACT_HEADER, "2")
            .header(ACCEPT, "application/json")
            .header(ACCEPT_LANGUAGE, self.accept_language.as_str())
            .header(USER_AGENT, UPDATE_USER_AGENT)
            .json(&ProgressUpdateBody::from(update));
        self.send(request, CallKind::Write)?;
        Ok(())
    }

    fn reauthenticate(&mut self) -> ApiResult<()> {
        if let Err(err) = self.credentials.force_renew() {
            warn!("{err}");
            return Err(err);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::{
        io::{Read, Write},
        net::TcpListener,
        sync::Arc,
        thread::{self, JoinHandle},
    };

    use serde_json::json;

    use super::*;
    use crate::auth::StaticToken;

    /// Serves one canned `(status, body)` per connection and hands back the
    /// raw requests it received.
    fn serve(responses: Vec<(u16, &'static str)>) -> Result<(String, JoinHandle<Vec<String>>)> {
        let listener = TcpListener::bind("127.0.0.1:0")?;
        let base = format!("http://{}", listener.local_addr()?);
        let handle = thread::spawn(move || {
            let mut requests = Vec::new();
            for (status, body) in responses {
                let Ok((mut stream, _)) = listener.accept() else {
                    break;
                };
                let _ = stream.set_read_timeout(Some(Duration::from_secs(5)));
                requests.push(read_request(&mut stream));
                let response = format!(
                    "HTTP/1.1 {status} Canned\r\ncontent-type: application/json\r\n\
                     content-length: {}\r\nconnection: close\r\n\r\n{body}",
                    body.len()
                );
                let _ = stream.write_all(response.as_bytes());
            }
            requests
        });
        Ok((base, handle))
    }

    fn read_request(stream: &mut impl Read) -> String {
        let mut raw = Vec::new();
        let mut chunk = [0u8; 4096];
        loop {
            let text = String::from_utf8_lossy(&raw).into_owned();
            if let Some(end) = text.find("\r\n\r\n") {
                let length = header(&text, "content-length")
                    .and_then(|value| value.parse::<usize>().ok())
                    .unwrap_or(0);
                if raw.len() >= end + 4 + length {
                    return text;
                }
            }
            match stream.read(&mut chunk) {
                Ok(0) | Err(_) => return String::from_utf8_lossy(&raw).into_owned(),
                Ok(read) => raw.extend_from_slice(&chunk[..read]),
            }
        }
    }

    fn header<'a>(request: &'a str, name: &str) -> Option<&'a str> {
        request
            .split("\r\n\r\n")
            .next()?
            .lines()
            .skip(1)
            .filter_map(|line| line.split_once(':'))
            .find(|(key, _)| key.trim().eq_ignore_ascii_case(name))
            .map(|(_, value)| value.trim())
    }

    fn body(request: &str) -> &str {
        request.split_once("\r\n\r\n").map_or("", |(_, body)| body)
    }

    fn gateway(base: &str) -> Result<XboxGateway> {
        let config = AppConfig {
            profile_url: format!("{base}/users/me/profile/settings?settings=Gamertag"),
            titlehub_url: base.to_string(),
            achievements_url: format!("{base}/"),
            ..AppConfig::default()
        };
        let mut credentials = CredentialStore::new();
        credentials.authenticate(Arc::new(StaticToken::new("uhs;secret", None)))?;
        XboxGateway::new(&config, credentials)
    }

    fn update() -> ProgressUpdate {
        ProgressUpdate {
            xuid: "2533274800000000".to_string(),
            title_id: "100".to_string(),
            service_config_id: "scid-1".to_string(),
            achievement_id: "7".to_string(),
        }
    }

    #[test]
    fn status_codes_are_classified() {
        assert_eq!(classify(StatusCode::OK, CallKind::Read), Ok(()));
        assert_eq!(
            classify(StatusCode::UNAUTHORIZED, CallKind::Read),
            Err(ApiError::AuthExpired)
        );
        assert_eq!(
            classify(StatusCode::FORBIDDEN, CallKind::Write),
            Err(ApiError::AuthExpired)
        );
        assert_eq!(
            classify(StatusCode::TOO_MANY_REQUESTS, CallKind::Write),
            Err(ApiError::RateLimited)
        );
        assert_eq!(
            classify(StatusCode::NOT_MODIFIED, CallKind::Write),
            Err(ApiError::AlreadyDone)
        );
        assert_eq!(
            classify(StatusCode::NOT_MODIFIED, CallKind::Read),
            Err(ApiError::Unexpected(304))
        );
        assert_eq!(
            classify(StatusCode::INTERNAL_SERVER_ERROR, CallKind::Read),
            Err(ApiError::Unexpected(500))
        );
    }

    #[test]
    fn gateway_without_token_fails_before_sending() -> Result<()> {
        let config = AppConfig {
            profile_url: "http://127.0.0.1:9/profile".to_string(),
            ..AppConfig::default()
        };
        let mut gateway = XboxGateway::new(&config, CredentialStore::new())?;
        assert!(matches!(gateway.profile(), Err(ApiError::RenewalFailed(_))));
        assert!(matches!(
            gateway.reauthenticate(),
            Err(ApiError::RenewalFailed(_))
        ));
        Ok(())
    }

    #[test]
    fn reads_send_credential_and_contract_headers() -> Result<()> {
        let (base, server) = serve(vec![
            (200, r#"{"titles":[{"titleId":"100","name":"Halo"}]}"#),
            (200, r#"{"achievements":[]}"#),
        ])?;
        let mut gateway = gateway(&base)?;

        let titles = gateway.title_history("42")?;
        assert_eq!(titles.len(), 1);
        assert_eq!(titles[0].title_id, "100");
        assert!(gateway.achievements("42", "100")?.is_empty());

        let requests = server.join().expect("server thread");
        assert!(requests[0].starts_with(
            "GET /users/xuid(42)/titles/titleHistory/decoration/Achievement,scid HTTP/1.1"
        ));
        assert_eq!(header(&requests[0], "authorization"), Some("XBL3.0 x=uhs;secret"));
        assert_eq!(header(&requests[0], CONTRACT_HEADER), Some("2"));
        assert_eq!(header(&requests[0], "accept"), Some("application/json"));
        assert_eq!(header(&requests[0], "accept-language"), Some("en-GB"));

        assert!(requests[1].starts_with("GET /users/xuid(42)/achievements?titleId=100 HTTP/1.1"));
        assert_eq!(header(&requests[1], CONTRACT_HEADER), Some("4"));
        Ok(())
    }

    #[test]
    fn progress_update_posts_completion_body() -> Result<()> {
        let (base, server) = serve(vec![(200, "")])?;
        let mut gateway = gateway(&base)?;

        gateway.update_progress(&update())?;

        let requests = server.join().expect("server thread");
        let request = &requests[0];
        assert!(request.starts_with(
            "POST /users/xuid(2533274800000000)/achievements/scid-1/update HTTP/1.1"
        ));
        assert_eq!(header(request, "user-agent"), Some(UPDATE_USER_AGENT));
        assert_eq!(header(request, CONTRACT_HEADER), Some("2"));
        assert_eq!(header(request, "authorization"), Some("XBL3.0 x=uhs;secret"));

        let sent: serde_json::Value = serde_json::from_str(body(request))?;
        assert_eq!(
            sent,
            json!({
                "action": "progressUpdate",
                "serviceConfigId": "scid-1",
                "titleId": "100",
                "userId": "2533274800000000",
                "achievements": [{ "id": "7", "percentComplete": "100" }]
            })
        );
        Ok(())
    }

    #[test]
    fn write_statuses_are_classified_from_the_response() -> Result<()> {
        let (base, server) = serve(vec![(304, ""), (429, ""), (401, ""), (500, "")])?;
        let mut gateway = gateway(&base)?;

        assert_eq!(gateway.update_progress(&update()), Err(ApiError::AlreadyDone));
        assert_eq!(gateway.update_progress(&update()), Err(ApiError::RateLimited));
        assert_eq!(gateway.update_progress(&update()), Err(ApiError::AuthExpired));
        assert_eq!(gateway.update_progress(&update()), Err(ApiError::Unexpected(500)));

        assert_eq!(server.join().expect("server thread").len(), 4);
        Ok(())
    }

    #[test]
    fn unreachable_service_is_transient() -> Result<()> {
        let base = {
            let listener = TcpListener::bind("127.0.0.1:0")?;
            format!("http://{}", listener.local_addr()?)
        };
        let mut gateway = gateway(&base)?;
        assert!(matches!(gateway.title_history("42"), Err(ApiError::Transient(_))));
        Ok(())
    }
}
