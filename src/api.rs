use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::StatusCode;
use tracing::{debug, warn};
use url::Url;

use crate::error::FetchError;
use crate::tracker::ScoreSource;
use crate::types::{GameStatus, Matchup, PlayerLanding, ScoreNow};

/// Fetch `url` and return the body text. Anything but a 200 is an error.
pub async fn fetch_body(client: &reqwest::Client, url: &str) -> Result<String, FetchError> {
    let resp = client.get(url).send().await?;
    let status = resp.status();
    if status != StatusCode::OK {
        return Err(FetchError::Status(status));
    }
    Ok(resp.text().await?)
}

/// Find the first game in a `score/now` body that involves `team`.
///
/// Returns `Ok(None)` when the team is not on the board.
pub fn parse_game_status(body: &str, team: &str) -> Result<Option<GameStatus>, FetchError> {
    let score: ScoreNow = serde_json::from_str(body)?;
    let status = score
        .games
        .into_iter()
        .find(|g| g.home_team.abbrev == team || g.away_team.abbrev == team)
        .map(|g| GameStatus {
            matchup: Matchup {
                home: g.home_team.abbrev,
                away: g.away_team.abbrev,
            },
            state: g.game_state,
        });
    Ok(status)
}

/// Extract `featuredStats.regularSeason.career.goals` from a player landing body.
pub fn parse_career_goals(body: &str) -> Result<u32, FetchError> {
    let landing: PlayerLanding = serde_json::from_str(body)?;
    Ok(landing.featured_stats.regular_season.career.goals)
}

/// Client for the public NHL web API, bound to one team and one player.
pub struct NhlClient {
    http: reqwest::Client,
    base_url: String,
    team: String,
    player_id: u32,
}

impl NhlClient {
    pub fn new(base_url: &str, team: &str, player_id: u32, timeout: Duration) -> Result<Self> {
        Url::parse(base_url).with_context(|| format!("invalid NHL API base URL {base_url}"))?;
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("failed to build HTTP client")?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            team: team.to_string(),
            player_id,
        })
    }

    pub fn score_now_url(&self) -> String {
        format!("{}/v1/score/now", self.base_url)
    }

    pub fn player_landing_url(&self) -> String {
        format!("{}/v1/player/{}/landing", self.base_url, self.player_id)
    }

    /// The tracked team's game on today's board, if any.
    pub async fn fetch_game_status(&self) -> Result<Option<GameStatus>, FetchError> {
        let body = fetch_body(&self.http, &self.score_now_url()).await?;
        let status = parse_game_status(&body, &self.team)?;
        debug!("Score feed: {:?}", status);
        Ok(status)
    }

    /// The tracked player's career regular-season goal total.
    pub async fn fetch_career_goals(&self) -> Result<u32, FetchError> {
        let body = fetch_body(&self.http, &self.player_landing_url()).await?;
        let goals = parse_career_goals(&body)?;
        debug!("Player {} career goals: {goals}", self.player_id);
        Ok(goals)
    }
}

impl ScoreSource for NhlClient {
    async fn tracked_game(&self) -> Option<GameStatus> {
        match self.fetch_game_status().await {
            Ok(status) => status,
            Err(e) => {
                warn!("Failed to fetch scores: {e}");
                None
            }
        }
    }

    async fn career_goals(&self) -> Option<u32> {
        match self.fetch_career_goals().await {
            Ok(goals) => Some(goals),
            Err(e) => {
                warn!("Failed to fetch player goals: {e}");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::spawn_http;
    use crate::types::GameState;
    use serde_json::json;

    fn score_body(games: serde_json::Value) -> String {
        json!({ "prevDate": "2025-04-05", "currentDate": "2025-04-06", "games": games }).to_string()
    }

    fn game(away: &str, home: &str, state: &str) -> serde_json::Value {
        json!({
            "id": 2024021200,
            "awayTeam": { "id": 1, "abbrev": away, "score": 1 },
            "homeTeam": { "id": 2, "abbrev": home, "score": 2 },
            "gameState": state,
        })
    }

    fn landing_body(goals: u32) -> String {
        json!({
            "playerId": 8471214,
            "firstName": { "default": "Alex" },
            "featuredStats": {
                "season": 20242025,
                "regularSeason": {
                    "subSeason": { "goals": 44 },
                    "career": { "gamesPlayed": 1490, "goals": goals, "assists": 738 }
                }
            }
        })
        .to_string()
    }

    #[test]
    fn test_parse_game_status_home_and_away() {
        let body = score_body(json!([
            game("BOS", "TOR", "LIVE"),
            game("WSH", "NYI", "CRIT"),
        ]));
        let status = parse_game_status(&body, "WSH").unwrap().unwrap();
        assert_eq!(status.matchup.home, "NYI");
        assert_eq!(status.matchup.away, "WSH");
        assert_eq!(status.state, GameState::Crit);
        assert!(status.is_live());

        let body = score_body(json!([game("PIT", "WSH", "FUT")]));
        let status = parse_game_status(&body, "WSH").unwrap().unwrap();
        assert_eq!(status.matchup.to_string(), "WSH vs. PIT");
        assert!(!status.is_live());
    }

    #[test]
    fn test_parse_game_status_first_match_wins() {
        let body = score_body(json!([
            game("WSH", "CAR", "OFF"),
            game("PHI", "WSH", "LIVE"),
        ]));
        let status = parse_game_status(&body, "WSH").unwrap().unwrap();
        assert_eq!(status.matchup.home, "CAR");
        assert!(!status.is_live());
    }

    #[test]
    fn test_parse_game_status_team_absent() {
        let body = score_body(json!([game("BOS", "TOR", "LIVE")]));
        assert!(parse_game_status(&body, "WSH").unwrap().is_none());
        assert!(parse_game_status(&score_body(json!([])), "WSH").unwrap().is_none());
        assert!(parse_game_status("{}", "WSH").unwrap().is_none());
    }

    #[test]
    fn test_parse_game_status_malformed() {
        assert!(parse_game_status("", "WSH").is_err());
        assert!(parse_game_status("<html>", "WSH").is_err());
        assert!(parse_game_status(r#"{"games": 3}"#, "WSH").is_err());
    }

    #[test]
    fn test_parse_career_goals() {
        assert_eq!(parse_career_goals(&landing_body(897)).unwrap(), 897);
        assert_eq!(parse_career_goals(&landing_body(0)).unwrap(), 0);
    }

    #[test]
    fn test_parse_career_goals_malformed() {
        assert!(parse_career_goals("").is_err());
        assert!(parse_career_goals(r#"{"featuredStats": {}}"#).is_err());
        assert!(
            parse_career_goals(
                r#"{"featuredStats":{"regularSeason":{"career":{"goals":"many"}}}}"#
            )
            .is_err()
        );
    }

    fn client(base: &str) -> NhlClient {
        NhlClient::new(base, "WSH", 8471214, Duration::from_secs(5)).unwrap()
    }

    #[test]
    fn test_endpoint_urls() {
        let c = client("https://api-web.nhle.com/");
        assert_eq!(c.score_now_url(), "https://api-web.nhle.com/v1/score/now");
        assert_eq!(
            c.player_landing_url(),
            "https://api-web.nhle.com/v1/player/8471214/landing"
        );
        assert!(NhlClient::new("not a url", "WSH", 1, Duration::from_secs(1)).is_err());
    }

    #[tokio::test]
    async fn test_fetch_body_non_200_is_error() {
        let (base, mut requests) =
            spawn_http(|_| (503, r#"{"games": []}"#.to_string())).await;
        let http = reqwest::Client::new();

        let err = fetch_body(&http, &format!("{base}/v1/score/now"))
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::Status(s) if s.as_u16() == 503));
        assert_eq!(requests.recv().await.unwrap().path(), "/v1/score/now");
    }

    #[tokio::test]
    async fn test_fetch_body_transport_error() {
        // Bind and drop to get a port with nothing listening.
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let http = reqwest::Client::new();
        let err = fetch_body(&http, &format!("http://{addr}/")).await.unwrap_err();
        assert!(matches!(err, FetchError::Transport(_)));
    }

    #[tokio::test]
    async fn test_score_source_live_game_and_goals() {
        let (base, _requests) = spawn_http(|path| match path {
            "/v1/score/now" => (200, score_body(json!([game("WSH", "NYR", "LIVE")]))),
            "/v1/player/8471214/landing" => (200, landing_body(895)),
            _ => (404, String::new()),
        })
        .await;
        let nhl = client(&base);

        let status = nhl.tracked_game().await.unwrap();
        assert!(status.is_live());
        assert_eq!(status.matchup.to_string(), "NYR vs. WSH");
        assert_eq!(nhl.career_goals().await, Some(895));
    }

    #[tokio::test]
    async fn test_score_source_safe_defaults() {
        let (base, _requests) = spawn_http(|path| match path {
            "/v1/score/now" => (200, "not json".to_string()),
            _ => (500, String::new()),
        })
        .await;
        let nhl = client(&base);

        assert_eq!(nhl.tracked_game().await, None);
        assert_eq!(nhl.career_goals().await, None);
    }
}
