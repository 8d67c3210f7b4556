use serde::{Deserialize, Serialize};

// ── NHL API response shapes ──────────────────────────────────────────

/// `GET /v1/score/now`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ScoreNow {
    #[serde(default)]
    pub games: Vec<ScoreGame>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreGame {
    #[serde(default)]
    pub away_team: TeamRef,
    #[serde(default)]
    pub home_team: TeamRef,
    #[serde(default)]
    pub game_state: GameState,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TeamRef {
    #[serde(default)]
    pub abbrev: String,
}

/// Game state as reported by the API. Only `LIVE` and `CRIT` mean the puck is in play.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum GameState {
    Live,
    /// Live, final minutes of a close game.
    Crit,
    #[default]
    #[serde(other)]
    Other,
}

/// `GET /v1/player/{id}/landing`, reduced to the career goal total.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerLanding {
    pub featured_stats: FeaturedStats,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeaturedStats {
    pub regular_season: RegularSeason,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RegularSeason {
    pub career: CareerTotals,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CareerTotals {
    pub goals: u32,
}

// ── Domain types ─────────────────────────────────────────────────────

/// Home and away abbreviations of the tracked team's game.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Matchup {
    pub home: String,
    pub away: String,
}

impl std::fmt::Display for Matchup {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} vs. {}", self.home, self.away)
    }
}

/// The tracked team's game in the latest score feed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GameStatus {
    pub matchup: Matchup,
    pub state: GameState,
}

impl GameStatus {
    pub fn is_live(&self) -> bool {
        matches!(self.state, GameState::Live | GameState::Crit)
    }
}

/// What a single tick of the tracker did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickOutcome {
    /// Tracked team not playing (or no score data); idle presence set.
    Idle,
    /// Game live. `goals` is `None` when the player feed had no data this tick.
    Tracking {
        matchup: Matchup,
        goals: Option<u32>,
        notified: bool,
    },
}

/// A detected goal, emitted by the reporter as one JSON line.
#[derive(Debug, Clone, Serialize)]
pub struct GoalEvent {
    pub timestamp: String,
    pub player_id: u32,
    pub goals: u32,
    pub previous_goals: u32,
    /// Goals left to the milestone; negative once it has been passed.
    pub remaining: i64,
    pub matchup: Option<Matchup>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_game_state_parsing() {
        let parse = |s: &str| serde_json::from_value::<GameState>(json!(s)).unwrap();
        assert_eq!(parse("LIVE"), GameState::Live);
        assert_eq!(parse("CRIT"), GameState::Crit);
        assert_eq!(parse("FUT"), GameState::Other);
        assert_eq!(parse("OFF"), GameState::Other);
        assert_eq!(parse("live"), GameState::Other);
    }

    #[test]
    fn test_is_live() {
        let status = |state| GameStatus {
            matchup: Matchup {
                home: "WSH".into(),
                away: "PIT".into(),
            },
            state,
        };
        assert!(status(GameState::Live).is_live());
        assert!(status(GameState::Crit).is_live());
        assert!(!status(GameState::Other).is_live());
    }

    #[test]
    fn test_matchup_display() {
        let m = Matchup {
            home: "NYR".into(),
            away: "WSH".into(),
        };
        assert_eq!(m.to_string(), "NYR vs. WSH");
    }

    #[test]
    fn test_goal_event_serializes_negative_remaining() {
        let event = GoalEvent {
            timestamp: "2025-04-06T17:00:00+00:00".into(),
            player_id: 8471214,
            goals: 895,
            previous_goals: 894,
            remaining: -1,
            matchup: None,
        };
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["remaining"], json!(-1));
        assert_eq!(value["goals"], json!(895));
        assert!(value["matchup"].is_null());
    }
}
