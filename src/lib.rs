pub mod api;
pub mod config;
pub mod discord;
pub mod error;
pub mod notifier;
pub mod reporter;
pub mod tracker;
pub mod types;

#[cfg(test)]
mod testing;

/// NHL web API base URL (public, no auth required)
pub const NHL_API_BASE: &str = "https://api-web.nhle.com";

/// Tracked team: Washington Capitals
pub const TRACKED_TEAM: &str = "WSH";

/// Tracked player: Alexander Ovechkin
pub const TRACKED_PLAYER_ID: u32 = 8471214;
pub const TRACKED_PLAYER_NAME: &str = "Alexander Ovechkin";

/// Career goal total that ties Wayne Gretzky's record.
pub const GOAL_MILESTONE: i64 = 894;
pub const MILESTONE_LABEL: &str = "tie Gretzky";

/// Presence text shown while the tracked team has no live game.
pub const IDLE_STATUS: &str = "No Caps Games :(";

/// Image attached to every goal announcement.
pub const GOAL_IMAGE_PATH: &str = "images/8471214.png";

/// Discord gateway URL (JSON encoding, API v10)
pub const DISCORD_GATEWAY_URL: &str = "wss://gateway.discord.gg/?v=10&encoding=json";

/// Discord REST API base URL
pub const DISCORD_API_BASE: &str = "https://discord.com/api/v10";
