//! Probe: NHL web API endpoints used by the tracker
//!
//! Hits GET /v1/score/now and GET /v1/player/{id}/landing and documents:
//! - Response status, latency and top-level fields
//! - Games on today's board with their gameState
//! - What the tracker decodes from each body

use std::time::{Duration, Instant};

use anyhow::Result;
use serde_json::Value;

use ovi_tracker::api::{NhlClient, parse_career_goals, parse_game_status};
use ovi_tracker::{NHL_API_BASE, TRACKED_PLAYER_ID, TRACKED_TEAM};

#[tokio::main]
async fn main() -> Result<()> {
    let client = reqwest::Client::new();
    let nhl = NhlClient::new(
        NHL_API_BASE,
        TRACKED_TEAM,
        TRACKED_PLAYER_ID,
        Duration::from_secs(10),
    )?;

    println!("=== Probe: NHL web API ===");
    println!("Team: {}  Player: {}", TRACKED_TEAM, TRACKED_PLAYER_ID);
    println!();

    // 1. Score board
    println!("--- 1. GET {} ---", nhl.score_now_url());
    let start = Instant::now();
    let resp = client.get(nhl.score_now_url()).send().await?;
    let status = resp.status();
    let text = resp.text().await?;
    println!("Status: {}", status);
    println!("Latency: {:?}", start.elapsed());

    let body: Value = serde_json::from_str(&text).unwrap_or(Value::Null);
    print_fields(&body);
    if let Some(games) = body.get("games").and_then(|g| g.as_array()) {
        println!("Games on board: {}", games.len());
        for game in games {
            let away = game
                .pointer("/awayTeam/abbrev")
                .and_then(|v| v.as_str())
                .unwrap_or("?");
            let home = game
                .pointer("/homeTeam/abbrev")
                .and_then(|v| v.as_str())
                .unwrap_or("?");
            let state = game
                .get("gameState")
                .and_then(|v| v.as_str())
                .unwrap_or("?");
            println!("  {} @ {} [{}]", away, home, state);
        }
    }
    match parse_game_status(&text, TRACKED_TEAM) {
        Ok(Some(game)) => println!(
            "Decoded: {} state={:?} live={}",
            game.matchup,
            game.state,
            game.is_live()
        ),
        Ok(None) => println!("Decoded: {} not on the board", TRACKED_TEAM),
        Err(e) => println!("Decode error: {}", e),
    }
    println!();

    // 2. Player landing
    println!("--- 2. GET {} ---", nhl.player_landing_url());
    let start = Instant::now();
    let resp = client.get(nhl.player_landing_url()).send().await?;
    let status = resp.status();
    let text = resp.text().await?;
    println!("Status: {}", status);
    println!("Latency: {:?}", start.elapsed());

    let body: Value = serde_json::from_str(&text).unwrap_or(Value::Null);
    print_fields(&body);
    if let Some(career) = body.pointer("/featuredStats/regularSeason/career") {
        println!("Career block:");
        println!("{}", serde_json::to_string_pretty(career)?);
    }
    match parse_career_goals(&text) {
        Ok(goals) => println!("Decoded: {} career goals", goals),
        Err(e) => println!("Decode error: {}", e),
    }
    println!();

    // 3. Latency over repeated polls (the tracker hits both every tick)
    println!("--- 3. Latency over 5 polls (both endpoints) ---");
    let mut latencies = Vec::new();
    for i in 0..5 {
        let start = Instant::now();
        let game = nhl.fetch_game_status().await;
        let goals = nhl.fetch_career_goals().await;
        let latency = start.elapsed();
        println!(
            "  Poll {}: {:?} (game ok: {}, goals ok: {})",
            i + 1,
            latency,
            game.is_ok(),
            goals.is_ok()
        );
        latencies.push(latency);
    }
    let avg = latencies.iter().sum::<Duration>() / latencies.len() as u32;
    println!("  Average: {:?}", avg);
    println!();

    println!("=== Probe Complete ===");
    Ok(())
}

fn print_fields(body: &Value) {
    match body.as_object() {
        Some(obj) => {
            println!("Top-level fields:");
            for key in obj.keys() {
                println!("  - {}", key);
            }
        }
        None => println!("Response is not a JSON object"),
    }
}
