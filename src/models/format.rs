//! Display helpers shared by the bridge API's team view.

const APEX_TIERS: &[&str] = &["MASTER", "GRANDMASTER", "CHALLENGER"];

/// "950", "123.4k", "1.2M".
pub fn format_mastery_points(points: u64) -> String {
    if points >= 1_000_000 {
        format!("{:.1}M", points as f64 / 1_000_000.0)
    } else if points >= 1_000 {
        format!("{:.1}k", points as f64 / 1_000.0)
    } else {
        points.to_string()
    }
}

/// A win ratio in `0.0..=1.0` as "55.3%".
pub fn format_win_rate(ratio: f64) -> String {
    format!("{:.1}%", ratio * 100.0)
}

/// Deathless games report kills + assists as the ratio.
pub fn calculate_kda(kills: u32, deaths: u32, assists: u32) -> f64 {
    let takedowns = u64::from(kills) + u64::from(assists);
    if deaths == 0 {
        return takedowns as f64;
    }
    let ratio = takedowns as f64 / deaths as f64;
    (ratio * 100.0).round() / 100.0
}

pub fn format_kda(kills: u32, deaths: u32, assists: u32) -> String {
    format!("{}/{}/{}", kills, deaths, assists)
}

/// "Gold II", "Challenger", or "Unranked" when either part is missing.
pub fn format_rank(tier: &str, division: &str) -> String {
    if tier.is_empty() || division.is_empty() {
        return "Unranked".to_string();
    }
    let upper = tier.to_uppercase();
    let mut chars = upper.chars();
    let pretty = match chars.next() {
        Some(first) => format!("{}{}", first, chars.as_str().to_lowercase()),
        None => String::new(),
    };
    if APEX_TIERS.contains(&upper.as_str()) {
        pretty
    } else {
        format!("{} {}", pretty, division)
    }
}

/// Seconds of game time as `MM:SS`.
pub fn format_game_time(seconds: u64) -> String {
    format!("{:02}:{:02}", seconds / 60, seconds % 60)
}
