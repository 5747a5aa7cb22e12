use serde::{Deserialize, Serialize};
use std::fmt;

pub mod format;

/// Side of the map a participant plays on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u16", into = "u16")]
pub enum TeamId {
    Blue,
    Red,
}

impl TryFrom<u16> for TeamId {
    type Error = String;

    fn try_from(value: u16) -> Result<Self, Self::Error> {
        match value {
            100 => Ok(TeamId::Blue),
            200 => Ok(TeamId::Red),
            other => Err(format!("unknown team id {}", other)),
        }
    }
}

impl From<TeamId> for u16 {
    fn from(team: TeamId) -> Self {
        match team {
            TeamId::Blue => 100,
            TeamId::Red => 200,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Ability {
    pub name: String,
    pub description: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ChampionAbilities {
    pub q: Ability,
    pub w: Ability,
    pub e: Ability,
    pub r: Ability,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub passive: Option<Ability>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChampionMastery {
    pub level: u32,
    pub points: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchStats {
    pub champion: String,
    pub kda: String,
    pub mode: String,
    pub win: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChampionStats {
    pub champion: String,
    pub win_rate: f64,
    pub games: u32,
    pub kda: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParticipantStats {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recent_matches: Option<Vec<MatchStats>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_champions: Option<Vec<ChampionStats>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub win_rate: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub games_played: Option<u32>,
}

/// One player's public data for the current match.
///
/// Deserialises from both the current backend shape and the legacy one
/// where each ability is a bare description string.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", from = "RawParticipant")]
pub struct Participant {
    pub summoner_name: String,
    pub champion_name: String,
    pub team_id: TeamId,
    pub tier: String,
    pub rank: String,
    pub mastery: ChampionMastery,
    pub ability: ChampionAbilities,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stats: Option<ParticipantStats>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub puuid: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summoner_id: Option<String>,
}

impl Participant {
    /// Identity fields the overlay cannot render without.
    pub fn is_complete(&self) -> bool {
        !self.summoner_name.is_empty() && !self.champion_name.is_empty()
    }
}

// ── Wire shape ───────────────────────────────────────────────────────────────

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawParticipant {
    #[serde(default)]
    summoner_name: String,
    #[serde(default)]
    champion_name: String,
    team_id: TeamId,
    #[serde(default)]
    tier: String,
    #[serde(default)]
    rank: String,
    #[serde(default)]
    mastery: ChampionMastery,
    #[serde(default)]
    ability: RawAbilities,
    #[serde(default)]
    stats: Option<ParticipantStats>,
    #[serde(default)]
    puuid: Option<String>,
    #[serde(default)]
    summoner_id: Option<String>,
}

#[derive(Deserialize, Default)]
struct RawAbilities {
    q: Option<AbilityField>,
    w: Option<AbilityField>,
    e: Option<AbilityField>,
    r: Option<AbilityField>,
    #[serde(alias = "p")]
    passive: Option<AbilityField>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum AbilityField {
    Detailed(Ability),
    Legacy(String),
}

impl AbilityField {
    fn into_ability(self, generated_name: String) -> Ability {
        match self {
            AbilityField::Detailed(ability) => ability,
            AbilityField::Legacy(description) => Ability {
                name: generated_name,
                description,
            },
        }
    }
}

fn adapt_abilities(raw: RawAbilities, champion: &str) -> ChampionAbilities {
    let slot = |field: Option<AbilityField>, key: &str| {
        field
            .map(|f| f.into_ability(format!("{}{}", champion, key)))
            .unwrap_or_default()
    };
    ChampionAbilities {
        q: slot(raw.q, "Q"),
        w: slot(raw.w, "W"),
        e: slot(raw.e, "E"),
        r: slot(raw.r, "R"),
        passive: raw
            .passive
            .map(|f| f.into_ability(format!("{}_Passive", champion))),
    }
}

impl From<RawParticipant> for Participant {
    fn from(raw: RawParticipant) -> Self {
        let ability = adapt_abilities(raw.ability, &raw.champion_name);
        Participant {
            summoner_name: raw.summoner_name,
            champion_name: raw.champion_name,
            team_id: raw.team_id,
            tier: raw.tier,
            rank: raw.rank,
            mastery: raw.mastery,
            ability,
            stats: raw.stats,
            puuid: raw.puuid,
            summoner_id: raw.summoner_id,
        }
    }
}

// ── Backend / telemetry payloads ─────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CurrentGame {
    #[serde(default)]
    pub participants: Vec<Participant>,
    #[serde(default)]
    pub game_mode: String,
    #[serde(default)]
    pub game_start_time: i64,
    #[serde(default)]
    pub map_id: u32,
}

/// Response of `GET /account/{name}/{tag}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountInfo {
    pub puuid: String,
    pub game_name: String,
    pub tag_line: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_game: Option<CurrentGame>,
}

/// Response of the local `/gamestats` endpoint.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GameStats {
    pub game_mode: String,
    pub game_time: f64,
    pub map_name: String,
    pub map_number: i64,
    pub map_terrain: String,
}

/// A `Name#Tag` player identity.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RiotId {
    pub name: String,
    pub tag: String,
}

impl RiotId {
    pub fn new(name: impl Into<String>, tag: impl Into<String>) -> Self {
        RiotId {
            name: name.into(),
            tag: tag.into(),
        }
    }
}

impl fmt::Display for RiotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.tag.is_empty() {
            write!(f, "{}", self.name)
        } else {
            write!(f, "{}#{}", self.name, self.tag)
        }
    }
}

/// Parse the telemetry's quoted `"Name#Tag"` identity string.
///
/// All `"` characters are dropped; a missing `#` yields an empty tag.
pub fn parse_summoner_name(raw: &str) -> RiotId {
    let cleaned = raw.replace('"', "");
    let mut parts = cleaned.split('#');
    let name = parts.next().unwrap_or_default().to_string();
    let tag = parts.next().unwrap_or_default().to_string();
    RiotId { name, tag }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Team {
    pub id: TeamId,
    pub participants: Vec<Participant>,
}

/// Split participants into the blue and red teams, blue first.
pub fn group_by_team(participants: &[Participant]) -> Vec<Team> {
    [TeamId::Blue, TeamId::Red]
        .into_iter()
        .map(|id| Team {
            id,
            participants: participants
                .iter()
                .filter(|p| p.team_id == id)
                .cloned()
                .collect(),
        })
        .collect()
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;

    pub fn participant(summoner: &str, champion: &str, team: TeamId) -> Participant {
        Participant {
            summoner_name: summoner.to_string(),
            champion_name: champion.to_string(),
            team_id: team,
            tier: "GOLD".into(),
            rank: "II".into(),
            mastery: ChampionMastery {
                level: 7,
                points: 123_456,
            },
            ability: ChampionAbilities::default(),
            stats: None,
            puuid: None,
            summoner_id: None,
        }
    }

    pub fn account_with(participants: Vec<Participant>) -> AccountInfo {
        AccountInfo {
            puuid: "puuid-1".into(),
            game_name: "Foo".into(),
            tag_line: "NA1".into(),
            current_game: Some(CurrentGame {
                participants,
                game_mode: "CLASSIC".into(),
                game_start_time: 1_700_000_000_000,
                map_id: 11,
            }),
        }
    }
}
