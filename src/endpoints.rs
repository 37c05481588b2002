//! Typed lookups over [`ResilientFetcher::fetch`].
//!
//! Each helper is a single API-Football call (except
//! [`FootballApiExt::team_player_profiles`]); none of them cache.

use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

use crate::fetcher::{Params, ResilientFetcher};
use crate::{Error, Result};

pub const PREMIER_LEAGUE_ID: u32 = 39;

pub const SQUADS_ENDPOINT: &str = "players/squads";
pub const PROFILES_ENDPOINT: &str = "players/profiles";
pub const TEAMS_ENDPOINT: &str = "teams";

#[async_trait]
pub trait FootballApiExt {
    /// Squad listing for a team, optionally for a given season.
    async fn team_squad(&self, team_id: u32, season: Option<u16>) -> Result<Value>;

    async fn player_profile(&self, player_id: u32) -> Result<Value>;

    /// Clubs of a league, optionally for a given season.
    async fn league_teams(&self, league_id: u32, season: Option<u16>) -> Result<Value>;

    async fn search_players(&self, name: &str) -> Result<Value>;

    /// Squad lookup followed by one profile lookup per listed player.
    async fn team_player_profiles(&self, team_id: u32, season: Option<u16>) -> Result<Vec<Value>>;
}

#[async_trait]
impl FootballApiExt for ResilientFetcher {
    async fn team_squad(&self, team_id: u32, season: Option<u16>) -> Result<Value> {
        let params = Params::new().with("team", team_id).with_opt("season", season);
        self.fetch(SQUADS_ENDPOINT, &params).await
    }

    async fn player_profile(&self, player_id: u32) -> Result<Value> {
        self.fetch(PROFILES_ENDPOINT, &Params::new().with("player", player_id))
            .await
    }

    async fn league_teams(&self, league_id: u32, season: Option<u16>) -> Result<Value> {
        let params = Params::new()
            .with("league", league_id)
            .with_opt("season", season);
        self.fetch(TEAMS_ENDPOINT, &params).await
    }

    async fn search_players(&self, name: &str) -> Result<Value> {
        self.fetch(PROFILES_ENDPOINT, &Params::new().with("search", name))
            .await
    }

    async fn team_player_profiles(&self, team_id: u32, season: Option<u16>) -> Result<Vec<Value>> {
        let squad = self.team_squad(team_id, season).await?;
        let ids = squad_player_ids(&squad)?;
        debug!(team_id, players = ids.len(), "fetching squad profiles");

        let mut profiles = Vec::with_capacity(ids.len());
        for id in ids {
            profiles.push(self.player_profile(id).await?);
        }
        Ok(profiles)
    }
}

/// Player ids from a squad payload: `[{"team": …, "players": [{"id": …}, …]}]`.
///
/// An empty squad list or a squad without `players` yields no ids.
pub fn squad_player_ids(squad: &Value) -> Result<Vec<u32>> {
    let players = match squad
        .as_array()
        .and_then(|entries| entries.first())
        .and_then(|first| first.get("players"))
    {
        Some(Value::Array(players)) => players,
        Some(other) => {
            return Err(Error::malformed(format!(
                "squad \"players\" should be an array, got {}",
                other
            )))
        }
        None => return Ok(Vec::new()),
    };

    players
        .iter()
        .enumerate()
        .map(|(i, p)| {
            p.get("id")
                .and_then(Value::as_u64)
                .and_then(|id| u32::try_from(id).ok())
                .ok_or_else(|| {
                    Error::malformed(format!("squad player #{} has no integer \"id\"", i))
                })
        })
        .collect()
}
