use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::FeedError;

/// Lottery location. A multi-state game carries one entry per jurisdiction
/// that reported it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StateProv {
    pub id: String,
    pub name: String,
    pub country: String,
}

/// Amount accumulated in the jackpot for a particular draw date.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Jackpot {
    pub date: NaiveDate,
    pub amount: i64,
}

/// State of a single lottery game as reported by the feed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Game {
    pub id: String,
    pub name: String,
    pub state_provs: Vec<StateProv>,
    pub update_time: DateTime<Utc>,
    pub last_draw_date: NaiveDate,
    pub last_draw_numbers: String,
    pub next_draw_date: NaiveDate,
    pub jackpot: Option<Jackpot>,
}

/// Full feed state at one point in time, keyed by record id.
pub type Snapshot = BTreeMap<String, Game>;

/// Key of a game record: the feed game code plus the raw last draw date, so
/// successive draws of the same game never collide.
pub fn record_id(game_id: &str, raw_last_draw_date: &str) -> String {
    format!("{}-{}", game_id, raw_last_draw_date)
}

/// Single item of the change stream.
#[derive(Debug)]
pub enum GameUpdate {
    Game(Game),
    Error(FeedError),
}

impl GameUpdate {
    pub fn game(&self) -> Option<&Game> {
        match self {
            GameUpdate::Game(game) => Some(game),
            GameUpdate::Error(_) => None,
        }
    }

    pub fn error(&self) -> Option<&FeedError> {
        match self {
            GameUpdate::Game(_) => None,
            GameUpdate::Error(e) => Some(e),
        }
    }
}

// Raw document layout as served by the feed.

#[derive(Deserialize, Debug)]
pub(crate) struct RawDocument {
    #[serde(rename = "StateProv", default)]
    pub states: Vec<RawStateProv>,
}

#[derive(Deserialize, Debug)]
pub(crate) struct RawStateProv {
    #[serde(rename = "@stateprov_id")]
    pub id: String,
    #[serde(rename = "@stateprov_name")]
    pub name: String,
    #[serde(rename = "@country")]
    pub country: String,
    #[serde(rename = "game", default)]
    pub games: Vec<RawGame>,
}

#[derive(Deserialize, Debug)]
pub(crate) struct RawGame {
    #[serde(rename = "@game_id")]
    pub id: String,
    #[serde(rename = "@game_name")]
    pub name: String,
    #[serde(rename = "@update_time")]
    pub updated: String,
    pub lastdraw_date: String,
    pub lastdraw_numbers: String,
    pub nextdraw_date: String,
    pub jackpot: Option<RawJackpot>,
}

#[derive(Deserialize, Debug)]
pub(crate) struct RawJackpot {
    #[serde(rename = "@date")]
    pub date: String,
    #[serde(rename = "$text")]
    pub amount: i64,
}

impl From<&RawStateProv> for StateProv {
    fn from(raw: &RawStateProv) -> Self {
        Self {
            id: raw.id.clone(),
            name: raw.name.clone(),
            country: raw.country.clone(),
        }
    }
}
