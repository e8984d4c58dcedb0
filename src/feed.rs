//! Feed document parsing.
//!
//! Turns the `allgames` XML document into a [`Snapshot`]. Games reported by
//! several jurisdictions for the same draw are merged into one record whose
//! location list follows document order. Any failure aborts the whole parse.

use quick_xml::Reader;
use quick_xml::events::Event;
use std::collections::btree_map::Entry;
use std::io::Read;
use tracing::debug;

use crate::charset::{Charsets, DEFAULT_CHARSET};
use crate::error::{FeedError, Result};
use crate::types::{Game, Jackpot, RawDocument, RawGame, Snapshot, StateProv, record_id};
use crate::utils::{parse_calendar_date, parse_feed_timestamp};

const ROOT_ELEMENT: &[u8] = b"allgames";

#[derive(Debug, Clone, Default)]
pub struct FeedParser {
    charsets: Charsets,
}

impl FeedParser {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_charsets(charsets: Charsets) -> Self {
        Self { charsets }
    }

    pub fn charsets_mut(&mut self) -> &mut Charsets {
        &mut self.charsets
    }

    pub fn parse(&self, input: &[u8]) -> Result<Snapshot> {
        let charset = declared_charset(input)?;
        let text = self.charsets.decode(&charset, input)?;
        check_root(&text)?;

        let doc: RawDocument = quick_xml::de::from_str(&text)?;
        let games = to_game_map(&doc)?;
        debug!(
            "Parsed {} games from {} jurisdictions ({})",
            games.len(),
            doc.states.len(),
            charset
        );
        Ok(games)
    }

    pub fn parse_reader<R: Read>(&self, mut reader: R) -> Result<Snapshot> {
        let mut input = Vec::new();
        reader
            .read_to_end(&mut input)
            .map_err(|e| FeedError::Malformed(format!("cannot read feed: {}", e)))?;
        self.parse(&input)
    }
}

/// Parse a feed document with the default charsets.
pub fn parse_xml(input: &[u8]) -> Result<Snapshot> {
    FeedParser::default().parse(input)
}

/// Read a feed document to the end and parse it with the default charsets.
pub fn parse_reader<R: Read>(reader: R) -> Result<Snapshot> {
    FeedParser::default().parse_reader(reader)
}

/// Encoding named by the XML declaration, UTF-8 when there is none.
fn declared_charset(input: &[u8]) -> Result<String> {
    let mut reader = Reader::from_reader(input);
    match reader.read_event() {
        Ok(Event::Decl(decl)) => match decl.encoding() {
            Some(Ok(label)) => Ok(String::from_utf8_lossy(&label).into_owned()),
            Some(Err(e)) => Err(FeedError::Malformed(format!(
                "invalid XML declaration: {}",
                e
            ))),
            None => Ok(DEFAULT_CHARSET.to_string()),
        },
        // Anything else is left for the document parser to reject.
        _ => Ok(DEFAULT_CHARSET.to_string()),
    }
}

fn check_root(text: &str) -> Result<()> {
    let mut reader = Reader::from_str(text);
    loop {
        match reader.read_event()? {
            Event::Start(e) | Event::Empty(e) => {
                if e.name().as_ref() == ROOT_ELEMENT {
                    return Ok(());
                }
                return Err(FeedError::Malformed(format!(
                    "expected root element <allgames>, found <{}>",
                    String::from_utf8_lossy(e.name().as_ref())
                )));
            }
            Event::Eof => {
                return Err(FeedError::Malformed("document has no root element".into()));
            }
            Event::End(_) => {
                return Err(FeedError::Malformed("unexpected closing tag".into()));
            }
            _ => {}
        }
    }
}

fn to_game(raw: &RawGame, state: StateProv) -> Result<Game> {
    let update_time = parse_feed_timestamp(&raw.updated)?;
    let last_draw_date = parse_calendar_date(&raw.lastdraw_date)?;
    let next_draw_date = parse_calendar_date(&raw.nextdraw_date)?;
    let jackpot = match &raw.jackpot {
        Some(jackpot) => Some(Jackpot {
            date: parse_calendar_date(&jackpot.date)?,
            amount: jackpot.amount,
        }),
        None => None,
    };

    Ok(Game {
        id: raw.id.clone(),
        name: raw.name.clone(),
        state_provs: vec![state],
        update_time,
        last_draw_date,
        last_draw_numbers: raw.lastdraw_numbers.clone(),
        next_draw_date,
        jackpot,
    })
}

fn to_game_map(doc: &RawDocument) -> Result<Snapshot> {
    let mut games = Snapshot::new();

    for state in &doc.states {
        for raw in &state.games {
            let id = record_id(&raw.id, &raw.lastdraw_date);
            let game = to_game(raw, StateProv::from(state))?;

            match games.entry(id) {
                Entry::Vacant(entry) => {
                    entry.insert(game);
                }
                Entry::Occupied(mut entry) => {
                    let existing = entry.get_mut();
                    if existing.last_draw_numbers != game.last_draw_numbers {
                        return Err(FeedError::Conflict {
                            game_id: game.id,
                        });
                    }
                    let mut state_provs = std::mem::take(&mut existing.state_provs);
                    state_provs.extend(game.state_provs);
                    *existing = Game {
                        state_provs,
                        ..game
                    };
                }
            }
        }
    }

    Ok(games)
}
