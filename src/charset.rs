//! Charset decoding for feed documents.
//!
//! The feed declares its encoding in the XML declaration. `Charsets` maps
//! declared labels to decoders so new encodings can be supported without
//! touching the parser.

use encoding_rs::Encoding;
use std::borrow::Cow;
use std::collections::HashMap;

use crate::error::{FeedError, Result};

/// Label used when a document does not declare an encoding.
pub const DEFAULT_CHARSET: &str = "UTF-8";

#[derive(Debug, Clone, Copy)]
enum Decoder {
    /// ISO-8859-1 proper: every byte maps to the code point of the same value.
    Latin1,
    Encoding(&'static Encoding),
}

impl Decoder {
    fn decode<'a>(self, input: &'a [u8]) -> Option<Cow<'a, str>> {
        match self {
            Decoder::Latin1 => Some(encoding_rs::mem::decode_latin1(input)),
            Decoder::Encoding(encoding) => {
                encoding.decode_without_bom_handling_and_without_replacement(input)
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct Charsets {
    decoders: HashMap<String, Decoder>,
}

impl Default for Charsets {
    fn default() -> Self {
        let mut charsets = Self::empty();
        charsets.register("UTF-8", encoding_rs::UTF_8);
        // encoding_rs would map these labels to windows-1252, which differs
        // in 0x80..=0x9F.
        charsets.insert("ISO-8859-1", Decoder::Latin1);
        charsets.insert("latin1", Decoder::Latin1);
        charsets
    }
}

impl Charsets {
    pub fn empty() -> Self {
        Self {
            decoders: HashMap::new(),
        }
    }

    /// Register `encoding` under `label`. Labels are case-insensitive.
    pub fn register(&mut self, label: &str, encoding: &'static Encoding) -> &mut Self {
        self.insert(label, Decoder::Encoding(encoding))
    }

    fn insert(&mut self, label: &str, decoder: Decoder) -> &mut Self {
        self.decoders.insert(label.to_ascii_lowercase(), decoder);
        self
    }

    pub fn supports(&self, label: &str) -> bool {
        self.decoders.contains_key(&label.to_ascii_lowercase())
    }

    /// Decode `input` using the charset named `label`.
    pub fn decode<'a>(&self, label: &str, input: &'a [u8]) -> Result<Cow<'a, str>> {
        let decoder = self
            .decoders
            .get(&label.to_ascii_lowercase())
            .ok_or_else(|| FeedError::Decode(format!("unsupported charset: {}", label)))?;

        decoder
            .decode(input)
            .ok_or_else(|| FeedError::Decode(format!("input is not valid {}", label)))
    }
}
