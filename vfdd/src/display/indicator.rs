/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Indicator catalogue and overlay register codec.
//!
//! The device exposes two attributes used here:
//!
//! * `dotled` – read-once catalogue, one lamp per line: `name enabled word bit`
//! * `overlay` – the raw lamp register as whitespace-separated 16-bit hex words

use tracing::{debug, warn};

/// Static description of one indicator lamp.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Indicator {
    pub name: String,
    /// Index of the overlay word holding this lamp.
    pub word: usize,
    /// Bit mask of the lamp within that word.
    pub mask: u16,
}

/// Parses the `dotled` catalogue.  Malformed lines are skipped.
pub fn parse_catalogue(text: &str) -> Vec<Indicator> {
    let mut out = Vec::new();

    for line in text.lines().filter(|l| !l.trim().is_empty()) {
        let fields: Vec<&str> = line.split_whitespace().collect();
        let parsed = match fields.as_slice() {
            [name, enabled, word, bit] => enabled
                .parse::<i64>()
                .ok()
                .and(word.parse::<usize>().ok())
                .zip(bit.parse::<u32>().ok().filter(|b| *b < 16))
                .map(|(word, bit)| Indicator {
                    name: name.to_string(),
                    word,
                    mask: 1 << bit,
                }),
            _ => None,
        };

        match parsed {
            Some(ind) => {
                debug!(
                    "  indicator [{}] word {} mask {:#06x}",
                    ind.name, ind.word, ind.mask
                );
                out.push(ind);
            }
            None => warn!("ignoring malformed indicator line '{}'", line),
        }
    }

    out
}

/// Parses the `overlay` attribute, stopping at the first non-hex token.
pub fn parse_overlay(text: &str) -> Vec<u16> {
    text.split_whitespace()
        .map_while(|tok| u16::from_str_radix(tok, 16).ok())
        .collect()
}

/// Formats overlay words the way the device expects them back.
pub fn format_overlay(words: &[u16]) -> String {
    words
        .iter()
        .map(|w| format!("{:04x}", w))
        .collect::<Vec<_>>()
        .join(" ")
}
