//! Inventory entries and their single-line text encoding.
//!
//! ```text
//! name;type;expiration;key1=val1,key2=val2
//! ```
//!
//! The fourth segment may be empty or absent when the item carries no
//! attributes. An expiration `<= 0` means the item never expires.
use std::collections::BTreeMap;
use std::fmt;

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::neighbor::errors::NeighborError;

/// Expiration sentinel for items that never expire.
pub const NEVER_EXPIRES: i64 = -1;

/// Minimum similarity ratio for a key to be offered as a suggestion.
const SUGGESTION_RATIO: f64 = 0.5;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item {
    pub name: String,
    /// Category tag, e.g. "weapon" or "consumable".
    #[serde(rename = "type")]
    pub kind: String,
    /// Absolute unix timestamp in seconds.
    pub expiration: i64,
    #[serde(default)]
    pub values: BTreeMap<String, String>,
}

impl Item {
    pub fn new(name: impl Into<String>, kind: impl Into<String>, expiration: i64) -> Self {
        Self {
            name: name.into(),
            kind: kind.into(),
            expiration,
            values: BTreeMap::new(),
        }
    }

    pub fn never_expires(name: impl Into<String>, kind: impl Into<String>) -> Self {
        Self::new(name, kind, NEVER_EXPIRES)
    }

    pub fn with_value(mut self, attribute: impl Into<String>, value: impl Into<String>) -> Self {
        self.values.insert(attribute.into(), value.into());
        self
    }

    pub fn expires(&self) -> bool {
        self.expiration > 0
    }

    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now().timestamp())
    }

    pub fn is_expired_at(&self, now: i64) -> bool {
        self.expires() && self.expiration < now
    }

    /// Serialize to `name;type;expiration;k=v,...`.
    ///
    /// Quote characters and the line delimiters (`;`, `|`) are stripped from
    /// every field; `,` is also stripped from attribute keys and values, and
    /// `=` from keys. Values may keep `=` since entries split on the first one.
    pub fn encode(&self) -> String {
        let values = self
            .values
            .iter()
            .map(|(key, value)| {
                format!(
                    "{}={}",
                    strip(key, &[',', '=']),
                    strip(value, &[','])
                )
            })
            .collect::<Vec<_>>()
            .join(",");
        format!(
            "{};{};{};{}",
            strip(&self.name, &[]),
            strip(&self.kind, &[]),
            self.expiration,
            values
        )
    }

    pub fn decode(line: &str) -> Result<Self, NeighborError> {
        let fields: Vec<&str> = line.split(';').collect();
        if fields.len() < 3 {
            return Err(NeighborError::Format(format!(
                "item needs at least 3 fields, found {}",
                fields.len()
            )));
        }
        if fields.len() > 4 {
            return Err(NeighborError::Format(format!(
                "item has {} fields, expected at most 4",
                fields.len()
            )));
        }
        let name = fields[0];
        if name.is_empty() {
            return Err(NeighborError::Format("item name is empty".to_string()));
        }
        let expiration: i64 = fields[2].trim().parse().map_err(|_| {
            NeighborError::Format(format!("item expiration '{}' is not an integer", fields[2]))
        })?;

        let mut item = Item::new(name, fields[1], expiration);
        let blob = fields.get(3).copied().unwrap_or("");
        if !blob.is_empty() {
            for entry in blob.split(',') {
                let (key, value) = entry.split_once('=').ok_or_else(|| {
                    NeighborError::Format(format!("attribute entry '{entry}' has no '='"))
                })?;
                item.values.insert(key.to_string(), value.to_string());
            }
        }
        Ok(item)
    }

    pub fn get_value(&self, attribute: &str) -> Result<&str, NeighborError> {
        self.values
            .get(attribute)
            .map(String::as_str)
            .ok_or_else(|| self.missing(attribute))
    }

    /// Replace the value of an existing attribute. Unknown attributes are an error.
    pub fn update_value(
        &mut self,
        attribute: &str,
        value: impl Into<String>,
    ) -> Result<(), NeighborError> {
        if !self.values.contains_key(attribute) {
            return Err(self.missing(attribute));
        }
        self.values.insert(attribute.to_string(), value.into());
        Ok(())
    }

    pub fn add_value(&mut self, attribute: impl Into<String>, value: impl Into<String>) {
        self.values.insert(attribute.into(), value.into());
    }

    fn missing(&self, attribute: &str) -> NeighborError {
        let suggestions = self
            .values
            .keys()
            .filter(|key| similarity_ratio(key, attribute) > SUGGESTION_RATIO)
            .cloned()
            .collect();
        NeighborError::NotFound {
            attribute: attribute.to_string(),
            suggestions,
        }
    }
}

impl fmt::Display for Item {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.expires() {
            return write!(f, "{}; expires never... probably", self.name);
        }
        let remaining = self.expiration - Utc::now().timestamp();
        if remaining < 0 {
            write!(f, "{}; expired", self.name)
        } else {
            write!(f, "{}; expires in {}", self.name, format_remaining(remaining))
        }
    }
}

/// Characters removed from every encoded field.
const ALWAYS_STRIPPED: [char; 4] = ['\'', '"', ';', '|'];

fn strip(text: &str, extra: &[char]) -> String {
    text.chars()
        .filter(|c| !ALWAYS_STRIPPED.contains(c) && !extra.contains(c))
        .collect()
}

fn format_remaining(seconds: i64) -> String {
    let days = seconds / 86_400;
    let hours = (seconds % 86_400) / 3_600;
    let minutes = (seconds % 3_600) / 60;
    let secs = seconds % 60;
    if days > 0 {
        format!("{days}d {hours}h {minutes}m {secs}s")
    } else if hours > 0 {
        format!("{hours}h {minutes}m {secs}s")
    } else if minutes > 0 {
        format!("{minutes}m {secs}s")
    } else {
        format!("{secs}s")
    }
}

/// Normalized edit-distance similarity in `[0, 1]`; 1.0 means identical.
fn similarity_ratio(a: &str, b: &str) -> f64 {
    let longest = a.chars().count().max(b.chars().count());
    if longest == 0 {
        return 1.0;
    }
    1.0 - levenshtein(a, b) as f64 / longest as f64
}

fn levenshtein(a: &str, b: &str) -> usize {
    let b: Vec<char> = b.chars().collect();
    let mut row: Vec<usize> = (0..=b.len()).collect();
    for (i, ca) in a.chars().enumerate() {
        let mut diagonal = row[0];
        row[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let above = row[j + 1];
            let cost = usize::from(ca != *cb);
            row[j + 1] = (above + 1).min(row[j] + 1).min(diagonal + cost);
            diagonal = above;
        }
    }
    row[b.len()]
}
