//! Renaming between storage columns and public field names

use std::collections::BTreeMap;

use crate::persistence::Row;

/// Which way keys are being renamed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Storage column -> public name
    Load,
    /// Public name -> storage column
    Save,
}

/// Renames the keys of `data` using `table` (public name -> storage column).
///
/// Keys absent from the table pass through unchanged.
pub fn translate_keys(data: Row, direction: Direction, table: &BTreeMap<String, String>) -> Row {
    if table.is_empty() {
        return data;
    }
    let lookup: BTreeMap<&str, &str> = match direction {
        Direction::Save => table.iter().map(|(p, s)| (p.as_str(), s.as_str())).collect(),
        Direction::Load => table.iter().map(|(p, s)| (s.as_str(), p.as_str())).collect(),
    };
    data.into_iter()
        .map(|(key, value)| match lookup.get(key.as_str()) {
            Some(renamed) => (renamed.to_string(), value),
            None => (key, value),
        })
        .collect()
}
