//! Column layout shared by the CSV sinks and the curator.
//!
//! Feature columns follow the CMU keystroke-dynamics naming convention:
//! `H.<k>` for the hold time of key `k`, `DD.<a>.<b>` and `UD.<a>.<b>` for the
//! down-down and up-down times of digraph `a b`. Keys are named as they appear
//! on the keyboard: `period`, digit words (`five`), `Shift.r` for an upper-case
//! `R`.

use crate::core::features::feature_len;
use serde::{Deserialize, Serialize};

/// Name of the participant column (first column).
pub const USER_COLUMN: &str = "User";

/// Name of the label column (last column).
pub const LABEL_COLUMN: &str = "target";

const DIGIT_WORDS: [&str; 10] = [
    "zero", "one", "two", "three", "four", "five", "six", "seven", "eight", "nine",
];

const SYMBOL_NAMES: &[(char, &str)] = &[
    ('.', "period"),
    (',', "comma"),
    (' ', "space"),
    ('-', "minus"),
    ('_', "underscore"),
    ('+', "plus"),
    ('=', "equal"),
    ('!', "exclam"),
    ('@', "at"),
    ('#', "numbersign"),
    ('$', "dollar"),
    ('%', "percent"),
    ('&', "ampersand"),
    ('*', "asterisk"),
    ('/', "slash"),
    ('?', "question"),
    (':', "colon"),
    (';', "semicolon"),
];

/// Column name of a single password character.
pub fn key_column_name(c: char) -> String {
    if let Some(d) = c.to_digit(10) {
        return DIGIT_WORDS[d as usize].to_string();
    }
    if c.is_ascii_uppercase() {
        return format!("Shift.{}", c.to_ascii_lowercase());
    }
    SYMBOL_NAMES
        .iter()
        .find(|(symbol, _)| *symbol == c)
        .map(|(_, name)| name.to_string())
        .unwrap_or_else(|| c.to_string())
}

/// Ordered feature columns for one target password.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureSchema {
    columns: Vec<String>,
}

impl FeatureSchema {
    /// Derive the feature columns for a password, one key per character.
    pub fn for_password(password: &str) -> Self {
        let keys: Vec<String> = password.chars().map(key_column_name).collect();

        let mut columns = Vec::with_capacity(feature_len(keys.len()));
        for pair in keys.windows(2) {
            columns.push(format!("H.{}", pair[0]));
            columns.push(format!("DD.{}.{}", pair[0], pair[1]));
            columns.push(format!("UD.{}.{}", pair[0], pair[1]));
        }
        if let Some(last) = keys.last() {
            columns.push(format!("H.{last}"));
        }

        Self { columns }
    }

    /// Schema from explicit feature column names.
    pub fn from_columns(columns: Vec<String>) -> Self {
        Self { columns }
    }

    pub fn feature_columns(&self) -> &[String] {
        &self.columns
    }

    pub fn feature_count(&self) -> usize {
        self.columns.len()
    }

    /// Full header row: user, features, label.
    pub fn header(&self) -> Vec<String> {
        std::iter::once(USER_COLUMN.to_string())
            .chain(self.columns.iter().cloned())
            .chain(std::iter::once(LABEL_COLUMN.to_string()))
            .collect()
    }

    /// Whether a header row starts with this schema's user and feature
    /// columns.
    pub fn is_prefix_of(&self, header: &[String]) -> bool {
        header.len() >= self.columns.len() + 1
            && header[0].eq_ignore_ascii_case(USER_COLUMN)
            && header[1..=self.columns.len()] == self.columns[..]
    }
}
