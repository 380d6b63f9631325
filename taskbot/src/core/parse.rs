//! Keyword/alias parser turning a free-text instruction into a task.
//!
//! Matching is substring-based over lowercased, whitespace-normalized text.
//! Aliases are tried in table order; the first hit wins, so longer and more
//! specific aliases are listed ahead of shorter ones they contain.

use std::sync::LazyLock;

use regex::Regex;

use crate::core::locations::SHELF;
use crate::core::task::{Step, Task};

/// Goal label assigned to parsed tasks.
pub const PARSED_GOAL: &str = "tidy_table";
/// Object used when no alias matches.
pub const DEFAULT_OBJECT: &str = "red_mug";

static WHITESPACE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("whitespace pattern compiles"));

const OBJECT_ALIASES: &[(&str, &[&str])] = &[
    ("red_mug", &["red mug", "red cup", "mug", "cup"]),
    ("blue_block", &["blue block", "blue cube"]),
];

const LOCATION_ALIASES: &[(&str, &[&str])] = &[
    ("shelf_A", &["left shelf", "shelf a", "shelf"]),
    ("bin1", &["bin 1", "first bin", "bin one"]),
    ("table", &["table", "desk", "workbench"]),
];

/// Lowercase and collapse runs of whitespace to single spaces.
pub fn normalize(text: &str) -> String {
    WHITESPACE
        .replace_all(text.trim(), " ")
        .to_lowercase()
}

fn lookup(text: &str, table: &[(&'static str, &[&str])]) -> Option<&'static str> {
    table
        .iter()
        .find(|(_, aliases)| aliases.iter().any(|alias| text.contains(alias)))
        .map(|(canonical, _)| *canonical)
}

/// Canonical object named in `text`, if any alias matches.
pub fn match_object(text: &str) -> Option<&'static str> {
    lookup(&normalize(text), OBJECT_ALIASES)
}

/// Canonical location named in `text`, if any alias matches.
pub fn match_location(text: &str) -> Option<&'static str> {
    lookup(&normalize(text), LOCATION_ALIASES)
}

/// Build a perceive → grasp → place task from an instruction.
pub fn parse_instruction(text: &str) -> Task {
    let normalized = normalize(text);
    let object = lookup(&normalized, OBJECT_ALIASES).unwrap_or(DEFAULT_OBJECT);
    let location = lookup(&normalized, LOCATION_ALIASES).unwrap_or(SHELF);
    Task::new(
        PARSED_GOAL,
        vec![
            Step::perceive(object),
            Step::grasp(object),
            Step::place(location),
        ],
    )
}
