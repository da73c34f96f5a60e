//! # View Module
//!
//! Snapshot of what a picker shows: the options, the highlighted row, the
//! committed label and why the list may be empty.
//!
//! Empty, unsupported and failed lists all read "No results found" in the
//! text rendering. The distinction survives in [`ListStatus`] for callers
//! that want to surface it.

use crate::controller::DropdownState;
use crate::{QueryContext, SelectOption};
use serde::{Deserialize, Serialize};

/// Text shown in place of options when the list is empty.
pub const NO_RESULTS: &str = "No results found";

/// Why the list looks the way it does.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ListStatus {
    /// Nothing requested yet.
    #[default]
    Idle,
    /// A fetch for the shown list is in flight.
    Loading,
    /// The last fetch returned options.
    Ready,
    /// The last fetch returned zero options.
    Empty,
    /// The collection has no registered fetcher.
    Unsupported,
    /// The backend failed.
    Failed,
}

impl ListStatus {
    /// Whether this status renders as "No results found".
    #[must_use]
    pub fn reads_as_no_results(self) -> bool {
        matches!(self, Self::Empty | Self::Unsupported | Self::Failed)
    }
}

/// A rendered picker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListView {
    pub context: QueryContext,
    pub state: DropdownState,
    pub status: ListStatus,
    /// Raw text in the search box.
    pub search_input: String,
    /// True when `items` are transient search results, not the cached pages.
    pub showing_search: bool,
    pub items: Vec<SelectOption>,
    pub highlighted: Option<usize>,
    pub selected: Option<SelectOption>,
    pub has_more: bool,
}

impl ListView {
    /// Label of the committed selection.
    #[must_use]
    pub fn label(&self) -> Option<&str> {
        self.selected.as_ref().map(|o| o.name.as_str())
    }

    #[must_use]
    pub fn is_open(&self) -> bool {
        self.state.is_open()
    }

    /// Option under the keyboard cursor.
    #[must_use]
    pub fn highlighted_option(&self) -> Option<&SelectOption> {
        self.highlighted.and_then(|i| self.items.get(i))
    }

    /// Format as plain text.
    #[must_use]
    pub fn to_text(&self) -> String {
        let mut output = String::new();

        output.push_str("┌─────────────────────────────────────┐\n");
        output.push_str(&format!("│ {} [{}]\n", self.context, self.state));
        output.push_str(&format!(
            "│ Selected: {}\n",
            self.label().unwrap_or("(none)")
        ));
        if !self.search_input.is_empty() {
            output.push_str(&format!("│ Search: \"{}\"\n", self.search_input));
        }

        if self.is_open() {
            output.push_str("├─────────────────────────────────────┤\n");
            if self.items.is_empty() {
                if self.status == ListStatus::Loading || self.state.is_loading() {
                    output.push_str("│ Loading...\n");
                } else {
                    output.push_str(&format!("│ {}\n", NO_RESULTS));
                }
            } else {
                for (i, item) in self.items.iter().enumerate() {
                    let marker = if self.highlighted == Some(i) { '>' } else { ' ' };
                    output.push_str(&format!("│ {} {} [{}]\n", marker, item.name, item.id));
                }
                if self.state == DropdownState::OpenLoadingMore {
                    output.push_str("│ Loading more...\n");
                } else if self.has_more {
                    output.push_str("│ ... scroll for more\n");
                }
            }
        }

        output.push_str("└─────────────────────────────────────┘\n");

        output
    }
}

// =============================================================================
// TESTS
// =============================================================================
