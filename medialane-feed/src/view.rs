//! Presentation contract: what a UI shows for a given view-state.

use std::fmt;

use chrono::{TimeZone, Utc};

use crate::{activity::ActivityKind, felt, session::ViewState};

pub const EMPTY_MESSAGE: &str = "No activity yet.";
pub const EMPTY_FILTERED_MESSAGE: &str = "No activity matches your filters.";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Row {
    pub id: String,
    pub kind: ActivityKind,
    pub asset_name: String,
    pub user: String,
    pub details: String,
    pub when: String,
    pub tx_link: String,
}

/// State of the trailing "load more" trigger.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LoadMore {
    /// Nothing left to load.
    Hidden,
    /// Shown but disabled while a fetch is running.
    Busy,
    Enabled,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Body {
    Skeleton,
    Empty { message: &'static str },
    List { rows: Vec<Row>, load_more: LoadMore },
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Screen {
    pub body: Body,
    /// Inline, dismissible error notice.
    pub notice: Option<String>,
}

pub fn render(view: &ViewState, explorer_url: &str) -> Screen {
    let body = if view.loading && view.activities.is_empty() {
        Body::Skeleton
    } else if view.activities.is_empty() {
        Body::Empty {
            message: if view.has_active_filters {
                EMPTY_FILTERED_MESSAGE
            } else {
                EMPTY_MESSAGE
            },
        }
    } else {
        let load_more = if !view.has_more {
            LoadMore::Hidden
        } else if view.loading || view.loading_more {
            LoadMore::Busy
        } else {
            LoadMore::Enabled
        };
        let rows = view
            .activities
            .iter()
            .map(|a| Row {
                id: a.id.clone(),
                kind: a.kind,
                asset_name: a.asset_name.clone(),
                user: a.user.clone(),
                details: a.details.clone(),
                when: format_timestamp(a.timestamp),
                tx_link: a.explorer_link(explorer_url),
            })
            .collect();
        Body::List { rows, load_more }
    };

    Screen {
        body,
        notice: view.error.as_ref().map(|e| e.to_string()),
    }
}

fn format_timestamp(timestamp: u64) -> String {
    i64::try_from(timestamp)
        .ok()
        .and_then(|secs| Utc.timestamp_opt(secs, 0).single())
        .map(|time| time.format("%Y-%m-%d %H:%M UTC").to_string())
        .unwrap_or_else(|| timestamp.to_string())
}

impl fmt::Display for Screen {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(notice) = &self.notice {
            writeln!(f, "! {}", notice)?;
        }
        match &self.body {
            Body::Skeleton => writeln!(f, "Loading activity..."),
            Body::Empty { message } => writeln!(f, "{}", message),
            Body::List { rows, load_more } => {
                for row in rows {
                    writeln!(
                        f,
                        "{:<20} {:<9} {:<24} {:<14} {}",
                        row.when,
                        row.kind,
                        row.asset_name,
                        felt::short(&row.user),
                        row.details
                    )?;
                    writeln!(f, "{:<20} {}", "", row.tx_link)?;
                }
                match load_more {
                    LoadMore::Hidden => writeln!(f, "-- end of activity --"),
                    LoadMore::Busy => writeln!(f, "-- loading more... --"),
                    LoadMore::Enabled => writeln!(f, "-- more activity available --"),
                }
            }
        }
    }
}
