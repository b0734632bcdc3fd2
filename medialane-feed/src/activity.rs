use std::{
    cmp::Ordering,
    collections::HashSet,
    fmt,
    io::{Error, ErrorKind, Result},
    str::FromStr,
};

use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum ActivityKind {
    Mint,
    Transfer,
    Burn,
    Listing,
    Offer,
    Sale,
    Cancel,
}

impl ActivityKind {
    pub const ALL: [ActivityKind; 7] = [
        ActivityKind::Mint,
        ActivityKind::Transfer,
        ActivityKind::Burn,
        ActivityKind::Listing,
        ActivityKind::Offer,
        ActivityKind::Sale,
        ActivityKind::Cancel,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ActivityKind::Mint => "mint",
            ActivityKind::Transfer => "transfer",
            ActivityKind::Burn => "burn",
            ActivityKind::Listing => "listing",
            ActivityKind::Offer => "offer",
            ActivityKind::Sale => "sale",
            ActivityKind::Cancel => "cancel",
        }
    }
}

impl fmt::Display for ActivityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl FromStr for ActivityKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        ActivityKind::ALL
            .into_iter()
            .find(|kind| kind.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| {
                Error::new(
                    ErrorKind::InvalidInput,
                    format!("unknown activity type: {:?}", s),
                )
            })
    }
}

/// A decoded on-chain event as shown in the activity feed.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Activity {
    /// `<tx_hash>-<event index within the tx>`.
    pub id: String,
    #[serde(rename = "type")]
    pub kind: ActivityKind,
    pub asset_name: String,
    pub user: String,
    pub details: String,
    pub tx_hash: String,
    /// Unix seconds of the block that emitted the event.
    pub timestamp: u64,
    #[serde(default)]
    pub block_number: u64,
    #[serde(default)]
    pub contract: String,
}

impl Activity {
    pub fn event_id(tx_hash: &str, index: usize) -> String {
        format!("{}-{}", tx_hash, index)
    }

    /// Feed order: newest first, ties broken by descending id so that page
    /// boundaries inside one timestamp stay stable.
    pub fn feed_order(a: &Activity, b: &Activity) -> Ordering {
        b.timestamp
            .cmp(&a.timestamp)
            .then_with(|| b.id.cmp(&a.id))
    }

    pub fn explorer_link(&self, explorer_url: &str) -> String {
        format!("{}/tx/{}", explorer_url.trim_end_matches('/'), self.tx_hash)
    }
}

pub fn sort_feed(activities: &mut [Activity]) {
    activities.sort_by(Activity::feed_order);
}

/// Appends the activities whose id is not loaded yet, keeping arrival order.
/// Returns how many were appended.
pub fn append_unique(loaded: &mut Vec<Activity>, incoming: Vec<Activity>) -> usize {
    let mut seen: HashSet<String> = loaded.iter().map(|a| a.id.clone()).collect();
    let before = loaded.len();
    for activity in incoming {
        if seen.insert(activity.id.clone()) {
            loaded.push(activity);
        } else {
            log::debug!("dropping duplicate activity {}", activity.id);
        }
    }
    loaded.len() - before
}

#[cfg(test)]
pub(crate) fn sample(n: usize) -> Vec<Activity> {
    (0..n)
        .map(|i| Activity {
            id: Activity::event_id(&format!("0x{:x}", 0x1000 + i), 0),
            kind: ActivityKind::ALL[i % ActivityKind::ALL.len()],
            asset_name: format!("Asset #{}", i),
            user: if i % 2 == 0 { "0xabc" } else { "0xdef" }.to_owned(),
            details: format!("event number {}", i),
            tx_hash: format!("0x{:x}", 0x1000 + i),
            // pairs share a timestamp to exercise tie-breaking
            timestamp: 1_700_000_000 - (i as u64 / 2) * 60,
            block_number: 500 - i as u64 / 2,
            contract: "0x123".to_owned(),
        })
        .collect()
}
