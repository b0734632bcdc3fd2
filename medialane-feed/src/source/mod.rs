//! Event source adapters: paginated, read-only access to activity records.

pub mod memory;
pub mod rpc;

use std::{fmt, io::Result};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::{activity::Activity, felt};

pub use memory::MemorySource;
pub use rpc::RpcSource;

/// Which activities a feed shows.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub enum Scope {
    #[default]
    Global,
    /// Normalized wallet address.
    Wallet(String),
}

impl Scope {
    pub fn wallet(address: &str) -> Result<Self> {
        Ok(Scope::Wallet(felt::normalize(address)?))
    }

    pub fn matches(&self, activity: &Activity) -> bool {
        match self {
            Scope::Global => true,
            Scope::Wallet(address) => felt::normalize(&activity.user)
                .map(|user| user == *address)
                .unwrap_or(false),
        }
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scope::Global => f.write_str("global"),
            Scope::Wallet(address) => write!(f, "wallet {}", address),
        }
    }
}

/// Opaque pagination token handed out by a source.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, Hash)]
pub struct Cursor(String);

impl Cursor {
    pub fn new(token: impl Into<String>) -> Self {
        Cursor(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Cursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One page of activities in feed order.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Page {
    pub activities: Vec<Activity>,
    /// `None` once the source is exhausted.
    pub next_cursor: Option<Cursor>,
}

#[async_trait]
pub trait EventSource: Send + Sync {
    /// Fetches up to `page_size` activities of `scope`, starting at `cursor`
    /// or at the newest activity when absent.
    async fn fetch(&self, scope: &Scope, page_size: usize, cursor: Option<&Cursor>)
        -> Result<Page>;
}

#[test]
fn test_scope_matches_normalized_user() {
    let activity = &crate::activity::sample(1)[0];
    assert!(Scope::Global.matches(activity));
    assert!(Scope::wallet("0x0ABC").unwrap().matches(activity));
    assert!(!Scope::wallet("0xdef").unwrap().matches(activity));
    assert!(Scope::wallet("alice").is_err());
    assert_eq!(Scope::wallet("0x0ABC").unwrap().to_string(), "wallet 0xabc");
}
