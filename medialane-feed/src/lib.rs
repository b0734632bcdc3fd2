//! Activity feed for the Medialane IP marketplace on Starknet.
//!
//! An [`EventSource`](source::EventSource) pages through on-chain activity,
//! a [`FeedSession`](session::FeedSession) sequences fetches and applies the
//! debounced search and type filters, and [`view::render`] turns the
//! session's view-state into what a UI shows.

pub mod activity;
pub mod api;
pub mod config;
pub mod debounce;
pub mod decode;
pub mod error;
pub mod felt;
pub mod filter;
pub mod session;
pub mod source;
pub mod view;

pub use activity::{Activity, ActivityKind};
pub use config::Config;
pub use error::FeedError;
pub use filter::{filter, TypeFilter};
pub use session::{FeedSession, FetchOutcome, Phase, SessionOptions, ViewState};
pub use source::{Cursor, EventSource, MemorySource, Page, RpcSource, Scope};
