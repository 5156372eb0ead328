//! FlowStrands: a terminal chat client whose feed mirrors a hosted,
//! append-only `messages` collection, tagged by room number.
//!
//! [`session::SessionGate`] follows the identity provider's auth state and
//! decides which surface is showing; once a user is present it activates the
//! [`feed::FeedSynchronizer`], which renders the history and then the live
//! additions into the [`view::ChatView`] drawn by [`ui`].

pub mod app;
pub mod config;
pub mod context;
pub mod error;
pub mod feed;
pub mod logging;
pub mod nostr;
pub mod session;
pub mod ui;
pub mod view;
