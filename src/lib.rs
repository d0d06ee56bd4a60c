//! Direct Line conversation client.
//!
//! Opens a conversation with a bot, posts user utterances as activities and
//! polls for the bot's activities, surfacing every outcome as a typed
//! [`directline::BotEvent`].
//!
//! See `DESIGN.md` for the architecture notes.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod chat;
pub mod config;
pub mod credentials;
pub mod directline;
pub mod logging;
