//! Shared types for the Scrollback transcript search index.

mod interaction;
mod message;
mod record;
mod search;
mod session;

pub use interaction::*;
pub use message::*;
pub use record::*;
pub use search::*;
pub use session::*;
