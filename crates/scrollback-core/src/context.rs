//! Context expansion around a single message.

use crate::store::Store;
use crate::{Result, ScrollbackError};
use scrollback_types::MessageContext;

/// A message with up to `before` preceding and `after` following messages
/// from the same session, both lists oldest first.
///
/// Windows are clipped at the session boundaries.
pub fn message_with_context(
    store: &Store,
    message_id: &str,
    before: usize,
    after: usize,
) -> Result<MessageContext> {
    let message = store
        .get_message(message_id)?
        .ok_or_else(|| ScrollbackError::MessageNotFound(message_id.to_string()))?;

    let before = if before == 0 {
        Vec::new()
    } else {
        store.messages_before(&message.session_id, message.sequence_num, before)?
    };
    let after = if after == 0 {
        Vec::new()
    } else {
        store.messages_after(&message.session_id, message.sequence_num, after)?
    };

    Ok(MessageContext {
        message,
        before,
        after,
    })
}
