use async_trait::async_trait;

use crate::{messaging::types::MessageChain, Result};

/// Port onto the chat platform host that delivered the current event.
///
/// One value is bound to one inbound event: `reply` answers the session that
/// sent it, and `prevent_default` stops the host from running its default bot
/// handling for that event.
#[async_trait]
pub trait HostContext: Send + Sync {
    async fn reply(&self, chain: MessageChain) -> Result<()>;

    fn prevent_default(&self);
}
