use async_trait::async_trait;

use crate::{
    domain::{AccessToken, AppCredentials, ServiceState, SessionId},
    Result,
};

/// Hexagonal port for the remote customer-service API.
///
/// Implementations return `Error::Api` for non-zero application error codes and
/// `Error::Transport` / `Error::Status` / `Error::Decode` for everything below that.
#[async_trait]
pub trait KfServiceApi: Send + Sync {
    /// Exchange app credentials for an access token.
    async fn fetch_token(&self, credentials: &AppCredentials) -> Result<AccessToken>;

    /// Current service state of a session.
    async fn service_state(
        &self,
        access_token: &str,
        open_kfid: &str,
        session: &SessionId,
    ) -> Result<ServiceState>;

    /// Move a session to `target`.
    async fn transfer(
        &self,
        access_token: &str,
        open_kfid: &str,
        session: &SessionId,
        target: ServiceState,
    ) -> Result<()>;
}
