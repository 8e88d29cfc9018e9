//! Bot -> human handoff plugin.
//!
//! Per message: `RECEIVED -> {IGNORED | HUMAN_ENGAGED | NOTIFIED+TRANSFERRING}`
//! and a transfer ends in `TRANSFERRED` or `TRANSFER_FAILED`. Nothing survives
//! across messages except the shared [`TokenCache`].

use std::sync::Arc;

use chrono::{Local, NaiveTime};
use tracing::{debug, error, info, warn};

use crate::{
    config::{Config, UnknownStatePolicy},
    credentials::TokenCache,
    domain::{ServiceState, SessionId},
    errors::Error,
    messaging::{
        port::HostContext,
        types::{IncomingMessage, MessageChain},
    },
    policy::{decide, extract_session_id, Decision},
    ports::KfServiceApi,
};

/// `errcode`s meaning the access token itself is bad or expired.
const TOKEN_ERRCODES: [i64; 3] = [40001, 40014, 42001];

/// Why a transfer attempt did not go through.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TransferFailure {
    /// No access token could be obtained.
    Credentials,
    /// The API answered with a non-zero `errcode`.
    Rejected { errcode: i64, errmsg: String },
    /// Connect / timeout / bad status / undecodable body.
    Transport(String),
}

/// Terminal state of one inbound message.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Outcome {
    Ignored,
    HumanEngaged,
    Transferred,
    TransferFailed(TransferFailure),
}

impl Outcome {
    /// Whether default downstream handling was suppressed.
    pub fn is_consumed(&self) -> bool {
        !matches!(self, Outcome::Ignored)
    }
}

/// Token outcome of the state check, reused by the transfer of the same message.
enum CarriedToken {
    Valid(String),
    AuthFailed,
}

pub struct HandoffPlugin {
    cfg: Arc<Config>,
    api: Arc<dyn KfServiceApi>,
    tokens: Arc<TokenCache>,
}

impl HandoffPlugin {
    pub fn new(cfg: Arc<Config>, api: Arc<dyn KfServiceApi>, tokens: Arc<TokenCache>) -> Self {
        Self { cfg, api, tokens }
    }

    pub fn config(&self) -> &Config {
        &self.cfg
    }

    /// Handle a message using the host's local wall-clock time.
    pub async fn handle(&self, msg: &IncomingMessage, host: &dyn HostContext) -> Outcome {
        self.handle_at(msg, host, Local::now().time()).await
    }

    pub async fn handle_at(
        &self,
        msg: &IncomingMessage,
        host: &dyn HostContext,
        now: NaiveTime,
    ) -> Outcome {
        let Some(session) = extract_session_id(&msg.sender_id) else {
            warn!(sender_id = %msg.sender_id, "no session id in sender id, ignoring");
            return Outcome::Ignored;
        };

        let mut carried = None;
        if self.cfg.state_check {
            let (engaged, token) = self.check_state(&session).await;
            if engaged {
                debug!(session = %session, "human agent already engaged, staying silent");
                host.prevent_default();
                return Outcome::HumanEngaged;
            }
            carried = token;
        }

        match decide(&msg.text, now, &self.cfg) {
            Decision::Ignore => Outcome::Ignored,
            Decision::Transfer { trigger, notice } => {
                info!(session = %session, ?trigger, "handoff triggered");
                if let Some(text) = notice {
                    self.send(host, &text).await;
                }
                self.transfer_with(&session, host, carried).await
            }
        }
    }

    /// Move `session` to the human queue. Always suppresses default handling.
    pub async fn transfer(&self, session: &SessionId, host: &dyn HostContext) -> Outcome {
        self.transfer_with(session, host, None).await
    }

    async fn transfer_with(
        &self,
        session: &SessionId,
        host: &dyn HostContext,
        carried: Option<CarriedToken>,
    ) -> Outcome {
        let outcome = self.try_transfer(session, host, carried).await;
        host.prevent_default();
        outcome
    }

    async fn try_transfer(
        &self,
        session: &SessionId,
        host: &dyn HostContext,
        carried: Option<CarriedToken>,
    ) -> Outcome {
        let token = match carried {
            Some(CarriedToken::Valid(t)) => Some(t),
            // Already failed once for this message; the cache logged the cause.
            Some(CarriedToken::AuthFailed) => None,
            None => match self.tokens.get_token().await {
                Ok(t) => Some(t),
                Err(e) => {
                    error!(session = %session, error = %e, "access token unavailable");
                    None
                }
            },
        };
        let Some(token) = token else {
            error!(session = %session, "handoff aborted: no access token");
            self.send(host, &self.cfg.notices.system_busy).await;
            return Outcome::TransferFailed(TransferFailure::Credentials);
        };

        let res = self
            .api
            .transfer(&token, &self.cfg.open_kfid, session, ServiceState::Queued)
            .await;

        match res {
            Ok(()) => {
                info!(session = %session, "session handed off to human queue");
                Outcome::Transferred
            }
            Err(Error::Api { errcode, errmsg }) => {
                error!(session = %session, errcode, errmsg = %errmsg, "handoff rejected");
                self.forget_token_on(errcode).await;
                self.send(host, &self.cfg.notices.transfer_failed).await;
                Outcome::TransferFailed(TransferFailure::Rejected { errcode, errmsg })
            }
            Err(e) => {
                error!(session = %session, error = %e, "handoff request failed");
                self.send(host, &self.cfg.notices.network_error).await;
                Outcome::TransferFailed(TransferFailure::Transport(e.to_string()))
            }
        }
    }

    /// Proactive state check. Query failures resolve through the configured policy.
    ///
    /// Also returns the token outcome so a following transfer in the same
    /// message does not authenticate a second time.
    async fn check_state(&self, session: &SessionId) -> (bool, Option<CarriedToken>) {
        let (state, carried) = match self.tokens.get_token().await {
            Ok(token) => {
                let state = self
                    .api
                    .service_state(&token, &self.cfg.open_kfid, session)
                    .await;
                (state, Some(CarriedToken::Valid(token)))
            }
            Err(e) => (Err(e), Some(CarriedToken::AuthFailed)),
        };

        match state {
            Ok(s) => {
                debug!(session = %session, state = s.code(), "service state");
                (s.is_human_engaged(), carried)
            }
            Err(e) => {
                let mut carried = carried;
                if let Some(code) = e.errcode() {
                    if self.forget_token_on(code).await
                        && matches!(carried, Some(CarriedToken::Valid(_)))
                    {
                        // Token rejected by the state query: let the transfer fetch a fresh one.
                        carried = None;
                    }
                }
                let policy = self.cfg.unknown_state_policy;
                warn!(session = %session, error = %e, ?policy, "service state unknown");
                (policy == UnknownStatePolicy::Suppress, carried)
            }
        }
    }

    async fn forget_token_on(&self, errcode: i64) -> bool {
        if TOKEN_ERRCODES.contains(&errcode) {
            self.tokens.invalidate().await;
            return true;
        }
        false
    }

    async fn send(&self, host: &dyn HostContext, text: &str) {
        if let Err(e) = host.reply(MessageChain::plain(text)).await {
            warn!(error = %e, "reply failed");
        }
    }
}
