//! WeCom customer-service adapter.
//!
//! Implements the `kfh-core` [`KfServiceApi`] port over the `cgi-bin` HTTP API:
//! `gettoken`, `kf/service_state/get` and `kf/service_state/trans`.

use std::time::Duration;

use async_trait::async_trait;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tracing::debug;

use kfh_core::{
    config::Config,
    domain::{AccessToken, AppCredentials, ServiceState, SessionId},
    errors::Error,
    ports::KfServiceApi,
    Result,
};

/// Common `{errcode, errmsg}` envelope of every response.
#[derive(Debug, Deserialize)]
struct Envelope {
    errcode: Option<i64>,
    #[serde(default)]
    errmsg: String,
}

impl Envelope {
    fn check(&self) -> Result<()> {
        match self.errcode {
            Some(0) => Ok(()),
            Some(errcode) => Err(Error::Api {
                errcode,
                errmsg: self.errmsg.clone(),
            }),
            None => Err(Error::Decode("response has no errcode".to_string())),
        }
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    #[serde(flatten)]
    envelope: Envelope,
    access_token: Option<String>,
    expires_in: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct StateResponse {
    #[serde(flatten)]
    envelope: Envelope,
    service_state: Option<i64>,
}

#[derive(Debug, Serialize)]
struct StateQuery<'a> {
    open_kfid: &'a str,
    external_userid: &'a str,
}

#[derive(Debug, Serialize)]
struct StateTransfer<'a> {
    open_kfid: &'a str,
    external_userid: &'a str,
    service_state: i64,
}

#[derive(Clone, Debug)]
pub struct WecomClient {
    base_url: String,
    http: reqwest::Client,
}

impl WecomClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Config(format!("http client build failed: {e}")))?;
        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            http,
        })
    }

    pub fn from_config(cfg: &Config) -> Result<Self> {
        Self::new(cfg.api_base.clone(), cfg.http_timeout)
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{path}", self.base_url)
    }

    fn map_err(e: reqwest::Error) -> Error {
        if e.is_decode() {
            Error::Decode(format!("wecom response: {e}"))
        } else {
            Error::Transport(format!("wecom request error: {e}"))
        }
    }

    async fn read<T: DeserializeOwned>(resp: reqwest::Response) -> Result<T> {
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(Error::Status {
                status: status.as_u16(),
                body: body.chars().take(200).collect(),
            });
        }

        let bytes = resp.bytes().await.map_err(Self::map_err)?;
        serde_json::from_slice(&bytes).map_err(|e| Error::Decode(format!("wecom json: {e}")))
    }

    async fn post<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        path: &str,
        access_token: &str,
        body: &B,
    ) -> Result<T> {
        let resp = self
            .http
            .post(self.url(path))
            .query(&[("access_token", access_token)])
            .json(body)
            .send()
            .await
            .map_err(Self::map_err)?;
        Self::read(resp).await
    }
}

#[async_trait]
impl KfServiceApi for WecomClient {
    async fn fetch_token(&self, credentials: &AppCredentials) -> Result<AccessToken> {
        debug!(corp_id = %credentials.corp_id, "requesting access token");
        let resp = self
            .http
            .get(self.url("gettoken"))
            .query(&[
                ("corpid", credentials.corp_id.as_str()),
                ("corpsecret", credentials.secret.as_str()),
            ])
            .send()
            .await
            .map_err(Self::map_err)?;

        let body: TokenResponse = Self::read(resp).await?;
        body.envelope.check()?;

        let token = body
            .access_token
            .filter(|t| !t.trim().is_empty())
            .ok_or_else(|| Error::Decode("gettoken returned no access_token".to_string()))?;

        Ok(AccessToken {
            token,
            expires_in: body.expires_in,
        })
    }

    async fn service_state(
        &self,
        access_token: &str,
        open_kfid: &str,
        session: &SessionId,
    ) -> Result<ServiceState> {
        let body: StateResponse = self
            .post(
                "kf/service_state/get",
                access_token,
                &StateQuery {
                    open_kfid,
                    external_userid: session.as_str(),
                },
            )
            .await?;
        body.envelope.check()?;

        body.service_state
            .map(ServiceState::from_code)
            .ok_or_else(|| Error::Decode("service_state missing".to_string()))
    }

    async fn transfer(
        &self,
        access_token: &str,
        open_kfid: &str,
        session: &SessionId,
        target: ServiceState,
    ) -> Result<()> {
        debug!(session = %session, target = target.code(), "changing service state");
        let body: Envelope = self
            .post(
                "kf/service_state/trans",
                access_token,
                &StateTransfer {
                    open_kfid,
                    external_userid: session.as_str(),
                    service_state: target.code(),
                },
            )
            .await?;
        body.check()
    }
}
