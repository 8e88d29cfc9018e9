/// Core error type for the handoff plugin.
///
/// Adapter crates map their specific errors into this type so the dispatcher
/// can branch on typed outcomes (transport vs. application-level rejection).
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("config error: {0}")]
    Config(String),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("unexpected http status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("api error {errcode}: {errmsg}")]
    Api { errcode: i64, errmsg: String },

    #[error("malformed response: {0}")]
    Decode(String),

    #[error("host error: {0}")]
    Host(String),
}

impl Error {
    /// Application-level error code, when the remote API returned one.
    pub fn errcode(&self) -> Option<i64> {
        match self {
            Error::Api { errcode, .. } => Some(*errcode),
            _ => None,
        }
    }

    /// True for failures below the application layer (connect, timeout, bad status, bad body).
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            Error::Transport(_) | Error::Status { .. } | Error::Decode(_) | Error::Json(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, Error>;
