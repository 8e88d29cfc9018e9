use std::{env, time::Duration};

use chrono::NaiveTime;

use crate::{domain::AppCredentials, errors::Error, Result};

pub const DEFAULT_API_BASE: &str = "https://qyapi.weixin.qq.com/cgi-bin";

const OPENING_HOURS: &str = "人工客服在线时间为 每周一至周日 08:30-23:59，若有使用问题，\
您可以先留言，我们上线后会第一时间为您解答！";

/// What to do when the proactive state query fails.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum UnknownStatePolicy {
    /// Continue with the keyword / time-of-day policy.
    #[default]
    FallThrough,
    /// Treat the session as human-handled and stay silent.
    Suppress,
}

impl UnknownStatePolicy {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "fall_through" | "fallthrough" | "act" => Some(Self::FallThrough),
            "suppress" | "ignore" => Some(Self::Suppress),
            _ => None,
        }
    }
}

/// User-visible copy sent back to the session.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Notices {
    pub image_night: String,
    pub image_day: String,
    pub keyword_night: String,
    pub system_busy: String,
    pub transfer_failed: String,
    pub network_error: String,
}

impl Default for Notices {
    fn default() -> Self {
        Self {
            image_night: format!(
                "智能客服暂不支持处理文字外的信息，且人工客服暂时未在线哦～\n{OPENING_HOURS}"
            ),
            image_day: "智能客服无法处理文字以外的信息，已帮您转入人工服务，请稍等。".to_string(),
            keyword_night: OPENING_HOURS.to_string(),
            system_busy: "系统繁忙，转接失败，请稍后再试".to_string(),
            transfer_failed: "转接失败，请稍后重试".to_string(),
            network_error: "网络异常，请稍后重试".to_string(),
        }
    }
}

/// Typed configuration for the handoff plugin.
#[derive(Clone, Debug)]
pub struct Config {
    // Customer-service account
    pub open_kfid: String,
    pub credentials: AppCredentials,
    pub api_base: String,

    // Behavior flags
    pub state_check: bool,
    pub unknown_state_policy: UnknownStatePolicy,
    pub night_end: NaiveTime,
    pub trigger_keywords: Vec<String>,
    pub image_placeholder: String,
    pub notices: Notices,

    // Runtime constants
    pub token_ttl: Duration,
    pub http_timeout: Duration,
}

impl Config {
    /// Defaults for everything except the account identity.
    pub fn new(open_kfid: impl Into<String>, credentials: AppCredentials) -> Self {
        Self {
            open_kfid: open_kfid.into(),
            credentials,
            api_base: DEFAULT_API_BASE.to_string(),
            state_check: false,
            unknown_state_policy: UnknownStatePolicy::default(),
            night_end: default_night_end(),
            trigger_keywords: vec!["转人工".to_string(), "找客服".to_string()],
            image_placeholder: "[图片]".to_string(),
            notices: Notices::default(),
            token_ttl: Duration::from_secs(7000),
            http_timeout: Duration::from_millis(10_000),
        }
    }

    /// Load from the process environment (after merging `./.env`).
    pub fn load() -> Result<Self> {
        // A missing .env is fine; existing variables win.
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build a config from an arbitrary key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let get = |key: &str| lookup(key).and_then(non_empty);

        // Required
        let open_kfid = require(get("KFH_OPEN_KFID"), "KFH_OPEN_KFID")?;
        let corp_id = require(get("KFH_CORP_ID"), "KFH_CORP_ID")?;
        let secret = require(get("KFH_CORP_SECRET"), "KFH_CORP_SECRET")?;

        let mut cfg = Self::new(open_kfid, AppCredentials { corp_id, secret });

        if let Some(base) = get("KFH_API_BASE") {
            cfg.api_base = base.trim_end_matches('/').to_string();
        }

        if let Some(v) = get("KFH_STATE_CHECK") {
            cfg.state_check = parse_bool(&v)
                .ok_or_else(|| invalid("KFH_STATE_CHECK", &v, "expected a boolean"))?;
        }
        if let Some(v) = get("KFH_UNKNOWN_STATE_POLICY") {
            cfg.unknown_state_policy = UnknownStatePolicy::parse(&v).ok_or_else(|| {
                invalid(
                    "KFH_UNKNOWN_STATE_POLICY",
                    &v,
                    "expected fall_through or suppress",
                )
            })?;
        }
        if let Some(v) = get("KFH_NIGHT_END") {
            cfg.night_end = NaiveTime::parse_from_str(v.trim(), "%H:%M")
                .map_err(|_| invalid("KFH_NIGHT_END", &v, "expected HH:MM"))?;
        }
        if let Some(v) = get("KFH_TRIGGER_KEYWORDS") {
            let keywords = parse_csv(&v);
            if keywords.is_empty() {
                return Err(invalid("KFH_TRIGGER_KEYWORDS", &v, "no keywords"));
            }
            cfg.trigger_keywords = keywords;
        }
        if let Some(v) = get("KFH_IMAGE_PLACEHOLDER") {
            cfg.image_placeholder = v;
        }

        if let Some(v) = get("KFH_TOKEN_TTL_SECS") {
            let secs = parse_u64(&v)
                .ok_or_else(|| invalid("KFH_TOKEN_TTL_SECS", &v, "expected seconds"))?;
            if secs == 0 {
                return Err(invalid("KFH_TOKEN_TTL_SECS", &v, "must be positive"));
            }
            cfg.token_ttl = Duration::from_secs(secs);
        }
        if let Some(v) = get("KFH_HTTP_TIMEOUT_MS") {
            let ms = parse_u64(&v)
                .ok_or_else(|| invalid("KFH_HTTP_TIMEOUT_MS", &v, "expected milliseconds"))?;
            cfg.http_timeout = Duration::from_millis(ms);
        }

        Ok(cfg)
    }
}

fn default_night_end() -> NaiveTime {
    NaiveTime::from_hms_opt(8, 30, 0).unwrap_or_default()
}

fn require(v: Option<String>, key: &str) -> Result<String> {
    v.ok_or_else(|| Error::Config(format!("{key} environment variable is required")))
}

fn invalid(key: &str, value: &str, reason: &str) -> Error {
    Error::Config(format!("invalid {key}={value:?}: {reason}"))
}

fn parse_bool(s: &str) -> Option<bool> {
    match s.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn parse_u64(s: &str) -> Option<u64> {
    s.trim().parse::<u64>().ok()
}

fn parse_csv(s: &str) -> Vec<String> {
    s.split(',')
        .map(|p| p.trim())
        .filter(|p| !p.is_empty())
        .map(|p| p.to_string())
        .collect()
}

fn non_empty(s: String) -> Option<String> {
    if s.trim().is_empty() {
        None
    } else {
        Some(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |k: &str| map.get(k).cloned()
    }

    const REQUIRED: [(&str, &str); 3] = [
        ("KFH_OPEN_KFID", "wkABC"),
        ("KFH_CORP_ID", "ww123"),
        ("KFH_CORP_SECRET", "s3cret"),
    ];

    #[test]
    fn defaults_apply_when_only_required_set() {
        let cfg = Config::from_lookup(lookup(&REQUIRED)).unwrap();
        assert_eq!(cfg.open_kfid, "wkABC");
        assert_eq!(cfg.credentials.corp_id, "ww123");
        assert_eq!(cfg.api_base, DEFAULT_API_BASE);
        assert!(!cfg.state_check);
        assert_eq!(cfg.unknown_state_policy, UnknownStatePolicy::FallThrough);
        assert_eq!(cfg.night_end, NaiveTime::from_hms_opt(8, 30, 0).unwrap());
        assert_eq!(cfg.trigger_keywords, vec!["转人工", "找客服"]);
        assert_eq!(cfg.image_placeholder, "[图片]");
        assert_eq!(cfg.token_ttl, Duration::from_secs(7000));
    }

    #[test]
    fn missing_secret_is_config_error() {
        let err = Config::from_lookup(lookup(&REQUIRED[..2])).unwrap_err();
        assert!(matches!(err, Error::Config(ref m) if m.contains("KFH_CORP_SECRET")));
    }

    #[test]
    fn overrides_are_parsed() {
        let mut pairs = REQUIRED.to_vec();
        pairs.extend([
            ("KFH_API_BASE", "http://127.0.0.1:9000/cgi-bin/"),
            ("KFH_STATE_CHECK", "yes"),
            ("KFH_UNKNOWN_STATE_POLICY", "suppress"),
            ("KFH_NIGHT_END", "09:15"),
            ("KFH_TRIGGER_KEYWORDS", "人工, agent ,,"),
            ("KFH_TOKEN_TTL_SECS", "600"),
            ("KFH_HTTP_TIMEOUT_MS", "2500"),
        ]);
        let cfg = Config::from_lookup(lookup(&pairs)).unwrap();
        assert_eq!(cfg.api_base, "http://127.0.0.1:9000/cgi-bin");
        assert!(cfg.state_check);
        assert_eq!(cfg.unknown_state_policy, UnknownStatePolicy::Suppress);
        assert_eq!(cfg.night_end, NaiveTime::from_hms_opt(9, 15, 0).unwrap());
        assert_eq!(cfg.trigger_keywords, vec!["人工", "agent"]);
        assert_eq!(cfg.token_ttl, Duration::from_secs(600));
        assert_eq!(cfg.http_timeout, Duration::from_millis(2500));
    }

    #[test]
    fn bad_values_are_rejected() {
        for (key, value) in [
            ("KFH_STATE_CHECK", "maybe"),
            ("KFH_NIGHT_END", "8.30"),
            ("KFH_UNKNOWN_STATE_POLICY", "whatever"),
            ("KFH_TOKEN_TTL_SECS", "-1"),
            ("KFH_TOKEN_TTL_SECS", "0"),
            ("KFH_TRIGGER_KEYWORDS", " , "),
        ] {
            let mut pairs = REQUIRED.to_vec();
            pairs.push((key, value));
            assert!(
                Config::from_lookup(lookup(&pairs)).is_err(),
                "{key}={value} should fail"
            );
        }
    }
}
