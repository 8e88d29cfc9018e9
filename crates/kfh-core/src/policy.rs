//! Pure message classification: session-id extraction, night window, and the
//! decision of whether (and how) to hand a message off to a human agent.

use chrono::NaiveTime;

use crate::{config::Config, domain::SessionId};

/// Marker that starts the external user id inside a platform sender id.
pub const SESSION_MARKER: &str = "wm";
/// Delimiter some hosts append to the sender id.
pub const SESSION_TRAILER: char = '!';

/// Extract the session id: everything from the marker to the end, minus one
/// trailing delimiter.
pub fn extract_session_id(sender_id: &str) -> Option<SessionId> {
    let idx = sender_id.find(SESSION_MARKER)?;
    let tail = &sender_id[idx..];
    let id = tail.strip_suffix(SESSION_TRAILER).unwrap_or(tail);
    Some(SessionId(id.to_string()))
}

/// Night is strictly before `night_end`.
pub fn is_night(now: NaiveTime, night_end: NaiveTime) -> bool {
    now < night_end
}

pub fn contains_trigger(text: &str, keywords: &[String]) -> bool {
    keywords.iter().any(|k| !k.is_empty() && text.contains(k.as_str()))
}

/// Which rule matched, for logs.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Trigger {
    Image,
    KeywordNight,
    KeywordDay,
}

/// What the dispatcher should do with a message.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Decision {
    /// Leave the message to downstream bot handling.
    Ignore,
    /// Optionally send `notice`, then transfer the session.
    Transfer {
        trigger: Trigger,
        notice: Option<String>,
    },
}

/// Apply the image / keyword / time-of-day rules in priority order.
pub fn decide(text: &str, now: NaiveTime, cfg: &Config) -> Decision {
    let night = is_night(now, cfg.night_end);

    if text == cfg.image_placeholder {
        let notice = if night {
            &cfg.notices.image_night
        } else {
            &cfg.notices.image_day
        };
        return Decision::Transfer {
            trigger: Trigger::Image,
            notice: Some(notice.clone()),
        };
    }

    if !contains_trigger(text, &cfg.trigger_keywords) {
        return Decision::Ignore;
    }

    if night {
        Decision::Transfer {
            trigger: Trigger::KeywordNight,
            notice: Some(cfg.notices.keyword_night.clone()),
        }
    } else {
        Decision::Transfer {
            trigger: Trigger::KeywordDay,
            notice: None,
        }
    }
}
