/// Inbound user message as handed over by the host.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IncomingMessage {
    /// Platform-specific sender id; the session id is embedded in it.
    pub sender_id: String,
    pub text: String,
}

impl IncomingMessage {
    pub fn new(sender_id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            sender_id: sender_id.into(),
            text: text.into(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Component {
    Plain(String),
}

/// Structured outgoing message.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MessageChain {
    pub components: Vec<Component>,
}

impl MessageChain {
    pub fn new(components: Vec<Component>) -> Self {
        Self { components }
    }

    /// Convenience for the single-text-segment case.
    pub fn plain(text: impl Into<String>) -> Self {
        Self::new(vec![Component::Plain(text.into())])
    }

    /// Concatenated text of all plain components.
    pub fn to_plain_text(&self) -> String {
        self.components
            .iter()
            .map(|c| match c {
                Component::Plain(s) => s.as_str(),
            })
            .collect()
    }
}
