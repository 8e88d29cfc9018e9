//! Console host: one `<sender_id>\t<text>` event per stdin line.

use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::sync::Mutex;
use tracing::{info, warn};

use kfh_core::{
    errors::Error,
    handoff::HandoffPlugin,
    messaging::{
        port::HostContext,
        types::{IncomingMessage, MessageChain},
    },
    Result,
};

/// Host context for a single console event; replies go to stdout.
struct ConsoleEvent<'a> {
    out: &'a Mutex<tokio::io::Stdout>,
    prevented: AtomicBool,
}

#[async_trait]
impl HostContext for ConsoleEvent<'_> {
    async fn reply(&self, chain: MessageChain) -> Result<()> {
        let mut out = self.out.lock().await;
        for line in chain.to_plain_text().lines() {
            out.write_all(format!("> {line}\n").as_bytes()).await?;
        }
        out.flush().await?;
        Ok(())
    }

    fn prevent_default(&self) {
        self.prevented.store(true, Ordering::SeqCst);
    }
}

pub fn parse_line(line: &str) -> Option<IncomingMessage> {
    let (sender, text) = line.split_once('\t')?;
    let sender = sender.trim();
    if sender.is_empty() {
        return None;
    }
    Some(IncomingMessage::new(sender, text))
}

pub async fn run(plugin: &HandoffPlugin) -> Result<()> {
    let out = Mutex::new(tokio::io::stdout());
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    info!("reading <sender_id>\\t<text> events from stdin");
    while let Some(line) = lines.next_line().await.map_err(Error::Io)? {
        if line.trim().is_empty() {
            continue;
        }
        let Some(msg) = parse_line(&line) else {
            warn!(line = %line, "skipping malformed console event");
            continue;
        };

        let event = ConsoleEvent {
            out: &out,
            prevented: AtomicBool::new(false),
        };
        let outcome = plugin.handle(&msg, &event).await;
        info!(sender_id = %msg.sender_id, ?outcome, "event handled");

        if !event.prevented.load(Ordering::SeqCst) {
            let mut o = out.lock().await;
            o.write_all(b"[pass-through]\n").await?;
            o.flush().await?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_tab_separated_events() {
        let msg = parse_line("kf_wmA!\t我要转人工").unwrap();
        assert_eq!(msg.sender_id, "kf_wmA!");
        assert_eq!(msg.text, "我要转人工");

        // Text may itself contain tabs.
        assert_eq!(parse_line("wmA\ta\tb").unwrap().text, "a\tb");
    }

    #[test]
    fn rejects_lines_without_sender() {
        assert!(parse_line("no tab here").is_none());
        assert!(parse_line("  \thello").is_none());
    }
}
