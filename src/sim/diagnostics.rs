//! Per-evaluation runtime messages.
//!
//! Every message is also forwarded to the `log` facade, so hosts that only
//! install a logger still see them.

use std::fmt;

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Level {
    /// Informational note (counters, totals, parameters).
    Remark,
    /// Non-fatal problem; the evaluation continues with fallbacks.
    Warning,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Message {
    pub level: Level,
    pub text: String,
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = match self.level {
            Level::Remark => "remark",
            Level::Warning => "warning",
        };
        write!(f, "[{tag}] {}", self.text)
    }
}

/// Messages collected during one evaluation.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Diagnostics {
    messages: Vec<Message>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn remark(&mut self, text: impl Into<String>) {
        let text = text.into();
        log::debug!("{text}");
        self.messages.push(Message {
            level: Level::Remark,
            text,
        });
    }

    pub fn warning(&mut self, text: impl Into<String>) {
        let text = text.into();
        log::warn!("{text}");
        self.messages.push(Message {
            level: Level::Warning,
            text,
        });
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn warnings(&self) -> impl Iterator<Item = &Message> {
        self.messages.iter().filter(|m| m.level == Level::Warning)
    }

    pub fn warning_count(&self) -> usize {
        self.warnings().count()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}
