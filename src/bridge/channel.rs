//! Channels the page may use to call back into the host

use serde::{Deserialize, Serialize};
use std::fmt;

/// Closed set of page-to-host channels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ChannelName {
    /// Diagnostic text from the page
    #[serde(rename = "log")]
    Log,
    /// Serialized post content, emitted by the extraction script
    #[serde(rename = "htmlPostContent")]
    HtmlPostContent,
}

impl ChannelName {
    /// Every channel, in registration order
    pub const ALL: [ChannelName; 2] = [ChannelName::Log, ChannelName::HtmlPostContent];

    /// Name the page uses for this channel
    pub fn as_str(self) -> &'static str {
        match self {
            ChannelName::Log => "log",
            ChannelName::HtmlPostContent => "htmlPostContent",
        }
    }

    /// Resolve a wire name. Names outside the closed set yield `None`.
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "log" => Some(ChannelName::Log),
            "htmlPostContent" => Some(ChannelName::HtmlPostContent),
            _ => None,
        }
    }
}

impl fmt::Display for ChannelName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A message posted by script code inside the surface
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InboundMessage {
    /// Channel name as sent by the page
    pub name: String,
    /// String payload
    pub payload: String,
}

impl InboundMessage {
    /// Create a message
    pub fn new(name: impl Into<String>, payload: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            payload: payload.into(),
        }
    }

    /// Message on a known channel
    pub fn on(channel: ChannelName, payload: impl Into<String>) -> Self {
        Self::new(channel.as_str(), payload)
    }

    /// The channel this message names, if it is one of ours
    pub fn channel(&self) -> Option<ChannelName> {
        ChannelName::parse(&self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_known_names() {
        for channel in ChannelName::ALL {
            assert_eq!(ChannelName::parse(channel.as_str()), Some(channel));
        }
    }

    #[test]
    fn test_parse_is_case_sensitive() {
        assert_eq!(ChannelName::parse("htmlpostcontent"), None);
        assert_eq!(ChannelName::parse("Log"), None);
        assert_eq!(ChannelName::parse(""), None);
    }

    #[test]
    fn test_serde_uses_wire_names() {
        let json = serde_json::to_string(&ChannelName::HtmlPostContent).unwrap();
        assert_eq!(json, "\"htmlPostContent\"");
    }

    #[test]
    fn test_inbound_message_channel() {
        assert_eq!(
            InboundMessage::new("log", "hello").channel(),
            Some(ChannelName::Log)
        );
        assert_eq!(InboundMessage::new("telemetry", "{}").channel(), None);
    }
}
