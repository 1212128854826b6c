use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Body of `POST /ask`
#[derive(Debug, Serialize)]
pub struct AskRequest<'a> {
    pub question: &'a str,
    pub filename: &'a str,
    pub user_id: &'a str,
}

/// Response from `POST /ask`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AskResponse {
    #[serde(default)]
    pub answer: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
#[serde(rename_all = "lowercase")]
pub enum Sender {
    User,
    Bot,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct ChatMessage {
    pub sender: Sender,
    pub text: String,
    #[cfg_attr(feature = "ts", ts(type = "string"))]
    pub sent_at: DateTime<Utc>,
}

impl ChatMessage {
    pub fn new(sender: Sender, text: impl Into<String>) -> Self {
        Self {
            sender,
            text: text.into(),
            sent_at: Utc::now(),
        }
    }

    pub fn segments(&self) -> Vec<Segment<'_>> {
        segments(&self.text)
    }
}

/// A run of message text, either plain or bold
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Segment<'a> {
    pub text: &'a str,
    pub bold: bool,
}

/// Split bot text on `**bold**` markers.
///
/// Only complete pairs are treated as markup; an unmatched `**` stays in
/// the plain text. Empty runs are dropped.
pub fn segments(text: &str) -> Vec<Segment<'_>> {
    let mut out = Vec::new();
    let mut rest = text;

    while let Some(start) = rest.find("**") {
        let after = &rest[start + 2..];
        let Some(end) = after.find("**") else {
            break;
        };
        if start > 0 {
            out.push(Segment { text: &rest[..start], bold: false });
        }
        if end > 0 {
            out.push(Segment { text: &after[..end], bold: true });
        }
        rest = &after[end + 2..];
    }

    if !rest.is_empty() {
        out.push(Segment { text: rest, bold: false });
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plain(text: &str) -> Segment<'_> {
        Segment { text, bold: false }
    }

    fn bold(text: &str) -> Segment<'_> {
        Segment { text, bold: true }
    }

    #[test]
    fn test_segments_plain_text() {
        assert_eq!(segments("Drink water."), vec![plain("Drink water.")]);
        assert!(segments("").is_empty());
    }

    #[test]
    fn test_segments_bold_runs() {
        assert_eq!(
            segments("Take **ibuprofen** with **food**."),
            vec![plain("Take "), bold("ibuprofen"), plain(" with "), bold("food"), plain(".")]
        );
        assert_eq!(segments("**Warning**"), vec![bold("Warning")]);
    }

    #[test]
    fn test_segments_unmatched_marker_is_literal() {
        assert_eq!(
            segments("**Note** 2 ** 3"),
            vec![bold("Note"), plain(" 2 ** 3")]
        );
    }

    #[test]
    fn test_segments_empty_bold_dropped() {
        assert_eq!(segments("a****b"), vec![plain("a"), plain("b")]);
    }

    #[test]
    fn test_sender_serializes_lowercase() {
        let msg = ChatMessage::new(Sender::Bot, "hi");
        let json = serde_json::to_value(&msg).expect("serialize");
        assert_eq!(json["sender"], "bot");
        assert_eq!(json["text"], "hi");
    }
}
