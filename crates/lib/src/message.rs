//! Outgoing message descriptors.
//!
//! The dialogue table only selects which canned message to send; this module
//! owns the shape of those messages and their LINE Messaging API JSON form.

use serde::{Deserialize, Serialize};
use serde_json::json;
use std::fmt;

/// One outgoing message, as written in the tour script. Unknown keys are rejected.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", deny_unknown_fields)]
pub enum MessageDescriptor {
    /// Plain text bubble.
    Text { body: String },

    /// Image message (full-size and preview URLs).
    #[serde(rename_all = "camelCase")]
    Image {
        full_url: String,
        preview_url: String,
    },

    /// LINE sticker (package id + sticker id, both sent as strings).
    #[serde(rename_all = "camelCase")]
    Sticker {
        package_id: String,
        sticker_id: String,
    },

    /// Flex message. `contents` is a LINE flex container (bubble or carousel) passed through unchanged.
    #[serde(rename_all = "camelCase")]
    FlexCard {
        alt_text: String,
        contents: serde_json::Value,
    },

    /// Buttons template: title, body text, and message actions that echo `text` back as user input.
    #[serde(rename_all = "camelCase")]
    ButtonPrompt {
        alt_text: String,
        title: String,
        body: String,
        options: Vec<ButtonOption>,
    },
}

/// A button on a prompt: what the user sees and what gets sent back when pressed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ButtonOption {
    pub label: String,
    pub text: String,
}

impl MessageDescriptor {
    pub fn text(body: impl Into<String>) -> Self {
        Self::Text { body: body.into() }
    }

    /// Short tag for logs ("text", "image", ...).
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Text { .. } => "text",
            Self::Image { .. } => "image",
            Self::Sticker { .. } => "sticker",
            Self::FlexCard { .. } => "flexCard",
            Self::ButtonPrompt { .. } => "buttonPrompt",
        }
    }

    /// Button options when this is a prompt; empty otherwise.
    pub fn options(&self) -> &[ButtonOption] {
        match self {
            Self::ButtonPrompt { options, .. } => options,
            _ => &[],
        }
    }

    /// Message object for the LINE reply/push API.
    pub fn to_line_json(&self) -> serde_json::Value {
        match self {
            Self::Text { body } => json!({ "type": "text", "text": body }),
            Self::Image {
                full_url,
                preview_url,
            } => json!({
                "type": "image",
                "originalContentUrl": full_url,
                "previewImageUrl": preview_url,
            }),
            Self::Sticker {
                package_id,
                sticker_id,
            } => json!({
                "type": "sticker",
                "packageId": package_id,
                "stickerId": sticker_id,
            }),
            Self::FlexCard { alt_text, contents } => json!({
                "type": "flex",
                "altText": alt_text,
                "contents": contents,
            }),
            Self::ButtonPrompt {
                alt_text,
                title,
                body,
                options,
            } => {
                let actions: Vec<serde_json::Value> = options
                    .iter()
                    .map(|o| json!({ "type": "message", "label": o.label, "text": o.text }))
                    .collect();
                json!({
                    "type": "template",
                    "altText": alt_text,
                    "template": {
                        "type": "buttons",
                        "title": title,
                        "text": body,
                        "actions": actions,
                    }
                })
            }
        }
    }
}

/// Plain-text rendering for the terminal player and logs.
impl fmt::Display for MessageDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text { body } => write!(f, "{}", body),
            Self::Image { full_url, .. } => write!(f, "[image] {}", full_url),
            Self::Sticker {
                package_id,
                sticker_id,
            } => write!(f, "[sticker {}/{}]", package_id, sticker_id),
            Self::FlexCard { alt_text, .. } => write!(f, "[card] {}", alt_text),
            Self::ButtonPrompt {
                title,
                body,
                options,
                ..
            } => {
                write!(f, "{}\n{}", title, body)?;
                for o in options {
                    write!(f, "\n  [{}]", o.label)?;
                }
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn button_prompt_becomes_buttons_template() {
        let prompt = MessageDescriptor::ButtonPrompt {
            alt_text: "選擇".to_string(),
            title: "標題".to_string(),
            body: "內容".to_string(),
            options: vec![
                ButtonOption {
                    label: "是".to_string(),
                    text: "是".to_string(),
                },
                ButtonOption {
                    label: "否".to_string(),
                    text: "否".to_string(),
                },
            ],
        };
        let v = prompt.to_line_json();
        assert_eq!(v["type"], "template");
        assert_eq!(v["altText"], "選擇");
        assert_eq!(v["template"]["type"], "buttons");
        assert_eq!(v["template"]["text"], "內容");
        assert_eq!(v["template"]["actions"][1]["type"], "message");
        assert_eq!(v["template"]["actions"][1]["text"], "否");
    }

    #[test]
    fn image_uses_line_field_names() {
        let image = MessageDescriptor::Image {
            full_url: "https://example.com/a.jpg".to_string(),
            preview_url: "https://example.com/a_s.jpg".to_string(),
        };
        let v = image.to_line_json();
        assert_eq!(v["originalContentUrl"], "https://example.com/a.jpg");
        assert_eq!(v["previewImageUrl"], "https://example.com/a_s.jpg");
    }

    #[test]
    fn parses_tagged_yaml() {
        let yaml = "type: sticker\npackageId: \"11539\"\nstickerId: \"52114146\"\n";
        let m: MessageDescriptor = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(
            m,
            MessageDescriptor::Sticker {
                package_id: "11539".to_string(),
                sticker_id: "52114146".to_string(),
            }
        );
        assert_eq!(m.kind(), "sticker");
        assert!(m.options().is_empty());
    }

    #[test]
    fn misspelled_key_is_rejected() {
        let yaml = "type: image\nfullUrl: https://example.com/a.jpg\npreviewUrl: https://example.com/b.jpg\npreviewURL: https://example.com/c.jpg\n";
        let err = serde_yaml::from_str::<MessageDescriptor>(yaml).unwrap_err();
        assert!(err.to_string().contains("previewURL"), "{}", err);
    }
}
