//! Request assembly: the chat-completions body sent to the provider.
//!
//! One user turn, fixed prompt first, then one `image_url` part per page in
//! document order. The model is never told page numbers, so the order of the
//! image parts is the only page-sequence signal it gets.

use crate::config::ExtractionConfig;
use crate::pipeline::encode::EncodedImage;
use crate::prompts::EXTRACTION_PROMPT;
use serde::{Deserialize, Serialize};

/// Sampling temperature. Pinned to the most deterministic setting.
pub const TEMPERATURE: f32 = 0.0;

/// Detail hint attached to every image part.
pub const IMAGE_DETAIL: &str = "high";

/// Chat-completions request body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub max_tokens: usize,
    pub temperature: f32,
}

impl ChatRequest {
    /// Text of the first text part of the first message.
    pub fn prompt(&self) -> Option<&str> {
        self.messages
            .first()?
            .content
            .iter()
            .find_map(|part| match part {
                ContentPart::Text { text } => Some(text.as_str()),
                ContentPart::ImageUrl { .. } => None,
            })
    }

    /// Image parts across all messages, in request order.
    pub fn images(&self) -> impl Iterator<Item = &ImageUrl> {
        self.messages
            .iter()
            .flat_map(|m| m.content.iter())
            .filter_map(|part| match part {
                ContentPart::ImageUrl { image_url } => Some(image_url),
                ContentPart::Text { .. } => None,
            })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: Vec<ContentPart>,
}

/// One block of multimodal message content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentPart {
    Text { text: String },
    ImageUrl { image_url: ImageUrl },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageUrl {
    /// `data:<mime>;base64,<payload>`
    pub url: String,
    pub detail: String,
}

impl ImageUrl {
    /// Split the data URI into `(mime, base64 payload)`.
    pub fn split_data_uri(&self) -> Option<(&str, &str)> {
        let rest = self.url.strip_prefix("data:")?;
        let (mime, payload) = rest.split_once(";base64,")?;
        Some((mime, payload))
    }
}

/// Assemble the single-turn extraction request.
pub fn build_request(config: &ExtractionConfig, images: &[EncodedImage]) -> ChatRequest {
    let mut content = Vec::with_capacity(images.len() + 1);
    content.push(ContentPart::Text {
        text: EXTRACTION_PROMPT.to_string(),
    });
    content.extend(images.iter().map(|img| ContentPart::ImageUrl {
        image_url: ImageUrl {
            url: img.data_uri(),
            detail: IMAGE_DETAIL.to_string(),
        },
    }));

    ChatRequest {
        model: config.model.clone(),
        messages: vec![ChatMessage {
            role: "user".to_string(),
            content,
        }],
        max_tokens: config.max_tokens,
        temperature: TEMPERATURE,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PageFormat;
    use serde_json::json;

    fn fake_image(tag: &str) -> EncodedImage {
        EncodedImage {
            data: tag.to_string(),
            format: PageFormat::Png,
        }
    }

    #[test]
    fn wire_shape_matches_chat_completions() {
        let config = ExtractionConfig::builder()
            .model("gpt-4o")
            .max_tokens(4096)
            .build()
            .unwrap();
        let request = build_request(&config, &[fake_image("AAAA"), fake_image("BBBB")]);

        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(
            value,
            json!({
                "model": "gpt-4o",
                "messages": [{
                    "role": "user",
                    "content": [
                        { "type": "text", "text": EXTRACTION_PROMPT },
                        { "type": "image_url", "image_url": { "url": "data:image/png;base64,AAAA", "detail": "high" } },
                        { "type": "image_url", "image_url": { "url": "data:image/png;base64,BBBB", "detail": "high" } }
                    ]
                }],
                "max_tokens": 4096,
                "temperature": 0.0
            })
        );
    }

    #[test]
    fn image_order_follows_page_order() {
        let config = ExtractionConfig::default();
        let images: Vec<_> = ["p1", "p2", "p3"].into_iter().map(fake_image).collect();
        let request = build_request(&config, &images);

        let payloads: Vec<&str> = request
            .images()
            .map(|img| img.split_data_uri().unwrap().1)
            .collect();
        assert_eq!(payloads, ["p1", "p2", "p3"]);
        assert_eq!(request.prompt(), Some(EXTRACTION_PROMPT));
    }

    #[test]
    fn split_data_uri_rejects_plain_urls() {
        let url = ImageUrl {
            url: "https://example.com/page.png".into(),
            detail: "high".into(),
        };
        assert!(url.split_data_uri().is_none());
    }
}
