use std::fmt::Write;

use docimport_extract::generator::InlineData;
use rig::completion::message::{
    AssistantContent, DocumentMediaType, ImageMediaType, Message, UserContent,
};
use rig::completion::CompletionRequest;
use rig::OneOrMany;

use crate::errors::ProviderError;

/// Lowercases a media type and drops any parameters (`; charset=...`).
#[must_use]
pub fn normalize_media_type(media_type: &str) -> String {
    media_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase()
}

/// Maps a media type to Rig's image media type, if it is an image Rig knows.
#[must_use]
pub fn image_media_type(media_type: &str) -> Option<ImageMediaType> {
    match normalize_media_type(media_type).as_str() {
        "image/jpeg" | "image/jpg" => Some(ImageMediaType::JPEG),
        "image/png" => Some(ImageMediaType::PNG),
        "image/gif" => Some(ImageMediaType::GIF),
        "image/webp" => Some(ImageMediaType::WEBP),
        "image/heic" => Some(ImageMediaType::HEIC),
        "image/heif" => Some(ImageMediaType::HEIF),
        "image/svg+xml" => Some(ImageMediaType::SVG),
        _ => None,
    }
}

/// Maps a media type to Rig's document media type, if Rig names it.
#[must_use]
pub fn document_media_type(media_type: &str) -> Option<DocumentMediaType> {
    match normalize_media_type(media_type).as_str() {
        "application/pdf" => Some(DocumentMediaType::PDF),
        _ => None,
    }
}

/// Converts an inline payload into user content.
///
/// Known image types become image content; everything else, including
/// spreadsheet containers re-routed from the text path, is sent as a
/// base64 document.
#[must_use]
pub fn inline_content(inline: &InlineData) -> UserContent {
    image_media_type(&inline.media_type).map_or_else(
        || {
            UserContent::document(
                inline.data_base64.clone(),
                document_media_type(&inline.media_type),
            )
        },
        |image_type| UserContent::image_base64(inline.data_base64.clone(), Some(image_type), None),
    )
}

/// Builds the single user message for a generation call.
///
/// # Errors
/// Returns `ProviderError::Message` if the content list ends up empty.
pub fn user_message(prompt: &str, inline: Option<&InlineData>) -> Result<Message, ProviderError> {
    let mut parts = Vec::with_capacity(2);
    if let Some(inline) = inline {
        parts.push(inline_content(inline));
    }
    parts.push(UserContent::text(prompt));

    let content = OneOrMany::many(parts).map_err(|e| ProviderError::Message(e.to_string()))?;
    Ok(Message::User { content })
}

/// Joins the text parts of a completion choice.
#[must_use]
pub fn response_text(choice: &OneOrMany<AssistantContent>) -> String {
    choice
        .iter()
        .filter_map(|c| match c {
            AssistantContent::Text(t) => Some(t.text.as_str()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Renders a request as plain text for trace logging. Inline payloads are
/// summarized rather than dumped.
#[must_use]
pub fn format_chat_history(request: &CompletionRequest) -> String {
    let mut prompt_str = String::new();

    if let Some(preamble) = &request.preamble {
        let _ = write!(prompt_str, "System: {preamble}\n\n");
    }

    for msg in request.chat_history.iter() {
        match msg {
            Message::User { content } => {
                let text = content
                    .iter()
                    .map(|c| match c {
                        UserContent::Text(t) => t.text.clone(),
                        UserContent::Image(_) => "[image]".to_string(),
                        UserContent::Document(_) => "[document]".to_string(),
                        _ => String::new(),
                    })
                    .collect::<Vec<_>>()
                    .join("\n");
                let _ = writeln!(prompt_str, "User: {text}");
            }
            Message::Assistant { content, .. } => {
                let text = content
                    .iter()
                    .map(|c| match c {
                        AssistantContent::Text(t) => t.text.clone(),
                        _ => String::new(),
                    })
                    .collect::<Vec<_>>()
                    .join("\n");
                let _ = writeln!(prompt_str, "Assistant: {text}");
            }
        }
    }

    prompt_str
}
