//! Media-type dispatch over up to five handler slots.
//!
//! Selection is a pure function of the media type and the set of filled
//! slots. First match wins, case-insensitively:
//!
//! 1. `image/*` goes to `image`
//! 2. `application/pdf` goes to `pdf`
//! 3. spreadsheet types go to `spreadsheet`
//! 4. anything else goes to `document`, then `fallback`
//!
//! A rule whose slot is empty falls through to the next rule.

use async_trait::async_trait;
use docimport_metering::FileCategory;
use thiserror::Error;

use crate::errors::ImportError;

/// Spreadsheet media types that don't contain an obvious keyword.
const SPREADSHEET_MEDIA_TYPES: &[&str] = &[
    "text/csv",
    "text/tab-separated-values",
    "application/vnd.ms-excel",
    "application/vnd.ms-excel.sheet.macroenabled.12",
    "application/vnd.ms-excel.sheet.binary.macroenabled.12",
    "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
    "application/vnd.openxmlformats-officedocument.spreadsheetml.template",
    "application/vnd.oasis.opendocument.spreadsheet",
    "application/vnd.oasis.opendocument.spreadsheet-template",
];

const SPREADSHEET_KEYWORDS: &[&str] = &["spreadsheet", "excel", "csv"];

/// Routing failure.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RouterError {
    /// No filled slot accepts the media type.
    #[error("Unsupported media type: {0}")]
    UnsupportedMediaType(String),
}

/// The slot a media type was dispatched to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RouteSlot {
    /// `image/*`.
    Image,
    /// `application/pdf`.
    Pdf,
    /// CSV, Excel, and OpenDocument spreadsheets.
    Spreadsheet,
    /// Any other document.
    Document,
    /// Last resort.
    Fallback,
}

/// Returns whether `media_type` names a spreadsheet format.
#[must_use]
pub fn is_spreadsheet(media_type: &str) -> bool {
    let media_type = media_type.trim().to_ascii_lowercase();
    SPREADSHEET_MEDIA_TYPES.contains(&media_type.as_str())
        || SPREADSHEET_KEYWORDS
            .iter()
            .any(|keyword| media_type.contains(keyword))
}

/// Handler invoked by [`ContentRouter::route`].
#[async_trait]
pub trait ContentHandler: Send + Sync {
    /// What the handler produces.
    type Output: Send;

    /// Handles base64 `content` declared as `media_type`.
    async fn handle(&self, content: &str, media_type: &str) -> anyhow::Result<Self::Output>;
}

/// Dispatches payloads to handlers by declared media type.
#[derive(Debug, Clone)]
pub struct ContentRouter<H> {
    image: Option<H>,
    pdf: Option<H>,
    spreadsheet: Option<H>,
    document: Option<H>,
    fallback: Option<H>,
}

impl<H> Default for ContentRouter<H> {
    fn default() -> Self {
        Self {
            image: None,
            pdf: None,
            spreadsheet: None,
            document: None,
            fallback: None,
        }
    }
}

impl<H> ContentRouter<H> {
    /// A router with every slot empty.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Fills the image slot.
    #[must_use]
    pub fn with_image(mut self, handler: H) -> Self {
        self.image = Some(handler);
        self
    }

    /// Fills the PDF slot.
    #[must_use]
    pub fn with_pdf(mut self, handler: H) -> Self {
        self.pdf = Some(handler);
        self
    }

    /// Fills the spreadsheet slot.
    #[must_use]
    pub fn with_spreadsheet(mut self, handler: H) -> Self {
        self.spreadsheet = Some(handler);
        self
    }

    /// Fills the document slot.
    #[must_use]
    pub fn with_document(mut self, handler: H) -> Self {
        self.document = Some(handler);
        self
    }

    /// Fills the fallback slot.
    #[must_use]
    pub fn with_fallback(mut self, handler: H) -> Self {
        self.fallback = Some(handler);
        self
    }

    /// Picks the slot and handler for `media_type`.
    pub fn select(&self, media_type: &str) -> Result<(RouteSlot, &H), RouterError> {
        let normalized = media_type.trim().to_ascii_lowercase();

        let candidates = [
            (normalized.starts_with("image/"), RouteSlot::Image, &self.image),
            (normalized == "application/pdf", RouteSlot::Pdf, &self.pdf),
            (is_spreadsheet(&normalized), RouteSlot::Spreadsheet, &self.spreadsheet),
            (true, RouteSlot::Document, &self.document),
            (true, RouteSlot::Fallback, &self.fallback),
        ];

        candidates
            .into_iter()
            .find_map(|(matches, slot, handler)| {
                handler.as_ref().filter(|_| matches).map(|h| (slot, h))
            })
            .ok_or_else(|| RouterError::UnsupportedMediaType(media_type.to_string()))
    }
}

impl ContentRouter<FileCategory> {
    /// Maps every slot to its file category; the fallback slot is treated
    /// as a document.
    #[must_use]
    pub fn by_category() -> Self {
        Self::new()
            .with_image(FileCategory::Image)
            .with_pdf(FileCategory::Pdf)
            .with_spreadsheet(FileCategory::Spreadsheet)
            .with_document(FileCategory::Document)
            .with_fallback(FileCategory::Document)
    }

    /// File category for `media_type`.
    pub fn category(&self, media_type: &str) -> Result<FileCategory, RouterError> {
        self.select(media_type).map(|(_, category)| *category)
    }
}

impl<H: ContentHandler> ContentRouter<H> {
    /// Selects a handler and runs it.
    pub async fn route(&self, content: &str, media_type: &str) -> Result<H::Output, ImportError> {
        let (slot, handler) = self.select(media_type)?;
        tracing::debug!(event = "content_routed", media_type, slot = ?slot, "content_routed");
        Ok(handler.handle(content, media_type).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn full() -> ContentRouter<RouteSlot> {
        ContentRouter::new()
            .with_image(RouteSlot::Image)
            .with_pdf(RouteSlot::Pdf)
            .with_spreadsheet(RouteSlot::Spreadsheet)
            .with_document(RouteSlot::Document)
            .with_fallback(RouteSlot::Fallback)
    }

    fn slot(router: &ContentRouter<RouteSlot>, media_type: &str) -> Option<RouteSlot> {
        router.select(media_type).ok().map(|(slot, _)| slot)
    }

    #[test]
    fn test_dispatch_order() {
        let router = full();
        assert_eq!(slot(&router, "image/png"), Some(RouteSlot::Image));
        assert_eq!(slot(&router, "IMAGE/JPEG"), Some(RouteSlot::Image));
        assert_eq!(slot(&router, "application/pdf"), Some(RouteSlot::Pdf));
        assert_eq!(slot(&router, "Application/PDF"), Some(RouteSlot::Pdf));
        assert_eq!(slot(&router, "text/csv"), Some(RouteSlot::Spreadsheet));
        assert_eq!(slot(&router, "application/vnd.ms-excel"), Some(RouteSlot::Spreadsheet));
        assert_eq!(
            slot(&router, "application/vnd.oasis.opendocument.spreadsheet"),
            Some(RouteSlot::Spreadsheet)
        );
        assert_eq!(slot(&router, "text/plain"), Some(RouteSlot::Document));
    }

    #[test]
    fn test_empty_slot_falls_through() {
        let router = ContentRouter::new()
            .with_pdf(RouteSlot::Pdf)
            .with_fallback(RouteSlot::Fallback);
        assert_eq!(slot(&router, "image/png"), Some(RouteSlot::Fallback));
        assert_eq!(slot(&router, "text/csv"), Some(RouteSlot::Fallback));
        assert_eq!(slot(&router, "application/pdf"), Some(RouteSlot::Pdf));

        let router = ContentRouter::new().with_document(RouteSlot::Document);
        assert_eq!(slot(&router, "image/png"), Some(RouteSlot::Document));
    }

    #[test]
    fn test_unsupported_carries_media_type() {
        let router = ContentRouter::new().with_image(RouteSlot::Image);
        assert_eq!(
            router.select("Application/Zip").unwrap_err(),
            RouterError::UnsupportedMediaType("Application/Zip".into())
        );
        let empty: ContentRouter<RouteSlot> = ContentRouter::new();
        assert!(empty.select("image/png").is_err());
    }

    #[test]
    fn test_selection_is_deterministic() {
        let router = full();
        for media_type in ["image/gif", "application/pdf", "text/csv", "", "x/unknown"] {
            assert_eq!(slot(&router, media_type), slot(&router, media_type));
        }
    }

    #[test]
    fn test_is_spreadsheet() {
        assert!(is_spreadsheet(
            "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet"
        ));
        assert!(is_spreadsheet("application/x-csv"));
        assert!(is_spreadsheet("text/tab-separated-values"));
        assert!(!is_spreadsheet("application/msword"));
    }

    #[test]
    fn test_category_router() {
        let router = ContentRouter::by_category();
        assert_eq!(router.category("image/webp").unwrap(), FileCategory::Image);
        assert_eq!(router.category("application/pdf").unwrap(), FileCategory::Pdf);
        assert_eq!(router.category("text/csv").unwrap(), FileCategory::Spreadsheet);
        assert_eq!(router.category("application/msword").unwrap(), FileCategory::Document);
    }

    struct Echo;

    #[async_trait]
    impl ContentHandler for Echo {
        type Output = String;

        async fn handle(&self, content: &str, media_type: &str) -> anyhow::Result<String> {
            if content.is_empty() {
                anyhow::bail!("empty content");
            }
            Ok(format!("{media_type}:{content}"))
        }
    }

    #[tokio::test]
    async fn test_route_runs_handler() {
        let router = ContentRouter::new().with_image(Echo);
        assert_eq!(router.route("AAAA", "image/png").await.unwrap(), "image/png:AAAA");
        assert!(matches!(
            router.route("AAAA", "text/plain").await,
            Err(ImportError::Router(RouterError::UnsupportedMediaType(_)))
        ));
        assert!(matches!(
            router.route("", "image/png").await,
            Err(ImportError::Domain(_))
        ));
    }
}
