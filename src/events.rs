use serde::{Deserialize, Serialize};

use crate::{client::ResolvedBlock, visibility::VisibilityContext};

/// Analytics event describing the experience a visitor was shown on one page view.
///
/// Passed to the [`EventRecorder`]; its serialized form can be merged into any analytics
/// payload unchanged (see [`ExperienceEvent::to_properties`]).
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExperienceEvent {
    /// Durable visitor id.
    pub visitor_id: String,
    /// Id of the current browser session.
    pub session_id: String,
    /// Page that was rendered.
    pub page_id: String,
    /// Page-level test assignment, if the page was reached through a running test.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page_variant: Option<PageVariant>,
    /// Variant and visibility of every block, in page order.
    pub blocks: Vec<BlockOutcome>,
    /// Campaign parameters of the page URL.
    pub utm: UtmContext,
    /// Referrer of the page view, empty when there is none.
    pub referrer: String,
    /// Time the page was rendered.
    pub timestamp: chrono::DateTime<chrono::Utc>,
    /// Library that produced the event.
    pub meta_data: EventMetaData,
}

impl ExperienceEvent {
    /// Event fields as a JSON object.
    pub fn to_properties(&self) -> serde_json::Map<String, serde_json::Value> {
        match serde_json::to_value(self) {
            Ok(serde_json::Value::Object(map)) => map,
            // A struct always serializes to an object.
            _ => serde_json::Map::new(),
        }
    }
}

/// Page-level test and the variant the visitor was assigned to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageVariant {
    /// Id of the page-level test.
    pub test_id: String,
    /// Assigned variant.
    pub variant_id: String,
    /// Display name of the assigned variant.
    pub variant_name: String,
}

/// Resolution outcome of a single block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockOutcome {
    /// Block id.
    pub block_id: String,
    /// Selected variant.
    pub variant_id: String,
    /// Display name of the selected variant.
    pub variant_name: String,
    /// Whether the block was shown.
    pub visible: bool,
}

impl From<&ResolvedBlock> for BlockOutcome {
    fn from(block: &ResolvedBlock) -> BlockOutcome {
        BlockOutcome {
            block_id: block.block_id.clone(),
            variant_id: block.variant_id.clone(),
            variant_name: block.variant_name.clone(),
            visible: block.visible,
        }
    }
}

/// Campaign and click-id parameters of the page view. Absent parameters are omitted.
///
/// Fields carry the query parameter of the same name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UtmContext {
    /// `utm_source`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub utm_source: Option<String>,
    /// `utm_medium`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub utm_medium: Option<String>,
    /// `utm_campaign`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub utm_campaign: Option<String>,
    /// `utm_term`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub utm_term: Option<String>,
    /// `utm_content`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub utm_content: Option<String>,
    /// `gclid`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gclid: Option<String>,
    /// `fbclid`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fbclid: Option<String>,
    /// `ttclid`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ttclid: Option<String>,
}

impl From<&VisibilityContext> for UtmContext {
    fn from(context: &VisibilityContext) -> UtmContext {
        let param = |name: &str| context.url_params.get(name).map(str::to_owned);
        UtmContext {
            utm_source: param("utm_source"),
            utm_medium: param("utm_medium"),
            utm_campaign: param("utm_campaign"),
            utm_term: param("utm_term"),
            utm_content: param("utm_content"),
            gclid: param("gclid"),
            fbclid: param("fbclid"),
            ttclid: param("ttclid"),
        }
    }
}

/// Name and version of this library.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EventMetaData {
    /// Package name.
    pub lib_name: &'static str,
    /// Package version.
    pub lib_version: &'static str,
}

impl Default for EventMetaData {
    fn default() -> Self {
        EventMetaData {
            lib_name: env!("CARGO_PKG_NAME"),
            lib_version: env!("CARGO_PKG_VERSION"),
        }
    }
}

/// Receives one [`ExperienceEvent`] per rendered page view.
pub trait EventRecorder {
    /// Pass `event` to the analytics pipeline.
    fn record(&self, event: ExperienceEvent);
}

pub(crate) struct NoopEventRecorder;
impl EventRecorder for NoopEventRecorder {
    fn record(&self, _event: ExperienceEvent) {}
}

impl<T: Fn(ExperienceEvent)> EventRecorder for T {
    fn record(&self, event: ExperienceEvent) {
        self(event);
    }
}
