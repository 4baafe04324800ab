//! Published page documents as delivered by the persistence layer.
//!
//! Parsing is lenient: malformed blocks, variants and rule conditions are skipped, and `null`
//! fields read as their defaults. Only a document without a page `id` is rejected.
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::{
    try_parse::{none_if_invalid, null_as_default, skip_invalid},
    variant::Variant,
    visibility::VisibilityRules,
    Error, Result,
};

/// A published landing page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Page {
    /// Page id. Page-level variants point at other pages by this id.
    pub id: String,
    /// Content blocks in rendering order.
    #[serde(default, deserialize_with = "skip_invalid")]
    pub blocks: Vec<Block>,
    /// Page-level A/B test, if one is configured.
    #[serde(
        default,
        deserialize_with = "none_if_invalid",
        skip_serializing_if = "Option::is_none"
    )]
    pub ab_test: Option<AbTest>,
}

impl Page {
    /// Parse a page from its JSON document.
    pub fn from_json(json: &str) -> Result<Page> {
        serde_json::from_str(json).map_err(|err| Error::PageParseError(Arc::new(err)))
    }
}

/// Page-level A/B test routing visitors to alternate pages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AbTest {
    /// Test id; also names the storage key of the assignment.
    pub id: String,
    /// Display name.
    #[serde(default, deserialize_with = "null_as_default")]
    pub name: String,
    /// Lifecycle status. Missing status reads as running.
    #[serde(default, deserialize_with = "null_as_default")]
    pub status: AbTestStatus,
    /// Explicit variants. The original page is the implicit control.
    #[serde(default, deserialize_with = "skip_invalid")]
    pub variants: Vec<AbTestVariant>,
}

impl AbTest {
    /// Only running tests route traffic.
    pub fn is_running(&self) -> bool {
        self.status == AbTestStatus::Running
    }

    pub(crate) fn candidate_variants(&self) -> Vec<Variant<String>> {
        self.variants
            .iter()
            .map(|it| Variant {
                id: it.id.clone(),
                name: it.name.clone(),
                traffic_percentage: it.traffic_percentage,
                payload: it.page_id.clone(),
            })
            .collect()
    }
}

/// Lifecycle status of a page-level test.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AbTestStatus {
    /// Not started yet.
    Draft,
    /// Routing traffic.
    #[default]
    Running,
    /// Temporarily stopped.
    Paused,
    /// Finished. Stored assignments are kept but no longer applied.
    Completed,
    /// Unrecognized status. Treated as not running.
    #[serde(other)]
    Unknown,
}

/// Alternate page of a page-level test.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AbTestVariant {
    /// Variant id, persisted as the visitor's assignment.
    pub id: String,
    /// Display name reported in events.
    #[serde(default, deserialize_with = "null_as_default")]
    pub name: String,
    /// Share of traffic in percent.
    #[serde(default, deserialize_with = "null_as_default")]
    pub traffic_percentage: f64,
    /// Page served to visitors assigned to this variant.
    pub page_id: String,
}

/// A typed content block (hero, product, form, ...). The engine treats `config` as opaque.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Block {
    /// Block id; also names the storage key of the block assignment.
    pub id: String,
    /// Block kind, passed through to the renderer.
    #[serde(rename = "type", default, deserialize_with = "null_as_default")]
    pub block_type: String,
    /// Configuration of the original block.
    #[serde(default)]
    pub config: serde_json::Value,
    /// Whether `variants` split traffic.
    #[serde(default, deserialize_with = "null_as_default")]
    pub ab_test_enabled: bool,
    /// In-place alternate configurations.
    #[serde(default, deserialize_with = "skip_invalid")]
    pub variants: Vec<BlockVariant>,
    /// Conditional visibility. Malformed rules read as absent, so the block stays visible.
    #[serde(
        default,
        deserialize_with = "none_if_invalid",
        skip_serializing_if = "Option::is_none"
    )]
    pub visibility_rules: Option<VisibilityRules>,
}

impl Block {
    pub(crate) fn candidate_variants(&self) -> Vec<Variant<serde_json::Value>> {
        if !self.ab_test_enabled {
            return Vec::new();
        }
        self.variants
            .iter()
            .map(|it| Variant {
                id: it.id.clone(),
                name: it.name.clone(),
                traffic_percentage: it.traffic_percentage,
                payload: it.config.clone(),
            })
            .collect()
    }
}

/// In-place alternate configuration of a block.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockVariant {
    /// Variant id, persisted as the visitor's assignment.
    pub id: String,
    /// Display name reported in events.
    #[serde(default, deserialize_with = "null_as_default")]
    pub name: String,
    /// Share of traffic in percent.
    #[serde(default, deserialize_with = "null_as_default")]
    pub traffic_percentage: f64,
    /// Configuration replacing the block's own when this variant is selected.
    #[serde(default)]
    pub config: serde_json::Value,
}

#[cfg(test)]
mod tests {
    use std::{fs, fs::File, io::BufReader};

    use super::{AbTestStatus, Page};
    use crate::{
        visibility::{VisibilityContext, VisibilityLogic},
        Error,
    };

    #[test]
    fn parse_page_fixtures() {
        for entry in fs::read_dir("tests/data/pages/").unwrap() {
            let entry = entry.unwrap();
            let f = File::open(entry.path()).unwrap();
            let _page: Page = serde_json::from_reader(BufReader::new(f)).unwrap();
        }
    }

    #[test]
    fn parse_minimal_page() {
        let page = Page::from_json(
            r#"
              {
                "id": "page-1",
                "blocks": [
                  { "id": "hero", "type": "hero", "config": { "headline": "Hi" } }
                ]
              }
            "#,
        )
        .unwrap();

        assert_eq!(page.id, "page-1");
        assert!(page.ab_test.is_none());
        assert_eq!(page.blocks[0].block_type, "hero");
        assert!(!page.blocks[0].ab_test_enabled);
        assert!(page.blocks[0].candidate_variants().is_empty());
        assert!(page.blocks[0].visibility_rules.is_none());
    }

    #[test]
    fn parse_partially_if_unexpected() {
        let page = Page::from_json(
            r#"
              {
                "id": "page-1",
                "abTest": {
                  "id": "test-1",
                  "status": "archived",
                  "variants": [{ "id": "v1", "trafficPercentage": 50, "pageId": "page-2" }]
                },
                "blocks": [
                  {
                    "id": "hero",
                    "type": "hero",
                    "visibilityRules": { "enabled": true, "logic": "new_logic", "conditions": [] }
                  }
                ]
              }
            "#,
        )
        .unwrap();

        let test = page.ab_test.unwrap();
        assert_eq!(test.status, AbTestStatus::Unknown);
        assert!(!test.is_running());
        assert_eq!(
            page.blocks[0].visibility_rules.as_ref().unwrap().logic,
            VisibilityLogic::Unknown
        );
    }

    #[test]
    fn disabled_block_test_has_no_candidates() {
        let page = Page::from_json(
            r#"
              {
                "id": "page-1",
                "blocks": [
                  {
                    "id": "hero",
                    "abTestEnabled": false,
                    "variants": [{ "id": "v1", "trafficPercentage": 100, "config": {} }]
                  }
                ]
              }
            "#,
        )
        .unwrap();

        assert!(page.blocks[0].candidate_variants().is_empty());
    }

    #[test]
    fn malformed_entries_do_not_reject_the_page() {
        let page = Page::from_json(
            r#"
              {
                "id": "page-1",
                "abTest": {
                  "id": "test-1",
                  "name": null,
                  "status": null,
                  "variants": [
                    { "id": "v1", "trafficPercentage": null, "pageId": "page-2" },
                    { "id": "v2", "trafficPercentage": 50 }
                  ]
                },
                "blocks": [
                  {
                    "id": "null-value",
                    "type": null,
                    "visibilityRules": {
                      "enabled": true,
                      "logic": null,
                      "conditions": [
                        { "field": "utm_source", "operator": "exists", "value": null }
                      ]
                    }
                  },
                  {
                    "id": "missing-operator",
                    "visibilityRules": {
                      "enabled": true,
                      "logic": "show_if_all",
                      "conditions": [
                        { "field": "utm_source", "value": "google" },
                        { "field": "utm_medium", "operator": "equals", "value": "cpc" }
                      ]
                    }
                  },
                  { "id": "null-variants", "abTestEnabled": null, "variants": null },
                  { "type": "hero" },
                  { "id": "bad-rules", "visibilityRules": "show" },
                  { "id": "ok", "type": "footer" }
                ]
              }
            "#,
        )
        .unwrap();

        let test = page.ab_test.as_ref().unwrap();
        assert!(test.is_running());
        assert_eq!(test.name, "");
        assert_eq!(test.variants.len(), 1);
        assert_eq!(test.variants[0].traffic_percentage, 0.0);

        let ids: Vec<&str> = page.blocks.iter().map(|it| it.id.as_str()).collect();
        assert_eq!(
            ids,
            ["null-value", "missing-operator", "null-variants", "bad-rules", "ok"]
        );

        let rules = page.blocks[0].visibility_rules.as_ref().unwrap();
        assert_eq!(rules.logic, VisibilityLogic::ShowIfAny);
        assert_eq!(rules.conditions[0].value, "");
        assert!(rules.conditions[0].is_valid());

        // The condition without an operator drops out; the remaining one decides.
        let rules = page.blocks[1].visibility_rules.as_ref().unwrap();
        assert_eq!(rules.conditions.len(), 1);
        assert!(rules.eval(&VisibilityContext::from_query("utm_medium=cpc", "")));

        assert!(!page.blocks[2].ab_test_enabled);
        assert!(page.blocks[2].variants.is_empty());
        assert!(page.blocks[3].visibility_rules.is_none());
    }

    #[test]
    fn invalid_document_is_an_error() {
        assert!(matches!(
            Page::from_json(r#"{ "blocks": [] }"#),
            Err(Error::PageParseError(_))
        ));
    }
}
