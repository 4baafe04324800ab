use serde::Serialize;

use crate::{
    events::{BlockOutcome, EventMetaData, ExperienceEvent, PageVariant, UtmContext},
    identity::{IdentityProvider, VisitorIdentity},
    page::{Block, Page},
    selector::VariantSelector,
    storage::TestKey,
    visibility::{is_block_visible, VisibilityContext},
    ClientConfig, EventRecorder,
};

/// Selects the experience shown to a visitor.
///
/// In order to create a client instance, first create [`ClientConfig`].
///
/// A page view is processed in two steps: the page-level test is resolved first (possibly
/// sending the visitor to another page), then blocks of the page that is actually shown are
/// resolved and evaluated. [`ExperienceClient::view_page`] runs both steps.
///
/// # Examples
/// ```
/// # use pb_experience::{ClientConfig, ExperienceClient};
/// let client = ExperienceClient::new(ClientConfig::new());
/// ```
pub struct ExperienceClient<'a> {
    identity: IdentityProvider,
    selector: VariantSelector<'a>,
    event_recorder: Box<dyn EventRecorder + Send + Sync + 'a>,
}

impl<'a> ExperienceClient<'a> {
    /// Create a new `ExperienceClient` using the specified configuration.
    pub fn new(config: ClientConfig<'a>) -> Self {
        ExperienceClient {
            identity: IdentityProvider::new(
                config.durable_storage.clone(),
                config.session_storage,
            ),
            selector: VariantSelector::new(config.durable_storage, config.random),
            event_recorder: config.event_recorder,
        }
    }

    /// Visitor and session ids of the current visitor.
    pub fn identity(&self) -> VisitorIdentity {
        self.identity.identity()
    }

    /// Resolve the page-level test of `page`.
    ///
    /// Pages without a running test stay where they are without touching storage.
    pub fn resolve_page(&self, page: &Page) -> PageResolution {
        let Some(test) = page.ab_test.as_ref().filter(|it| it.is_running()) else {
            return PageResolution::Stay { page_variant: None };
        };

        let variants = test.candidate_variants();
        if variants.is_empty() {
            return PageResolution::Stay { page_variant: None };
        }

        let resolution = self.selector.resolve_variant(
            &TestKey::Page(test.id.clone()),
            &variants,
            page.id.clone(),
        );
        log::trace!(target: "pb_experience",
                    page_id:display = page.id,
                    test_id:display = test.id,
                    resolution:serde;
                    "resolved page test");

        let page_variant = PageVariant {
            test_id: test.id.clone(),
            variant_id: resolution.variant_id,
            variant_name: resolution.variant_name,
        };
        if resolution.payload == page.id {
            PageResolution::Stay {
                page_variant: Some(page_variant),
            }
        } else {
            PageResolution::Navigate {
                page_id: resolution.payload,
                page_variant,
            }
        }
    }

    /// Resolve the variant and visibility of a single block.
    pub fn resolve_block(&self, block: &Block, context: &VisibilityContext) -> ResolvedBlock {
        let resolution = self.selector.resolve_variant(
            &TestKey::Block(block.id.clone()),
            &block.candidate_variants(),
            block.config.clone(),
        );
        let visible = is_block_visible(block.visibility_rules.as_ref(), context);

        log::trace!(target: "pb_experience",
                    block_id:display = block.id,
                    variant_id:display = resolution.variant_id,
                    visible;
                    "resolved block");

        ResolvedBlock {
            block_id: block.id.clone(),
            block_type: block.block_type.clone(),
            config: resolution.payload,
            variant_id: resolution.variant_id,
            variant_name: resolution.variant_name,
            visible,
        }
    }

    /// Resolve every block of the page being shown and record an [`ExperienceEvent`].
    ///
    /// `page_variant` is the page-level assignment that led to this page, if any.
    pub fn render_page(
        &self,
        page: &Page,
        context: &VisibilityContext,
        page_variant: Option<PageVariant>,
    ) -> RenderedPage {
        let identity = self.identity();
        let blocks: Vec<ResolvedBlock> = page
            .blocks
            .iter()
            .map(|block| self.resolve_block(block, context))
            .collect();

        let event = ExperienceEvent {
            visitor_id: identity.visitor_id.clone(),
            session_id: identity.session_id.clone(),
            page_id: page.id.clone(),
            page_variant: page_variant.clone(),
            blocks: blocks.iter().map(BlockOutcome::from).collect(),
            utm: UtmContext::from(context),
            referrer: context.referrer.clone(),
            timestamp: chrono::Utc::now(),
            meta_data: EventMetaData::default(),
        };
        log::trace!(target: "pb_experience",
                    event:serde;
                    "recording experience event");
        self.event_recorder.record(event);

        RenderedPage {
            page_id: page.id.clone(),
            page_variant,
            identity,
            blocks,
        }
    }

    /// Process a page view: resolve the page-level test, then either ask the caller to
    /// navigate or resolve the page's blocks.
    pub fn view_page(&self, page: &Page, context: &VisibilityContext) -> PageView {
        match self.resolve_page(page) {
            PageResolution::Navigate {
                page_id,
                page_variant,
            } => PageView::Navigate {
                page_id,
                page_variant,
            },
            PageResolution::Stay { page_variant } => {
                PageView::Render(self.render_page(page, context, page_variant))
            }
        }
    }
}

/// Outcome of the page-level test.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase", rename_all_fields = "camelCase", tag = "action")]
pub enum PageResolution {
    /// Show the current page. `page_variant` is set when a running test assigned the visitor
    /// to it.
    Stay {
        /// Assignment that kept the visitor here.
        page_variant: Option<PageVariant>,
    },
    /// Show `page_id` instead of the current page.
    Navigate {
        /// Page to send the visitor to.
        page_id: String,
        /// Assignment that led to `page_id`.
        page_variant: PageVariant,
    },
}

/// A block ready for rendering.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedBlock {
    /// Id of the [`Block`].
    pub block_id: String,
    /// Block kind, passed through from the page.
    pub block_type: String,
    /// Configuration of the selected variant.
    pub config: serde_json::Value,
    /// Selected variant, [`CONTROL_VARIANT_ID`](crate::CONTROL_VARIANT_ID) for the original.
    pub variant_id: String,
    /// Display name of the selected variant.
    pub variant_name: String,
    /// Whether visibility rules let the block render.
    pub visible: bool,
}

/// A page with every block resolved for the current visitor.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderedPage {
    /// Page that was rendered.
    pub page_id: String,
    /// Page-level assignment that led here, if any.
    pub page_variant: Option<PageVariant>,
    /// Visitor the page was rendered for.
    pub identity: VisitorIdentity,
    /// All blocks in page order, hidden ones included.
    pub blocks: Vec<ResolvedBlock>,
}

impl RenderedPage {
    /// Blocks that should be rendered, in page order.
    pub fn visible_blocks(&self) -> impl Iterator<Item = &ResolvedBlock> {
        self.blocks.iter().filter(|it| it.visible)
    }
}

/// Outcome of [`ExperienceClient::view_page`].
#[derive(Debug, Clone, PartialEq)]
pub enum PageView {
    /// A page-level test sends the visitor elsewhere. Nothing was rendered or recorded.
    Navigate {
        /// Page to send the visitor to.
        page_id: String,
        /// Assignment that led to `page_id`.
        page_variant: PageVariant,
    },
    /// The page was rendered and its event recorded.
    Render(RenderedPage),
}

#[cfg(test)]
mod tests {
    use std::{
        fs::File,
        sync::{Arc, Mutex},
    };

    use serde_json::json;

    use super::{PageResolution, PageView};
    use crate::{
        page::Page,
        storage::{MemoryStorage, Storage},
        visibility::VisibilityContext,
        ClientConfig, ExperienceClient, ExperienceEvent,
    };

    fn load_page(name: &str) -> Page {
        let f = File::open(format!("tests/data/pages/{name}.json")).unwrap();
        serde_json::from_reader(f).unwrap()
    }

    fn client_with(durable: Arc<MemoryStorage>, r: f64) -> ExperienceClient<'static> {
        let mut config = ClientConfig::new();
        config.durable_storage(durable).random_source(move || r);
        config.to_client()
    }

    #[test]
    fn block_without_test_or_rules_renders_unchanged() {
        let _ = env_logger::builder().is_test(true).try_init();

        let page = load_page("no-test");
        let client = ClientConfig::new().to_client();

        let PageView::Render(rendered) =
            client.view_page(&page, &VisibilityContext::default())
        else {
            panic!("page without a test must render");
        };

        assert_eq!(rendered.page_variant, None);
        assert_eq!(rendered.blocks.len(), 1);
        let block = &rendered.blocks[0];
        assert_eq!(block.config, page.blocks[0].config);
        assert_eq!(block.variant_id, "original");
        assert!(block.visible);
    }

    #[test]
    fn malformed_page_entries_still_render() {
        let page = load_page("malformed");
        let client = ClientConfig::new().to_client();

        let PageView::Render(rendered) = client.view_page(
            &page,
            &VisibilityContext::from_query("utm_source=facebook", ""),
        ) else {
            panic!("page without a test must render");
        };

        let ids: Vec<&str> = rendered.blocks.iter().map(|it| it.block_id.as_str()).collect();
        assert_eq!(ids, ["paid-social", "hero", "footer"]);

        // Only the parsed `exists` condition counts, and utm_medium is absent.
        assert!(!rendered.blocks[0].visible);
        assert!(rendered.blocks[1].visible);
        assert_eq!(rendered.blocks[1].variant_id, "original");
        assert_eq!(rendered.blocks[1].config, json!({ "headline": "Welcome" }));
        assert!(rendered.blocks[2].visible);
    }

    #[test]
    fn full_traffic_block_variant_is_sticky() {
        let durable = Arc::new(MemoryStorage::new());
        let page = load_page("block-variants");
        let block = &page.blocks[0];
        let ctx = VisibilityContext::default();

        let first = client_with(durable.clone(), 0.0).resolve_block(block, &ctx);
        assert_eq!(first.variant_id, "v1");
        assert_eq!(first.variant_name, "Urgency headline");
        assert_eq!(first.config, json!({ "headline": "Only 3 left!" }));

        // Same visitor storage, different luck: still v1.
        let second = client_with(durable.clone(), 0.999).resolve_block(block, &ctx);
        assert_eq!(second.variant_id, "v1");
        assert_eq!(
            durable.get("pb_ab_variant_block_hero").unwrap().as_deref(),
            Some("v1")
        );
    }

    #[test]
    fn running_page_test_navigates_to_variant_page() {
        let durable = Arc::new(MemoryStorage::new());
        let page = load_page("page-test");

        // Candidates: original 50, long-form 50.
        let client = client_with(durable.clone(), 0.75);
        let resolution = client.resolve_page(&page);

        let PageResolution::Navigate {
            page_id,
            page_variant,
        } = &resolution
        else {
            panic!("expected navigation, got {resolution:?}");
        };
        assert_eq!(page_id, "landing-long");
        assert_eq!(page_variant.test_id, "test-1");
        assert_eq!(page_variant.variant_id, "long-form");
        assert_eq!(
            durable.get("pb_ab_variant_test-1").unwrap().as_deref(),
            Some("long-form")
        );

        // Blocks are not resolved when navigating away.
        assert!(matches!(
            client.view_page(&page, &VisibilityContext::default()),
            PageView::Navigate { .. }
        ));
        assert_eq!(durable.get("pb_ab_variant_block_hero").unwrap(), None);
    }

    #[test]
    fn running_page_test_control_stays() {
        let page = load_page("page-test");
        let client = client_with(Arc::new(MemoryStorage::new()), 0.1);

        let resolution = client.resolve_page(&page);
        let PageResolution::Stay {
            page_variant: Some(page_variant),
        } = &resolution
        else {
            panic!("expected to stay on control, got {resolution:?}");
        };
        assert_eq!(page_variant.variant_id, "original");
        assert_eq!(page_variant.variant_name, "Original");
    }

    #[test]
    fn completed_page_test_is_ignored() {
        let durable = Arc::new(MemoryStorage::new());
        let mut page = load_page("page-test");
        page.ab_test.as_mut().unwrap().status = crate::page::AbTestStatus::Completed;

        let client = client_with(durable.clone(), 0.75);

        assert_eq!(
            client.resolve_page(&page),
            PageResolution::Stay { page_variant: None }
        );
        assert_eq!(durable.get("pb_ab_variant_test-1").unwrap(), None);
    }

    #[test]
    fn records_event_with_visibility_and_utm() {
        let events = Arc::new(Mutex::new(Vec::<ExperienceEvent>::new()));
        let page = load_page("visibility");

        let client = {
            let events = events.clone();
            let mut config = ClientConfig::new();
            config.event_recorder(move |event: ExperienceEvent| {
                events.lock().unwrap().push(event);
            });
            config.to_client()
        };

        let ctx = VisibilityContext::from_url(
            "https://shop.example.com/pages/sale?utm_source=Facebook&fbclid=abc",
            "https://l.facebook.com/",
        )
        .unwrap();
        let PageView::Render(rendered) = client.view_page(&page, &ctx) else {
            panic!("page without a test must render");
        };

        let visible: Vec<&str> = rendered
            .visible_blocks()
            .map(|it| it.block_id.as_str())
            .collect();
        assert_eq!(visible, ["facebook-offer", "footer"]);

        let events = events.lock().unwrap();
        assert_eq!(events.len(), 1);
        let event = &events[0];
        assert_eq!(event.visitor_id, rendered.identity.visitor_id);
        assert_eq!(event.session_id, rendered.identity.session_id);
        assert_eq!(event.page_id, "landing");
        assert_eq!(event.utm.utm_source.as_deref(), Some("Facebook"));
        assert_eq!(event.utm.fbclid.as_deref(), Some("abc"));
        assert_eq!(event.referrer, "https://l.facebook.com/");
        let outcomes: Vec<(&str, bool)> = event
            .blocks
            .iter()
            .map(|it| (it.block_id.as_str(), it.visible))
            .collect();
        assert_eq!(
            outcomes,
            [
                ("facebook-offer", true),
                ("google-offer", false),
                ("footer", true)
            ]
        );
    }

    #[test]
    fn identity_is_stable_across_page_views() {
        let durable = Arc::new(MemoryStorage::new());
        let client = client_with(durable.clone(), 0.5);
        let page = load_page("no-test");

        let PageView::Render(first) = client.view_page(&page, &VisibilityContext::default())
        else {
            panic!("page without a test must render");
        };
        let PageView::Render(second) = client.view_page(&page, &VisibilityContext::default())
        else {
            panic!("page without a test must render");
        };

        assert_eq!(first.identity, second.identity);
        assert_eq!(
            durable.get("pb_visitor_id").unwrap(),
            Some(first.identity.visitor_id)
        );
    }
}
