//! Resolve the experience for one page view.
//!
//! ```text
//! cargo run --example page_view -- tests/data/pages/visibility.json \
//!     "https://shop.example.com/pages/sale?utm_source=facebook" "https://l.facebook.com/"
//! ```
//!
//! Assignments and the visitor id are kept in `PB_STORAGE` (default `.pb-storage.json`), so
//! running the command again shows the same variants.
use pb_experience::{ClientConfig, ExperienceEvent, JsonFileStorage, Page, PageView, VisibilityContext};

pub fn main() {
    env_logger::init();

    let mut args = std::env::args().skip(1);
    let page_path = args.next().expect("usage: page_view <page.json> <url> [referrer]");
    let url = args.next().expect("usage: page_view <page.json> <url> [referrer]");
    let referrer = args.next().unwrap_or_default();
    let storage_path =
        std::env::var("PB_STORAGE").unwrap_or_else(|_| ".pb-storage.json".to_owned());

    let page = Page::from_json(&std::fs::read_to_string(page_path).unwrap()).unwrap();
    let context = VisibilityContext::from_url(&url, referrer).unwrap();

    let mut config = ClientConfig::new();
    config
        .durable_storage(JsonFileStorage::open(storage_path).unwrap())
        .event_recorder(|event: ExperienceEvent| {
            println!(
                "Event: {}",
                serde_json::to_string_pretty(&event.to_properties()).unwrap()
            );
        });
    let client = config.to_client();

    match client.view_page(&page, &context) {
        PageView::Navigate {
            page_id,
            page_variant,
        } => {
            println!(
                "Navigate to page {:?} (test {:?}, variant {:?})",
                page_id, page_variant.test_id, page_variant.variant_id
            );
        }
        PageView::Render(rendered) => {
            for block in &rendered.blocks {
                println!(
                    "{:<20} variant={:<12} visible={}",
                    block.block_id, block.variant_id, block.visible
                );
            }
        }
    }
}
