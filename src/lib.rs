//! Visitor experience selection for published landing pages.
//!
//! # Overview
//!
//! Pages are assembled from typed content blocks. When a page is viewed, this crate decides
//! which experience the visitor gets:
//!
//! - whether a running page-level A/B test sends the visitor to an alternate page,
//! - which variant of each block (if the block splits traffic) is shown,
//! - whether each block is visible under its conditional visibility rules.
//!
//! The [`ExperienceClient`] ties these together. It is built from a [`ClientConfig`], which
//! injects [`Storage`] backends for durable and session-scoped state, a [`RandomSource`] for
//! first-time variant draws, and an [`EventRecorder`] that receives an [`ExperienceEvent`] for
//! every rendered page view.
//!
//! Variant assignments are *sticky*: the first view draws a variant by traffic percentage and
//! stores it under the visitor's durable storage; later views reuse it for as long as the
//! variant exists.
//!
//! # Error Handling
//!
//! Experience decisions never fail. Missing or malformed rules, unknown enum values and storage
//! failures all fail open: content stays visible and the visitor is treated as first-seen.
//! Fallible plumbing (storage backends, page parsing) returns [`Error`].
//!
//! # Logging
//!
//! The package uses the [`log`](https://docs.rs/log/latest/log/) crate with target
//! `pb_experience`. Decisions are logged at `trace` level, new assignments at `debug`, and
//! storage degradation at `warn`.
//!
//! # Examples
//!
//! ```
//! # use pb_experience::{ClientConfig, Page, PageView, VisibilityContext};
//! let client = ClientConfig::new().to_client();
//! let page = Page::from_json(r#"{ "id": "landing", "blocks": [] }"#).unwrap();
//! let context = VisibilityContext::from_query("utm_source=facebook", "");
//!
//! match client.view_page(&page, &context) {
//!     PageView::Navigate { page_id, .. } => println!("redirect to {page_id}"),
//!     PageView::Render(rendered) => println!("{} blocks", rendered.visible_blocks().count()),
//! }
//! ```

#![warn(rustdoc::missing_crate_level_docs)]
#![warn(missing_docs)]

mod client;
mod config;
mod error;
mod events;
mod identity;
mod page;
mod random;
mod selector;
mod storage;
mod try_parse;
mod variant;
mod visibility;

pub use client::{ExperienceClient, PageResolution, PageView, RenderedPage, ResolvedBlock};
pub use config::ClientConfig;
pub use error::{Error, Result};
pub use events::{
    BlockOutcome, EventMetaData, EventRecorder, ExperienceEvent, PageVariant, UtmContext,
};
pub use identity::{IdentityProvider, VisitorIdentity};
pub use page::{AbTest, AbTestStatus, AbTestVariant, Block, BlockVariant, Page};
pub use random::RandomSource;
pub use selector::VariantSelector;
pub use storage::{
    JsonFileStorage, MemoryStorage, SharedStorage, Storage, TestKey, SESSION_ID_KEY,
    VISITOR_ID_KEY,
};
pub use variant::{
    AssignmentReason, Resolution, Variant, CONTROL_VARIANT_ID, CONTROL_VARIANT_NAME,
};
pub use visibility::{
    is_block_visible, Condition, ConditionField, ConditionOperator, UrlParams,
    VisibilityContext, VisibilityLogic, VisibilityRules,
};
