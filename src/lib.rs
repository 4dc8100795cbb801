//! # Popflow Merge
//!
//! Content-merging and preview pipeline for popup template review.
//!
//! Two cooperating passes:
//! - **Annotation** (save-time): replaces `{{field_id}}` merge tags in a
//!   design document with default values and injects stable element ids.
//! - **Merging** (review-time): substitutes shopper-specific values and the
//!   assigned coupon list into the annotated HTML, producing body-only
//!   markup for an isolated rendering surface.
//!
//! ## Example — annotate then merge
//! ```ignore
//! use popflow_merge::{annotate, merge_text, ContentMapping, FieldDefinition};
//!
//! let annotated = annotate(&design, &fields);
//! // ... template is persisted, exported as HTML ...
//! let mut mapping = ContentMapping::new();
//! mapping.insert("heading_id".to_string(), "Summer Sale".to_string());
//! let merged = merge_text(&template_html, &mapping);
//! assert!(merged.diagnostics.is_empty());
//! ```
//!
//! All merge functions are best-effort and never panic: the caller always
//! gets renderable HTML back, with skipped work reported as diagnostics.

pub mod annotate;
pub mod coupon;
pub mod design;
pub mod error;
pub mod field;
pub mod merge;
pub mod surface;

// --- Core types ---
pub use annotate::{annotate, extract_template_field_ids, Annotated};
pub use coupon::{
    merge_coupons, CouponDisplayItem, CouponSelection, MAX_COUPON_ITEMS,
};
pub use design::{BlockMeta, BlockValues, ColumnBlock, ContentBlock, DesignBody, DesignDocument, Section};
pub use error::{Diagnostic, MergeError, MergeResult};
pub use field::{ContentMapping, FieldDefinition};
pub use merge::{extract_merge_field_ids, merge_text, Merged};
pub use surface::{
    Generation, RenderSurface, SandboxPolicy, SurfaceId, SurfaceSynchronizer, SyncOutcome,
};

/// Full review-time merge: text substitution first, then the coupon list —
/// but only once the reviewer's selection applies. Until a non-empty
/// selection exists or the selection was explicitly changed, the template's
/// built-in default coupons are preserved.
pub fn merge(html: &str, mapping: &ContentMapping, selection: &CouponSelection) -> Merged {
    let mut merged = merge_text(html, mapping);
    if selection.should_apply() {
        let coupon_pass = merge_coupons(&merged.html, &selection.items);
        merged.html = coupon_pass.html;
        merged.diagnostics.extend(coupon_pass.diagnostics);
    }
    merged
}
