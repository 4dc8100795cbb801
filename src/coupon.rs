use dom_query::{Document, Selection};
use serde::{Deserialize, Serialize};

use crate::error::{Diagnostic, MergeError, MergeResult};
use crate::merge::{serialize_body, Merged};

/// Structural marker contract for the coupon list component. Published
/// templates already carry these attribute names; they must not change.
pub const COUPON_LIST_SELECTOR: &str = "[data-component=\"two-column-coupon-list\"]";
pub const COUPON_PROPS_ATTR: &str = "data-props";
pub const COUPON_COUNT_ATTR: &str = "data-coupon-count";
pub const COUPON_ITEMS_SLOT_SELECTOR: &str = "[data-slot=\"coupon-items\"]";
pub const COUPON_ITEM_SELECTOR: &str = "[data-slot=\"coupon-item\"]";
pub const COUPON_OFFER_SELECTOR: &str = "[data-field=\"offer\"]";
pub const COUPON_SUBTEXT_SELECTOR: &str = "[data-field=\"subtext\"]";
pub const COUPON_CTA_SELECTOR: &str = "[data-field=\"cta\"]";
pub const COUPON_INDEX_ATTR: &str = "data-coupon-index";

/// At most this many coupon items are rendered; the rest are dropped.
pub const MAX_COUPON_ITEMS: usize = 12;

const DEFAULT_OFFER_LABEL: &str = "Offer";

/// One coupon as displayed in the list. Identity is positional — the
/// reconciler matches items to DOM nodes by index, not by a coupon id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CouponDisplayItem {
    #[serde(rename = "offerText", default)]
    pub offer_text: String,
    #[serde(default)]
    pub subtext: String,
}

/// The reviewer's current coupon choice. Until a non-empty selection
/// exists or the reviewer has explicitly changed it, the template's
/// built-in default coupons are preserved.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CouponSelection {
    pub items: Vec<CouponDisplayItem>,
    pub changed: bool,
}

impl CouponSelection {
    pub fn should_apply(&self) -> bool {
        !self.items.is_empty() || self.changed
    }
}

/// Reconciles the template's coupon list component against `coupons`.
///
/// Existing item nodes are updated in place so the template's own markup
/// and styling survive; the first item serves as a structural template when
/// the list grows, and trailing nodes are removed when it shrinks. A
/// template without the component is returned unchanged.
pub fn merge_coupons(html: &str, coupons: &[CouponDisplayItem]) -> Merged {
    let mut diagnostics = Vec::new();
    match try_merge_coupons(html, coupons, &mut diagnostics) {
        Ok(merged) => Merged {
            html: merged,
            diagnostics,
        },
        Err(err) => {
            tracing::warn!(error = %err, "coupon merge failed, returning original HTML");
            diagnostics.push(Diagnostic::MergeFailed {
                reason: err.to_string(),
            });
            Merged {
                html: html.to_string(),
                diagnostics,
            }
        }
    }
}

fn try_merge_coupons(
    html: &str,
    coupons: &[CouponDisplayItem],
    diagnostics: &mut Vec<Diagnostic>,
) -> MergeResult<String> {
    if !html.contains('<') {
        return Err(MergeError::NotHtml);
    }

    let doc = Document::from(html);
    let root_selection = doc.select(COUPON_LIST_SELECTOR);
    let Some(root) = root_selection.nodes().first() else {
        diagnostics.push(Diagnostic::CouponListAbsent);
        return Ok(html.to_string());
    };

    // Existing properties blob; malformed JSON degrades to an empty object.
    let mut props = serde_json::Map::new();
    if let Some(raw) = root.attr(COUPON_PROPS_ATTR) {
        match serde_json::from_str::<serde_json::Value>(&raw) {
            Ok(serde_json::Value::Object(map)) => props = map,
            _ => diagnostics.push(Diagnostic::MalformedPropsBlob),
        }
    }

    if coupons.len() > MAX_COUPON_ITEMS {
        diagnostics.push(Diagnostic::CouponsTruncated {
            dropped: coupons.len() - MAX_COUPON_ITEMS,
        });
    }
    let items = &coupons[..coupons.len().min(MAX_COUPON_ITEMS)];

    let items_value =
        serde_json::to_value(items).map_err(|e| MergeError::PropsBlob(e.to_string()))?;
    props.insert("coupons".to_string(), items_value);
    let props_json = serde_json::to_string(&serde_json::Value::Object(props))
        .map_err(|e| MergeError::PropsBlob(e.to_string()))?;
    root.set_attr(COUPON_PROPS_ATTR, &props_json);
    root.set_attr(COUPON_COUNT_ATTR, &items.len().to_string());

    let slot_selector = format!("{} {}", COUPON_LIST_SELECTOR, COUPON_ITEMS_SLOT_SELECTOR);
    let slot_selection = doc.select(&slot_selector);
    let Some(slot) = slot_selection.nodes().first() else {
        diagnostics.push(Diagnostic::CouponSlotAbsent);
        return serialize_body(&doc);
    };

    let item_selector = format!("{} {}", slot_selector, COUPON_ITEM_SELECTOR);
    let existing = doc.select(&item_selector);
    let existing_count = existing.nodes().len();

    // The first existing node is the structural template for growth. With
    // no item at all there is nothing to clone; only the blob and count are
    // updated.
    if existing_count > 0 && items.len() > existing_count {
        let template_html = existing.nodes()[0].html().to_string();
        for _ in existing_count..items.len() {
            slot.append_html(template_html.clone());
        }
    }

    let current = doc.select(&item_selector);
    for (index, (node, item)) in current.nodes().iter().zip(items).enumerate() {
        update_item(node, index, item);
    }

    for node in current.nodes().iter().skip(items.len()) {
        node.remove_from_parent();
    }

    serialize_body(&doc)
}

fn update_item(node: &dom_query::Node, index: usize, item: &CouponDisplayItem) {
    let offer = if item.offer_text.is_empty() {
        DEFAULT_OFFER_LABEL
    } else {
        item.offer_text.as_str()
    };

    node.set_attr("id", &format!("tcl-item-{}", index));
    node.set_attr("data-index", &index.to_string());
    node.set_attr("data-offer", offer);

    let scope = Selection::from(node.clone());

    let offer_selection = scope.select(COUPON_OFFER_SELECTOR);
    if let Some(offer_node) = offer_selection.nodes().first() {
        offer_node.set_text(offer);
    }

    let subtext_selection = scope.select(COUPON_SUBTEXT_SELECTOR);
    if let Some(subtext_node) = subtext_selection.nodes().first() {
        subtext_node.set_text(item.subtext.as_str());
        set_display(subtext_node, !item.subtext.is_empty());
    }

    let cta_selection = scope.select(COUPON_CTA_SELECTOR);
    if let Some(cta_node) = cta_selection.nodes().first() {
        cta_node.set_attr(COUPON_INDEX_ATTR, &index.to_string());
    }
}

/// Rewrites the inline `display` declaration: hidden nodes get
/// `display:none`, visible nodes get the declaration removed so the
/// template's stylesheet applies again.
fn set_display(node: &dom_query::Node, visible: bool) {
    let style = node
        .attr("style")
        .map(|s| s.to_string())
        .unwrap_or_default();
    let mut declarations: Vec<String> = style
        .split(';')
        .map(str::trim)
        .filter(|decl| {
            !decl.is_empty() && !decl.to_ascii_lowercase().starts_with("display")
        })
        .map(String::from)
        .collect();
    if !visible {
        declarations.push("display:none".to_string());
    }

    if declarations.is_empty() {
        node.remove_attr("style");
    } else {
        node.set_attr("style", &declarations.join(";"));
    }
}
