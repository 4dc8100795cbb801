use popflow_merge::{
    annotate, extract_merge_field_ids, extract_template_field_ids, merge, merge_coupons,
    merge_text, ContentMapping, CouponDisplayItem, CouponSelection, DesignDocument, Diagnostic,
    FieldDefinition, RenderSurface, SandboxPolicy, SurfaceId, SurfaceSynchronizer, SyncOutcome,
};
use pretty_assertions::assert_eq;
use serde_json::json;

// --- Fixtures ---

fn design_with_blocks(blocks: serde_json::Value) -> DesignDocument {
    serde_json::from_value(json!({
        "counters": { "u_row": 1 },
        "body": {
            "id": "body-1",
            "rows": [{
                "id": "row-1",
                "columns": [{ "id": "col-1", "contents": blocks, "values": {} }],
                "values": {}
            }],
            "headers": [],
            "footers": [],
            "values": {}
        },
        "schemaVersion": 16
    }))
    .expect("valid design fixture")
}

fn text_block(id: &str, text: &str) -> serde_json::Value {
    json!({ "id": id, "type": "heading", "values": { "text": text } })
}

fn field(id: &str, default: &str) -> FieldDefinition {
    serde_json::from_value(json!({
        "field_id": id,
        "default_field_value": default
    }))
    .expect("valid field fixture")
}

fn mapping(pairs: &[(&str, &str)]) -> ContentMapping {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

fn coupons(items: &[(&str, &str)]) -> Vec<CouponDisplayItem> {
    items
        .iter()
        .map(|(offer, sub)| CouponDisplayItem {
            offer_text: offer.to_string(),
            subtext: sub.to_string(),
        })
        .collect()
}

fn occurrences(haystack: &str, needle: &str) -> usize {
    haystack.matches(needle).count()
}

const COUPON_TEMPLATE: &str = "<div class=\"wrap\">\
<div data-component=\"two-column-coupon-list\" data-props='{\"columns\":2}'>\
<ul data-slot=\"coupon-items\">\
<li data-slot=\"coupon-item\">\
<span data-field=\"offer\">10% Off</span>\
<span data-field=\"subtext\">Template default</span>\
<a data-field=\"cta\" href=\"#\">Claim</a>\
</li>\
</ul>\
</div>\
</div>";

// --- Annotation ---

#[test]
fn annotate_injects_id_into_default_markup() {
    let design = design_with_blocks(json!([text_block("blk-1", "{{heading_id}}")]));
    let fields = vec![field("heading_id", "<h1>Welcome</h1>")];

    let annotated = annotate(&design, &fields);
    let text = annotated.design.body.rows[0].columns[0].contents[0]
        .values
        .text
        .as_deref();

    assert_eq!(text, Some("<h1 id=\"heading_id\">Welcome</h1>"));
    assert!(annotated.diagnostics.is_empty());
}

#[test]
fn annotate_wraps_plain_default_in_span() {
    let design = design_with_blocks(json!([text_block("blk-1", "Before {{greeting}} after")]));
    let fields = vec![field("greeting", "Hello")];

    let annotated = annotate(&design, &fields);
    let text = annotated.design.body.rows[0].columns[0].contents[0]
        .values
        .text
        .as_deref();

    assert_eq!(
        text,
        Some("Before <span id=\"greeting\">Hello</span> after")
    );
}

#[test]
fn annotate_replaces_existing_id_attribute() {
    let design = design_with_blocks(json!([text_block("blk-1", "{{cta}}")]));
    let fields = vec![field("cta", "<a id=\"old\" href=\"/go\">Shop now</a>")];

    let annotated = annotate(&design, &fields);
    let text = annotated.design.body.rows[0].columns[0].contents[0]
        .values
        .text
        .as_deref();

    assert_eq!(text, Some("<a id=\"cta\" href=\"/go\">Shop now</a>"));
}

#[test]
fn annotate_leaves_unknown_placeholder_verbatim() {
    let design = design_with_blocks(json!([text_block("blk-1", "{{missing}} and {{known}}")]));
    let fields = vec![field("known", "Value")];

    let annotated = annotate(&design, &fields);
    let text = annotated.design.body.rows[0].columns[0].contents[0]
        .values
        .text
        .as_deref()
        .unwrap()
        .to_string();

    assert!(text.contains("{{missing}}"));
    assert!(text.contains("<span id=\"known\">Value</span>"));
    assert!(annotated.diagnostics.contains(&Diagnostic::UnknownField {
        field_id: "missing".to_string()
    }));
}

#[test]
fn annotate_records_html_id_token_set() {
    let design = design_with_blocks(json!([text_block("blk-1", "{{a}} {{b}} {{a}}")]));
    let fields = vec![field("a", "One"), field("b", "Two")];

    let annotated = annotate(&design, &fields);
    let meta = annotated.design.body.rows[0].columns[0].contents[0]
        .values
        .meta
        .as_ref()
        .expect("meta written");

    assert_eq!(meta.html_id.as_deref(), Some("a b"));
}

#[test]
fn annotate_is_idempotent() {
    let design = design_with_blocks(json!([
        text_block("blk-1", "{{heading_id}}"),
        text_block("blk-2", "plain text")
    ]));
    let fields = vec![field("heading_id", "<h1>Welcome</h1>")];

    let once = annotate(&design, &fields);
    let twice = annotate(&once.design, &fields);

    assert_eq!(once.design, twice.design);
}

#[test]
fn annotate_visits_headers_and_footers() {
    let design: DesignDocument = serde_json::from_value(json!({
        "body": {
            "rows": [],
            "headers": [{
                "columns": [{ "contents": [text_block("hdr", "{{top}}")] }]
            }],
            "footers": [{
                "columns": [{ "contents": [text_block("ftr", "{{bottom}}")] }]
            }]
        }
    }))
    .unwrap();
    let fields = vec![field("top", "Header"), field("bottom", "Footer")];

    let annotated = annotate(&design, &fields);
    let header_text = annotated.design.body.headers.as_ref().unwrap()[0].columns[0].contents[0]
        .values
        .text
        .as_deref();
    let footer_text = annotated.design.body.footers.as_ref().unwrap()[0].columns[0].contents[0]
        .values
        .text
        .as_deref();

    assert_eq!(header_text, Some("<span id=\"top\">Header</span>"));
    assert_eq!(footer_text, Some("<span id=\"bottom\">Footer</span>"));
}

#[test]
fn annotate_synthesizes_text_from_secondary_payload() {
    let block = json!({
        "id": "blk-1",
        "type": "text",
        "values": {
            "textJson": { "root": { "children": [{ "type": "merge_tag", "tag": "{{promo_code}}" }] } }
        }
    });
    let design = design_with_blocks(json!([block]));
    let fields = vec![field("promo_code", "SAVE20")];

    let annotated = annotate(&design, &fields);
    let values = &annotated.design.body.rows[0].columns[0].contents[0].values;

    assert_eq!(
        values.text.as_deref(),
        Some("<span id=\"promo_code\">SAVE20</span>")
    );
    // The editor's own state stays untouched so it keeps showing the tag.
    assert_eq!(
        values.text_json,
        Some(json!({ "root": { "children": [{ "type": "merge_tag", "tag": "{{promo_code}}" }] } }))
    );
}

#[test]
fn annotate_preserves_unknown_properties() {
    let mut raw = json!({
        "counters": { "u_row": 1 },
        "body": {
            "rows": [{
                "columns": [{
                    "contents": [{
                        "id": "blk-1",
                        "type": "heading",
                        "values": { "text": "{{title}}", "fontSize": "22px" }
                    }]
                }]
            }]
        },
        "schemaVersion": 16
    });
    raw["vendorExtension"] = json!({ "nested": true });
    let design: DesignDocument = serde_json::from_value(raw).unwrap();
    let fields = vec![field("title", "Hi")];

    let annotated = annotate(&design, &fields);
    let round_trip: serde_json::Value =
        serde_json::from_str(&annotated.design.to_json().unwrap()).unwrap();

    assert_eq!(round_trip["vendorExtension"], json!({ "nested": true }));
    assert_eq!(
        round_trip["body"]["rows"][0]["columns"][0]["contents"][0]["values"]["fontSize"],
        json!("22px")
    );
}

#[test]
fn extract_template_field_ids_dedupes_in_order() {
    let design = design_with_blocks(json!([
        text_block("blk-1", "{{a}} {{b}}"),
        text_block("blk-2", "{{a}} {{c}}")
    ]));

    assert_eq!(extract_template_field_ids(&design), vec!["a", "b", "c"]);
}

// --- Text merging ---

#[test]
fn merge_text_targets_annotated_element_by_id() {
    let html = "<h1 id=\"heading_id\">Welcome</h1>";
    let merged = merge_text(html, &mapping(&[("heading_id", "Summer Sale")]));

    assert_eq!(merged.html, "<h1 id=\"heading_id\">Summer Sale</h1>");
    assert!(merged.diagnostics.is_empty());
}

#[test]
fn merge_text_id_selector_beats_data_attribute() {
    let html = "<div id=\"promo\">{{promo}}</div><div data-field-id=\"promo\">untouched</div>";
    let merged = merge_text(html, &mapping(&[("promo", "WINNER")]));

    assert!(merged.html.contains("<div id=\"promo\">WINNER</div>"));
    assert!(merged.html.contains(">untouched<"));
}

#[test]
fn merge_text_falls_back_to_data_attributes() {
    let html = "<p data-field=\"subtitle\">{{subtitle}}</p>";
    let merged = merge_text(html, &mapping(&[("subtitle", "Fresh deals")]));

    assert!(merged.html.contains(">Fresh deals</p>"));
}

#[test]
fn merge_text_resolves_input_by_name() {
    let html = "<input name=\"email_field\" type=\"text\">";
    let merged = merge_text(html, &mapping(&[("email_field", "you@example.com")]));

    assert!(merged.html.contains("value=\"you@example.com\""));
}

#[test]
fn merge_text_sets_textarea_content() {
    let html = "<textarea id=\"note\">old</textarea>";
    let merged = merge_text(html, &mapping(&[("note", "Leave by the door")]));

    assert!(merged.html.contains(">Leave by the door</textarea>"));
}

#[test]
fn merge_text_sets_image_source_and_alt() {
    let html = "<img id=\"hero\">";
    let merged = merge_text(html, &mapping(&[("hero", "https://cdn.example.com/sale.png")]));

    assert!(merged.html.contains("src=\"https://cdn.example.com/sale.png\""));
    assert!(merged.html.contains("alt=\"https://cdn.example.com/sale.png\""));
}

#[test]
fn merge_text_scans_text_for_legacy_placeholders() {
    let html = "<p>Use code {{promo}} at checkout</p>";
    let merged = merge_text(html, &mapping(&[("promo", "SAVE20")]));

    assert!(merged.html.contains("Use code SAVE20 at checkout"));
}

#[test]
fn merge_text_unknown_field_is_a_noop() {
    let html = "<h1 id=\"title\">Hello</h1>";
    let merged = merge_text(html, &mapping(&[("unknown_field", "x")]));

    assert_eq!(merged.html, html);
    assert!(merged.diagnostics.contains(&Diagnostic::UnresolvedField {
        field_id: "unknown_field".to_string()
    }));
}

#[test]
fn merge_text_is_deterministic() {
    let html = "<div id=\"a\">{{a}}</div><p>code {{b}} here</p>";
    let m = mapping(&[("a", "first"), ("b", "second")]);

    let once = merge_text(html, &m);
    let twice = merge_text(html, &m);

    assert_eq!(once.html, twice.html);
    assert_eq!(once.diagnostics, twice.diagnostics);
}

#[test]
fn merge_text_returns_original_on_unparsable_input() {
    let input = "coupon details coming soon";
    let merged = merge_text(input, &mapping(&[("any", "value")]));

    assert_eq!(merged.html, input);
    assert!(merged
        .diagnostics
        .iter()
        .any(|d| matches!(d, Diagnostic::MergeFailed { .. })));
}

#[test]
fn annotate_then_merge_end_to_end() {
    let design = design_with_blocks(json!([text_block("blk-1", "{{heading_id}}")]));
    let fields = vec![field("heading_id", "<h1>Welcome</h1>")];

    let annotated = annotate(&design, &fields);
    let exported = annotated.design.body.rows[0].columns[0].contents[0]
        .values
        .text
        .clone()
        .unwrap();
    assert_eq!(exported, "<h1 id=\"heading_id\">Welcome</h1>");

    let merged = merge_text(&exported, &mapping(&[("heading_id", "Summer Sale")]));
    assert!(merged
        .html
        .contains("<h1 id=\"heading_id\">Summer Sale</h1>"));
}

#[test]
fn extract_merge_field_ids_finds_ids_attributes_and_placeholders() {
    let html = "<h1 id=\"title\">Hi</h1><p data-field-id=\"sub\">x</p><span>{{promo}}</span>";
    let ids = extract_merge_field_ids(html);

    assert!(ids.contains(&"title".to_string()));
    assert!(ids.contains(&"sub".to_string()));
    assert!(ids.contains(&"promo".to_string()));
}

// --- Coupon reconciliation ---

#[test]
fn merge_coupons_truncates_to_twelve_items() {
    let many: Vec<(String, String)> = (0..20)
        .map(|i| (format!("{}% Off", i + 5), format!("Deal {}", i)))
        .collect();
    let many_refs: Vec<(&str, &str)> = many
        .iter()
        .map(|(a, b)| (a.as_str(), b.as_str()))
        .collect();

    let merged = merge_coupons(COUPON_TEMPLATE, &coupons(&many_refs));

    assert_eq!(occurrences(&merged.html, "data-slot=\"coupon-item\""), 12);
    assert!(merged.html.contains("data-coupon-count=\"12\""));
    assert!(merged
        .diagnostics
        .contains(&Diagnostic::CouponsTruncated { dropped: 8 }));
}

#[test]
fn merge_coupons_shrinks_list_in_place() {
    let five = coupons(&[
        ("A", "1"),
        ("B", "2"),
        ("C", "3"),
        ("D", "4"),
        ("E", "5"),
    ]);
    let grown = merge_coupons(COUPON_TEMPLATE, &five);
    assert_eq!(occurrences(&grown.html, "data-slot=\"coupon-item\""), 5);

    let two = coupons(&[("A", "1"), ("B", "2")]);
    let shrunk = merge_coupons(&grown.html, &two);

    assert_eq!(occurrences(&shrunk.html, "data-slot=\"coupon-item\""), 2);
    assert!(shrunk.html.contains("data-coupon-count=\"2\""));
}

#[test]
fn merge_coupons_without_container_returns_input_unchanged() {
    let html = "<div><p>No coupon component here</p></div>";
    let merged = merge_coupons(html, &coupons(&[("15% Off", "Today")]));

    assert_eq!(merged.html, html);
    assert!(merged.diagnostics.contains(&Diagnostic::CouponListAbsent));
}

#[test]
fn merge_coupons_recovers_from_malformed_props_blob() {
    let html = COUPON_TEMPLATE.replace("{\"columns\":2}", "not json");
    let merged = merge_coupons(&html, &coupons(&[("15% Off", "Today")]));

    assert!(merged.diagnostics.contains(&Diagnostic::MalformedPropsBlob));
    assert!(merged.html.contains("offerText"));
    assert!(merged.html.contains("data-coupon-count=\"1\""));
}

#[test]
fn merge_coupons_end_to_end_hides_empty_subtext() {
    let merged = merge_coupons(
        COUPON_TEMPLATE,
        &coupons(&[("15% Off", "Ends Friday"), ("Free Ship", "")]),
    );

    assert_eq!(occurrences(&merged.html, "data-slot=\"coupon-item\""), 2);
    assert!(merged.html.contains(">15% Off</span>"));
    assert!(merged.html.contains(">Ends Friday</span>"));
    assert!(merged.html.contains(">Free Ship</span>"));
    assert!(merged.html.contains("display:none"));
    assert!(merged.html.contains("id=\"tcl-item-0\""));
    assert!(merged.html.contains("id=\"tcl-item-1\""));
    assert!(merged.html.contains("data-coupon-index=\"1\""));
}

#[test]
fn merge_preserves_template_coupons_until_selection_applies() {
    let untouched = merge(COUPON_TEMPLATE, &ContentMapping::new(), &CouponSelection::default());
    assert!(untouched.html.contains(">10% Off</span>"));
    assert!(!untouched.html.contains("data-coupon-count"));

    let cleared = merge(
        COUPON_TEMPLATE,
        &ContentMapping::new(),
        &CouponSelection {
            items: Vec::new(),
            changed: true,
        },
    );
    assert_eq!(occurrences(&cleared.html, "data-slot=\"coupon-item\""), 0);
    assert!(cleared.html.contains("data-coupon-count=\"0\""));
}

// --- Surface synchronization ---

struct RecordingSurface {
    id: SurfaceId,
    writes: Vec<String>,
    listeners: usize,
}

impl RecordingSurface {
    fn new(id: SurfaceId) -> Self {
        RecordingSurface {
            id,
            writes: Vec::new(),
            listeners: 0,
        }
    }
}

impl RenderSurface for RecordingSurface {
    fn surface_id(&self) -> SurfaceId {
        self.id
    }

    fn write_document(&mut self, html: &str) {
        self.writes.push(html.to_string());
    }

    fn install_interaction_listener(&mut self) {
        self.listeners += 1;
    }
}

#[test]
fn synchronizer_skips_unchanged_html() {
    let mut sync = SurfaceSynchronizer::new(SandboxPolicy::default(), false);
    let mut surface = RecordingSurface::new(1);

    assert_eq!(sync.sync(&mut surface, "<p>a</p>"), SyncOutcome::Written);
    assert_eq!(
        sync.sync(&mut surface, "<p>a</p>"),
        SyncOutcome::SkippedUnchanged
    );
    assert_eq!(surface.writes.len(), 1);
}

#[test]
fn synchronizer_rewrites_on_html_change() {
    let mut sync = SurfaceSynchronizer::new(SandboxPolicy::default(), false);
    let mut surface = RecordingSurface::new(1);

    sync.sync(&mut surface, "<p>a</p>");
    assert_eq!(sync.sync(&mut surface, "<p>b</p>"), SyncOutcome::Written);
    assert_eq!(surface.writes, vec!["<p>a</p>", "<p>b</p>"]);
}

#[test]
fn synchronizer_rewrites_when_surface_is_recreated() {
    let mut sync = SurfaceSynchronizer::new(SandboxPolicy::default(), false);
    let mut desktop = RecordingSurface::new(1);
    sync.sync(&mut desktop, "<p>a</p>");

    // Same HTML, fresh surface: the device-frame swap destroyed the old
    // surface, so content comparison alone would wrongly skip the write.
    let mut mobile = RecordingSurface::new(2);
    assert_eq!(sync.sync(&mut mobile, "<p>a</p>"), SyncOutcome::Written);
    assert_eq!(mobile.writes, vec!["<p>a</p>"]);
}

#[test]
fn synchronizer_drops_stale_generation() {
    let mut sync = SurfaceSynchronizer::new(SandboxPolicy::default(), false);
    let mut surface = RecordingSurface::new(1);

    let slow = sync.begin();
    let fast = sync.begin();
    assert_eq!(sync.commit(fast, &mut surface, "<p>new</p>"), SyncOutcome::Written);
    assert_eq!(
        sync.commit(slow, &mut surface, "<p>old</p>"),
        SyncOutcome::SkippedStale
    );
    assert_eq!(surface.writes, vec!["<p>new</p>"]);
}

#[test]
fn synchronizer_reinstalls_listener_per_write_when_interactive() {
    let mut sync = SurfaceSynchronizer::new(SandboxPolicy::default(), true);
    let mut surface = RecordingSurface::new(1);

    sync.sync(&mut surface, "<p>a</p>");
    sync.sync(&mut surface, "<p>a</p>");
    sync.sync(&mut surface, "<p>b</p>");

    assert_eq!(surface.writes.len(), 2);
    assert_eq!(surface.listeners, 2);
}

#[test]
fn sandbox_policy_default_attribute_value() {
    assert_eq!(
        SandboxPolicy::default().attribute_value(),
        "allow-scripts allow-same-origin allow-forms"
    );
}
