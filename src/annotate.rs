use std::collections::HashMap;
use std::sync::OnceLock;

use regex::{NoExpand, Regex};

use crate::design::{BlockMeta, ContentBlock, DesignDocument};
use crate::error::Diagnostic;
use crate::field::{field_lookup, FieldDefinition};

/// The outcome of annotation: a rewritten design plus every non-fatal
/// condition met along the way. Annotation itself never fails.
#[derive(Debug, Clone, PartialEq)]
pub struct Annotated {
    pub design: DesignDocument,
    pub diagnostics: Vec<Diagnostic>,
}

fn merge_tag_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\{\{([^}]+)\}\}").expect("merge tag regex"))
}

fn html_tag_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"<(\w+)([^>]*)>").expect("html tag regex"))
}

fn id_attr_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#"\bid\s*=\s*["']([^"']*)["']"#).expect("id attr regex"))
}

/// Replaces every `{{field_id}}` merge tag in the design's content blocks
/// with the field's default value, injecting a stable `id` attribute so the
/// review-time merger can locate the element. Visits rows, headers, and
/// footers. The input document is not mutated; a rewritten deep copy is
/// returned.
///
/// Unknown field ids are left verbatim in the text and reported as
/// [`Diagnostic::UnknownField`]. Re-annotating an already annotated design
/// is a no-op: consumed merge tags are gone and injected ids are stable.
pub fn annotate(design: &DesignDocument, fields: &[FieldDefinition]) -> Annotated {
    let lookup = field_lookup(fields);
    let mut design = design.clone();
    let mut diagnostics = Vec::new();

    for section in design.sections_mut() {
        for column in &mut section.columns {
            for block in &mut column.contents {
                annotate_block(block, &lookup, &mut diagnostics);
            }
        }
    }

    Annotated { design, diagnostics }
}

fn annotate_block(
    block: &mut ContentBlock,
    lookup: &HashMap<&str, &FieldDefinition>,
    diagnostics: &mut Vec<Diagnostic>,
) {
    let mut found = Vec::new();

    if let Some(text) = block.values.text.take() {
        let (processed, ids) = process_text(&text, lookup, diagnostics);
        block.values.text = Some(processed);
        found.extend(ids);
    }

    if let Some(html) = block.values.html.take() {
        let (processed, ids) = process_text(&html, lookup, diagnostics);
        block.values.html = Some(processed);
        found.extend(ids);
    }

    // Merge tags inserted through the editor's tag picker land only in the
    // rich-text state (`textJson`); the plain `text` payload is absent. If
    // that state holds a single tag, synthesize `text` with the injected id
    // so the exported HTML carries the element. `textJson` stays untouched.
    if block.values.text.as_deref().map_or(true, str::is_empty) {
        if let Some(text_json) = &block.values.text_json {
            match serde_json::to_string(text_json) {
                Ok(raw) => {
                    if let Some(caps) = merge_tag_regex().captures(&raw) {
                        let field_id = caps[1].to_string();
                        if let Some(field) = lookup.get(field_id.as_str()) {
                            block.values.text =
                                Some(inject_id(&field.default_field_value, &field_id));
                            found.push(field_id);
                        }
                    }
                }
                Err(_) => {
                    let block_id = block.id.clone().unwrap_or_default();
                    tracing::warn!(block_id = %block_id, "unreadable secondary payload");
                    diagnostics.push(Diagnostic::SecondaryPayloadSkipped { block_id });
                }
            }
        }
    }

    record_field_ids(block, &found);
}

/// Replaces known `{{field_id}}` tags with `inject_id(default, id)`,
/// leaving unknown tags verbatim. Returns the rewritten text and the ids
/// that matched a field definition.
fn process_text(
    text: &str,
    lookup: &HashMap<&str, &FieldDefinition>,
    diagnostics: &mut Vec<Diagnostic>,
) -> (String, Vec<String>) {
    let mut found = Vec::new();
    let processed = merge_tag_regex().replace_all(text, |caps: &regex::Captures| {
        let field_id = caps[1].to_string();
        match lookup.get(field_id.as_str()) {
            Some(field) => {
                let injected = inject_id(&field.default_field_value, &field_id);
                found.push(field_id);
                injected
            }
            None => {
                tracing::warn!(field_id = %field_id, "no template field for merge tag");
                diagnostics.push(Diagnostic::UnknownField {
                    field_id: field_id.clone(),
                });
                caps[0].to_string()
            }
        }
    });
    (processed.into_owned(), found)
}

/// Adds `id="field_id"` to the first HTML start tag in `content`, replacing
/// any existing id outright. Tag-less content is wrapped in a span carrying
/// the id.
pub(crate) fn inject_id(content: &str, field_id: &str) -> String {
    let tag_re = html_tag_regex();
    let Some(caps) = tag_re.captures(content) else {
        return format!("<span id=\"{}\">{}</span>", field_id, content);
    };

    let tag = caps[1].to_string();
    let attrs = caps.get(2).map(|m| m.as_str()).unwrap_or("");
    let id_re = id_attr_regex();

    let updated_attrs = if id_re.is_match(attrs) {
        id_re
            .replace(attrs, NoExpand(&format!("id=\"{}\"", field_id)))
            .into_owned()
    } else if attrs.is_empty() {
        format!(" id=\"{}\"", field_id)
    } else {
        format!("{} id=\"{}\"", attrs, field_id)
    };

    tag_re
        .replace(content, NoExpand(&format!("<{}{}>", tag, updated_attrs)))
        .into_owned()
}

/// Unions newly found field ids into the block's `htmlID` token set,
/// deduplicated and order-stable.
fn record_field_ids(block: &mut ContentBlock, found: &[String]) {
    if found.is_empty() {
        return;
    }

    let meta = block.values.meta.get_or_insert_with(BlockMeta::default);
    let mut tokens: Vec<String> = meta
        .html_id
        .as_deref()
        .unwrap_or("")
        .split_whitespace()
        .map(String::from)
        .collect();
    for id in found {
        if !tokens.iter().any(|t| t == id) {
            tokens.push(id.clone());
        }
    }
    meta.html_id = Some(tokens.join(" "));
}

/// Collects every `{{field_id}}` placeholder id present in the design's
/// text and HTML payloads, deduplicated in discovery order.
pub fn extract_template_field_ids(design: &DesignDocument) -> Vec<String> {
    let mut ids: Vec<String> = Vec::new();
    let mut collect = |text: &str| {
        for caps in merge_tag_regex().captures_iter(text) {
            let id = caps[1].to_string();
            if !ids.iter().any(|known| *known == id) {
                ids.push(id);
            }
        }
    };

    for section in design.sections() {
        for column in &section.columns {
            for block in &column.contents {
                if let Some(text) = block.values.text.as_deref() {
                    collect(text);
                }
                if let Some(html) = block.values.html.as_deref() {
                    collect(html);
                }
            }
        }
    }
    ids
}
