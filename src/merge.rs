use std::sync::OnceLock;

use dom_query::{Document, Selection};
use regex::{NoExpand, Regex};

use crate::error::{Diagnostic, MergeError, MergeResult};
use crate::field::ContentMapping;

/// The outcome of a merge pass: best-effort HTML plus every non-fatal
/// condition met along the way. Merging never fails outright — on a
/// processing error the original HTML comes back with a
/// [`Diagnostic::MergeFailed`] entry.
#[derive(Debug, Clone, PartialEq)]
pub struct Merged {
    pub html: String,
    pub diagnostics: Vec<Diagnostic>,
}

/// How a located element receives its value, decided once per element by
/// tag name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TargetKind {
    Input,
    TextArea,
    Select,
    Image,
    Generic,
}

impl TargetKind {
    fn of(node: &dom_query::Node) -> Self {
        let name = node
            .node_name()
            .map(|n| n.to_lowercase())
            .unwrap_or_default();
        match name.as_str() {
            "input" => TargetKind::Input,
            "textarea" => TargetKind::TextArea,
            "select" => TargetKind::Select,
            "img" => TargetKind::Image,
            _ => TargetKind::Generic,
        }
    }
}

/// Substitutes shopper-specific values into annotated template HTML.
///
/// Each mapping entry is resolved against the document by a fixed selector
/// priority list (id, data attributes, class, name), falling back to a text
/// scan for legacy placeholder syntax. Unresolved fields are skipped with a
/// diagnostic; they never block other fields. The returned markup is
/// body-only, ready for a full-document surface write.
pub fn merge_text(html: &str, mapping: &ContentMapping) -> Merged {
    let mut diagnostics = Vec::new();
    match try_merge_text(html, mapping, &mut diagnostics) {
        Ok(merged) => Merged {
            html: merged,
            diagnostics,
        },
        Err(err) => {
            tracing::warn!(error = %err, "content merge failed, returning original HTML");
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

fn try_merge_text(
    html: &str,
    mapping: &ContentMapping,
    diagnostics: &mut Vec<Diagnostic>,
) -> MergeResult<String> {
    if !html.contains('<') {
        return Err(MergeError::NotHtml);
    }

    let doc = Document::from(html);
    for (field_id, value) in mapping {
        match locate_target(&doc, field_id) {
            Some(node) => apply_value(&node, field_id, value),
            None => diagnostics.push(Diagnostic::UnresolvedField {
                field_id: field_id.clone(),
            }),
        }
    }
    serialize_body(&doc)
}

/// Serializes the document's body children only — the fragment callers
/// inject into a rendering surface.
pub(crate) fn serialize_body(doc: &Document) -> MergeResult<String> {
    let body = doc.select("body");
    let node = body.nodes().first().ok_or(MergeError::NotHtml)?;
    Ok(node.inner_html().to_string())
}

/// Element resolution, in contract order. The first selector that matches
/// wins; later selectors are not consulted.
fn locate_target<'a>(doc: &'a Document, field_id: &str) -> Option<dom_query::Node<'a>> {
    let selectors = [
        format!("#{}", css_escape(field_id)),
        format!("[data-field-id=\"{}\"]", field_id),
        format!("[data-field=\"{}\"]", field_id),
        format!("[data-id=\"{}\"]", field_id),
        format!(".field-{}", css_escape(field_id)),
        format!("[name=\"{}\"]", field_id),
    ];

    for selector in &selectors {
        // Field ids are caller data; a selector that fails to parse is
        // skipped, not an error.
        if let Some(selection) = doc.try_select(selector) {
            if let Some(node) = selection.nodes().first() {
                return Some(node.clone());
            }
        }
    }

    find_by_placeholder_text(doc, field_id)
}

/// Legacy fallback: scan element text for placeholder forms of the field
/// id and target the nearest non-script/style element holding one.
fn find_by_placeholder_text<'a>(doc: &'a Document, field_id: &str) -> Option<dom_query::Node<'a>> {
    let patterns = placeholder_forms(field_id);

    for node in doc.select("body *").nodes() {
        let name = node
            .node_name()
            .map(|n| n.to_lowercase())
            .unwrap_or_default();
        if name == "script" || name == "style" {
            continue;
        }
        let text = node.immediate_text();
        if patterns.iter().any(|p| text.contains(p.as_str())) {
            return Some(node.clone());
        }
    }
    None
}

/// The five legacy placeholder spellings, in priority order.
fn placeholder_forms(field_id: &str) -> [String; 5] {
    [
        format!("{{{{{}}}}}", field_id),
        format!("{{{}}}", field_id),
        format!("[{}]", field_id),
        format!("%{}%", field_id),
        format!("${}$", field_id),
    ]
}

fn apply_value(node: &dom_query::Node, field_id: &str, value: &str) {
    match TargetKind::of(node) {
        TargetKind::Input => node.set_attr("value", value),
        TargetKind::TextArea => node.set_text(value),
        TargetKind::Select => node.set_attr("value", value),
        TargetKind::Image => {
            node.set_attr("src", value);
            node.set_attr("alt", value);
        }
        TargetKind::Generic => replace_inner_patterns(node, field_id, value),
    }
}

/// Pattern-based replacement inside a generic element's inner markup:
/// field-specific placeholder spellings first, generic bracketed content
/// second, full overwrite as the last resort.
fn replace_inner_patterns(node: &dom_query::Node, field_id: &str, value: &str) {
    let current = node.inner_html().to_string();
    let mut updated = None;

    let escaped = regex::escape(field_id);
    let specific = [
        format!(r"\{{\{{{}\}}\}}", escaped),
        format!(r"\{{{}\}}", escaped),
        format!(r"\[{}\]", escaped),
        format!("%{}%", escaped),
        format!(r"\${}\$", escaped),
    ];
    for pattern in &specific {
        let Ok(re) = Regex::new(pattern) else {
            continue;
        };
        if re.is_match(&current) {
            updated = Some(re.replace_all(&current, NoExpand(value)).into_owned());
            break;
        }
    }

    if updated.is_none() {
        for re in generic_placeholder_regexes() {
            if re.is_match(&current) {
                updated = Some(re.replace_all(&current, NoExpand(value)).into_owned());
                break;
            }
        }
    }

    let new_inner = updated.unwrap_or_else(|| value.to_string());
    Selection::from(node.clone()).set_html(new_inner);
}

fn generic_placeholder_regexes() -> &'static [Regex] {
    static RES: OnceLock<Vec<Regex>> = OnceLock::new();
    RES.get_or_init(|| {
        [
            r"\{\{[^}]*\}\}",
            r"\{[^}]*\}",
            r"\[[^\]]*\]",
            r"%[^%]*%",
            r"\$[^$]*\$",
        ]
        .iter()
        .map(|p| Regex::new(p).expect("generic placeholder regex"))
        .collect()
    })
}

/// Minimal CSS identifier escaping, enough for field ids that start with a
/// digit or contain separator characters.
pub(crate) fn css_escape(ident: &str) -> String {
    let mut out = String::with_capacity(ident.len() + 4);
    for (i, ch) in ident.chars().enumerate() {
        if i == 0 && ch.is_ascii_digit() {
            out.push_str(&format!("\\3{} ", ch));
        } else if ch.is_ascii_alphanumeric() || ch == '-' || ch == '_' || !ch.is_ascii() {
            out.push(ch);
        } else {
            out.push('\\');
            out.push(ch);
        }
    }
    out
}

/// Collects candidate field ids from annotated HTML: `id` attributes,
/// `data-field-id` attributes, and placeholder patterns in body text.
pub fn extract_merge_field_ids(html: &str) -> Vec<String> {
    let mut ids: Vec<String> = Vec::new();
    if !html.contains('<') {
        return ids;
    }
    let mut push_unique = |id: String| {
        if !id.is_empty() && !ids.iter().any(|known| *known == id) {
            ids.push(id);
        }
    };

    let doc = Document::from(html);
    for node in doc.select("[id]").nodes() {
        if let Some(id) = node.attr("id") {
            push_unique(id.trim().to_string());
        }
    }
    for node in doc.select("[data-field-id]").nodes() {
        if let Some(id) = node.attr("data-field-id") {
            push_unique(id.trim().to_string());
        }
    }

    if let Some(body) = doc.select("body").nodes().first() {
        let text = body.text().to_string();
        for re in placeholder_capture_regexes() {
            for caps in re.captures_iter(&text) {
                push_unique(caps[1].trim().to_string());
            }
        }
    }
    ids
}

fn placeholder_capture_regexes() -> &'static [Regex] {
    static RES: OnceLock<Vec<Regex>> = OnceLock::new();
    RES.get_or_init(|| {
        [
            r"\{\{([^}]+)\}\}",
            r"\{([^}]+)\}",
            r"\[([^\]]+)\]",
            r"%([^%]+)%",
            r"\$([^$]+)\$",
        ]
        .iter()
        .map(|p| Regex::new(p).expect("placeholder capture regex"))
        .collect()
    })
}
