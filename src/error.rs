use thiserror::Error;

pub type MergeResult<T> = Result<T, MergeError>;

/// Hard errors. These surface only from explicit parse entry points
/// (design/field/mapping JSON, CLI file handling) — the merge functions
/// themselves never return one to callers, they fall back to the original
/// HTML and report through [`Diagnostic`] instead.
#[derive(Error, Debug, Clone)]
pub enum MergeError {
    #[error("Design document parse error: {0}")]
    DesignParse(String),

    #[error("Field definitions parse error: {0}")]
    FieldsParse(String),

    #[error("Content mapping parse error: {0}")]
    MappingParse(String),

    #[error("Coupon list parse error: {0}")]
    CouponsParse(String),

    #[error("Input contains no HTML markup")]
    NotHtml,

    #[error("Properties blob serialization error: {0}")]
    PropsBlob(String),

    #[error("Invalid input: {0}")]
    Invalid(String),
}

/// Non-fatal conditions collected during annotation and merging.
///
/// A diagnostic never blocks other fields from merging; it records what was
/// skipped so callers (and tests) can observe best-effort behavior instead
/// of silently losing it.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Diagnostic {
    #[error("No template field found for merge tag '{{{{{field_id}}}}}'")]
    UnknownField { field_id: String },

    #[error("Secondary payload for block '{block_id}' could not be read; skipped")]
    SecondaryPayloadSkipped { block_id: String },

    #[error("No merge target found for field '{field_id}'")]
    UnresolvedField { field_id: String },

    #[error("Template has no coupon list component")]
    CouponListAbsent,

    #[error("Coupon list has no items slot")]
    CouponSlotAbsent,

    #[error("Malformed data-props blob; treated as empty")]
    MalformedPropsBlob,

    #[error("Coupon list truncated: {dropped} item(s) beyond the limit dropped")]
    CouponsTruncated { dropped: usize },

    #[error("Merge failed, original HTML returned: {reason}")]
    MergeFailed { reason: String },
}
