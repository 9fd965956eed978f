use super::rules::{RuleField, RuleTable};
use crate::util::collapse_whitespace;

const VALUE_TERMINATORS: [char; 6] = ['。', '！', '？', '!', '?', '\n'];

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtractedFields {
    pub stem: String,
    pub answer: String,
    pub analysis: String,
}

#[derive(Debug)]
struct FieldValue {
    field: RuleField,
    remove_start: usize,
    remove_end: usize,
    value: String,
}

/// Pulls answer and analysis out of a span and leaves the rest as the stem.
///
/// A marker's value stops at the first sentence terminator, the next
/// answer/analysis marker, or the end of the span. The first non-empty value
/// per field wins; every marker and its value are cut from the stem.
pub fn extract_fields(rules: &RuleTable, span: &str) -> ExtractedFields {
    let hits = rules.field_hits(span);
    if hits.is_empty() {
        return ExtractedFields {
            stem: span.trim().to_string(),
            ..ExtractedFields::default()
        };
    }

    let mut values = Vec::<FieldValue>::with_capacity(hits.len());
    for (index, hit) in hits.iter().enumerate() {
        let limit = hits
            .get(index + 1)
            .map(|next| next.start)
            .unwrap_or(span.len());
        let window = &span[hit.end..limit];

        let (value_end, remove_end) = match window.char_indices().find(|(_, character)| {
            VALUE_TERMINATORS.contains(character)
        }) {
            Some((offset, '。')) => (hit.end + offset, hit.end + offset + '。'.len_utf8()),
            Some((offset, _)) => (hit.end + offset, hit.end + offset),
            None => (limit, limit),
        };

        values.push(FieldValue {
            field: hit.field,
            remove_start: hit.start,
            remove_end,
            value: span[hit.end..value_end].trim().to_string(),
        });
    }

    let first_value = |field: RuleField| {
        values
            .iter()
            .find(|entry| entry.field == field && !entry.value.is_empty())
            .map(|entry| entry.value.clone())
            .unwrap_or_default()
    };
    let answer = first_value(RuleField::Answer);
    let analysis = first_value(RuleField::Analysis);

    let mut stem = String::with_capacity(span.len());
    let mut cursor = 0usize;
    for entry in &values {
        if entry.remove_start > cursor {
            stem.push_str(&span[cursor..entry.remove_start]);
            stem.push(' ');
        }
        cursor = cursor.max(entry.remove_end);
    }
    if cursor < span.len() {
        stem.push_str(&span[cursor..]);
    }

    ExtractedFields {
        stem: collapse_whitespace(&stem),
        answer,
        analysis,
    }
}
