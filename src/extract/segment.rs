use super::rules::{MarkerClass, RuleField, RuleHit, RuleTable};

/// One putative problem cut out of normalized page text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Span {
    pub sequence: usize,
    pub marker: String,
    pub class: MarkerClass,
    pub text: String,
}

#[derive(Debug, Clone, Copy)]
enum SegmenterState {
    Scanning,
    InSpan {
        open: RuleHit,
    },
    Emit {
        open: RuleHit,
        end: usize,
        next: Option<RuleHit>,
    },
}

/// Splits normalized text into spans, one pass over the marker hits.
///
/// A span starts right after its marker and stops before the next marker of
/// the same or a stronger class. Weaker markers inside an open span are plain
/// content. Text before the first marker is discarded.
pub fn segment(rules: &RuleTable, text: &str) -> Vec<Span> {
    let mut hits = rules.marker_hits(text).into_iter();
    let mut spans = Vec::<Span>::new();
    let mut state = SegmenterState::Scanning;

    loop {
        state = match state {
            SegmenterState::Scanning => match hits.next() {
                Some(open) => SegmenterState::InSpan { open },
                None => break,
            },
            SegmenterState::InSpan { open } => match hits.next() {
                Some(next) if class_of(next) <= class_of(open) => SegmenterState::Emit {
                    open,
                    end: next.start,
                    next: Some(next),
                },
                Some(_) => SegmenterState::InSpan { open },
                None => SegmenterState::Emit {
                    open,
                    end: text.len(),
                    next: None,
                },
            },
            SegmenterState::Emit { open, end, next } => {
                let body = text[open.end..end].trim();
                if !body.is_empty() {
                    spans.push(Span {
                        sequence: spans.len() + 1,
                        marker: text[open.start..open.end].to_string(),
                        class: class_of(open),
                        text: body.to_string(),
                    });
                }

                match next {
                    Some(open) => SegmenterState::InSpan { open },
                    None => break,
                }
            }
        };
    }

    spans
}

fn class_of(hit: RuleHit) -> MarkerClass {
    match hit.field {
        RuleField::Marker(class) => class,
        RuleField::Answer | RuleField::Analysis => MarkerClass::Keyword,
    }
}
