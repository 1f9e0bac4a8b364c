use tracing::warn;

use crate::types::{limits, Batch, Field, NamedBlock};

/// Appended to a single line that alone exceeds `MAX_FIELD_VALUE`.
/// Exactly 20 chars, so truncated line + marker lands on the limit.
const LINE_TRUNCATION_MARKER: &str = "... (line truncated)";

/// Result of packing a run's report blocks. `truncated` is set when the
/// global batch cap was hit and trailing content was dropped.
#[derive(Debug, Clone)]
pub struct Packed {
    pub batches: Vec<Batch>,
    pub truncated: bool,
}

/// All protocol limits count Unicode scalar values, not bytes.
fn char_len(s: &str) -> usize {
    s.chars().count()
}

fn truncate_chars(s: &str, max: usize) -> String {
    if char_len(s) <= max {
        s.to_string()
    } else {
        s.chars().take(max).collect()
    }
}

/// Split one block into delivery fields. The serialized block is used
/// whole when it fits; otherwise it is cut on line boundaries into the
/// fewest chunks that each fit `MAX_FIELD_VALUE`. A single line that
/// cannot fit on its own is hard-truncated with a marker.
fn split_block(block: &NamedBlock) -> Vec<Field> {
    let text = block.text();
    if char_len(&text) <= limits::MAX_FIELD_VALUE {
        return vec![Field {
            name: truncate_chars(&block.name, limits::MAX_FIELD_NAME),
            value: text,
        }];
    }

    let mut chunks: Vec<String> = Vec::new();
    let mut current = String::new();
    let mut current_len = 0usize;
    // Tracks whether `current` holds at least one line; an empty string
    // is a valid (empty) line and must survive chunking.
    let mut started = false;

    for raw in &block.lines {
        let line = if char_len(raw) > limits::MAX_FIELD_VALUE {
            warn!(
                block = %block.name,
                line_chars = char_len(raw),
                "single line exceeds field capacity, truncating"
            );
            let mut cut: String = raw
                .chars()
                .take(limits::MAX_FIELD_VALUE - LINE_TRUNCATION_MARKER.len())
                .collect();
            cut.push_str(LINE_TRUNCATION_MARKER);
            cut
        } else {
            raw.clone()
        };

        let line_len = char_len(&line);
        if started && current_len + 1 + line_len > limits::MAX_FIELD_VALUE {
            chunks.push(std::mem::take(&mut current));
            current_len = 0;
            started = false;
        }
        if started {
            current.push('\n');
            current_len += 1;
        }
        current.push_str(&line);
        current_len += line_len;
        started = true;
    }
    if started {
        chunks.push(current);
    }

    chunks
        .into_iter()
        .enumerate()
        .map(|(i, value)| {
            let name = if i == 0 {
                block.name.clone()
            } else {
                format!("{} (cont. {})", block.name, i)
            };
            Field {
                name: truncate_chars(&name, limits::MAX_FIELD_NAME),
                value,
            }
        })
        .collect()
}

/// Pack named report blocks into at most `MAX_BATCHES_PER_RUN` batches,
/// each respecting the field-count and character budgets. Never fails;
/// when the cap is hit, packing stops and `truncated` reports the loss.
pub fn pack(blocks: &[NamedBlock], title: &str, description: &str) -> Packed {
    let title = truncate_chars(title, limits::MAX_TITLE);
    let description = truncate_chars(description, limits::MAX_DESCRIPTION);
    let cont_title = truncate_chars(&format!("{title} (cont.)"), limits::MAX_TITLE);

    let mut batches: Vec<Batch> = Vec::new();
    let mut truncated = false;
    // The first batch pays for its title and description up front;
    // continuation batches pay only for the continuation title.
    let mut current = Batch {
        chars_used: char_len(&title) + char_len(&description),
        title,
        description,
        fields: Vec::new(),
    };

    'blocks: for block in blocks {
        if block.text().trim().is_empty() {
            continue;
        }
        for field in split_block(block) {
            let size = char_len(&field.name) + char_len(&field.value);
            let over_fields = current.fields.len() + 1 > limits::MAX_FIELDS_PER_BATCH;
            let over_chars = current.chars_used + size > limits::MAX_CHARS_PER_BATCH;

            if over_fields || over_chars {
                let next = Batch {
                    title: cont_title.clone(),
                    description: String::new(),
                    fields: Vec::new(),
                    chars_used: char_len(&cont_title),
                };
                batches.push(std::mem::replace(&mut current, next));
                if batches.len() == limits::MAX_BATCHES_PER_RUN {
                    warn!(
                        batches = batches.len(),
                        "batch cap reached, dropping remaining report content"
                    );
                    truncated = true;
                    break 'blocks;
                }
            }

            current.chars_used += size;
            current.fields.push(field);
        }
    }

    if !truncated && !current.fields.is_empty() {
        batches.push(current);
    }

    Packed { batches, truncated }
}
