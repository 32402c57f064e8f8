//! Repair of quoted CSV fields that span several physical lines
//!
//! Exports produced by web applications often carry free-text cells with
//! embedded line breaks. Each quoted field has its whitespace runs, line
//! breaks included, collapsed to a single space and is trimmed; everything
//! outside quotes is copied through untouched. Spaces or tabs between a
//! delimiter and an opening quote are dropped so the repaired field decodes
//! as a quoted field.

/// Collapse line breaks and whitespace runs inside every quoted field
pub fn sanitize(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut field = String::new();
    let mut in_quotes = false;
    let mut at_field_start = true;
    let mut padding = String::new();
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        if in_quotes {
            if c == '"' {
                if chars.peek() == Some(&'"') {
                    chars.next();
                    field.push_str("\"\"");
                } else {
                    in_quotes = false;
                    out.push('"');
                    out.push_str(&collapse_whitespace(&field));
                    out.push('"');
                    field.clear();
                }
            } else {
                field.push(c);
            }
            continue;
        }

        if at_field_start && matches!(c, ' ' | '\t') {
            padding.push(c);
            continue;
        }

        // A quote only opens a quoted field at the start of a field
        if c == '"' && at_field_start {
            in_quotes = true;
            at_field_start = false;
            padding.clear();
            continue;
        }

        out.push_str(&padding);
        padding.clear();
        out.push(c);
        at_field_start = matches!(c, ',' | '\n' | '\r');
    }

    out.push_str(&padding);

    // Unterminated quote: leave the tail as it was
    if in_quotes {
        out.push('"');
        out.push_str(&field);
    }

    out
}

/// Number of physical lines in `text`
///
/// A trailing segment without a terminator counts as a line; empty lines do
/// not. A line holding only spaces is a record to the CSV reader, so it counts.
pub fn physical_line_count(text: &str) -> usize {
    text.lines().filter(|line| !line.is_empty()).count()
}

fn collapse_whitespace(value: &str) -> String {
    value.split_whitespace().collect::<Vec<_>>().join(" ")
}
