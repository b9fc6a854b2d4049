use std::borrow::Cow;

/// Pluralizes a piece of text.
pub fn pluralize(base: &str, count: usize) -> Cow<'_, str> {
    if count == 1 {
        base.into()
    } else {
        format!("{base}s").into()
    }
}

/// Turns a webhook action (`review_requested`) into title case (`Review requested`).
pub fn humanize_action(action: &str) -> String {
    let mut chars = action.chars();
    match chars.next() {
        Some(first) => first
            .to_uppercase()
            .chain(chars.map(|c| if c == '_' { ' ' } else { c }))
            .collect(),
        None => String::new(),
    }
}

/// Shortens `text` to at most `limit` characters, marking the cut with an ellipsis.
pub fn truncate(text: &str, limit: usize) -> Cow<'_, str> {
    match text.char_indices().nth(limit) {
        Some((index, _)) => format!("{}...", &text[..index]).into(),
        None => text.into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pluralize_zero() {
        assert_eq!(pluralize("recipient", 0), "recipients");
    }

    #[test]
    fn pluralize_one() {
        assert_eq!(pluralize("recipient", 1), "recipient");
    }

    #[test]
    fn humanize_single_word() {
        assert_eq!(humanize_action("reopened"), "Reopened");
    }

    #[test]
    fn humanize_snake_case() {
        assert_eq!(humanize_action("review_requested"), "Review requested");
    }

    #[test]
    fn humanize_empty() {
        assert_eq!(humanize_action(""), "");
    }

    #[test]
    fn truncate_short() {
        assert_eq!(truncate("hello", 5), "hello");
    }

    #[test]
    fn truncate_long() {
        assert_eq!(truncate("hello world", 5), "hello...");
    }

    #[test]
    fn truncate_multibyte() {
        assert_eq!(truncate("héllo wörld", 7), "héllo w...");
    }
}
