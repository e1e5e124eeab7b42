//! Text rendering utilities for human-friendly error messages.
//!
//! Provides helpers to format resolution chains, type names,
//! and "did you mean?" suggestions in error output.

/// Renders a resolution chain as a readable string.
///
/// # Examples
/// ```
/// use quickwire_support::rendering::render_chain;
///
/// let chain = vec!["Mailer", "Transport", "Mailer"];
/// assert_eq!(render_chain(&chain), "Mailer → Transport → Mailer");
/// ```
pub fn render_chain(chain: &[impl AsRef<str>]) -> String {
    chain
        .iter()
        .map(|s| s.as_ref())
        .collect::<Vec<_>>()
        .join(" → ")
}

/// Shortens a fully qualified type name for display.
///
/// Every path segment is dropped, generic arguments and trait objects
/// keep their shape.
///
/// ```
/// use quickwire_support::rendering::shorten_type_name;
///
/// assert_eq!(shorten_type_name("app::mail::Mailer"), "Mailer");
/// assert_eq!(
///     shorten_type_name("alloc::sync::Arc<dyn app::mail::Transport>"),
///     "Arc<dyn Transport>"
/// );
/// ```
pub fn shorten_type_name(full_name: &str) -> String {
    let mut result = String::with_capacity(full_name.len());
    let mut chars = full_name.chars().peekable();
    let mut segment = String::new();

    while let Some(ch) = chars.next() {
        match ch {
            ':' if chars.peek() == Some(&':') => {
                chars.next();
                segment.clear();
            }
            '<' | '>' | ',' | ' ' | '(' | ')' | '[' | ']' | ';' | '&' => {
                result.push_str(&segment);
                result.push(ch);
                segment.clear();
            }
            _ => segment.push(ch),
        }
    }

    result.push_str(&segment);
    result
}

/// Picks registered type names that look like `requested`.
///
/// Exact substring matches rank first, then matches on the shortened
/// name, then names sharing a prefix of at least three characters.
/// At most `max_suggestions` names are returned, best first.
pub fn suggest_similar(requested: &str, available: &[&str], max_suggestions: usize) -> Vec<String> {
    let requested_lower = requested.to_lowercase();
    let requested_short = shorten_type_name(requested).to_lowercase();

    let mut scored: Vec<(&str, usize)> = available
        .iter()
        .filter(|&&name| name != requested)
        .filter_map(|&name| {
            let name_lower = name.to_lowercase();
            let name_short = shorten_type_name(name).to_lowercase();

            if name_lower.contains(&requested_lower) || requested_lower.contains(&name_lower) {
                return Some((name, 100));
            }

            if name_short.contains(&requested_short) || requested_short.contains(&name_short) {
                return Some((name, 80));
            }

            let common = name_short
                .chars()
                .zip(requested_short.chars())
                .take_while(|(a, b)| a == b)
                .count();

            (common >= 3).then_some((name, common * 10))
        })
        .collect();

    scored.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
    scored
        .into_iter()
        .take(max_suggestions)
        .map(|(name, _)| name.to_string())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn render_simple_chain() {
        let chain = vec!["A", "B", "C", "A"];
        assert_eq!(render_chain(&chain), "A → B → C → A");
    }

    #[test]
    fn render_empty_chain() {
        let chain: Vec<&str> = vec![];
        assert_eq!(render_chain(&chain), "");
    }

    #[test]
    fn shorten_simple_path() {
        assert_eq!(shorten_type_name("app::mail::Mailer"), "Mailer");
    }

    #[test]
    fn shorten_trait_object_in_arc() {
        assert_eq!(
            shorten_type_name("alloc::sync::Arc<dyn app::mail::Transport>"),
            "Arc<dyn Transport>"
        );
    }

    #[test]
    fn shorten_tuple_and_reference() {
        assert_eq!(
            shorten_type_name("(app::A, &core::option::Option<app::B>)"),
            "(A, &Option<B>)"
        );
    }

    #[test]
    fn shorten_no_path() {
        assert_eq!(shorten_type_name("u32"), "u32");
    }

    #[test]
    fn suggest_similar_types() {
        let available = vec![
            "app::mail::MailTransport",
            "app::mail::Mailer",
            "app::db::Pool",
        ];

        let suggestions = suggest_similar("app::mail::Transport", &available, 3);
        assert_eq!(suggestions.first().map(String::as_str), Some("app::mail::MailTransport"));
        assert!(!suggestions.iter().any(|s| s.contains("Pool")));
    }

    #[test]
    fn suggest_skips_the_requested_name_itself() {
        let available = vec!["app::Mailer"];
        assert!(suggest_similar("app::Mailer", &available, 3).is_empty());
    }

    #[test]
    fn suggest_no_match() {
        let available = vec!["app::db::Pool"];
        assert!(suggest_similar("XyzAbcDef", &available, 3).is_empty());
    }
}
