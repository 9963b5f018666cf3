//! Template Rendering
//!
//! Substitutes `$title` and `$message` into webhook templates.

use crate::Event;

/// Placeholder replaced by [`Event::title`].
pub const TITLE_PLACEHOLDER: &str = "$title";

/// Placeholder replaced by [`Event::message`].
pub const MESSAGE_PLACEHOLDER: &str = "$message";

/// Render a template against an event.
///
/// Every occurrence of each placeholder is replaced in a single left-to-right
/// pass. Substituted values are copied verbatim: they are not escaped for the
/// template's format and are never scanned for further placeholders.
pub fn render(template: &str, event: &Event) -> String {
    let mut out = String::with_capacity(template.len() + event.title.len() + event.message.len());
    let mut rest = template;

    while let Some(pos) = rest.find('$') {
        out.push_str(&rest[..pos]);
        let tail = &rest[pos..];

        if let Some(after) = tail.strip_prefix(TITLE_PLACEHOLDER) {
            out.push_str(&event.title);
            rest = after;
        } else if let Some(after) = tail.strip_prefix(MESSAGE_PLACEHOLDER) {
            out.push_str(&event.message);
            rest = after;
        } else {
            out.push('$');
            rest = &tail[1..];
        }
    }

    out.push_str(rest);
    out
}
