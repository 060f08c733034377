//! Plain-text rendering of a forwarded message.

use super::ForwardView;

const BORDER_WIDTH: usize = 60;

/// Render the plain-text body: a bordered header block, then the decoded text.
pub(crate) fn render(view: &ForwardView<'_>) -> String {
    let lang = view.lang;
    let border = "\u{2501}".repeat(BORDER_WIDTH);

    let mut content = String::new();
    content.push_str(&format!("{border}\n"));
    content.push_str(&format!("{}\n", lang.forwarded_heading().to_uppercase()));
    content.push_str(&format!("{border}\n\n"));

    let labels = [
        (lang.label_from(), view.from.as_str()),
        (lang.label_to(), view.to.as_str()),
        (lang.label_date(), view.date.as_str()),
        (lang.label_subject(), view.subject.as_str()),
    ];
    let width = labels
        .iter()
        .map(|(label, _)| label.chars().count() + 1)
        .max()
        .unwrap_or(0);
    for (label, value) in labels {
        content.push_str(&format!("{:<width$} {value}\n", format!("{label}:")));
    }

    content.push_str(&format!("\n{border}\n"));
    content.push_str(&format!("{}\n", lang.label_message().to_uppercase()));
    content.push_str(&format!("{border}\n\n"));

    if !view.body.is_empty() {
        content.push_str(view.body);
        content.push_str("\n\n");
    }
    content.push_str(&border);
    content
}
