//! HTML rendering of a forwarded message.

use std::borrow::Cow;

use crate::model::address::{Address, EmailAddress};

use super::ForwardView;

/// Values that can be shown in the HTML rendering.
///
/// Header inputs are not always plain strings (optional values, address
/// lists), so everything is converted to text before escaping.
pub trait HtmlText {
    fn html_text(&self) -> Cow<'_, str>;
}

impl HtmlText for str {
    fn html_text(&self) -> Cow<'_, str> {
        Cow::Borrowed(self)
    }
}

impl HtmlText for String {
    fn html_text(&self) -> Cow<'_, str> {
        Cow::Borrowed(self)
    }
}

impl<T: HtmlText> HtmlText for Option<T> {
    fn html_text(&self) -> Cow<'_, str> {
        match self {
            Some(value) => value.html_text(),
            None => Cow::Borrowed(""),
        }
    }
}

impl<T: HtmlText> HtmlText for [T] {
    fn html_text(&self) -> Cow<'_, str> {
        Cow::Owned(
            self.iter()
                .map(|v| v.html_text())
                .collect::<Vec<_>>()
                .join(", "),
        )
    }
}

impl<T: HtmlText> HtmlText for Vec<T> {
    fn html_text(&self) -> Cow<'_, str> {
        self.as_slice().html_text()
    }
}

impl HtmlText for Address {
    fn html_text(&self) -> Cow<'_, str> {
        match self {
            Address::Single(addr) => Cow::Borrowed(addr),
            Address::Many(list) => list.html_text(),
        }
    }
}

impl HtmlText for EmailAddress {
    fn html_text(&self) -> Cow<'_, str> {
        if self.display_name.is_empty() {
            Cow::Borrowed(&self.address)
        } else {
            Cow::Owned(format!("{} <{}>", self.display_name, self.address))
        }
    }
}

/// Escape `& < > " '` for safe inclusion in HTML text and attributes.
pub fn escape_html<T: HtmlText + ?Sized>(value: &T) -> String {
    let text = value.html_text();
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#039;"),
            _ => out.push(ch),
        }
    }
    out
}

const STYLE: &str = "\
body { font-family: Arial, sans-serif; line-height: 1.6; color: #333; }
.forwarded-header { background: #f0f0f0; padding: 15px; border-left: 4px solid #007bff; margin-bottom: 20px; }
.forwarded-header h3 { margin: 0 0 10px 0; color: #007bff; }
.forwarded-info { font-size: 0.9em; color: #666; }
.forwarded-info strong { color: #333; }
.message-body { white-space: pre-wrap; word-wrap: break-word; }
.technical-details { background: #f9f9f9; padding: 15px; border: 1px solid #ddd; margin-top: 20px; }
.technical-details pre { white-space: pre-wrap; word-wrap: break-word; font-size: 0.8em; }";

/// Render the HTML body: header block, decoded text, and a collapsed
/// section holding the untouched raw message.
pub(crate) fn render(view: &ForwardView<'_>) -> String {
    let lang = view.lang;
    let row = |label: &str, value: &str| {
        format!(
            "      <p><strong>{}:</strong> {}</p>\n",
            escape_html(label),
            escape_html(value)
        )
    };

    let mut info = String::new();
    info.push_str(&row(lang.label_from(), &view.from));
    info.push_str(&row(lang.label_to(), &view.to));
    info.push_str(&row(lang.label_date(), &view.date));
    info.push_str(&row(lang.label_subject(), &view.subject));

    format!(
        "<!DOCTYPE html>
<html lang=\"{code}\">
<head>
  <meta charset=\"UTF-8\">
  <style>
{style}
  </style>
</head>
<body>
  <div class=\"forwarded-header\">
    <h3>{heading}</h3>
    <div class=\"forwarded-info\">
{info}    </div>
  </div>
  <div class=\"message-body\">{body}</div>
  <details class=\"technical-details\">
    <summary>{details}</summary>
    <pre>{raw}</pre>
  </details>
</body>
</html>",
        code = lang.code(),
        style = STYLE,
        heading = escape_html(lang.forwarded_heading()),
        body = escape_html(view.body),
        details = escape_html(lang.technical_details()),
        raw = escape_html(view.raw.as_ref()),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_all_special_characters() {
        assert_eq!(
            escape_html("<a href=\"x\">Tom & Jerry's</a>"),
            "&lt;a href=&quot;x&quot;&gt;Tom &amp; Jerry&#039;s&lt;/a&gt;"
        );
    }

    #[test]
    fn test_escape_non_string_inputs() {
        let none: Option<String> = None;
        assert_eq!(escape_html(&none), "");
        assert_eq!(escape_html(&Some("a<b".to_string())), "a&lt;b");
        assert_eq!(
            escape_html(&vec!["a@b.ch".to_string(), "<c@d.ch>".to_string()]),
            "a@b.ch, &lt;c@d.ch&gt;"
        );
        assert_eq!(
            escape_html(&Address::Many(vec!["x@y.ch".into(), "z@y.ch".into()])),
            "x@y.ch, z@y.ch"
        );
        assert_eq!(
            escape_html(&EmailAddress::parse("Anna <anna@example.ch>")),
            "Anna &lt;anna@example.ch&gt;"
        );
    }

    #[test]
    fn test_escape_keeps_unicode() {
        assert_eq!(escape_html("Grüße – ☺"), "Grüße – ☺");
    }
}
