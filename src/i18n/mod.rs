//! Internationalization (i18n) module.
//!
//! Provides localized strings for the forwarded message and the CLI.
//! English is the default language; German is available as an alternative.
//! Every string is a method on [`Lang`], so the composer can render in the
//! configured language while the CLI uses the process-wide one.

use std::sync::OnceLock;

static CURRENT_LANG: OnceLock<Lang> = OnceLock::new();

/// Supported languages.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Lang {
    /// English (default)
    #[default]
    En,
    /// German
    De,
}

impl Lang {
    /// Parse a language code string (e.g. "en", "de", "en_US", "de-CH").
    /// Returns `None` for unrecognized codes.
    pub fn from_code(code: &str) -> Option<Self> {
        let normalized = code.to_lowercase();
        let prefix = normalized.split(['_', '-', '.']).next().unwrap_or("");
        match prefix {
            "en" => Some(Self::En),
            "de" => Some(Self::De),
            _ => None,
        }
    }

    /// Return the ISO 639-1 code for this language.
    pub fn code(self) -> &'static str {
        match self {
            Self::En => "en",
            Self::De => "de",
        }
    }
}

/// Initialize the global language. Call once at startup.
/// If already initialized, this is a no-op.
pub fn set_lang(lang: Lang) {
    let _ = CURRENT_LANG.set(lang);
}

/// Get the currently configured language (defaults to English).
pub fn lang() -> Lang {
    CURRENT_LANG.get().copied().unwrap_or_default()
}

/// Detect language from the `MAILFWD_LANG` / `LC_MESSAGES` / `LANG` environment variables.
pub fn detect_system_lang() -> Lang {
    ["MAILFWD_LANG", "LC_MESSAGES", "LANG"]
        .iter()
        .find_map(|var| std::env::var(var).ok().and_then(|v| Lang::from_code(&v)))
        .unwrap_or_default()
}

/// Macro for defining translatable strings as methods on [`Lang`].
macro_rules! msg {
    ($($name:ident, $en:expr, $de:expr;)*) => {
        impl Lang {
            $(
                /// Returns the localized string for this language.
                pub fn $name(self) -> &'static str {
                    match self {
                        Lang::En => $en,
                        Lang::De => $de,
                    }
                }
            )*
        }
    };
}

msg! {
    // ── Forwarded message ───────────────────────────────────────
    forwarded_marker, "[Forwarded]", "[Weitergeleitet]";
    message_from, "Email from", "E-Mail von";
    forwarded_heading, "Forwarded email", "Weitergeleitete E-Mail";
    label_from, "From", "Von";
    label_to, "To", "An";
    label_date, "Date", "Datum";
    label_subject, "Subject", "Betreff";
    label_message, "Message", "Nachricht";
    no_subject, "(No subject)", "(Kein Betreff)";
    unknown_sender, "unknown", "unbekannt";
    technical_details, "Technical details (original message)", "Technische Details (Original-E-Mail)";
    note_preserved,
        "Forwarding failed; the original message is preserved in storage",
        "Weiterleitung fehlgeschlagen; die E-Mail bleibt im Speicher erhalten";

    // ── CLI ─────────────────────────────────────────────────────
    app_about,
        "mailfwd \u{2014} decode raw inbound emails and forward them as readable HTML + text messages.",
        "mailfwd \u{2014} rohe eingehende E-Mails dekodieren und als lesbare HTML- und Text-Nachricht weiterleiten.";
    help_cmd_decode, "Decode a raw message file and print its headers and body", "Eine rohe Nachricht dekodieren und Header und Text ausgeben";
    help_cmd_compose, "Print the forwarded message that would be sent", "Die weitergeleitete Nachricht ausgeben, ohne sie zu senden";
    help_cmd_handle, "Process a trigger event: fetch, decode, forward", "Ein Ereignis verarbeiten: laden, dekodieren, weiterleiten";
    help_cmd_completions, "Generate shell completions", "Shell-Vervollst\u{e4}ndigungen erzeugen";
    help_cmd_manpage, "Generate a man page", "Eine Manpage erzeugen";
    err_file_not_found, "File not found", "Datei nicht gefunden";
    msg_no_event, "No mail record in event, nothing to do", "Kein E-Mail-Eintrag im Ereignis, nichts zu tun";
    msg_anomalies, "decoding anomalies", "Dekodierungs-Auff\u{e4}lligkeiten";
}
