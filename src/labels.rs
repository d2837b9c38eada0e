use chrono::{DateTime, Utc};
use relmenu_document::Status;

/// User-visible strings for one language.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Labels {
    pub language: &'static str,
    pub title: &'static str,
    pub created: &'static str,
    pub participants_joiner: &'static str,
    pub branding: &'static str,
    pub source_hint: &'static str,
    pub last_updated: &'static str,
    page_of: &'static str,
    date_format: &'static str,
    statuses: [&'static str; 7],
}

const EN: Labels = Labels {
    language: "en",
    title: "Relationship Menu",
    created: "Created",
    participants_joiner: " & ",
    branding: "Made with the Relationship Menu",
    source_hint: "This PDF contains its own data. Import it again to keep editing.",
    last_updated: "Last updated",
    page_of: "Page {n} of {m}",
    date_format: "%B %-d, %Y",
    statuses: [
        "Must have",
        "Like to have",
        "Maybe",
        "Prefer not",
        "Off limits",
        "Let's talk",
        "Not set",
    ],
};

const DE: Labels = Labels {
    language: "de",
    title: "Beziehungsmen\u{fc}",
    created: "Erstellt",
    participants_joiner: " & ",
    branding: "Erstellt mit dem Beziehungsmen\u{fc}",
    source_hint: "Dieses PDF enth\u{e4}lt seine Daten. Erneut importieren, um weiter zu bearbeiten.",
    last_updated: "Zuletzt ge\u{e4}ndert",
    page_of: "Seite {n} von {m}",
    date_format: "%d.%m.%Y",
    statuses: [
        "Unbedingt",
        "Gerne",
        "Vielleicht",
        "Lieber nicht",
        "Tabu",
        "Reden wir",
        "Offen",
    ],
};

impl Labels {
    /// Picks the catalog by primary language subtag; unknown tags fall back to
    /// English.
    pub fn for_language(tag: &str) -> &'static Labels {
        let primary = tag
            .split(['-', '_'])
            .next()
            .unwrap_or_default()
            .to_ascii_lowercase();
        match primary.as_str() {
            "de" => &DE,
            _ => &EN,
        }
    }

    pub fn status(&self, status: Status) -> &'static str {
        let idx = Status::ALL
            .iter()
            .position(|s| *s == status)
            .unwrap_or(Status::ALL.len() - 1);
        self.statuses[idx]
    }

    pub fn page_of(&self, page: usize, total: usize) -> String {
        self.page_of
            .replace("{n}", &page.to_string())
            .replace("{m}", &total.to_string())
    }

    /// Formats a millisecond Unix timestamp as a UTC calendar date.
    pub fn date(&self, timestamp_ms: i64) -> String {
        match DateTime::<Utc>::from_timestamp_millis(timestamp_ms) {
            Some(dt) => dt.format(self.date_format).to_string(),
            None => String::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn language_selection_uses_primary_subtag() {
        assert_eq!(Labels::for_language("de-AT").language, "de");
        assert_eq!(Labels::for_language("DE").language, "de");
        assert_eq!(Labels::for_language("fr").language, "en");
        assert_eq!(Labels::for_language("").language, "en");
    }

    #[test]
    fn dates_and_page_numbers_are_localized() {
        // 2023-11-14T22:13:20Z
        let ts = 1_700_000_000_000;
        assert_eq!(Labels::for_language("en").date(ts), "November 14, 2023");
        assert_eq!(Labels::for_language("de").date(ts), "14.11.2023");
        assert_eq!(Labels::for_language("en").page_of(2, 5), "Page 2 of 5");
        assert_eq!(Labels::for_language("de").page_of(1, 1), "Seite 1 von 1");
    }

    #[test]
    fn every_status_has_a_label() {
        for labels in [Labels::for_language("en"), Labels::for_language("de")] {
            for status in Status::ALL {
                assert!(!labels.status(status).is_empty());
            }
        }
        assert_eq!(Labels::for_language("en").status(Status::OffLimit), "Off limits");
    }
}
