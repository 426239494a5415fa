//! Message composer: localized title and body for one meal notification.

use chrono::NaiveDate;
use serde::Serialize;

use herald_common::types::{Item, primary_subtag};

/// Title used when no project name is configured.
pub const DEFAULT_PROJECT_NAME: &str = "Rocket Meals";

/// Language assumed for subscribers without one.
pub const DEFAULT_LANGUAGE: &str = "de";

const MEAL_GLYPH: &str = "🍽";

/// A ready-to-send notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Message {
    pub title: String,
    pub body: String,
}

/// Human-readable rendering of an absolute date.
pub trait DateFormatter: Send + Sync {
    fn format_date(&self, date: NaiveDate, language: &str) -> String;
}

/// `20.10.2026` for German (and anything unknown), `October 20, 2026` for English.
#[derive(Debug, Clone, Copy, Default)]
pub struct HumanDateFormatter;

impl DateFormatter for HumanDateFormatter {
    fn format_date(&self, date: NaiveDate, language: &str) -> String {
        if is_english(language) {
            date.format("%B %-d, %Y").to_string()
        } else {
            date.format("%d.%m.%Y").to_string()
        }
    }
}

struct Phrases {
    today: &'static str,
    tomorrow: &'static str,
    unnamed_item: &'static str,
}

const GERMAN: Phrases = Phrases {
    today: "Heute",
    tomorrow: "Morgen",
    unnamed_item: "ein Gericht",
};

const ENGLISH: Phrases = Phrases {
    today: "Today",
    tomorrow: "Tomorrow",
    unnamed_item: "a dish",
};

fn is_english(language: &str) -> bool {
    primary_subtag(language).eq_ignore_ascii_case("en")
}

fn phrases(language: &str) -> &'static Phrases {
    if is_english(language) { &ENGLISH } else { &GERMAN }
}

/// Builds notification messages. Composition never fails.
pub struct MessageComposer {
    project_name: String,
    formatter: Box<dyn DateFormatter>,
}

impl MessageComposer {
    pub fn new(project_name: Option<String>) -> Self {
        Self::with_formatter(project_name, HumanDateFormatter)
    }

    pub fn with_formatter(
        project_name: Option<String>,
        formatter: impl DateFormatter + 'static,
    ) -> Self {
        Self {
            project_name: project_name.unwrap_or_else(|| DEFAULT_PROJECT_NAME.to_string()),
            formatter: Box::new(formatter),
        }
    }

    pub fn project_name(&self) -> &str {
        &self.project_name
    }

    /// Compose `"🍽 <when>: <item name>"` titled with the project name.
    pub fn compose(
        &self,
        item: Option<&Item>,
        language: Option<&str>,
        days_ahead: u32,
        date: NaiveDate,
    ) -> Message {
        let language = language
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .unwrap_or(DEFAULT_LANGUAGE);
        let phrases = phrases(language);

        let when = match days_ahead {
            0 => phrases.today.to_string(),
            1 => phrases.tomorrow.to_string(),
            _ => self.formatter.format_date(date, language),
        };
        let name = item
            .and_then(|i| i.translated_name(language))
            .unwrap_or(phrases.unnamed_item);

        Message {
            title: self.project_name.clone(),
            body: format!("{MEAL_GLYPH} {when}: {name}"),
        }
    }
}

impl Default for MessageComposer {
    fn default() -> Self {
        Self::new(None)
    }
}
