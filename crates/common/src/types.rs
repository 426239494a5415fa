use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Lifecycle state of a scheduled notification run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum RunState {
    Running,
    Success,
    Failed,
}

impl RunState {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, RunState::Running)
    }
}

impl std::fmt::Display for RunState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RunState::Running => write!(f, "running"),
            RunState::Success => write!(f, "success"),
            RunState::Failed => write!(f, "failed"),
        }
    }
}

impl std::str::FromStr for RunState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "running" => Ok(RunState::Running),
            "success" => Ok(RunState::Success),
            "failed" => Ok(RunState::Failed),
            other => Err(format!("unknown run state '{other}'")),
        }
    }
}

/// A dish offered at a canteen on a given calendar day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Offer {
    pub id: Uuid,
    pub item_id: Uuid,
    pub location_id: Uuid,
    pub date: NaiveDate,
}

/// A subscriber's opt-in (or opt-out) for notifications about one item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Subscription {
    pub id: Uuid,
    pub subscriber_id: Uuid,
    pub item_id: Uuid,
    pub notify: bool,
}

/// A registered device of a subscriber.
///
/// `push_token` is the opaque object handed over by the app, e.g.
/// `{"pushtokenObj": {"type": "expo", "data": "ExponentPushToken[...]"}}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Endpoint {
    pub id: Uuid,
    pub push_token: Option<serde_json::Value>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl Endpoint {
    /// The physical delivery address inside the push object, if any.
    pub fn delivery_address(&self) -> Option<&str> {
        self.push_token
            .as_ref()?
            .pointer("/pushtokenObj/data")?
            .as_str()
            .map(str::trim)
            .filter(|address| !address.is_empty())
    }
}

/// A profile together with its registered devices.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Subscriber {
    pub id: Uuid,
    pub language: Option<String>,
    pub location_id: Option<Uuid>,
    pub endpoints: Vec<Endpoint>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct ItemTranslation {
    pub language_code: String,
    pub name: Option<String>,
}

/// A catalog item (dish) with its translated names.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item {
    pub id: Uuid,
    pub translations: Vec<ItemTranslation>,
}

impl Item {
    /// Look up the item name for a language.
    ///
    /// Exact language codes win over a match on the primary subtag only
    /// (`de` matches `de-DE`). Blank names count as missing.
    pub fn translated_name(&self, language: &str) -> Option<&str> {
        let wanted = language.trim();
        if wanted.is_empty() {
            return None;
        }
        let named = |t: &&ItemTranslation| {
            t.name
                .as_deref()
                .map(str::trim)
                .is_some_and(|name| !name.is_empty())
        };

        let exact = self
            .translations
            .iter()
            .filter(named)
            .find(|t| t.language_code.eq_ignore_ascii_case(wanted));
        let by_primary = || {
            let primary = primary_subtag(wanted);
            self.translations
                .iter()
                .filter(named)
                .find(|t| primary_subtag(&t.language_code).eq_ignore_ascii_case(primary))
        };

        exact
            .or_else(by_primary)
            .and_then(|t| t.name.as_deref())
            .map(str::trim)
    }
}

/// `de-DE` → `de`, `en_US` → `en`.
pub fn primary_subtag(language: &str) -> &str {
    language
        .split(['-', '_'])
        .next()
        .unwrap_or(language)
        .trim()
}

/// Counters collected during one notification run, stored as the run result.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunStats {
    pub offers: u32,
    pub subscriptions: u32,
    pub skipped_subscribers: u32,
    pub addresses_notified: u32,
    pub dispatch_failures: u32,
    pub dead_addresses: u32,
    pub endpoints_cleared: u32,
}

/// The report of one scheduled notification run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduledRun {
    pub id: Uuid,
    pub schedule: String,
    pub state: RunState,
    pub log: Vec<String>,
    pub result: serde_json::Value,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl ScheduledRun {
    pub fn start(schedule: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            schedule: schedule.into(),
            state: RunState::Running,
            log: Vec::new(),
            result: serde_json::Value::Null,
            started_at: Utc::now(),
            finished_at: None,
        }
    }
}
