use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

use super::GoogleClient;
use crate::error::MomentumError;

/// Start or end of an event: all-day events carry `date`, timed ones `dateTime`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventTime {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_time: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_zone: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CalendarEvent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default)]
    pub summary: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(default)]
    pub start: EventTime,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end: Option<EventTime>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    /// Which configured calendar the event belongs to; stripped before sending to Google.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub calendar_id: Option<String>,
}

impl CalendarEvent {
    pub fn validate(&self) -> Result<(), MomentumError> {
        if self.summary.trim().is_empty() {
            return Err(MomentumError::invalid("event summary cannot be empty"));
        }
        if self.start.date.is_none() && self.start.date_time.is_none() {
            return Err(MomentumError::invalid("event start needs a date or dateTime"));
        }
        Ok(())
    }

    /// The body sent to Google: no local bookkeeping, and an end that defaults to the start.
    fn outgoing(&self) -> Self {
        let mut body = self.clone();
        body.calendar_id = None;
        if body.end.is_none() {
            body.end = Some(body.start.clone());
        }
        body
    }
}

/// A partial update: only the fields present are sent, so Google keeps the rest.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start: Option<EventTime>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end: Option<EventTime>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
}

impl EventPatch {
    pub fn validate(&self) -> Result<(), MomentumError> {
        if let Some(summary) = &self.summary {
            if summary.trim().is_empty() {
                return Err(MomentumError::invalid("event summary cannot be empty"));
            }
        }
        if let Some(start) = &self.start {
            if start.date.is_none() && start.date_time.is_none() {
                return Err(MomentumError::invalid("event start needs a date or dateTime"));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
struct EventList {
    #[serde(default)]
    items: Vec<CalendarEvent>,
}

impl GoogleClient {
    pub async fn list_events(
        &self,
        calendar_id: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<CalendarEvent>> {
        let url = self.endpoint(&["calendar", "v3", "calendars", calendar_id, "events"])?;
        let mut request = self.http.get(url).query(&[
            ("timeMin", from.to_rfc3339()),
            ("timeMax", to.to_rfc3339()),
            ("singleEvents", "true".to_string()),
            ("orderBy", "startTime".to_string()),
        ]);

        // Public calendars can be read with just the API key.
        request = match (self.access_token().await, &self.settings.api_key) {
            (Ok(token), _) => request.bearer_auth(token),
            (Err(_), Some(key)) => request.query(&[("key", key)]),
            (Err(e), None) => return Err(e),
        };

        let list: EventList = self.send_json(request).await?;
        Ok(list
            .items
            .into_iter()
            .map(|mut event| {
                event.calendar_id = Some(calendar_id.to_string());
                event
            })
            .collect())
    }

    /// Events from every configured calendar, earliest first.
    ///
    /// A calendar that fails to load is logged and skipped so one bad id does
    /// not blank the whole view; the call only fails if every calendar does.
    pub async fn list_all_events(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<CalendarEvent>> {
        let mut events = Vec::new();
        let mut last_error = None;
        let calendar_ids = self.calendar_ids();

        for calendar_id in &calendar_ids {
            match self.list_events(calendar_id, from, to).await {
                Ok(mut found) => events.append(&mut found),
                Err(e) => {
                    warn!(calendar_id = %calendar_id, error = %e, "failed to load calendar");
                    last_error = Some(e);
                }
            }
        }

        if let Some(e) = last_error {
            if events.is_empty() {
                return Err(e);
            }
        }

        events.sort_by(|a, b| start_key(a).cmp(start_key(b)));
        Ok(events)
    }

    pub async fn create_event(
        &self,
        calendar_id: Option<&str>,
        event: &CalendarEvent,
    ) -> Result<CalendarEvent> {
        event.validate()?;
        let calendar_id = match calendar_id {
            Some(id) => id.to_string(),
            None => self.calendar_ids().remove(0),
        };

        let url = self.endpoint(&["calendar", "v3", "calendars", &calendar_id, "events"])?;
        let body = event.outgoing();
        let request = self.authorized(self.http.post(url)).await?.json(&body);

        let mut created: CalendarEvent = self.send_json(request).await?;
        created.calendar_id = Some(calendar_id);
        Ok(created)
    }

    pub async fn update_event(
        &self,
        calendar_id: &str,
        event_id: &str,
        patch: &EventPatch,
    ) -> Result<CalendarEvent> {
        patch.validate()?;
        let url = self.endpoint(&["calendar", "v3", "calendars", calendar_id, "events", event_id])?;
        let request = self.authorized(self.http.patch(url)).await?.json(patch);

        let mut updated: CalendarEvent = self.send_json(request).await?;
        updated.calendar_id = Some(calendar_id.to_string());
        Ok(updated)
    }

    pub async fn delete_event(&self, calendar_id: &str, event_id: &str) -> Result<()> {
        let url = self.endpoint(&["calendar", "v3", "calendars", calendar_id, "events", event_id])?;
        let request = self.authorized(self.http.delete(url)).await?;
        self.send_empty(request).await
    }
}

fn start_key(event: &CalendarEvent) -> &str {
    event
        .start
        .date_time
        .as_deref()
        .or(event.start.date.as_deref())
        .unwrap_or("")
}
