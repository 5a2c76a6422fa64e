use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use uuid::Uuid;

use crate::validation::{
    validate_capacity, validate_date, validate_non_empty_string, validate_status,
    ValidationError, ValidationLimits,
};

const MAX_EVENT_ID_LENGTH: usize = 200;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventStatus {
    Draft,
    Published,
    Active,
    Cancelled,
    Completed,
}

impl EventStatus {
    pub const ALL: &'static [EventStatus] = &[
        EventStatus::Draft,
        EventStatus::Published,
        EventStatus::Active,
        EventStatus::Cancelled,
        EventStatus::Completed,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EventStatus::Draft => "draft",
            EventStatus::Published => "published",
            EventStatus::Active => "active",
            EventStatus::Cancelled => "cancelled",
            EventStatus::Completed => "completed",
        }
    }
}

impl fmt::Display for EventStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventStatus {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        validate_status("status", s, EventStatus::ALL)
    }
}

impl Serialize for EventStatus {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for EventStatus {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// A persisted event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    pub event_id: String,
    pub title: String,
    pub description: String,
    pub date: String,
    pub location: String,
    pub capacity: u32,
    pub organizer: String,
    pub status: EventStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A validated event that has not reached the store yet; timestamps are stamped on insert.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewEvent {
    pub event_id: String,
    pub title: String,
    pub description: String,
    pub date: String,
    pub location: String,
    pub capacity: u32,
    pub organizer: String,
    pub status: EventStatus,
}

impl NewEvent {
    pub fn into_event(self, now: DateTime<Utc>) -> Event {
        Event {
            event_id: self.event_id,
            title: self.title,
            description: self.description,
            date: self.date,
            location: self.location,
            capacity: self.capacity,
            organizer: self.organizer,
            status: self.status,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Body of `POST /events`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventCreateInput {
    #[serde(default)]
    pub event_id: Option<String>,
    pub title: String,
    pub description: String,
    pub date: String,
    pub location: String,
    pub capacity: i64,
    pub organizer: String,
    pub status: String,
}

/// Presence-tracked value for partial updates.
///
/// A key missing from the JSON body stays `Absent`; a key sent as `null`
/// becomes `Null`. Both leave the stored value alone, but only `Absent`
/// counts towards an empty patch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Field<T> {
    Absent,
    Null,
    Present(T),
}

impl<T> Default for Field<T> {
    fn default() -> Self {
        Field::Absent
    }
}

impl<T> Field<T> {
    pub fn is_absent(&self) -> bool {
        matches!(self, Field::Absent)
    }

    pub fn as_present(&self) -> Option<&T> {
        match self {
            Field::Present(value) => Some(value),
            Field::Absent | Field::Null => None,
        }
    }
}

impl<'de, T: Deserialize<'de>> Deserialize<'de> for Field<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Ok(match Option::<T>::deserialize(deserializer)? {
            Some(value) => Field::Present(value),
            None => Field::Null,
        })
    }
}

/// Body of `PUT /events/{eventId}`.
///
/// `eventId`, `createdAt` and `updatedAt` are not fields here, so serde drops
/// them from incoming payloads instead of rejecting the request.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct EventUpdateInput {
    pub title: Field<String>,
    pub description: Field<String>,
    pub date: Field<String>,
    pub location: Field<String>,
    pub capacity: Field<i64>,
    pub organizer: Field<String>,
    pub status: Field<String>,
}

impl EventUpdateInput {
    /// True when the payload named none of the updatable fields.
    pub fn is_empty(&self) -> bool {
        self.title.is_absent()
            && self.description.is_absent()
            && self.date.is_absent()
            && self.location.is_absent()
            && self.capacity.is_absent()
            && self.organizer.is_absent()
            && self.status.is_absent()
    }

    /// Validates every present field and drops the ones sent as `null`.
    pub fn validate(&self, limits: &ValidationLimits) -> Result<EventPatch, ValidationError> {
        let text = |field: &str, value: &Field<String>, max: usize| {
            value
                .as_present()
                .map(|v| validate_non_empty_string(field, v, max))
                .transpose()
        };

        Ok(EventPatch {
            title: text("title", &self.title, limits.max_title_length)?,
            description: text(
                "description",
                &self.description,
                limits.max_description_length,
            )?,
            date: self
                .date
                .as_present()
                .map(|v| validate_date("date", v))
                .transpose()?,
            location: text("location", &self.location, limits.max_location_length)?,
            capacity: self
                .capacity
                .as_present()
                .map(|v| checked_capacity(*v, limits))
                .transpose()?,
            organizer: text("organizer", &self.organizer, limits.max_organizer_length)?,
            status: self
                .status
                .as_present()
                .map(|v| validate_status("status", v, EventStatus::ALL))
                .transpose()?,
        })
    }
}

/// Validated changes to apply to a stored event. `None` means leave as is.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventPatch {
    pub title: Option<String>,
    pub description: Option<String>,
    pub date: Option<String>,
    pub location: Option<String>,
    pub capacity: Option<u32>,
    pub organizer: Option<String>,
    pub status: Option<EventStatus>,
}

impl EventPatch {
    pub fn is_empty(&self) -> bool {
        *self == EventPatch::default()
    }
}

fn checked_capacity(value: i64, limits: &ValidationLimits) -> Result<u32, ValidationError> {
    let value = validate_capacity("capacity", value, limits.min_capacity, limits.max_capacity)?;
    u32::try_from(value)
        .map_err(|_| ValidationError::new("capacity", "Capacity is out of range"))
}

/// Validates a create payload, trims its strings and assigns an id when none was given.
pub fn normalize_create_input(
    input: EventCreateInput,
    limits: &ValidationLimits,
) -> Result<NewEvent, ValidationError> {
    let event_id = match input.event_id.as_deref().map(str::trim) {
        Some(id) if !id.is_empty() => {
            validate_non_empty_string("eventId", id, MAX_EVENT_ID_LENGTH)?
        }
        _ => Uuid::new_v4().to_string(),
    };

    Ok(NewEvent {
        event_id,
        title: validate_non_empty_string("title", &input.title, limits.max_title_length)?,
        description: validate_non_empty_string(
            "description",
            &input.description,
            limits.max_description_length,
        )?,
        date: validate_date("date", &input.date)?,
        location: validate_non_empty_string(
            "location",
            &input.location,
            limits.max_location_length,
        )?,
        capacity: checked_capacity(input.capacity, limits)?,
        organizer: validate_non_empty_string(
            "organizer",
            &input.organizer,
            limits.max_organizer_length,
        )?,
        status: validate_status("status", &input.status, EventStatus::ALL)?,
    })
}

/// Applies `patch` on top of `existing`.
///
/// Identity and `created_at` are never touched. `updated_at` moves to `now`
/// (never earlier than `created_at`) whenever the patch carries a change.
pub fn merge_update(existing: Event, patch: &EventPatch, now: DateTime<Utc>) -> Event {
    if patch.is_empty() {
        return existing;
    }

    let mut merged = existing;
    if let Some(title) = &patch.title {
        merged.title = title.clone();
    }
    if let Some(description) = &patch.description {
        merged.description = description.clone();
    }
    if let Some(date) = &patch.date {
        merged.date = date.clone();
    }
    if let Some(location) = &patch.location {
        merged.location = location.clone();
    }
    if let Some(capacity) = patch.capacity {
        merged.capacity = capacity;
    }
    if let Some(organizer) = &patch.organizer {
        merged.organizer = organizer.clone();
    }
    if let Some(status) = patch.status {
        merged.status = status;
    }
    merged.updated_at = now.max(merged.created_at);
    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use serde_json::json;

    fn create_input() -> EventCreateInput {
        serde_json::from_value(json!({
            "title": "  Rust Meetup  ",
            "description": " Monthly talks ",
            "date": "2024-06-15T09:00:00Z",
            "location": " Berlin ",
            "capacity": 120,
            "organizer": " Ferris ",
            "status": "published"
        }))
        .unwrap()
    }

    fn stored_event() -> Event {
        let created = Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap();
        Event {
            event_id: "evt-1".to_string(),
            title: "Rust Meetup".to_string(),
            description: "Monthly talks".to_string(),
            date: "2024-06-15".to_string(),
            location: "Berlin".to_string(),
            capacity: 120,
            organizer: "Ferris".to_string(),
            status: EventStatus::Draft,
            created_at: created,
            updated_at: created,
        }
    }

    #[test]
    fn test_normalize_trims_and_generates_id() {
        let event = normalize_create_input(create_input(), &ValidationLimits::default()).unwrap();
        assert_eq!(event.title, "Rust Meetup");
        assert_eq!(event.description, "Monthly talks");
        assert_eq!(event.location, "Berlin");
        assert_eq!(event.organizer, "Ferris");
        assert_eq!(event.status, EventStatus::Published);
        assert!(Uuid::parse_str(&event.event_id).is_ok());
    }

    #[test]
    fn test_normalize_generates_id_for_blank_event_id() {
        let mut input = create_input();
        input.event_id = Some("   ".to_string());
        let event = normalize_create_input(input, &ValidationLimits::default()).unwrap();
        assert!(Uuid::parse_str(&event.event_id).is_ok());
    }

    #[test]
    fn test_normalize_keeps_client_event_id_trimmed() {
        let mut input = create_input();
        input.event_id = Some(" launch-party ".to_string());
        let event = normalize_create_input(input, &ValidationLimits::default()).unwrap();
        assert_eq!(event.event_id, "launch-party");
    }

    #[test]
    fn test_normalize_rejects_whitespace_title() {
        let mut input = create_input();
        input.title = "   ".to_string();
        let err = normalize_create_input(input, &ValidationLimits::default()).unwrap_err();
        assert_eq!(err.field.as_deref(), Some("title"));
    }

    #[test]
    fn test_normalize_rejects_unknown_status() {
        let mut input = create_input();
        input.status = "archived".to_string();
        let err = normalize_create_input(input, &ValidationLimits::default()).unwrap_err();
        assert_eq!(err.field.as_deref(), Some("status"));
    }

    #[test]
    fn test_update_input_tracks_presence() {
        let input: EventUpdateInput =
            serde_json::from_value(json!({ "title": "New", "location": null })).unwrap();
        assert_eq!(input.title, Field::Present("New".to_string()));
        assert_eq!(input.location, Field::Null);
        assert_eq!(input.capacity, Field::Absent);
        assert!(!input.is_empty());
    }

    #[test]
    fn test_update_input_ignores_identity_fields() {
        let input: EventUpdateInput = serde_json::from_value(json!({
            "eventId": "other",
            "createdAt": "2020-01-01T00:00:00Z"
        }))
        .unwrap();
        assert!(input.is_empty());
    }

    #[test]
    fn test_update_validation_drops_nulls() {
        let input: EventUpdateInput =
            serde_json::from_value(json!({ "title": null, "capacity": 10 })).unwrap();
        let patch = input.validate(&ValidationLimits::default()).unwrap();
        assert_eq!(patch.title, None);
        assert_eq!(patch.capacity, Some(10));
    }

    #[test]
    fn test_update_validation_rejects_whitespace() {
        let input: EventUpdateInput =
            serde_json::from_value(json!({ "organizer": "  " })).unwrap();
        let err = input.validate(&ValidationLimits::default()).unwrap_err();
        assert_eq!(err.field.as_deref(), Some("organizer"));
    }

    #[test]
    fn test_merge_changes_only_patched_fields() {
        let existing = stored_event();
        let now = existing.created_at + Duration::minutes(5);
        let patch = EventPatch {
            title: Some("X".to_string()),
            ..EventPatch::default()
        };

        let merged = merge_update(existing.clone(), &patch, now);
        assert_eq!(merged.title, "X");
        assert_eq!(merged.updated_at, now);
        assert_eq!(
            Event {
                title: existing.title.clone(),
                updated_at: existing.updated_at,
                ..merged
            },
            existing
        );
    }

    #[test]
    fn test_merge_empty_patch_is_noop() {
        let existing = stored_event();
        let later = existing.created_at + Duration::hours(1);
        let merged = merge_update(existing.clone(), &EventPatch::default(), later);
        assert_eq!(merged, existing);
    }

    #[test]
    fn test_merge_never_moves_updated_at_before_created_at() {
        let existing = stored_event();
        let skewed = existing.created_at - Duration::seconds(30);
        let patch = EventPatch {
            status: Some(EventStatus::Active),
            ..EventPatch::default()
        };
        let merged = merge_update(existing.clone(), &patch, skewed);
        assert_eq!(merged.updated_at, existing.created_at);
    }

    #[test]
    fn test_event_serializes_camel_case() {
        let value = serde_json::to_value(stored_event()).unwrap();
        assert_eq!(value["eventId"], "evt-1");
        assert_eq!(value["status"], "draft");
        assert!(value.get("createdAt").is_some());
        assert!(value.get("updatedAt").is_some());
    }
}
