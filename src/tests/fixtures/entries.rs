// Shared test fixture for time log entries.
// Defaults come from json/entry.json, setters override single fields.

use crate::modules::time_log::core::entry::Entry;
use crate::shared::core::primitives::new_entry_id;
use serde::Deserialize;
use std::fs;
use uuid::Uuid;

// JSON -> DTO (transport shape)
#[derive(Debug, Clone, Deserialize)]
pub struct EntryDto {
    pub id: Uuid,
    pub start_time: i64,
    pub category: String,
    pub comment: String,
}

pub struct EntryBuilder {
    inner: Entry,
}

impl Default for EntryBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[allow(dead_code)]
impl EntryBuilder {
    pub fn new() -> Self {
        let json_str = fs::read_to_string("./src/tests/fixtures/json/entry.json").unwrap();
        let dto: EntryDto = serde_json::from_str(&json_str).unwrap();

        Self {
            inner: Entry {
                id: dto.id,
                start_time: dto.start_time,
                category: dto.category,
                comment: dto.comment,
            },
        }
    }

    pub fn id(mut self, v: Uuid) -> Self {
        self.inner.id = v;
        self
    }

    /// Replaces the fixed id with a newly generated one.
    pub fn fresh_id(self) -> Self {
        self.id(new_entry_id())
    }

    /// Leaves the id for the history to assign.
    pub fn unassigned(self) -> Self {
        self.id(Uuid::nil())
    }

    pub fn start_time(mut self, v: i64) -> Self {
        self.inner.start_time = v;
        self
    }

    pub fn category(mut self, v: impl Into<String>) -> Self {
        self.inner.category = v.into();
        self
    }

    pub fn comment(mut self, v: impl Into<String>) -> Self {
        self.inner.comment = v.into();
        self
    }

    pub fn build(self) -> Entry {
        self.inner
    }
}

#[cfg(test)]
mod entry_builder_tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    fn default_delegates_to_new_and_parses_json() {
        let built = EntryBuilder::default().build();
        assert_eq!(
            built.id,
            Uuid::parse_str("0191c3a4-7b2e-7c3d-9e4f-5a6b7c8d9e0f").unwrap()
        );
        assert_eq!(built.start_time, 1_700_000_000_000);
        assert_eq!(built.category, "Work");
        assert_eq!(built.comment, "This is a test");
    }

    #[rstest]
    fn setters_override_all_fields_and_build_returns_inner() {
        let custom = EntryBuilder::new()
            .unassigned()
            .start_time(1111)
            .category("Home")
            .comment("desc")
            .build();

        assert!(custom.id.is_nil());
        assert_eq!(custom.start_time, 1111);
        assert_eq!(custom.category, "Home");
        assert_eq!(custom.comment, "desc");
        assert_ne!(EntryBuilder::new().fresh_id().build().id, custom.id);
    }
}
