//! JSONB column payloads

use sea_orm::FromJsonQueryResult;
use serde::{Deserialize, Serialize};

/// Ordered list of strings stored as a JSON array
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize, FromJsonQueryResult)]
#[serde(transparent)]
pub struct StringList(pub Vec<String>);

impl StringList {
    pub fn iter(&self) -> std::slice::Iter<'_, String> {
        self.0.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Case-insensitive membership
    pub fn contains_ignore_case(&self, value: &str) -> bool {
        self.0.iter().any(|v| v.eq_ignore_ascii_case(value))
    }
}

impl From<Vec<String>> for StringList {
    fn from(values: Vec<String>) -> Self {
        Self(values)
    }
}

impl From<StringList> for Vec<String> {
    fn from(list: StringList) -> Self {
        list.0
    }
}

/// A weekly publishing window: `day_of_week` counts from Sunday (0) to
/// Saturday (6); hours are local to the tenant timezone, start inclusive,
/// end exclusive.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublishingWindow {
    pub day_of_week: u8,
    pub start_hour: u8,
    pub end_hour: u8,
}

impl PublishingWindow {
    pub fn contains_hour(&self, hour: u32) -> bool {
        hour >= u32::from(self.start_hour) && hour < u32::from(self.end_hour)
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize, FromJsonQueryResult)]
#[serde(transparent)]
pub struct PublishingWindows(pub Vec<PublishingWindow>);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_string_list_is_a_plain_array() {
        let list = StringList(vec!["seo".into(), "Rust".into()]);
        assert_eq!(serde_json::to_string(&list).unwrap(), r#"["seo","Rust"]"#);
        assert!(list.contains_ignore_case("rust"));
    }

    #[test]
    fn test_window_hours_half_open() {
        let window = PublishingWindow { day_of_week: 1, start_hour: 9, end_hour: 17 };
        assert!(window.contains_hour(9));
        assert!(window.contains_hour(16));
        assert!(!window.contains_hour(17));
        assert!(!window.contains_hour(8));
    }
}
