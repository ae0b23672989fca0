use chrono::NaiveDate;
use serde::{Deserialize, Deserializer, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Suburb {
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub postalcode: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestingCenter {
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub code: String,
    #[serde(default)]
    pub postalcode: String,
}

/// Per-day flag feeding the date picker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DateAvailability {
    pub date: NaiveDate,
    pub is_available: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl DateAvailability {
    pub fn label(&self) -> String {
        let day = self.date.format("%A, %B %-d, %Y");
        if self.is_available {
            day.to_string()
        } else {
            format!("{day} - {}", self.reason.as_deref().unwrap_or("Unavailable"))
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Holiday {
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
    pub date: NaiveDate,
    pub reason: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suburb_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewHoliday {
    pub date: NaiveDate,
    pub reason: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suburb_id: Option<String>,
}

/// The booking API is inconsistent about id types; normalise to strings.
pub(crate) fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Id {
        Text(String),
        Number(i64),
    }

    Ok(match Id::deserialize(deserializer)? {
        Id::Text(s) => s,
        Id::Number(n) => n.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_numeric_and_string_ids() {
        let suburbs: Vec<Suburb> = serde_json::from_str(
            r#"[{"id":7,"name":"Parramatta","postalcode":"2150"},{"id":"x1","name":"Ryde"}]"#,
        )
        .unwrap();
        assert_eq!(suburbs[0].id, "7");
        assert_eq!(suburbs[1].id, "x1");
        assert_eq!(suburbs[1].postalcode, "");
    }

    #[test]
    fn test_date_label() {
        let open: DateAvailability =
            serde_json::from_str(r#"{"date":"2025-06-16","isAvailable":true}"#).unwrap();
        assert_eq!(open.label(), "Monday, June 16, 2025");

        let closed: DateAvailability = serde_json::from_str(
            r#"{"date":"2025-12-25","isAvailable":false,"reason":"Christmas"}"#,
        )
        .unwrap();
        assert_eq!(closed.label(), "Thursday, December 25, 2025 - Christmas");
    }
}
