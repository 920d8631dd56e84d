use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// A field value as it arrives from the caller: text or a bare JSON number.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Text(String),
    Number(serde_json::Number),
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Text(text) => f.write_str(text),
            FieldValue::Number(n) => write!(f, "{}", n),
        }
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        FieldValue::Text(value.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        FieldValue::Text(value)
    }
}

impl From<i64> for FieldValue {
    fn from(value: i64) -> Self {
        FieldValue::Number(value.into())
    }
}

impl From<u64> for FieldValue {
    fn from(value: u64) -> Self {
        FieldValue::Number(value.into())
    }
}

impl From<f64> for FieldValue {
    fn from(value: f64) -> Self {
        serde_json::Number::from_f64(value)
            .map(FieldValue::Number)
            .unwrap_or_else(|| FieldValue::Text(value.to_string()))
    }
}

/// Field name to value. Absent, null and blank values all mean "leave the
/// control alone".
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FieldRecord(BTreeMap<String, Option<FieldValue>>);

impl FieldRecord {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        self.set(name, value);
        self
    }

    pub fn set(&mut self, name: impl Into<String>, value: impl Into<FieldValue>) {
        self.0.insert(name.into(), Some(value.into()));
    }

    /// The value as text, or `None` when unset or blank.
    pub fn value(&self, name: &str) -> Option<String> {
        self.0
            .get(name)
            .and_then(Option::as_ref)
            .map(|v| v.to_string())
            .filter(|v| !v.trim().is_empty())
    }

    /// Names with a usable value.
    pub fn present(&self) -> impl Iterator<Item = &str> {
        self.0
            .keys()
            .map(String::as_str)
            .filter(move |name| self.value(name).is_some())
    }
}

/// Image URLs in upload order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ImageList(Vec<String>);

impl ImageList {
    pub fn new<I, S>(urls: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(
            urls.into_iter()
                .map(Into::into)
                .filter(|u: &String| !u.trim().is_empty())
                .collect(),
        )
    }

    pub fn urls(&self) -> &[String] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numbers_and_text_deserialize() {
        let record: FieldRecord =
            serde_json::from_str(r#"{"make":"Toyota","year":2022,"trim":null,"price":""}"#)
                .unwrap();
        assert_eq!(record.value("make").as_deref(), Some("Toyota"));
        assert_eq!(record.value("year").as_deref(), Some("2022"));
        assert_eq!(record.value("trim"), None);
        assert_eq!(record.value("price"), None);
        assert_eq!(record.value("model"), None);
        assert_eq!(record.present().collect::<Vec<_>>(), vec!["make", "year"]);
    }

    #[test]
    fn image_list_drops_blanks() {
        let images = ImageList::new(["a", " ", "b", "c"]);
        assert_eq!(images.len(), 3);
        assert_eq!(images.urls(), &["a".to_string(), "b".to_string(), "c".to_string()]);
    }
}
