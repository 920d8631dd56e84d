use crate::engine::resolver::ResolutionQuery;
use crate::engine::retry::RetryPolicy;
use crate::config::EngineConfig;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProfileInfo {
    pub id: String,
    pub name: String,
    pub create_url: String,
    pub color: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// Typed key by key.
    Text,
    /// Picked from a dropdown, custom or native.
    Choice,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueTransform {
    AsIs,
    DigitsOnly,
    Transmission,
}

impl ValueTransform {
    pub fn apply(&self, raw: &str) -> Option<String> {
        let raw = raw.trim();
        let value = match self {
            ValueTransform::AsIs => raw.to_string(),
            ValueTransform::DigitsOnly => raw
                .split('.')
                .next()
                .unwrap_or_default()
                .chars()
                .filter(char::is_ascii_digit)
                .collect(),
            ValueTransform::Transmission => {
                let lower = raw.to_lowercase();
                if lower.contains("auto") {
                    "Automatic".to_string()
                } else if lower.contains("manual") || lower.contains("standard") {
                    "Manual".to_string()
                } else {
                    raw.to_string()
                }
            }
        };
        (!value.is_empty()).then_some(value)
    }
}

/// One control on a target form and how to find and write it.
pub struct FieldTarget {
    pub field: &'static str,
    pub kind: FieldKind,
    pub selectors: &'static [&'static str],
    pub label: Option<&'static str>,
    pub placeholder: Option<&'static str>,
    pub aria_label: Option<&'static str>,
    pub role: Option<&'static str>,
    /// Control renders late; use the slow resolution budget.
    pub slow: bool,
    pub clear_first: bool,
    pub transform: ValueTransform,
}

impl FieldTarget {
    pub fn query(&self) -> ResolutionQuery {
        let mut query = ResolutionQuery::selectors(self.selectors);
        if let Some(label) = self.label {
            query = query.label(label);
        }
        if let Some(placeholder) = self.placeholder {
            query = query.placeholder(placeholder);
        }
        if let Some(aria_label) = self.aria_label {
            query = query.aria_label(aria_label);
        }
        if let Some(role) = self.role {
            query = query.role(role);
        }
        query
    }

    pub fn retry(&self, config: &EngineConfig) -> RetryPolicy {
        if self.slow {
            config.slow_retry()
        } else {
            config.retry()
        }
    }

    pub fn prepare(&self, raw: &str) -> Option<String> {
        self.transform.apply(raw)
    }
}

pub struct FormProfile {
    pub id: &'static str,
    pub name: &'static str,
    pub create_url: &'static str,
    pub color: &'static str,
    /// Counted to decide whether the form has rendered.
    pub ready_selector: &'static str,
    /// Filled in this order; anything that gates other fields comes first.
    pub fields: &'static [FieldTarget],
    pub file_input_selectors: &'static [&'static str],
    pub add_photos_selectors: &'static [&'static str],
    pub add_photos_label: &'static str,
}

impl FormProfile {
    pub fn info(&self) -> ProfileInfo {
        ProfileInfo {
            id: self.id.into(),
            name: self.name.into(),
            create_url: self.create_url.into(),
            color: self.color.into(),
        }
    }

    pub fn file_input_query(&self) -> ResolutionQuery {
        ResolutionQuery::selectors(self.file_input_selectors).input_type("file")
    }

    pub fn add_photos_query(&self) -> ResolutionQuery {
        ResolutionQuery::selectors(self.add_photos_selectors).aria_label(self.add_photos_label)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn price_keeps_digits_only() {
        assert_eq!(ValueTransform::DigitsOnly.apply("$21,000").as_deref(), Some("21000"));
        assert_eq!(ValueTransform::DigitsOnly.apply("21000.00").as_deref(), Some("21000"));
        assert_eq!(ValueTransform::DigitsOnly.apply("call us"), None);
    }

    #[test]
    fn transmission_is_normalized() {
        let t = ValueTransform::Transmission;
        assert_eq!(t.apply("8-Speed Automatic").as_deref(), Some("Automatic"));
        assert_eq!(t.apply("6 speed standard").as_deref(), Some("Manual"));
        assert_eq!(t.apply("CVT").as_deref(), Some("CVT"));
    }
}
