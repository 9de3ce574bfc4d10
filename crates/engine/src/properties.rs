use std::collections::BTreeMap;
use std::fmt::Display;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Raw string property bag attached to tiles, layers and map objects.
///
/// Typed configuration structs are built from it once at load time.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Properties(BTreeMap<String, String>);

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PropertyError {
    #[error("property '{key}' has invalid value '{value}': {reason}")]
    InvalidValue {
        key: String,
        value: String,
        reason: String,
    },
    #[error("required property '{key}' is missing")]
    Missing { key: String },
    #[error("property '{key}' has unknown value '{value}'")]
    UnknownVariant { key: String, value: String },
}

impl Properties {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: &str, value: &str) -> Self {
        self.insert(key, value);
        self
    }

    pub fn insert(&mut self, key: &str, value: &str) {
        self.0.insert(key.to_string(), value.to_string());
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Boolean flag; only a case-insensitive `true` counts as set.
    pub fn flag(&self, key: &str, default: bool) -> bool {
        match self.get(key) {
            Some(value) => value.trim().eq_ignore_ascii_case("true"),
            None => default,
        }
    }

    pub fn required(&self, key: &str) -> Result<&str, PropertyError> {
        self.get(key).ok_or_else(|| PropertyError::Missing {
            key: key.to_string(),
        })
    }

    pub fn parse<T>(&self, key: &str) -> Result<Option<T>, PropertyError>
    where
        T: FromStr,
        T::Err: Display,
    {
        match self.get(key) {
            Some(value) => parse_value(key, value).map(Some),
            None => Ok(None),
        }
    }

    pub fn parse_or<T>(&self, key: &str, default: T) -> Result<T, PropertyError>
    where
        T: FromStr,
        T::Err: Display,
    {
        Ok(self.parse(key)?.unwrap_or(default))
    }

    /// Comma separated list, blank entries ignored.
    pub fn parse_list<T>(&self, key: &str) -> Result<Vec<T>, PropertyError>
    where
        T: FromStr,
        T::Err: Display,
    {
        let Some(value) = self.get(key) else {
            return Ok(Vec::new());
        };
        value
            .split(',')
            .map(str::trim)
            .filter(|item| !item.is_empty())
            .map(|item| parse_value(key, item))
            .collect()
    }
}

impl FromIterator<(String, String)> for Properties {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

fn parse_value<T>(key: &str, value: &str) -> Result<T, PropertyError>
where
    T: FromStr,
    T::Err: Display,
{
    value
        .trim()
        .parse::<T>()
        .map_err(|error| PropertyError::InvalidValue {
            key: key.to_string(),
            value: value.to_string(),
            reason: error.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flag_only_accepts_true() {
        let props = Properties::new()
            .with("a", "True")
            .with("b", "yes")
            .with("c", "false");
        assert!(props.flag("a", false));
        assert!(!props.flag("b", true));
        assert!(!props.flag("c", true));
        assert!(props.flag("missing", true));
    }

    #[test]
    fn parse_reports_key_and_value() {
        let props = Properties::new().with("speed", "fast");
        let error = props.parse::<i32>("speed").expect_err("invalid");
        match error {
            PropertyError::InvalidValue { key, value, .. } => {
                assert_eq!(key, "speed");
                assert_eq!(value, "fast");
            }
            other => panic!("unexpected error {other:?}"),
        }
        assert_eq!(props.parse_or("delay", 4_u32).expect("default"), 4);
    }

    #[test]
    fn parse_list_skips_blank_entries() {
        let props = Properties::new().with("animation", "3, 4,,5 ");
        assert_eq!(
            props.parse_list::<u32>("animation").expect("list"),
            vec![3, 4, 5]
        );
        assert!(props.parse_list::<u32>("none").expect("empty").is_empty());
    }
}
