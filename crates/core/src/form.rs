use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// The kind of application form a draft belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FormType {
    /// The standard benefit application.
    Standard,
    /// Application for keeping the benefit during a stay abroad.
    Abroad,
}

impl FormType {
    /// Every known form type, in declaration order.
    pub const ALL: [FormType; 2] = [FormType::Standard, FormType::Abroad];

    /// Wire name used in object metadata, object keys and grouping ids.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Standard => "STANDARD",
            Self::Abroad => "ABROAD",
        }
    }

    /// Human-readable title used in notification texts.
    pub fn title(self) -> &'static str {
        match self {
            Self::Standard => "application for work assessment allowance",
            Self::Abroad => "application for allowance during a stay abroad",
        }
    }
}

impl fmt::Display for FormType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FormType {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|t| t.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| CoreError::UnknownFormType(s.to_owned()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_wire_names_case_insensitively() {
        assert_eq!("STANDARD".parse::<FormType>(), Ok(FormType::Standard));
        assert_eq!("abroad".parse::<FormType>(), Ok(FormType::Abroad));
    }

    #[test]
    fn rejects_unknown() {
        assert_eq!(
            "PENSION".parse::<FormType>(),
            Err(CoreError::UnknownFormType("PENSION".into()))
        );
    }

    #[test]
    fn serde_uses_wire_name() {
        let json = serde_json::to_string(&FormType::Abroad).unwrap();
        assert_eq!(json, "\"ABROAD\"");
        let back: FormType = serde_json::from_str(&json).unwrap();
        assert_eq!(back, FormType::Abroad);
    }
}
