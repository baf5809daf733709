use serde::{Deserialize, Serialize};

/// Expiry classification of a rendered dataset.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DatasetKind {
    ZeroDte,
    Weekly,
    Monthly,
    Other,
}

impl DatasetKind {
    /// Classify a free-form tag by substring, in priority order
    /// `0DTE` > `WEEKLY` > `MONTHLY`.
    pub fn classify(tag: &str) -> Self {
        let tag = tag.to_ascii_uppercase();
        if tag.contains("0DTE") {
            Self::ZeroDte
        } else if tag.contains("WEEKLY") {
            Self::Weekly
        } else if tag.contains("MONTHLY") {
            Self::Monthly
        } else {
            Self::Other
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ZeroDte => "ZERO_DTE",
            Self::Weekly => "WEEKLY",
            Self::Monthly => "MONTHLY",
            Self::Other => "OTHER",
        }
    }
}

impl std::fmt::Display for DatasetKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A rendered block of option-chain text ready for display or prompting.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MarketDataset {
    pub id: String,
    pub name: String,
    pub content: String,
    #[serde(rename = "type")]
    pub kind: DatasetKind,
}

impl MarketDataset {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        content: impl Into<String>,
        kind: DatasetKind,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            content: content.into(),
            kind,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classify_priority() {
        assert_eq!(DatasetKind::classify("0DTE"), DatasetKind::ZeroDte);
        assert_eq!(DatasetKind::classify("weekly (2024-01-26)"), DatasetKind::Weekly);
        assert_eq!(DatasetKind::classify("MONTHLY"), DatasetKind::Monthly);
        assert_eq!(DatasetKind::classify("0DTE WEEKLY"), DatasetKind::ZeroDte);
        assert_eq!(DatasetKind::classify("WEEKLY/MONTHLY"), DatasetKind::Weekly);
        assert_eq!(DatasetKind::classify("EXTRA_EXP"), DatasetKind::Other);
        assert_eq!(DatasetKind::classify(""), DatasetKind::Other);
    }

    #[test]
    fn kind_wire_names() {
        assert_eq!(
            serde_json::to_string(&DatasetKind::ZeroDte).unwrap(),
            "\"ZERO_DTE\""
        );
        let ds = MarketDataset::new("a", "b", "c", DatasetKind::Monthly);
        let json = serde_json::to_value(&ds).unwrap();
        assert_eq!(json["type"], "MONTHLY");
    }
}
