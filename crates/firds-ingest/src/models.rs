//! Domain types shared by the extractor, the writer and the link locator

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Output columns, in order.
pub const COLUMNS: [&str; 6] = [
    "Id",
    "FullName",
    "ClassificationType",
    "CommodityDerivativeIndicator",
    "Currency",
    "Issuer",
];

/// One financial instrument row.
///
/// Every field is optional; an absent field is written as an empty cell so
/// rows stay aligned with [`COLUMNS`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstrumentRecord {
    #[serde(rename = "Id")]
    pub id: Option<String>,

    #[serde(rename = "FullName")]
    pub full_name: Option<String>,

    #[serde(rename = "ClassificationType")]
    pub classification_type: Option<String>,

    #[serde(rename = "CommodityDerivativeIndicator")]
    pub commodity_derivative_indicator: Option<String>,

    #[serde(rename = "Currency")]
    pub currency: Option<String>,

    #[serde(rename = "Issuer")]
    pub issuer: Option<String>,
}

impl InstrumentRecord {
    pub fn is_empty(&self) -> bool {
        self.id.is_none()
            && self.full_name.is_none()
            && self.classification_type.is_none()
            && self.commodity_derivative_indicator.is_none()
            && self.currency.is_none()
            && self.issuer.is_none()
    }
}

/// A record column together with the XML tag it is read from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    Id,
    FullName,
    ClassificationType,
    CommodityDerivativeIndicator,
    Currency,
    Issuer,
}

impl Field {
    /// Children of `FinInstrmGnlAttrbts` that map to a column.
    pub fn from_general_attribute(local_name: &[u8]) -> Option<Self> {
        match local_name {
            b"Id" => Some(Field::Id),
            b"FullNm" => Some(Field::FullName),
            b"ClssfctnTp" => Some(Field::ClassificationType),
            b"CmmdtyDerivInd" => Some(Field::CommodityDerivativeIndicator),
            b"NtnlCcy" => Some(Field::Currency),
            _ => None,
        }
    }

    /// Overwrites the column; a later duplicate tag replaces an earlier one.
    pub fn assign(self, record: &mut InstrumentRecord, value: Option<String>) {
        let slot = match self {
            Field::Id => &mut record.id,
            Field::FullName => &mut record.full_name,
            Field::ClassificationType => &mut record.classification_type,
            Field::CommodityDerivativeIndicator => &mut record.commodity_derivative_indicator,
            Field::Currency => &mut record.currency,
            Field::Issuer => &mut record.issuer,
        };
        *slot = value;
    }
}

/// One file descriptor from the discovery document: its name/value pairs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DiscoveryEntry {
    pub fields: BTreeMap<String, String>,
}

impl DiscoveryEntry {
    pub fn get(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(|s| s.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_general_attribute_tags() {
        assert_eq!(Field::from_general_attribute(b"Id"), Some(Field::Id));
        assert_eq!(Field::from_general_attribute(b"FullNm"), Some(Field::FullName));
        assert_eq!(Field::from_general_attribute(b"NtnlCcy"), Some(Field::Currency));
        assert_eq!(Field::from_general_attribute(b"ShrtNm"), None);
        // Issr lives beside the general attributes, not inside them
        assert_eq!(Field::from_general_attribute(b"Issr"), None);
    }

    #[test]
    fn test_assign_last_wins() {
        let mut record = InstrumentRecord::default();
        assert!(record.is_empty());

        Field::Currency.assign(&mut record, Some("EUR".to_string()));
        Field::Currency.assign(&mut record, Some("USD".to_string()));
        assert_eq!(record.currency.as_deref(), Some("USD"));
        assert!(!record.is_empty());
    }
}
