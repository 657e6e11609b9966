use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

/// Application credentials for the client-credentials grant
#[derive(Clone)]
pub struct Credentials {
    client_id: String,
    client_secret: String,
}

impl Credentials {
    pub fn new(client_id: impl Into<String>, client_secret: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: client_secret.into(),
        }
    }

    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    pub fn client_secret(&self) -> &str {
        &self.client_secret
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .finish()
    }
}

/// Bearer token valid for the remainder of one aggregation
#[derive(Clone)]
pub struct AccessToken {
    pub value: String,
    pub expires_at: Option<DateTime<Utc>>,
}

impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccessToken")
            .field("value", &"<redacted>")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConditionCode {
    New,
    Used,
    NotSpecified,
}

impl ConditionCode {
    /// Value used inside the Browse `conditions:{...}` filter
    pub fn filter_value(&self) -> &'static str {
        match self {
            ConditionCode::New => "NEW",
            ConditionCode::Used => "USED",
            ConditionCode::NotSpecified => "UNSPECIFIED",
        }
    }

    /// Parses a comma separated list such as `new,used`.
    pub fn parse_list(text: &str) -> Result<BTreeSet<ConditionCode>, String> {
        text.split(',')
            .map(str::trim)
            .filter(|part| !part.is_empty())
            .map(ConditionCode::from_str)
            .collect()
    }
}

impl FromStr for ConditionCode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "new" => Ok(ConditionCode::New),
            "used" => Ok(ConditionCode::Used),
            "not_specified" | "unspecified" => Ok(ConditionCode::NotSpecified),
            other => Err(format!("unknown condition '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListingQuery {
    pub identifier: String,
    pub condition_filter: Option<BTreeSet<ConditionCode>>,
}

impl ListingQuery {
    pub fn new(identifier: impl Into<String>) -> Self {
        Self {
            identifier: identifier.into().trim().to_string(),
            condition_filter: None,
        }
    }

    pub fn with_conditions(mut self, conditions: BTreeSet<ConditionCode>) -> Self {
        self.condition_filter = if conditions.is_empty() {
            None
        } else {
            Some(conditions)
        };
        self
    }

    /// GTIN-8, UPC-A, EAN-13 and GTIN-14 are all plain digit strings.
    pub fn is_gtin(&self) -> bool {
        let len = self.identifier.len();
        (8..=14).contains(&len) && self.identifier.bytes().all(|b| b.is_ascii_digit())
    }

    pub fn filter_expression(&self) -> Option<String> {
        let conditions = self.condition_filter.as_ref()?;
        let values: Vec<&str> = conditions.iter().map(|c| c.filter_value()).collect();
        Some(format!("conditions:{{{}}}", values.join("|")))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Price {
    pub amount: f64,
    pub currency: String,
}

impl Price {
    /// Parses upstream price text, keeping only finite non-negative amounts.
    pub fn parse(value: &str, currency: impl Into<String>) -> Option<Self> {
        let amount = value.trim().parse::<f64>().ok()?;
        if !amount.is_finite() || amount < 0.0 {
            return None;
        }
        Some(Self {
            amount,
            currency: currency.into(),
        })
    }
}

/// Normalized active listing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Listing {
    pub id: String,
    pub title: String,
    pub price: Price,
    pub url: String,
    pub image_url: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ActiveListings {
    pub total: usize,
    pub items: Vec<Listing>,
}

/// Normalized completed listing. Every field may be missing upstream.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SoldItem {
    pub title: Option<String>,
    pub price: Option<Price>,
    pub sold_date: Option<String>,
    pub url: Option<String>,
}

impl SoldItem {
    pub fn amount(&self) -> Option<f64> {
        self.price.as_ref().map(|price| price.amount)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SoldListings {
    pub total: u64,
    pub items: Vec<SoldItem>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarketMetrics {
    pub sell_through_rate_percent: f64,
    pub recommended_price: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarketSnapshot {
    pub identifier: String,
    pub active_count: usize,
    pub sold_count: u64,
    pub sell_through_rate_percent: f64,
    pub recommended_price: Option<f64>,
    pub active_listings: Vec<Listing>,
    pub sold_listings: Vec<SoldItem>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gtin_detection() {
        assert!(ListingQuery::new("0123456789012").is_gtin());
        assert!(ListingQuery::new(" 12345678 ").is_gtin());
        assert!(!ListingQuery::new("1234567").is_gtin());
        assert!(!ListingQuery::new("nintendo switch oled").is_gtin());
        assert!(!ListingQuery::new("012345678901234").is_gtin());
    }

    #[test]
    fn test_condition_filter_expression() {
        let conditions = ConditionCode::parse_list("used, new").unwrap();
        let query = ListingQuery::new("0123456789012").with_conditions(conditions);
        assert_eq!(
            query.filter_expression().as_deref(),
            Some("conditions:{NEW|USED}")
        );

        let unfiltered = ListingQuery::new("0123456789012").with_conditions(BTreeSet::new());
        assert_eq!(unfiltered.filter_expression(), None);
    }

    #[test]
    fn test_condition_parse_rejects_unknown() {
        assert!(ConditionCode::parse_list("new,refurbished").is_err());
        assert_eq!(
            ConditionCode::parse_list("unspecified").unwrap(),
            BTreeSet::from([ConditionCode::NotSpecified])
        );
    }

    #[test]
    fn test_price_parse() {
        assert_eq!(
            Price::parse(" 12.50", "USD"),
            Some(Price {
                amount: 12.5,
                currency: "USD".into()
            })
        );
        assert_eq!(Price::parse("0", "USD").map(|p| p.amount), Some(0.0));
        assert_eq!(Price::parse("-5.00", "USD"), None);
        assert_eq!(Price::parse("NaN", "USD"), None);
        assert_eq!(Price::parse("inf", "USD"), None);
        assert_eq!(Price::parse("n/a", "USD"), None);
    }

    #[test]
    fn test_sold_item_serializes_price_object() {
        let item = SoldItem {
            title: Some("Game Boy Color".into()),
            price: Price::parse("74.99", "USD"),
            ..Default::default()
        };
        let value = serde_json::to_value(&item).unwrap();
        assert_eq!(value["price"]["amount"], 74.99);
        assert_eq!(value["price"]["currency"], "USD");
        assert_eq!(item.amount(), Some(74.99));
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let credentials = Credentials::new("app-id", "super-secret");
        let token = AccessToken {
            value: "v^1.1#token".into(),
            expires_at: None,
        };
        assert!(!format!("{:?}", credentials).contains("super-secret"));
        assert!(!format!("{:?}", token).contains("v^1.1"));
    }
}
