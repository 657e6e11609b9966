use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub expires_in: Option<i64>,
    pub token_type: Option<String>,
}

// Browse API (active listings)

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BrowseSearchResponse {
    #[serde(default)]
    pub total: u64,
    #[serde(default)]
    pub limit: Option<u64>,
    #[serde(default)]
    pub offset: Option<u64>,
    #[serde(default)]
    pub item_summaries: Vec<RawListing>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawListing {
    pub item_id: Option<String>,
    pub title: Option<String>,
    pub price: Option<RawAmount>,
    pub item_web_url: Option<String>,
    pub image: Option<RawImage>,
    pub condition: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawAmount {
    pub value: Option<String>,
    pub currency: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawImage {
    pub image_url: Option<String>,
}

// Finding API (completed listings). Every scalar arrives wrapped in a
// single-element array, and any level may be missing.

#[derive(Debug, Clone, Default, Deserialize)]
pub struct FindingEnvelope {
    #[serde(rename = "findCompletedItemsResponse", default)]
    pub find_completed_items_response: Vec<FindingResponse>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FindingResponse {
    #[serde(default)]
    pub ack: Vec<String>,
    #[serde(default)]
    pub search_result: Vec<FindingSearchResult>,
    #[serde(default)]
    pub error_message: Vec<FindingErrorMessage>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct FindingSearchResult {
    #[serde(rename = "@count")]
    pub count: Option<Value>,
    #[serde(default)]
    pub item: Vec<FindingItem>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FindingItem {
    #[serde(default)]
    pub title: Vec<String>,
    #[serde(rename = "viewItemURL", default)]
    pub view_item_url: Vec<String>,
    #[serde(default)]
    pub selling_status: Vec<FindingSellingStatus>,
    #[serde(default)]
    pub listing_info: Vec<FindingListingInfo>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FindingSellingStatus {
    #[serde(default)]
    pub current_price: Vec<FindingAmount>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct FindingAmount {
    #[serde(rename = "@currencyId")]
    pub currency_id: Option<String>,
    #[serde(rename = "__value__")]
    pub value: Option<Value>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FindingListingInfo {
    #[serde(default)]
    pub end_time: Vec<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct FindingErrorMessage {
    #[serde(default)]
    pub error: Vec<FindingErrorDetail>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct FindingErrorDetail {
    #[serde(default)]
    pub message: Vec<String>,
}

/// Renders a JSON scalar that may be a string or a number as text.
pub fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}
