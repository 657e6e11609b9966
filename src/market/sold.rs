use std::sync::Arc;

use super::models::{Price, SoldItem, SoldListings};
use crate::api::ebay::{FINDING_OPERATION, FINDING_SERVICE_VERSION};
use crate::api::types::scalar_text;
use crate::api::{Endpoints, FindingEnvelope, FindingItem, HttpRequest, HttpTransport};
use crate::error::{Result, ScoutError, SearchPhase};

/// Looks up recently completed sales on the legacy Finding service.
pub struct SoldListingResolver {
    transport: Arc<dyn HttpTransport>,
    endpoints: Endpoints,
    entries_per_page: usize,
}

impl SoldListingResolver {
    pub fn new(transport: Arc<dyn HttpTransport>, endpoints: Endpoints, entries_per_page: usize) -> Self {
        Self {
            transport,
            endpoints,
            entries_per_page,
        }
    }

    /// Single page of sold items; authenticated only by the application id.
    pub async fn find_sold_listings(&self, app_id: &str, keywords: &str) -> Result<SoldListings> {
        if app_id.trim().is_empty() {
            return Err(ScoutError::Credential("application id is missing".to_string()));
        }

        let request = HttpRequest::get(&self.endpoints.finding_url)
            .query("OPERATION-NAME", FINDING_OPERATION)
            .query("SERVICE-VERSION", FINDING_SERVICE_VERSION)
            .query("SECURITY-APPNAME", app_id)
            .query("RESPONSE-DATA-FORMAT", "JSON")
            .query("REST-PAYLOAD", "")
            .query("keywords", keywords)
            .query("itemFilter.name", "SoldItemsOnly")
            .query("itemFilter.value", "true")
            .query("paginationInput.entriesPerPage", self.entries_per_page.to_string())
            .query("paginationInput.pageNumber", "1");

        let response = self.transport.send(request).await?;

        if !response.is_success() {
            tracing::error!("Sold search failed: {}", response.status);
            return Err(ScoutError::UpstreamSearch {
                phase: SearchPhase::Sold,
                status: response.status,
            });
        }

        let sold = decode_sold_listings(&response.body)?;
        tracing::debug!("Sold search: {} items (count {})", sold.items.len(), sold.total);
        Ok(sold)
    }
}

/// Flattens the array-wrapped Finding payload.
///
/// Missing levels become absent fields and a missing or non-numeric count
/// becomes 0. Only a body that is not the expected JSON shape at all, or an
/// explicit `Failure` ack, is reported as malformed.
pub fn decode_sold_listings(body: &str) -> Result<SoldListings> {
    let malformed = |reason: String| ScoutError::MalformedResponse {
        phase: SearchPhase::Sold,
        reason,
    };

    let envelope: FindingEnvelope =
        serde_json::from_str(body).map_err(|e| malformed(e.to_string()))?;

    let Some(response) = envelope.find_completed_items_response.into_iter().next() else {
        return Ok(SoldListings::default());
    };

    if response.ack.first().map(String::as_str) == Some("Failure") {
        let message = response
            .error_message
            .first()
            .and_then(|m| m.error.first())
            .and_then(|e| e.message.first())
            .cloned()
            .unwrap_or_else(|| "no error message".to_string());
        return Err(malformed(format!("upstream ack Failure: {}", message)));
    }

    let Some(result) = response.search_result.into_iter().next() else {
        return Ok(SoldListings::default());
    };

    let total = result
        .count
        .as_ref()
        .and_then(scalar_text)
        .and_then(|text| text.trim().parse::<u64>().ok())
        .unwrap_or(0);

    Ok(SoldListings {
        total,
        items: result.item.into_iter().map(flatten_item).collect(),
    })
}

fn flatten_item(item: FindingItem) -> SoldItem {
    let current_price = item
        .selling_status
        .into_iter()
        .next()
        .and_then(|status| status.current_price.into_iter().next());

    let price = current_price.and_then(|amount| {
        let value = amount.value.as_ref().and_then(scalar_text)?;
        Price::parse(&value, amount.currency_id.unwrap_or_default())
    });

    SoldItem {
        title: item.title.into_iter().next(),
        price,
        sold_date: item
            .listing_info
            .into_iter()
            .next()
            .and_then(|info| info.end_time.into_iter().next()),
        url: item.view_item_url.into_iter().next(),
    }
}
