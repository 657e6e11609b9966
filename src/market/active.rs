use std::collections::HashSet;
use std::sync::Arc;

use super::models::{AccessToken, ActiveListings, Listing, ListingQuery, Price};
use crate::api::{BrowseSearchResponse, Endpoints, HttpRequest, HttpTransport, RawListing};
use crate::core::config::{FallbackPolicy, KeywordSource, SearchConfig};
use crate::error::{Result, ScoutError, SearchPhase};

/// Resolves an identifier into currently active listings.
///
/// Searches by GTIN first and, when that comes back sparse, runs exactly one
/// keyword search whose results are merged into (or substituted for) the
/// identifier results. Both phases walk every page sequentially.
pub struct ActiveListingResolver {
    transport: Arc<dyn HttpTransport>,
    endpoints: Endpoints,
    settings: SearchConfig,
}

impl ActiveListingResolver {
    pub fn new(
        transport: Arc<dyn HttpTransport>,
        endpoints: Endpoints,
        settings: SearchConfig,
    ) -> Self {
        Self {
            transport,
            endpoints,
            settings,
        }
    }

    pub async fn find_active_listings(
        &self,
        token: &AccessToken,
        query: &ListingQuery,
    ) -> Result<ActiveListings> {
        let identifier_items = if query.is_gtin() {
            self.collect_phase(token, query, SearchPhase::Identifier, &query.identifier)
                .await?
        } else {
            tracing::debug!(
                "'{}' is not a GTIN, going straight to keyword search",
                query.identifier
            );
            Vec::new()
        };

        if identifier_items.len() >= self.settings.fallback_threshold {
            return Ok(Self::finish(identifier_items));
        }

        let keywords = self.fallback_keywords(query, &identifier_items);
        tracing::info!(
            "Identifier search found {} listings (threshold {}), falling back to keywords '{}'",
            identifier_items.len(),
            self.settings.fallback_threshold,
            keywords
        );

        let keyword_items = self
            .collect_phase(token, query, SearchPhase::Keyword, &keywords)
            .await?;

        let items = match self.settings.fallback_policy {
            FallbackPolicy::Merge => {
                let mut merged = identifier_items;
                merged.extend(keyword_items);
                merged
            }
            FallbackPolicy::Replace => keyword_items,
        };

        Ok(Self::finish(items))
    }

    /// Keyword search only, for free-text lookups.
    pub async fn find_by_keywords(
        &self,
        token: &AccessToken,
        query: &ListingQuery,
    ) -> Result<ActiveListings> {
        let items = self
            .collect_phase(token, query, SearchPhase::Keyword, &query.identifier)
            .await?;
        Ok(Self::finish(items))
    }

    fn finish(items: Vec<Listing>) -> ActiveListings {
        let items = distinct_by_id(items);
        ActiveListings {
            total: items.len(),
            items,
        }
    }

    fn fallback_keywords(&self, query: &ListingQuery, identifier_items: &[Listing]) -> String {
        match self.settings.keyword_source {
            KeywordSource::Identifier => query.identifier.clone(),
            KeywordSource::Title => identifier_items
                .first()
                .map(|listing| title_keywords(&listing.title, self.settings.title_keyword_limit))
                .filter(|keywords| !keywords.is_empty())
                .unwrap_or_else(|| query.identifier.clone()),
        }
    }

    /// A malformed page empties the phase instead of failing the lookup.
    async fn collect_phase(
        &self,
        token: &AccessToken,
        query: &ListingQuery,
        phase: SearchPhase,
        search_value: &str,
    ) -> Result<Vec<Listing>> {
        match self.paginate(token, query, phase, search_value).await {
            Err(ScoutError::MalformedResponse { phase, reason }) => {
                tracing::warn!("Discarding {} results, malformed page: {}", phase, reason);
                Ok(Vec::new())
            }
            other => other,
        }
    }

    async fn paginate(
        &self,
        token: &AccessToken,
        query: &ListingQuery,
        phase: SearchPhase,
        search_value: &str,
    ) -> Result<Vec<Listing>> {
        let page_size = self.settings.effective_page_size();
        let mut offset = 0;
        let mut received = 0;
        let mut items = Vec::new();

        loop {
            let page = self
                .fetch_page(token, query, phase, search_value, page_size, offset)
                .await?;
            let page_len = page.item_summaries.len();
            received += page_len;

            tracing::debug!(
                "{} page at offset {}: {} items (reported total {})",
                phase,
                offset,
                page_len,
                page.total
            );

            items.extend(page.item_summaries.into_iter().filter_map(normalize_listing));

            // A short page always ends the walk, whatever the reported total says.
            if page_len < page_size || received as u64 >= page.total {
                break;
            }
            offset += page_size;
        }

        Ok(items)
    }

    async fn fetch_page(
        &self,
        token: &AccessToken,
        query: &ListingQuery,
        phase: SearchPhase,
        search_value: &str,
        limit: usize,
        offset: usize,
    ) -> Result<BrowseSearchResponse> {
        let key = match phase {
            SearchPhase::Identifier => "gtin",
            _ => "q",
        };

        let mut request = HttpRequest::get(&self.endpoints.browse_search_url)
            .bearer(&token.value)
            .header("Content-Type", "application/json")
            .query(key, search_value)
            .query("limit", limit.to_string())
            .query("offset", offset.to_string());

        if let Some(filter) = query.filter_expression() {
            request = request.query("filter", filter);
        }

        let response = self.transport.send(request).await?;

        if !response.is_success() {
            tracing::error!("{} search failed: {}", phase, response.status);
            return Err(ScoutError::UpstreamSearch {
                phase,
                status: response.status,
            });
        }

        if response.body.trim().is_empty() {
            return Ok(BrowseSearchResponse::default());
        }

        serde_json::from_str(&response.body).map_err(|e| ScoutError::MalformedResponse {
            phase,
            reason: e.to_string(),
        })
    }
}

/// First `limit` words of a title with punctuation removed.
pub fn title_keywords(title: &str, limit: usize) -> String {
    let cleaned: String = title
        .chars()
        .filter(|c| c.is_alphanumeric() || c.is_whitespace())
        .collect();

    cleaned
        .split_whitespace()
        .take(limit)
        .collect::<Vec<_>>()
        .join(" ")
}

fn normalize_listing(raw: RawListing) -> Option<Listing> {
    let id = raw.item_id.filter(|id| !id.is_empty())?;
    let price = raw.price?;

    let amount = price.value?.trim().parse::<f64>().ok()?;
    let currency = price.currency?;
    let valid_currency = currency.len() == 3 && currency.chars().all(|c| c.is_ascii_uppercase());

    if !amount.is_finite() || amount < 0.0 || !valid_currency {
        tracing::debug!("Dropping listing {} with unusable price", id);
        return None;
    }

    Some(Listing {
        id,
        title: raw.title.unwrap_or_default(),
        price: Price { amount, currency },
        url: raw.item_web_url.unwrap_or_default(),
        image_url: raw.image.and_then(|image| image.image_url),
    })
}

fn distinct_by_id(items: Vec<Listing>) -> Vec<Listing> {
    let mut seen = HashSet::new();
    items
        .into_iter()
        .filter(|listing| seen.insert(listing.id.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{HttpResponse, MockHttpTransport};
    use crate::market::ConditionCode;
    use serde_json::json;
    use std::collections::BTreeSet;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    const GTIN: &str = "0123456789012";

    fn token() -> AccessToken {
        AccessToken {
            value: "token".into(),
            expires_at: None,
        }
    }

    fn settings(page_size: usize) -> SearchConfig {
        SearchConfig {
            page_size,
            ..Default::default()
        }
    }

    fn resolver(mock: MockHttpTransport, settings: SearchConfig) -> ActiveListingResolver {
        ActiveListingResolver::new(Arc::new(mock), Endpoints::production(), settings)
    }

    fn page(prefix: &str, ids: std::ops::Range<usize>, total: usize) -> HttpResponse {
        let items: Vec<_> = ids
            .map(|i| {
                json!({
                    "itemId": format!("{}-{}", prefix, i),
                    "title": format!("Retro Console #{} (Boxed)", i),
                    "price": { "value": "25.00", "currency": "USD" },
                    "itemWebUrl": format!("https://www.ebay.com/itm/{}", i),
                    "image": { "imageUrl": format!("https://i.ebayimg.com/{}.jpg", i) }
                })
            })
            .collect();
        HttpResponse::new(200, json!({ "total": total, "itemSummaries": items }).to_string())
    }

    /// Serves `available` items for the request's limit/offset window.
    fn window(req: &HttpRequest, prefix: &str, available: usize, total: usize) -> HttpResponse {
        let limit: usize = req.query_param("limit").unwrap().parse().unwrap();
        let offset: usize = req.query_param("offset").unwrap().parse().unwrap();
        let end = (offset + limit).min(available);
        page(prefix, offset.min(end)..end, total)
    }

    #[tokio::test]
    async fn test_enough_identifier_results_skip_fallback() {
        let mut mock = MockHttpTransport::new();
        mock.expect_send()
            .withf(|req| req.query_param("gtin") == Some(GTIN))
            .times(1)
            .returning(|req| Ok(window(&req, "g", 12, 12)));
        mock.expect_send()
            .withf(|req| req.query_param("q").is_some())
            .times(0);

        let result = resolver(mock, settings(50))
            .find_active_listings(&token(), &ListingQuery::new(GTIN))
            .await
            .unwrap();

        assert_eq!(result.total, 12);
        assert_eq!(result.items[0].image_url.as_deref(), Some("https://i.ebayimg.com/0.jpg"));
    }

    #[tokio::test]
    async fn test_sparse_identifier_results_merge_keyword_results_once() {
        let mut mock = MockHttpTransport::new();
        mock.expect_send()
            .withf(|req| req.query_param("gtin").is_some())
            .times(1)
            .returning(|req| Ok(window(&req, "g", 3, 3)));
        mock.expect_send()
            .withf(|req| req.query_param("q") == Some(GTIN))
            .times(1)
            .returning(|req| Ok(window(&req, "k", 4, 4)));

        let result = resolver(mock, settings(50))
            .find_active_listings(&token(), &ListingQuery::new(GTIN))
            .await
            .unwrap();

        let ids: Vec<_> = result.items.iter().map(|l| l.id.as_str()).collect();
        assert_eq!(ids, vec!["g-0", "g-1", "g-2", "k-0", "k-1", "k-2", "k-3"]);
        assert_eq!(result.total, 7);
    }

    #[tokio::test]
    async fn test_merge_drops_duplicate_listings() {
        let mut mock = MockHttpTransport::new();
        mock.expect_send()
            .withf(|req| req.query_param("gtin").is_some())
            .times(1)
            .returning(|req| Ok(window(&req, "same", 2, 2)));
        mock.expect_send()
            .withf(|req| req.query_param("q").is_some())
            .times(1)
            .returning(|req| Ok(window(&req, "same", 3, 3)));

        let result = resolver(mock, settings(50))
            .find_active_listings(&token(), &ListingQuery::new(GTIN))
            .await
            .unwrap();

        assert_eq!(result.total, 3);
    }

    #[tokio::test]
    async fn test_replace_policy_substitutes_keyword_results() {
        let mut mock = MockHttpTransport::new();
        mock.expect_send()
            .withf(|req| req.query_param("gtin").is_some())
            .times(1)
            .returning(|req| Ok(window(&req, "g", 2, 2)));
        mock.expect_send()
            .withf(|req| req.query_param("q").is_some())
            .times(1)
            .returning(|req| Ok(window(&req, "k", 5, 5)));

        let config = SearchConfig {
            fallback_policy: FallbackPolicy::Replace,
            ..settings(50)
        };
        let result = resolver(mock, config)
            .find_active_listings(&token(), &ListingQuery::new(GTIN))
            .await
            .unwrap();

        assert_eq!(result.total, 5);
        assert!(result.items.iter().all(|l| l.id.starts_with("k-")));
    }

    #[tokio::test]
    async fn test_pagination_stops_on_short_page() {
        let offsets = Arc::new(Mutex::new(Vec::new()));
        let seen = offsets.clone();

        let mut mock = MockHttpTransport::new();
        mock.expect_send()
            .withf(|req| req.query_param("gtin").is_some())
            .times(3)
            .returning(move |req| {
                seen.lock().unwrap().push(req.query_param("offset").unwrap().to_string());
                Ok(window(&req, "g", 25, 25))
            });

        let result = resolver(mock, settings(10))
            .find_active_listings(&token(), &ListingQuery::new(GTIN))
            .await
            .unwrap();

        assert_eq!(result.total, 25);
        assert_eq!(*offsets.lock().unwrap(), vec!["0", "10", "20"]);
    }

    #[tokio::test]
    async fn test_pagination_stops_when_reported_total_is_reached() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();

        let mut mock = MockHttpTransport::new();
        mock.expect_send()
            .withf(|req| req.query_param("gtin").is_some())
            .returning(move |req| {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(window(&req, "g", 20, 20))
            });

        let result = resolver(mock, settings(10))
            .find_active_listings(&token(), &ListingQuery::new(GTIN))
            .await
            .unwrap();

        // 20 items, page size 10: exactly two full pages, no request for a third
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(result.total, 20);
    }

    #[tokio::test]
    async fn test_inflated_total_still_terminates() {
        let mut mock = MockHttpTransport::new();
        mock.expect_send()
            .withf(|req| req.query_param("gtin").is_some())
            .times(2)
            .returning(|req| Ok(window(&req, "g", 15, 10_000)));

        let result = resolver(mock, settings(10))
            .find_active_listings(&token(), &ListingQuery::new(GTIN))
            .await
            .unwrap();

        assert_eq!(result.total, 15);
    }

    #[tokio::test]
    async fn test_failed_page_discards_everything() {
        let mut mock = MockHttpTransport::new();
        mock.expect_send()
            .withf(|req| req.query_param("offset") == Some("0"))
            .times(1)
            .returning(|req| Ok(window(&req, "g", 30, 30)));
        mock.expect_send()
            .withf(|req| req.query_param("offset") == Some("10"))
            .times(1)
            .returning(|_| Ok(HttpResponse::new(503, "Service Unavailable")));

        let err = resolver(mock, settings(10))
            .find_active_listings(&token(), &ListingQuery::new(GTIN))
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            ScoutError::UpstreamSearch {
                phase: SearchPhase::Identifier,
                status: 503
            }
        ));
    }

    #[tokio::test]
    async fn test_keyword_failure_reports_keyword_phase() {
        let mut mock = MockHttpTransport::new();
        mock.expect_send()
            .withf(|req| req.query_param("gtin").is_some())
            .returning(|req| Ok(window(&req, "g", 0, 0)));
        mock.expect_send()
            .withf(|req| req.query_param("q").is_some())
            .returning(|_| Ok(HttpResponse::new(429, "")));

        let err = resolver(mock, settings(50))
            .find_active_listings(&token(), &ListingQuery::new(GTIN))
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            ScoutError::UpstreamSearch {
                phase: SearchPhase::Keyword,
                status: 429
            }
        ));
    }

    #[tokio::test]
    async fn test_malformed_identifier_page_degrades_to_fallback() {
        let mut mock = MockHttpTransport::new();
        mock.expect_send()
            .withf(|req| req.query_param("gtin").is_some())
            .times(1)
            .returning(|_| Ok(HttpResponse::new(200, "<html>gateway</html>")));
        mock.expect_send()
            .withf(|req| req.query_param("q").is_some())
            .times(1)
            .returning(|req| Ok(window(&req, "k", 2, 2)));

        let result = resolver(mock, settings(50))
            .find_active_listings(&token(), &ListingQuery::new(GTIN))
            .await
            .unwrap();

        assert_eq!(result.total, 2);
    }

    #[tokio::test]
    async fn test_keyword_phase_paginates() {
        let offsets = Arc::new(Mutex::new(Vec::new()));
        let seen = offsets.clone();

        let mut mock = MockHttpTransport::new();
        mock.expect_send()
            .withf(|req| req.query_param("gtin").is_some())
            .times(1)
            .returning(|req| Ok(window(&req, "g", 0, 0)));
        mock.expect_send()
            .withf(|req| req.query_param("q") == Some(GTIN))
            .times(3)
            .returning(move |req| {
                seen.lock().unwrap().push(req.query_param("offset").unwrap().to_string());
                Ok(window(&req, "k", 25, 25))
            });

        let result = resolver(mock, settings(10))
            .find_active_listings(&token(), &ListingQuery::new(GTIN))
            .await
            .unwrap();

        assert_eq!(result.total, 25);
        assert_eq!(*offsets.lock().unwrap(), vec!["0", "10", "20"]);
    }

    #[tokio::test]
    async fn test_malformed_keyword_page_keeps_identifier_results() {
        let mut mock = MockHttpTransport::new();
        mock.expect_send()
            .withf(|req| req.query_param("gtin").is_some())
            .times(1)
            .returning(|req| Ok(window(&req, "g", 3, 3)));
        mock.expect_send()
            .withf(|req| req.query_param("q").is_some() && req.query_param("offset") == Some("0"))
            .times(1)
            .returning(|req| Ok(window(&req, "k", 30, 30)));
        mock.expect_send()
            .withf(|req| req.query_param("q").is_some() && req.query_param("offset") == Some("10"))
            .times(1)
            .returning(|_| Ok(HttpResponse::new(200, "{\"itemSummaries\": 42}")));

        let result = resolver(mock, settings(10))
            .find_active_listings(&token(), &ListingQuery::new(GTIN))
            .await
            .unwrap();

        // the whole keyword phase is dropped, including its first good page
        let ids: Vec<_> = result.items.iter().map(|l| l.id.as_str()).collect();
        assert_eq!(ids, vec!["g-0", "g-1", "g-2"]);
        assert_eq!(result.total, 3);
    }

    #[tokio::test]
    async fn test_free_text_goes_straight_to_keywords() {
        let mut mock = MockHttpTransport::new();
        mock.expect_send()
            .withf(|req| req.query_param("gtin").is_some())
            .times(0);
        mock.expect_send()
            .withf(|req| req.query_param("q") == Some("game boy color"))
            .times(1)
            .returning(|req| Ok(window(&req, "k", 4, 4)));

        let result = resolver(mock, settings(50))
            .find_active_listings(&token(), &ListingQuery::new("game boy color"))
            .await
            .unwrap();

        assert_eq!(result.total, 4);
    }

    #[tokio::test]
    async fn test_title_keywords_come_from_first_identifier_match() {
        let mut mock = MockHttpTransport::new();
        mock.expect_send()
            .withf(|req| req.query_param("gtin").is_some())
            .times(1)
            .returning(|req| Ok(window(&req, "g", 1, 1)));
        mock.expect_send()
            .withf(|req| req.query_param("q") == Some("Retro Console 0 Boxed"))
            .times(1)
            .returning(|req| Ok(window(&req, "k", 1, 1)));

        let config = SearchConfig {
            keyword_source: KeywordSource::Title,
            ..settings(50)
        };
        let result = resolver(mock, config)
            .find_active_listings(&token(), &ListingQuery::new(GTIN))
            .await
            .unwrap();

        assert_eq!(result.total, 2);
    }

    #[tokio::test]
    async fn test_title_source_without_matches_uses_identifier() {
        let mut mock = MockHttpTransport::new();
        mock.expect_send()
            .withf(|req| req.query_param("gtin").is_some())
            .times(1)
            .returning(|req| Ok(window(&req, "g", 0, 0)));
        mock.expect_send()
            .withf(|req| req.query_param("q") == Some(GTIN))
            .times(1)
            .returning(|req| Ok(window(&req, "k", 0, 0)));

        let config = SearchConfig {
            keyword_source: KeywordSource::Title,
            ..settings(50)
        };
        let result = resolver(mock, config)
            .find_active_listings(&token(), &ListingQuery::new(GTIN))
            .await
            .unwrap();

        assert_eq!(result.total, 0);
    }

    #[tokio::test]
    async fn test_condition_filter_is_sent_on_every_phase() {
        let mut mock = MockHttpTransport::new();
        mock.expect_send()
            .withf(|req| req.query_param("filter") == Some("conditions:{USED}"))
            .times(2)
            .returning(|req| Ok(window(&req, "x", 0, 0)));

        let query = ListingQuery::new(GTIN).with_conditions(BTreeSet::from([ConditionCode::Used]));
        resolver(mock, settings(50))
            .find_active_listings(&token(), &query)
            .await
            .unwrap();
    }

    #[test]
    fn test_title_keywords() {
        assert_eq!(
            title_keywords("Nintendo Switch - OLED Model (White) w/ Mario's Kart 8 Deluxe Bundle!", 8),
            "Nintendo Switch OLED Model White w Marios Kart"
        );
        assert_eq!(title_keywords("!!!", 8), "");
    }

    #[test]
    fn test_listings_without_usable_price_are_dropped() {
        let raw = |value: &str, currency: &str| RawListing {
            item_id: Some("1".into()),
            price: Some(crate::api::RawAmount {
                value: Some(value.into()),
                currency: Some(currency.into()),
            }),
            ..Default::default()
        };

        assert!(normalize_listing(raw("19.99", "USD")).is_some());
        assert!(normalize_listing(raw("-1", "USD")).is_none());
        assert!(normalize_listing(raw("abc", "USD")).is_none());
        assert!(normalize_listing(raw("5", "dollars")).is_none());
        assert!(normalize_listing(RawListing::default()).is_none());
    }
}
