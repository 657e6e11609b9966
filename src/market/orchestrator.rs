use futures::future::try_join;
use std::sync::Arc;
use tracing::Instrument;
use uuid::Uuid;

use super::active::ActiveListingResolver;
use super::metrics::compute_metrics;
use super::models::{ActiveListings, Credentials, ListingQuery, MarketSnapshot, SoldListings};
use super::sold::SoldListingResolver;
use super::token::TokenProvider;
use crate::api::{Endpoints, HttpTransport};
use crate::core::config::SearchConfig;
use crate::error::{Result, ScoutError};

/// Runs one market lookup end to end.
///
/// Holds no per-lookup state: every call acquires its own token and builds a
/// fresh snapshot.
pub struct Aggregator {
    credentials: Credentials,
    tokens: TokenProvider,
    active: ActiveListingResolver,
    sold: SoldListingResolver,
}

impl Aggregator {
    pub fn new(
        transport: Arc<dyn HttpTransport>,
        endpoints: Endpoints,
        credentials: Credentials,
        settings: SearchConfig,
    ) -> Self {
        let sold_page = settings.effective_sold_page_size();
        Self {
            credentials,
            tokens: TokenProvider::new(transport.clone(), endpoints.clone()),
            active: ActiveListingResolver::new(transport.clone(), endpoints.clone(), settings),
            sold: SoldListingResolver::new(transport, endpoints, sold_page),
        }
    }

    /// Token first, then active and sold retrieval side by side.
    ///
    /// If either search fails the other is dropped mid-flight and the whole
    /// lookup fails. A malformed sold response counts as no sales.
    pub async fn aggregate(&self, query: &ListingQuery) -> Result<MarketSnapshot> {
        let span = tracing::info_span!(
            "aggregate",
            request_id = %Uuid::new_v4(),
            identifier = %query.identifier
        );

        async move {
            let token = self.tokens.acquire_token(&self.credentials).await?;

            let active = self.active.find_active_listings(&token, query);
            let sold = self.sold_or_empty(query);
            let (active, sold) = try_join(active, sold).await?;

            Ok::<_, ScoutError>(Self::assemble(query, active, sold))
        }
        .instrument(span)
        .await
    }

    /// Active listings for free text, without sold data or metrics.
    pub async fn search_keywords(&self, query: &ListingQuery) -> Result<ActiveListings> {
        let span = tracing::info_span!(
            "search_keywords",
            request_id = %Uuid::new_v4(),
            keywords = %query.identifier
        );

        async move {
            let token = self.tokens.acquire_token(&self.credentials).await?;
            self.active.find_by_keywords(&token, query).await
        }
        .instrument(span)
        .await
    }

    async fn sold_or_empty(&self, query: &ListingQuery) -> Result<SoldListings> {
        match self
            .sold
            .find_sold_listings(self.credentials.client_id(), &query.identifier)
            .await
        {
            Err(ScoutError::MalformedResponse { reason, .. }) => {
                tracing::warn!("Treating sold results as empty: {}", reason);
                Ok(SoldListings::default())
            }
            other => other,
        }
    }

    fn assemble(query: &ListingQuery, active: ActiveListings, sold: SoldListings) -> MarketSnapshot {
        let metrics = compute_metrics(active.total, sold.total, &sold.items);

        tracing::info!(
            "Snapshot ready: {} active, {} sold, sell-through {:.2}%, recommended {:?}",
            active.total,
            sold.total,
            metrics.sell_through_rate_percent,
            metrics.recommended_price
        );

        MarketSnapshot {
            identifier: query.identifier.clone(),
            active_count: active.total,
            sold_count: sold.total,
            sell_through_rate_percent: metrics.sell_through_rate_percent,
            recommended_price: metrics.recommended_price,
            active_listings: active.items,
            sold_listings: sold.items,
        }
    }
}
