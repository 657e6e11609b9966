/// OAuth scope granting public Browse API access
pub const PUBLIC_API_SCOPE: &str = "https://api.ebay.com/oauth/api_scope";

/// Finding service operation that returns completed listings
pub const FINDING_OPERATION: &str = "findCompletedItems";
pub const FINDING_SERVICE_VERSION: &str = "1.0.0";

/// Largest page either search surface accepts
pub const MAX_PAGE_SIZE: usize = 100;

/// Marketplace URLs for one environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    pub token_url: String,
    pub browse_search_url: String,
    pub finding_url: String,
    pub scope: String,
}

impl Endpoints {
    pub fn production() -> Self {
        Self {
            token_url: "https://api.ebay.com/identity/v1/oauth2/token".to_string(),
            browse_search_url: "https://api.ebay.com/buy/browse/v1/item_summary/search"
                .to_string(),
            finding_url: "https://svcs.ebay.com/services/search/FindingService/v1".to_string(),
            scope: PUBLIC_API_SCOPE.to_string(),
        }
    }

    pub fn sandbox() -> Self {
        Self {
            token_url: "https://api.sandbox.ebay.com/identity/v1/oauth2/token".to_string(),
            browse_search_url: "https://api.sandbox.ebay.com/buy/browse/v1/item_summary/search"
                .to_string(),
            finding_url: "https://svcs.sandbox.ebay.com/services/search/FindingService/v1"
                .to_string(),
            scope: PUBLIC_API_SCOPE.to_string(),
        }
    }

    pub fn for_environment(sandbox_mode: bool) -> Self {
        if sandbox_mode {
            Self::sandbox()
        } else {
            Self::production()
        }
    }
}
