use serde::Serialize;
use std::fmt;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, ScoutError>;

/// Which outbound search produced a failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchPhase {
    Identifier,
    Keyword,
    Sold,
}

impl fmt::Display for SearchPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SearchPhase::Identifier => "identifier",
            SearchPhase::Keyword => "keyword",
            SearchPhase::Sold => "sold",
        };
        f.write_str(name)
    }
}

#[derive(Error, Debug)]
pub enum ScoutError {
    #[error("Marketplace credentials are not usable: {0}")]
    Credential(String),

    #[error("Token exchange rejected with status {status}")]
    UpstreamAuth { status: u16 },

    #[error("{phase} search failed with status {status}")]
    UpstreamSearch { phase: SearchPhase, status: u16 },

    #[error("Malformed {phase} response: {reason}")]
    MalformedResponse { phase: SearchPhase, reason: String },

    #[error("Transport error: {0}")]
    Transport(String),
}

impl From<reqwest::Error> for ScoutError {
    fn from(err: reqwest::Error) -> Self {
        ScoutError::Transport(err.to_string())
    }
}

impl ScoutError {
    /// Whether repeating the same call later can reasonably succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            ScoutError::Credential(_) => false,
            ScoutError::UpstreamAuth { .. } => true,
            ScoutError::UpstreamSearch { status, .. } => {
                matches!(status, 401 | 403 | 429) || *status >= 500
            }
            ScoutError::MalformedResponse { .. } => false,
            ScoutError::Transport(_) => true,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            ScoutError::Credential(_) => "credential_error",
            ScoutError::UpstreamAuth { .. } => "upstream_auth_error",
            ScoutError::UpstreamSearch { .. } => "upstream_search_error",
            ScoutError::MalformedResponse { .. } => "malformed_response_error",
            ScoutError::Transport(_) => "transport_error",
        }
    }

    /// Message safe to hand to an end user. Never includes upstream bodies.
    pub fn client_message(&self) -> String {
        match self {
            ScoutError::Credential(_) => {
                "Marketplace access is not configured on this server".to_string()
            }
            ScoutError::UpstreamAuth { .. } => {
                "Could not authenticate with the marketplace, try again shortly".to_string()
            }
            ScoutError::UpstreamSearch { phase, status } if *status == 429 => {
                format!("Marketplace {} search is rate limited, try again shortly", phase)
            }
            ScoutError::UpstreamSearch { phase, .. } => {
                format!("Marketplace {} search failed", phase)
            }
            ScoutError::MalformedResponse { phase, .. } => {
                format!("Marketplace returned an unreadable {} response", phase)
            }
            ScoutError::Transport(_) => "Marketplace could not be reached".to_string(),
        }
    }

    pub fn http_status(&self) -> u16 {
        match self {
            ScoutError::Credential(_) => 500,
            ScoutError::UpstreamSearch { status: 429, .. } => 429,
            _ => 502,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_search_errors_retry_on_server_rate_limit_or_auth() {
        let search = |phase, status| ScoutError::UpstreamSearch { phase, status };

        assert!(search(SearchPhase::Identifier, 503).is_retryable());
        assert!(search(SearchPhase::Keyword, 429).is_retryable());
        assert!(search(SearchPhase::Identifier, 401).is_retryable());
        assert!(search(SearchPhase::Sold, 403).is_retryable());
        assert!(!search(SearchPhase::Sold, 400).is_retryable());
        assert!(!search(SearchPhase::Keyword, 404).is_retryable());
    }

    #[test]
    fn test_credential_errors_are_not_retryable() {
        let err = ScoutError::Credential("client secret is missing".into());
        assert!(!err.is_retryable());
        assert_eq!(err.http_status(), 500);
        assert_eq!(err.kind(), "credential_error");
    }

    #[test]
    fn test_client_message_hides_details() {
        let err = ScoutError::MalformedResponse {
            phase: SearchPhase::Sold,
            reason: "expected value at line 1 column 1".into(),
        };
        let message = err.client_message();
        assert!(message.contains("sold"));
        assert!(!message.contains("line 1"));
    }

    #[test]
    fn test_rate_limit_passes_through_as_429() {
        let err = ScoutError::UpstreamSearch {
            phase: SearchPhase::Sold,
            status: 429,
        };
        assert_eq!(err.http_status(), 429);
        assert_eq!(err.to_string(), "sold search failed with status 429");
    }
}
