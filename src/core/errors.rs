use thiserror::Error;

/// Error type for every layer of the harness.
///
/// Variants map one-to-one onto how a failure is handled: most are fatal for
/// the scenario (or claim) they occur in, none of them are fatal for the run.
#[derive(Debug, Error)]
pub enum HarnessError {
    /// The source-side token address is unknown, so the chain cannot be used
    /// as the origin of a transfer for this token yet.
    #[error("token {symbol} is not resolved on {chain}: bridge it into {chain} first")]
    TokenNotResolved { symbol: String, chain: String },

    /// Both the routing API and the direct bridge path failed.
    #[error("no route available: {0}")]
    NoRouteAvailable(String),

    /// Allowance could not be raised for the spender.
    #[error("approval of {token} for spender {spender} failed: {reason}")]
    ApprovalFailed { token: String, spender: String, reason: String },

    /// A backend returned a transaction that cannot be signed.
    #[error("malformed transaction: {0}")]
    MalformedTransaction(String),

    /// The indexer has not ingested the source transaction yet.
    #[error("deposit for {tx_hash} is not indexed yet")]
    DepositNotIndexed { tx_hash: String },

    /// The transaction was mined but its receipt reports failure.
    #[error("transaction {hash} reverted")]
    TransactionReverted { hash: String },

    /// Chain RPC or signer failure.
    #[error("rpc error: {0}")]
    Rpc(String),

    /// Routing API failure (HTTP, decoding or API-level error).
    #[error("router error: {0}")]
    Router(String),

    /// Missing or inconsistent configuration.
    #[error("configuration error: {0}")]
    Config(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

impl HarnessError {
    /// Short stable name used in reports and checkpoint records.
    pub fn kind(&self) -> &'static str {
        match self {
            HarnessError::TokenNotResolved { .. } => "TokenNotResolved",
            HarnessError::NoRouteAvailable(_) => "NoRouteAvailable",
            HarnessError::ApprovalFailed { .. } => "ApprovalFailed",
            HarnessError::MalformedTransaction(_) => "MalformedTransaction",
            HarnessError::DepositNotIndexed { .. } => "DepositNotIndexed",
            HarnessError::TransactionReverted { .. } => "TransactionReverted",
            HarnessError::Rpc(_) => "Rpc",
            HarnessError::Router(_) => "Router",
            HarnessError::Config(_) => "Config",
            HarnessError::Io(_) => "Io",
            HarnessError::Json(_) => "Json",
        }
    }
}

impl From<reqwest::Error> for HarnessError {
    fn from(err: reqwest::Error) -> Self {
        HarnessError::Router(err.to_string())
    }
}

impl From<toml::de::Error> for HarnessError {
    fn from(err: toml::de::Error) -> Self {
        HarnessError::Config(err.to_string())
    }
}

pub type Result<T, E = HarnessError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_token_not_resolved() {
        let err = HarnessError::TokenNotResolved {
            symbol: "ASTEST".to_string(),
            chain: "base".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "token ASTEST is not resolved on base: bridge it into base first"
        );
        assert_eq!(err.kind(), "TokenNotResolved");
    }

    #[test]
    fn test_display_approval_failed() {
        let err = HarnessError::ApprovalFailed {
            token: "0xaa".to_string(),
            spender: "0xbb".to_string(),
            reason: "reverted".to_string(),
        };
        assert_eq!(err.to_string(), "approval of 0xaa for spender 0xbb failed: reverted");
    }

    #[test]
    fn test_from_json_error() {
        let json_err = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let err: HarnessError = json_err.into();
        assert_eq!(err.kind(), "Json");
    }
}
