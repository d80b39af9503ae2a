//! Chapa Gateway Integration
//!
//! Initialize/verify contract against the Chapa transaction API.

use async_trait::async_trait;
use reqwest::{Client, StatusCode, Url};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::{PaymentError, Result};

const DEFAULT_API_BASE: &str = "https://api.chapa.co/v1/transaction";

/// Gateway client trait
///
/// Implemented by the Chapa HTTP client and by test doubles.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Start a transaction and obtain a hosted checkout page
    async fn initialize(&self, request: &InitializeRequest) -> Result<Checkout>;

    /// Query the current status of a transaction
    async fn verify(&self, transaction_id: &str) -> Result<VerifiedTransaction>;

    /// Gateway name
    fn name(&self) -> &str;
}

/// Chapa client configuration
#[derive(Clone, Debug)]
pub struct ChapaConfig {
    /// Secret key sent as bearer token
    pub secret_key: String,

    /// Transaction API base URL
    pub api_base: String,

    /// Per-request timeout
    pub timeout: Duration,
}

impl ChapaConfig {
    pub fn new(secret_key: impl Into<String>) -> Self {
        Self {
            secret_key: secret_key.into(),
            api_base: DEFAULT_API_BASE.into(),
            timeout: Duration::from_secs(10),
        }
    }

    #[must_use]
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into().trim_end_matches('/').to_string();
        self
    }

    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Create from environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_vars(|name| std::env::var(name).ok())
    }

    /// Create from a variable lookup. A blank secret key counts as unset.
    pub fn from_vars(var: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let secret_key = var("CHAPA_SECRET_KEY")
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| PaymentError::Config("CHAPA_SECRET_KEY not set".into()))?;

        let mut config = Self::new(secret_key);

        if let Some(base) = var("CHAPA_API_BASE") {
            config = config.with_api_base(base);
        }

        if let Some(secs) = var("GATEWAY_TIMEOUT_SECS") {
            let secs: u64 = secs
                .parse()
                .map_err(|_| PaymentError::Config("GATEWAY_TIMEOUT_SECS must be an integer".into()))?;
            config = config.with_timeout(Duration::from_secs(secs));
        }

        Ok(config)
    }
}

/// Body of the initialize call
#[derive(Clone, Debug, Serialize)]
pub struct InitializeRequest {
    #[serde(with = "rust_decimal::serde::float")]
    pub amount: Decimal,
    pub currency: String,
    pub email: String,
    pub tx_ref: String,
    pub callback_url: String,
}

/// Hosted checkout returned by a successful initialize
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Checkout {
    /// Gateway transaction id
    pub id: String,

    /// Page where the payer completes the payment
    pub checkout_url: String,
}

/// Result of a verify call
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerifiedTransaction {
    pub status: String,
}

impl VerifiedTransaction {
    pub fn is_success(&self) -> bool {
        self.status == "success"
    }
}

#[derive(Deserialize)]
struct Envelope<T> {
    data: Option<T>,
}

#[derive(Deserialize)]
struct InitializeData {
    id: Option<serde_json::Value>,
    checkout_url: Option<String>,
}

#[derive(Deserialize)]
struct VerifyData {
    status: Option<String>,
}

/// Chapa HTTP client
pub struct ChapaClient {
    http: Client,
    base: Url,
    secret_key: String,
}

impl ChapaClient {
    /// Create a client; every request is bounded by the configured timeout
    pub fn new(config: ChapaConfig) -> Result<Self> {
        let base = Url::parse(&config.api_base)
            .ok()
            .filter(|url| !url.cannot_be_a_base())
            .ok_or_else(|| PaymentError::Config(format!("invalid CHAPA_API_BASE: {}", config.api_base)))?;

        let http = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| PaymentError::Config(format!("HTTP client: {e}")))?;

        Ok(Self {
            http,
            base,
            secret_key: config.secret_key,
        })
    }

    /// Append path segments to the API base, percent-encoding each one
    fn url(&self, segments: &[&str]) -> Url {
        let mut url = self.base.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }
}

#[async_trait]
impl PaymentGateway for ChapaClient {
    async fn initialize(&self, request: &InitializeRequest) -> Result<Checkout> {
        let response = self
            .http
            .post(self.url(&["initialize"]))
            .bearer_auth(&self.secret_key)
            .json(request)
            .send()
            .await?;

        let status = response.status();
        if status != StatusCode::OK {
            tracing::warn!(tx_ref = %request.tx_ref, %status, "Chapa initialize rejected");
            return Err(PaymentError::Gateway(format!("initialize returned {status}")));
        }

        let body: Envelope<InitializeData> = response.json().await?;
        let data = body
            .data
            .ok_or_else(|| PaymentError::Gateway("initialize response has no data".into()))?;

        // Chapa may send the id as a number or a string
        let id = match data.id {
            Some(serde_json::Value::String(id)) => id,
            Some(serde_json::Value::Number(id)) => id.to_string(),
            _ => return Err(PaymentError::Gateway("initialize response has no transaction id".into())),
        };
        let checkout_url = data
            .checkout_url
            .ok_or_else(|| PaymentError::Gateway("initialize response has no checkout_url".into()))?;

        Ok(Checkout { id, checkout_url })
    }

    async fn verify(&self, transaction_id: &str) -> Result<VerifiedTransaction> {
        let response = self
            .http
            .get(self.url(&["verify", transaction_id]))
            .bearer_auth(&self.secret_key)
            .send()
            .await?;

        let status = response.status();
        if status != StatusCode::OK {
            tracing::warn!(%transaction_id, %status, "Chapa verify rejected");
            return Err(PaymentError::Gateway(format!("verify returned {status}")));
        }

        let body: Envelope<VerifyData> = response.json().await?;

        Ok(VerifiedTransaction {
            status: body.data.and_then(|d| d.status).unwrap_or_default(),
        })
    }

    fn name(&self) -> &str {
        "Chapa"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use serde_json::json;
    use wiremock::matchers::{bearer_token, body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client(server: &MockServer) -> ChapaClient {
        let config = ChapaConfig::new("CHASECK_TEST")
            .with_api_base(format!("{}/v1/transaction/", server.uri()))
            .with_timeout(Duration::from_secs(2));
        ChapaClient::new(config).unwrap()
    }

    fn request() -> InitializeRequest {
        InitializeRequest {
            amount: dec!(250.0),
            currency: "ETB".into(),
            email: "a@x.com".into(),
            tx_ref: "BR100".into(),
            callback_url: "http://localhost:8000/payments/verify/BR100".into(),
        }
    }

    #[test]
    fn test_config_defaults() {
        let config = ChapaConfig::new("key");
        assert_eq!(config.api_base, "https://api.chapa.co/v1/transaction");
        assert_eq!(config.timeout, Duration::from_secs(10));
    }

    #[test]
    fn test_config_from_vars() {
        let config = ChapaConfig::from_vars(|name| match name {
            "CHAPA_SECRET_KEY" => Some("CHASECK_TEST".into()),
            "CHAPA_API_BASE" => Some("http://sandbox/v1/transaction/".into()),
            "GATEWAY_TIMEOUT_SECS" => Some("3".into()),
            _ => None,
        })
        .unwrap();
        assert_eq!(config.secret_key, "CHASECK_TEST");
        assert_eq!(config.api_base, "http://sandbox/v1/transaction");
        assert_eq!(config.timeout, Duration::from_secs(3));
    }

    #[test]
    fn test_blank_secret_key_is_unset() {
        for key in [None, Some(String::new()), Some("   ".to_string())] {
            let err = ChapaConfig::from_vars(|name| {
                (name == "CHAPA_SECRET_KEY").then(|| key.clone()).flatten()
            })
            .unwrap_err();
            assert!(matches!(err, PaymentError::Config(msg) if msg.contains("CHAPA_SECRET_KEY")));
        }
    }

    #[test]
    fn test_client_rejects_unusable_api_base() {
        for base in ["not a url", "mailto:pay@chapa.co"] {
            let config = ChapaConfig::new("key").with_api_base(base);
            assert!(matches!(ChapaClient::new(config), Err(PaymentError::Config(_))));
        }
    }

    #[tokio::test]
    async fn test_initialize_sends_contract_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/transaction/initialize"))
            .and(bearer_token("CHASECK_TEST"))
            .and(body_json(json!({
                "amount": 250.0,
                "currency": "ETB",
                "email": "a@x.com",
                "tx_ref": "BR100",
                "callback_url": "http://localhost:8000/payments/verify/BR100",
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": {"id": "tx_1", "checkout_url": "https://pay/tx_1"}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let checkout = client(&server).initialize(&request()).await.unwrap();
        assert_eq!(checkout.id, "tx_1");
        assert_eq!(checkout.checkout_url, "https://pay/tx_1");
    }

    #[tokio::test]
    async fn test_initialize_accepts_numeric_id() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/transaction/initialize"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": {"id": 4821, "checkout_url": "https://pay/4821"}
            })))
            .mount(&server)
            .await;

        let checkout = client(&server).initialize(&request()).await.unwrap();
        assert_eq!(checkout.id, "4821");
    }

    #[tokio::test]
    async fn test_initialize_non_200_is_gateway_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/transaction/initialize"))
            .respond_with(ResponseTemplate::new(401).set_body_json(json!({"message": "Invalid API Key"})))
            .mount(&server)
            .await;

        let err = client(&server).initialize(&request()).await.unwrap_err();
        assert!(matches!(err, PaymentError::Gateway(_)));
    }

    #[tokio::test]
    async fn test_initialize_missing_checkout_url() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": {"id": "tx_1"}})))
            .mount(&server)
            .await;

        let err = client(&server).initialize(&request()).await.unwrap_err();
        assert!(matches!(err, PaymentError::Gateway(_)));
    }

    #[tokio::test]
    async fn test_verify_reads_status() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/transaction/verify/tx_1"))
            .and(bearer_token("CHASECK_TEST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": {"status": "success"}
            })))
            .mount(&server)
            .await;

        let verified = client(&server).verify("tx_1").await.unwrap();
        assert!(verified.is_success());
    }

    #[tokio::test]
    async fn test_verify_encodes_transaction_id_as_one_segment() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/transaction/verify/tx%2F1%3Fx=1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": {"status": "success"}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let verified = client(&server).verify("tx/1?x=1").await.unwrap();
        assert!(verified.is_success());
    }

    #[tokio::test]
    async fn test_verify_missing_status_is_not_success() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/transaction/verify/tx_2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": {}})))
            .mount(&server)
            .await;

        let verified = client(&server).verify("tx_2").await.unwrap();
        assert!(!verified.is_success());
    }

    #[tokio::test]
    async fn test_verify_non_200_is_gateway_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let err = client(&server).verify("tx_1").await.unwrap_err();
        assert!(matches!(err, PaymentError::Gateway(_)));
    }

    #[tokio::test]
    async fn test_slow_gateway_times_out() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"data": {"status": "success"}}))
                    .set_delay(Duration::from_secs(5)),
            )
            .mount(&server)
            .await;

        let config = ChapaConfig::new("CHASECK_TEST")
            .with_api_base(server.uri())
            .with_timeout(Duration::from_millis(200));
        let err = ChapaClient::new(config).unwrap().verify("tx_1").await.unwrap_err();
        assert!(matches!(err, PaymentError::Gateway(_)));
    }
}
