use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;

use soko_core::payment::{PaymentGateway, PushOutcome, StkAck};
use soko_core::phone::Msisdn;

fn default_base_url() -> String {
    "https://sandbox.safaricom.co.ke".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct MpesaConfig {
    pub consumer_key: String,
    pub consumer_secret: String,
    pub shortcode: String,
    pub passkey: String,
    pub callback_url: String,
    #[serde(default = "default_base_url")]
    pub base_url: String,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

/// Client for the Daraja STK-push API. Stateless: every push fetches a
/// fresh short-lived bearer token. All failure modes collapse into
/// `PushOutcome::Rejected`; nothing here panics or returns `Err` upward.
pub struct DarajaClient {
    http: reqwest::Client,
    config: MpesaConfig,
}

impl DarajaClient {
    pub fn new(config: MpesaConfig) -> Self {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .unwrap_or_default();
        Self { http, config }
    }

    /// Client-credentials token exchange. Soft-fails: any transport or
    /// auth problem logs and yields `None`, which the push path translates
    /// into a rejected outcome.
    pub async fn access_token(&self) -> Option<String> {
        let url = format!(
            "{}/oauth/v1/generate?grant_type=client_credentials",
            self.config.base_url
        );

        let response = self
            .http
            .get(&url)
            .basic_auth(&self.config.consumer_key, Some(&self.config.consumer_secret))
            .send()
            .await;

        match response {
            Ok(resp) if resp.status().is_success() => match resp.json::<TokenResponse>().await {
                Ok(body) => Some(body.access_token),
                Err(e) => {
                    tracing::warn!(error = %e, "malformed token response");
                    None
                }
            },
            Ok(resp) => {
                tracing::warn!(status = %resp.status(), "token request refused");
                None
            }
            Err(e) => {
                tracing::warn!(error = %e, "token request failed");
                None
            }
        }
    }

    /// Derived password for the push payload: base64 of
    /// shortcode + passkey + timestamp.
    fn password(&self, timestamp: &str) -> String {
        BASE64.encode(format!(
            "{}{}{}",
            self.config.shortcode, self.config.passkey, timestamp
        ))
    }

    fn timestamp() -> String {
        Utc::now().format("%Y%m%d%H%M%S").to_string()
    }
}

#[async_trait]
impl PaymentGateway for DarajaClient {
    async fn stk_push(
        &self,
        payer: &Msisdn,
        amount: u64,
        reference: &str,
        description: &str,
    ) -> PushOutcome {
        let Some(token) = self.access_token().await else {
            return PushOutcome::Rejected("Failed to get access token".to_string());
        };

        let timestamp = Self::timestamp();
        let payload = json!({
            "BusinessShortCode": self.config.shortcode,
            "Password": self.password(&timestamp),
            "Timestamp": timestamp,
            "TransactionType": "CustomerPayBillOnline",
            "Amount": amount,
            "PartyA": payer.as_str(),
            "PartyB": self.config.shortcode,
            "PhoneNumber": payer.as_str(),
            "CallBackURL": self.config.callback_url,
            "AccountReference": reference,
            "TransactionDesc": description,
        });

        let url = format!("{}/mpesa/stkpush/v1/processrequest", self.config.base_url);
        let response = self.http.post(&url).bearer_auth(token).json(&payload).send().await;

        match response {
            Ok(resp) if resp.status().is_success() => match resp.json::<StkAck>().await {
                Ok(ack) => PushOutcome::Accepted(ack),
                Err(e) => PushOutcome::Rejected(format!("malformed push response: {e}")),
            },
            Ok(resp) => {
                let body: serde_json::Value = resp.json().await.unwrap_or_default();
                let message = body["errorMessage"]
                    .as_str()
                    .unwrap_or("STK Push failed")
                    .to_string();
                tracing::warn!(%message, "push request rejected by provider");
                PushOutcome::Rejected(message)
            }
            Err(e) => PushOutcome::Rejected(e.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> MpesaConfig {
        MpesaConfig {
            consumer_key: "key".into(),
            consumer_secret: "secret".into(),
            shortcode: "174379".into(),
            passkey: "bfb279f9aa9bdbcf158e97dd71a467cd2e0c893059b10f78e6b72ada1ed2c919".into(),
            callback_url: "https://example.com/api/mpesa-callback".into(),
            base_url: default_base_url(),
        }
    }

    #[test]
    fn test_password_is_base64_of_shortcode_passkey_timestamp() {
        let client = DarajaClient::new(config());
        let encoded = client.password("20240101120000");
        let decoded = BASE64.decode(encoded).unwrap();
        let expected = format!("{}{}20240101120000", config().shortcode, config().passkey);
        assert_eq!(decoded, expected.as_bytes());
    }

    #[test]
    fn test_timestamp_shape() {
        let ts = DarajaClient::timestamp();
        assert_eq!(ts.len(), 14);
        assert!(ts.chars().all(|c| c.is_ascii_digit()));
    }

    #[test]
    fn test_config_defaults_to_sandbox() {
        let parsed: MpesaConfig = serde_json::from_value(json!({
            "consumer_key": "k",
            "consumer_secret": "s",
            "shortcode": "174379",
            "passkey": "p",
            "callback_url": "https://example.com/cb",
        }))
        .unwrap();
        assert_eq!(parsed.base_url, "https://sandbox.safaricom.co.ke");
    }
}
