use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::phone::Msisdn;

/// Response code the provider returns when a push request was accepted for
/// processing. Anything else means the request was received but not queued.
pub const ACCEPTED_RESPONSE_CODE: &str = "0";

/// Immediate acknowledgment from the provider for an STK push request.
/// Field names follow the provider's wire format.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StkAck {
    #[serde(rename = "MerchantRequestID")]
    pub merchant_request_id: String,
    #[serde(rename = "CheckoutRequestID")]
    pub checkout_request_id: String,
    #[serde(rename = "ResponseCode")]
    pub response_code: String,
    #[serde(rename = "ResponseDescription", default)]
    pub response_description: Option<String>,
    #[serde(rename = "CustomerMessage", default)]
    pub customer_message: Option<String>,
}

impl StkAck {
    pub fn is_accepted(&self) -> bool {
        self.response_code == ACCEPTED_RESPONSE_CODE
    }
}

/// Two-channel gateway result. Callers branch on this instead of unwinding:
/// a rejected push is an expected business outcome, not a panic-worthy one.
#[derive(Debug, Clone)]
pub enum PushOutcome {
    Accepted(StkAck),
    Rejected(String),
}

/// Seam to the external mobile-money provider. Implementations are
/// stateless per call and must never return `Err` across this boundary;
/// every failure mode collapses into `PushOutcome::Rejected`.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn stk_push(
        &self,
        payer: &Msisdn,
        amount: u64,
        reference: &str,
        description: &str,
    ) -> PushOutcome;
}
