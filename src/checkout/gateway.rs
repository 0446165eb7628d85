//! Payment gateway trait and an in-memory sandbox implementation.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::CheckoutError;

/// Lifecycle states of an externally owned payment intent. This system
/// only observes them; it never owns the intent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum PaymentIntentStatus {
    RequiresPaymentMethod,
    RequiresConfirmation,
    RequiresAction,
    Succeeded,
    Failed,
}

impl PaymentIntentStatus {
    /// States from which a single explicit confirmation attempt may still
    /// move the intent to `Succeeded`.
    pub fn is_confirmable(self) -> bool {
        matches!(
            self,
            Self::RequiresPaymentMethod | Self::RequiresConfirmation | Self::RequiresAction
        )
    }
}

/// Result of a successful authorization request.
#[derive(Debug, Clone)]
pub struct PaymentAuthorization {
    /// Opaque reference for one authorization attempt.
    pub reference: String,
    /// Continuation token handed back to the client for 3DS-style flows.
    pub client_token: String,
}

/// Contract with the external payment provider.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Request an authorization for `amount` minor units.
    async fn create_authorization(
        &self,
        amount: i64,
        currency: &str,
        method_ref: &str,
    ) -> Result<PaymentAuthorization, CheckoutError>;

    /// Current status of an authorization.
    async fn status(&self, reference: &str) -> Result<PaymentIntentStatus, CheckoutError>;

    /// One explicit confirmation attempt. `method_ref` is only needed when
    /// the intent has no payment method attached yet.
    async fn confirm(
        &self,
        reference: &str,
        method_ref: Option<&str>,
    ) -> Result<PaymentIntentStatus, CheckoutError>;
}

#[derive(Debug)]
struct IntentRecord {
    amount: i64,
    currency: String,
    status: PaymentIntentStatus,
}

#[derive(Debug, Default)]
struct InMemoryGatewayState {
    intents: HashMap<String, IntentRecord>,
    next_id: u32,
    initial_status: Option<PaymentIntentStatus>,
    fail_on_confirm: bool,
}

/// Sandbox gateway. New intents start in `RequiresConfirmation`; a confirm
/// call moves them to `Succeeded` unless configured to fail. Tests use the
/// knobs to drive every branch of the Phase-2 status handling.
#[derive(Debug, Clone, Default)]
pub struct InMemoryGateway {
    state: Arc<RwLock<InMemoryGatewayState>>,
}

impl InMemoryGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// Status assigned to newly created intents.
    pub fn set_initial_status(&self, status: PaymentIntentStatus) {
        self.state.write().unwrap().initial_status = Some(status);
    }

    /// Make subsequent confirm calls return an error.
    pub fn set_fail_on_confirm(&self, fail: bool) {
        self.state.write().unwrap().fail_on_confirm = fail;
    }

    /// Force an existing intent into the given state.
    pub fn force_status(&self, reference: &str, status: PaymentIntentStatus) {
        if let Some(intent) = self.state.write().unwrap().intents.get_mut(reference) {
            intent.status = status;
        }
    }

    pub fn intent_count(&self) -> usize {
        self.state.read().unwrap().intents.len()
    }

    /// Amount and currency held by an intent, if it exists.
    pub fn charged_amount(&self, reference: &str) -> Option<(i64, String)> {
        self.state
            .read()
            .unwrap()
            .intents
            .get(reference)
            .map(|intent| (intent.amount, intent.currency.clone()))
    }
}

#[async_trait]
impl PaymentGateway for InMemoryGateway {
    async fn create_authorization(
        &self,
        amount: i64,
        currency: &str,
        _method_ref: &str,
    ) -> Result<PaymentAuthorization, CheckoutError> {
        let mut state = self.state.write().unwrap();
        state.next_id += 1;
        let reference = format!("pi_{:06}", state.next_id);
        let status = state
            .initial_status
            .unwrap_or(PaymentIntentStatus::RequiresConfirmation);
        state.intents.insert(
            reference.clone(),
            IntentRecord {
                amount,
                currency: currency.to_string(),
                status,
            },
        );
        Ok(PaymentAuthorization {
            client_token: format!("{reference}_secret"),
            reference,
        })
    }

    async fn status(&self, reference: &str) -> Result<PaymentIntentStatus, CheckoutError> {
        let state = self.state.read().unwrap();
        let intent = state
            .intents
            .get(reference)
            .ok_or_else(|| CheckoutError::PaymentFailed("unknown payment reference".into()))?;
        Ok(intent.status)
    }

    async fn confirm(
        &self,
        reference: &str,
        _method_ref: Option<&str>,
    ) -> Result<PaymentIntentStatus, CheckoutError> {
        let mut state = self.state.write().unwrap();
        if state.fail_on_confirm {
            return Err(CheckoutError::PaymentFailed("card declined".into()));
        }
        let intent = state
            .intents
            .get_mut(reference)
            .ok_or_else(|| CheckoutError::PaymentFailed("unknown payment reference".into()))?;
        if intent.status.is_confirmable() {
            intent.status = PaymentIntentStatus::Succeeded;
        }
        Ok(intent.status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn create_then_confirm_succeeds() {
        let gateway = InMemoryGateway::new();
        let auth = gateway
            .create_authorization(2000, "inr", "pm_card")
            .await
            .unwrap();
        assert!(auth.reference.starts_with("pi_"));
        assert_eq!(
            gateway.charged_amount(&auth.reference),
            Some((2000, "inr".to_string()))
        );
        assert_eq!(
            gateway.status(&auth.reference).await.unwrap(),
            PaymentIntentStatus::RequiresConfirmation
        );

        let status = gateway.confirm(&auth.reference, None).await.unwrap();
        assert_eq!(status, PaymentIntentStatus::Succeeded);
        assert_eq!(
            gateway.status(&auth.reference).await.unwrap(),
            PaymentIntentStatus::Succeeded
        );
    }

    #[tokio::test]
    async fn confirm_failure_leaves_intent_unconfirmed() {
        let gateway = InMemoryGateway::new();
        let auth = gateway
            .create_authorization(500, "inr", "pm_card")
            .await
            .unwrap();
        gateway.set_fail_on_confirm(true);

        let err = gateway.confirm(&auth.reference, None).await.unwrap_err();
        assert!(matches!(err, CheckoutError::PaymentFailed(_)));
        assert_eq!(
            gateway.status(&auth.reference).await.unwrap(),
            PaymentIntentStatus::RequiresConfirmation
        );
    }

    #[tokio::test]
    async fn unknown_reference_is_a_payment_failure() {
        let gateway = InMemoryGateway::new();
        assert!(matches!(
            gateway.status("pi_missing").await,
            Err(CheckoutError::PaymentFailed(_))
        ));
    }
}
