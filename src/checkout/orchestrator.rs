//! The checkout orchestrator: Phase 1 creates a payment intent without
//! touching local state; Phase 2 verifies the payment and commits the
//! order atomically.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use super::{
    CartLine, CheckoutError, CheckoutStore, Notification, Notifier, OrderDraft, OrderLineDraft,
    PaymentGateway, PaymentIntentStatus, PlacedOrder,
};
use crate::checkout::CommitOutcome;

/// Phase-1 result handed back to the client. The client token continues
/// the payment flow on their side; the reference comes back to us in
/// Phase 2.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CheckoutIntent {
    pub payment_reference: String,
    pub client_token: String,
    pub total_amount: i64,
}

pub struct CheckoutService {
    store: Arc<dyn CheckoutStore>,
    gateway: Arc<dyn PaymentGateway>,
    notifier: Arc<dyn Notifier>,
    currency: String,
}

impl CheckoutService {
    pub fn new(
        store: Arc<dyn CheckoutStore>,
        gateway: Arc<dyn PaymentGateway>,
        notifier: Arc<dyn Notifier>,
        currency: impl Into<String>,
    ) -> Self {
        Self {
            store,
            gateway,
            notifier,
            currency: currency.into(),
        }
    }

    /// Phase 1: validate the cart and request a payment authorization.
    ///
    /// Nothing local is mutated, so callers may retry freely; an abandoned
    /// intent carries no state commitment on our side.
    pub async fn begin_checkout(
        &self,
        user_id: Uuid,
        address_id: Uuid,
        payment_method: &str,
    ) -> Result<CheckoutIntent, CheckoutError> {
        self.store
            .find_owned_address(address_id, user_id)
            .await?
            .ok_or(CheckoutError::NotFound)?;

        let lines = self.store.cart_lines(user_id).await?;
        if lines.is_empty() {
            return Err(CheckoutError::EmptyCart);
        }

        // Advisory only. The load-bearing check happens again inside the
        // commit transaction.
        for line in &lines {
            if line.stock < line.quantity {
                self.send_notification(Notification::RestockRequested {
                    product_id: line.product_id,
                })
                .await;
                return Err(CheckoutError::InsufficientStock {
                    product_id: line.product_id,
                });
            }
        }

        let total_amount = order_total(&lines);
        let auth = self
            .gateway
            .create_authorization(total_amount, &self.currency, payment_method)
            .await?;

        Ok(CheckoutIntent {
            payment_reference: auth.reference,
            client_token: auth.client_token,
            total_amount,
        })
    }

    /// Phase 2: verify the authorization and commit the order.
    ///
    /// Safe to call any number of times for one payment reference: the
    /// first successful call creates the order, every later call returns
    /// that same order.
    pub async fn complete_checkout(
        &self,
        user_id: Uuid,
        payment_reference: &str,
        address_id: Uuid,
    ) -> Result<PlacedOrder, CheckoutError> {
        // Idempotency gate. A replayed request short-circuits here.
        if let Some(existing) = self
            .store
            .order_by_payment_reference(payment_reference)
            .await?
        {
            return Ok(existing);
        }

        self.store
            .find_owned_address(address_id, user_id)
            .await?
            .ok_or(CheckoutError::NotFound)?;

        // The cart is re-read at commit time: the order reflects what is
        // in the cart now, not what was there when the intent was made.
        let lines = self.store.cart_lines(user_id).await?;
        if lines.is_empty() {
            return Err(CheckoutError::EmptyCart);
        }

        self.ensure_payment_succeeded(payment_reference).await?;

        let draft = OrderDraft {
            user_id,
            order_number: build_order_number(),
            payment_reference: payment_reference.to_string(),
            delivery_address_id: address_id,
            total_amount: order_total(&lines),
            lines: lines
                .iter()
                .map(|line| OrderLineDraft {
                    product_id: line.product_id,
                    quantity: line.quantity,
                    price_at_purchase: line.unit_price,
                })
                .collect(),
        };

        let outcome = self.store.commit_order(draft).await?;

        if let CommitOutcome::Created(placed) = &outcome {
            self.send_notification(Notification::OrderPlaced {
                user_id,
                order_id: placed.order.id,
                order_number: placed.order.order_number.clone(),
                total_amount: placed.order.total_amount,
            })
            .await;
        }

        Ok(outcome.into_order())
    }

    /// Proceed only on `Succeeded`. Confirmable states get exactly one
    /// confirmation attempt; a confirm call that errors surfaces
    /// `PaymentFailed`, anything else short of success surfaces
    /// `PaymentNotSuccessful`.
    async fn ensure_payment_succeeded(&self, reference: &str) -> Result<(), CheckoutError> {
        let status = self.gateway.status(reference).await?;
        let status = if status.is_confirmable() {
            self.gateway.confirm(reference, None).await.map_err(|err| {
                CheckoutError::PaymentFailed(err.to_string())
            })?
        } else {
            status
        };

        match status {
            PaymentIntentStatus::Succeeded => Ok(()),
            _ => Err(CheckoutError::PaymentNotSuccessful),
        }
    }

    async fn send_notification(&self, notification: Notification) {
        if let Err(err) = self.notifier.notify(notification).await {
            tracing::warn!(error = %err, "notification failed");
        }
    }
}

fn order_total(lines: &[CartLine]) -> i64 {
    lines
        .iter()
        .map(|line| line.unit_price * i64::from(line.quantity))
        .sum()
}

/// Human-readable order number, e.g. `ORD-1b9d6bcd`.
fn build_order_number() -> String {
    let suffix = Uuid::new_v4().to_string();
    format!("ORD-{}", &suffix[..8])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(quantity: i32, unit_price: i64) -> CartLine {
        CartLine {
            product_id: Uuid::new_v4(),
            product_name: "widget".into(),
            quantity,
            unit_price,
            stock: 100,
        }
    }

    #[test]
    fn total_is_exact_integer_arithmetic() {
        let lines = vec![line(2, 100), line(3, 333), line(1, 1)];
        assert_eq!(order_total(&lines), 200 + 999 + 1);
    }

    #[test]
    fn order_numbers_are_prefixed_and_short() {
        let number = build_order_number();
        assert!(number.starts_with("ORD-"));
        assert_eq!(number.len(), "ORD-".len() + 8);
    }
}
