//! Storage contract consumed by the checkout orchestrator.
//!
//! The persistent collaborators (addresses, cart, products, orders,
//! history) are grouped behind one trait because the final commit must
//! touch all of them inside a single transaction.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::models::{Address, Order, OrderItem};

use super::CheckoutError;

/// One cart entry joined with the product's live price and stock.
#[derive(Debug, Clone)]
pub struct CartLine {
    pub product_id: Uuid,
    pub product_name: String,
    pub quantity: i32,
    /// Current catalog price in minor units, read in the same pass as the
    /// stock figure. Never the price stored when the item was carted.
    pub unit_price: i64,
    pub stock: i32,
}

/// Line snapshot carried into the order record.
#[derive(Debug, Clone)]
pub struct OrderLineDraft {
    pub product_id: Uuid,
    pub quantity: i32,
    pub price_at_purchase: i64,
}

/// Everything needed to commit an order. Built by the orchestrator after
/// payment success has been confirmed.
#[derive(Debug, Clone)]
pub struct OrderDraft {
    pub user_id: Uuid,
    pub order_number: String,
    pub payment_reference: String,
    pub delivery_address_id: Uuid,
    pub lines: Vec<OrderLineDraft>,
    pub total_amount: i64,
}

/// A committed order together with its owned line items.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PlacedOrder {
    pub order: Order,
    pub items: Vec<OrderItem>,
}

/// Result of `commit_order`.
#[derive(Debug)]
pub enum CommitOutcome {
    /// The draft was committed; stock was decremented and the cart cleared.
    Created(PlacedOrder),
    /// Another commit with the same payment reference won the race. No
    /// state was changed by this call.
    AlreadyPlaced(PlacedOrder),
}

impl CommitOutcome {
    pub fn into_order(self) -> PlacedOrder {
        match self {
            Self::Created(order) | Self::AlreadyPlaced(order) => order,
        }
    }
}

#[async_trait]
pub trait CheckoutStore: Send + Sync {
    /// Address by id, scoped to its owner.
    async fn find_owned_address(
        &self,
        address_id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<Address>, CheckoutError>;

    /// The user's current cart joined with live product price and stock.
    async fn cart_lines(&self, user_id: Uuid) -> Result<Vec<CartLine>, CheckoutError>;

    /// Idempotency gate lookup.
    async fn order_by_payment_reference(
        &self,
        reference: &str,
    ) -> Result<Option<PlacedOrder>, CheckoutError>;

    /// Atomic commit: insert the order and its items, decrement stock for
    /// every line, clear the user's cart and append to their order
    /// history. Either all of it becomes visible or none of it does.
    ///
    /// Stock is re-checked here; `Conflict` means a concurrent commit beat
    /// this one to the remaining inventory. A duplicate payment reference
    /// resolves to `AlreadyPlaced` with the winner's order.
    async fn commit_order(&self, draft: OrderDraft) -> Result<CommitOutcome, CheckoutError>;
}
