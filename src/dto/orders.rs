use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::models::Order;

#[derive(Debug, Deserialize, ToSchema)]
pub struct CheckoutIntentRequest {
    pub address_id: Uuid,
    /// Payment method reference from the client-side payment SDK.
    pub payment_method: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct CompleteCheckoutRequest {
    pub payment_reference: String,
    pub address_id: Uuid,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct OrderList {
    pub items: Vec<Order>,
}
