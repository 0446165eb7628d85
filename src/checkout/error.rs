use thiserror::Error;
use uuid::Uuid;

/// Everything that can go wrong between "place my order" and a committed
/// order row. Validation failures surface directly to the caller; only
/// `CommitFailed` means the store rolled the transaction back.
#[derive(Debug, Error)]
pub enum CheckoutError {
    #[error("not found")]
    NotFound,

    #[error("cart is empty")]
    EmptyCart,

    #[error("insufficient stock for product {product_id}")]
    InsufficientStock { product_id: Uuid },

    #[error("payment not successful")]
    PaymentNotSuccessful,

    #[error("payment failed: {0}")]
    PaymentFailed(String),

    #[error("stock conflict")]
    Conflict,

    #[error("storage error")]
    Storage(#[source] anyhow::Error),

    #[error("order commit failed")]
    CommitFailed(#[source] anyhow::Error),
}
