//! Fire-and-forget notifications. Delivery (email, push) lives outside
//! this service; the orchestrator only hands events to a `Notifier` and
//! logs failures without propagating them.

use async_trait::async_trait;
use uuid::Uuid;

#[derive(Debug, Clone)]
pub enum Notification {
    /// Order confirmation for the buyer.
    OrderPlaced {
        user_id: Uuid,
        order_id: Uuid,
        order_number: String,
        total_amount: i64,
    },
    /// A checkout was refused because this product ran out.
    RestockRequested { product_id: Uuid },
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, notification: Notification) -> anyhow::Result<()>;
}

/// Notifier that writes to the log stream. Stands in for the mail
/// transport in development and tests.
#[derive(Debug, Clone, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, notification: Notification) -> anyhow::Result<()> {
        match notification {
            Notification::OrderPlaced {
                user_id,
                order_id,
                order_number,
                total_amount,
            } => {
                tracing::info!(
                    %user_id,
                    %order_id,
                    order_number,
                    total_amount,
                    "order confirmation"
                );
            }
            Notification::RestockRequested { product_id } => {
                tracing::info!(%product_id, "restock requested");
            }
        }
        Ok(())
    }
}
