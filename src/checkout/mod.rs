//! Two-phase checkout: payment intent creation followed by an atomic
//! order commit. The orchestrator talks to its collaborators (store,
//! payment gateway, notifier) through traits so they can be swapped for
//! in-memory implementations.

mod error;
pub mod gateway;
pub mod memory;
pub mod notify;
mod orchestrator;
pub mod pg;
pub mod store;

pub use error::CheckoutError;
pub use gateway::{InMemoryGateway, PaymentAuthorization, PaymentGateway, PaymentIntentStatus};
pub use memory::MemoryCheckoutStore;
pub use notify::{LogNotifier, Notification, Notifier};
pub use orchestrator::{CheckoutIntent, CheckoutService};
pub use pg::PgCheckoutStore;
pub use store::{CartLine, CheckoutStore, CommitOutcome, OrderDraft, OrderLineDraft, PlacedOrder};
