use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum_storefront_api::checkout::{
    CheckoutError, CheckoutService, CheckoutStore, CommitOutcome, InMemoryGateway,
    MemoryCheckoutStore, Notification, Notifier, OrderDraft, OrderLineDraft, PaymentIntentStatus,
};
use axum_storefront_api::models::{OrderStatus, PaymentStatus};
use uuid::Uuid;

/// Notifier that records everything it is handed.
#[derive(Debug, Clone, Default)]
struct RecordingNotifier {
    events: Arc<Mutex<Vec<Notification>>>,
}

impl RecordingNotifier {
    fn events(&self) -> Vec<Notification> {
        self.events.lock().unwrap().clone()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(&self, notification: Notification) -> anyhow::Result<()> {
        self.events.lock().unwrap().push(notification);
        Ok(())
    }
}

struct Harness {
    store: MemoryCheckoutStore,
    gateway: InMemoryGateway,
    notifier: RecordingNotifier,
    service: CheckoutService,
}

fn harness() -> Harness {
    let store = MemoryCheckoutStore::new();
    let gateway = InMemoryGateway::new();
    let notifier = RecordingNotifier::default();
    let service = CheckoutService::new(
        Arc::new(store.clone()),
        Arc::new(gateway.clone()),
        Arc::new(notifier.clone()),
        "inr",
    );
    Harness {
        store,
        gateway,
        notifier,
        service,
    }
}

#[tokio::test]
async fn happy_path_places_order_and_clears_cart() {
    let h = harness();
    let user_id = Uuid::new_v4();
    let address_id = h.store.add_address(user_id);
    let product_id = h.store.add_product("Steel Water Bottle", 100, 5);
    h.store.set_cart_line(user_id, product_id, 2);

    let intent = h
        .service
        .begin_checkout(user_id, address_id, "pm_card")
        .await
        .unwrap();
    assert_eq!(intent.total_amount, 200);

    let placed = h
        .service
        .complete_checkout(user_id, &intent.payment_reference, address_id)
        .await
        .unwrap();

    assert_eq!(placed.order.total_amount, 200);
    assert_eq!(placed.order.payment_status, PaymentStatus::Completed);
    assert_eq!(placed.order.order_status, OrderStatus::Processing);
    assert_eq!(placed.items.len(), 1);
    assert_eq!(placed.items[0].quantity, 2);
    assert_eq!(placed.items[0].price_at_purchase, 100);

    assert_eq!(h.store.stock_of(product_id), Some(3));
    assert_eq!(h.store.cart_len(user_id), 0);
    assert_eq!(h.store.history_of(user_id), vec![placed.order.id]);

    let order_placed = h
        .notifier
        .events()
        .into_iter()
        .any(|n| matches!(n, Notification::OrderPlaced { order_id, .. } if order_id == placed.order.id));
    assert!(order_placed, "expected an order confirmation notification");
}

#[tokio::test]
async fn empty_cart_is_rejected_in_both_phases() {
    let h = harness();
    let user_id = Uuid::new_v4();
    let address_id = h.store.add_address(user_id);

    let err = h
        .service
        .begin_checkout(user_id, address_id, "pm_card")
        .await
        .unwrap_err();
    assert!(matches!(err, CheckoutError::EmptyCart));

    let err = h
        .service
        .complete_checkout(user_id, "pi_000099", address_id)
        .await
        .unwrap_err();
    assert!(matches!(err, CheckoutError::EmptyCart));

    assert_eq!(h.store.order_count(), 0);
}

#[tokio::test]
async fn unknown_address_is_not_found() {
    let h = harness();
    let user_id = Uuid::new_v4();
    let product_id = h.store.add_product("Canvas Backpack", 250, 10);
    h.store.set_cart_line(user_id, product_id, 1);

    let err = h
        .service
        .begin_checkout(user_id, Uuid::new_v4(), "pm_card")
        .await
        .unwrap_err();
    assert!(matches!(err, CheckoutError::NotFound));

    // An address owned by someone else is just as invisible.
    let other_address = h.store.add_address(Uuid::new_v4());
    let err = h
        .service
        .begin_checkout(user_id, other_address, "pm_card")
        .await
        .unwrap_err();
    assert!(matches!(err, CheckoutError::NotFound));
}

#[tokio::test]
async fn begin_checkout_mutates_nothing_locally() {
    let h = harness();
    let user_id = Uuid::new_v4();
    let address_id = h.store.add_address(user_id);
    let product_id = h.store.add_product("Wireless Earbuds", 400, 7);
    h.store.set_cart_line(user_id, product_id, 3);

    for _ in 0..3 {
        h.service
            .begin_checkout(user_id, address_id, "pm_card")
            .await
            .unwrap();
    }

    // Three abandoned intents at the gateway, zero local changes.
    assert_eq!(h.gateway.intent_count(), 3);
    assert_eq!(h.store.stock_of(product_id), Some(7));
    assert_eq!(h.store.cart_len(user_id), 1);
    assert_eq!(h.store.order_count(), 0);
}

#[tokio::test]
async fn insufficient_stock_fails_phase_one_and_requests_restock() {
    let h = harness();
    let user_id = Uuid::new_v4();
    let address_id = h.store.add_address(user_id);
    let product_id = h.store.add_product("Trail Runner Shoes", 550, 1);
    h.store.set_cart_line(user_id, product_id, 2);

    let err = h
        .service
        .begin_checkout(user_id, address_id, "pm_card")
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        CheckoutError::InsufficientStock { product_id: id } if id == product_id
    ));

    let restock = h
        .notifier
        .events()
        .into_iter()
        .any(|n| matches!(n, Notification::RestockRequested { product_id: id } if id == product_id));
    assert!(restock, "expected a restock notification");
}

#[tokio::test]
async fn replayed_completion_returns_the_same_order_once() {
    let h = harness();
    let user_id = Uuid::new_v4();
    let address_id = h.store.add_address(user_id);
    let product_id = h.store.add_product("Steel Water Bottle", 130, 10);
    h.store.set_cart_line(user_id, product_id, 4);

    let intent = h
        .service
        .begin_checkout(user_id, address_id, "pm_card")
        .await
        .unwrap();

    let first = h
        .service
        .complete_checkout(user_id, &intent.payment_reference, address_id)
        .await
        .unwrap();
    let second = h
        .service
        .complete_checkout(user_id, &intent.payment_reference, address_id)
        .await
        .unwrap();

    assert_eq!(first.order.id, second.order.id);
    assert_eq!(first.order.order_number, second.order.order_number);
    // Stock decremented once, one order, one confirmation.
    assert_eq!(h.store.stock_of(product_id), Some(6));
    assert_eq!(h.store.order_count(), 1);
    let confirmations = h
        .notifier
        .events()
        .iter()
        .filter(|n| matches!(n, Notification::OrderPlaced { .. }))
        .count();
    assert_eq!(confirmations, 1);
}

#[tokio::test]
async fn duplicate_reference_commit_yields_the_winners_order() {
    let h = harness();
    let user_id = Uuid::new_v4();
    let address_id = h.store.add_address(user_id);
    let product_id = h.store.add_product("Steel Water Bottle", 130, 5);

    // Two commits race past the pre-commit lookup with one payment
    // reference; the store itself must resolve the duplicate.
    let draft = |order_number: &str| OrderDraft {
        user_id,
        order_number: order_number.to_string(),
        payment_reference: "pi_000042".to_string(),
        delivery_address_id: address_id,
        total_amount: 260,
        lines: vec![OrderLineDraft {
            product_id,
            quantity: 2,
            price_at_purchase: 130,
        }],
    };

    h.store.set_cart_line(user_id, product_id, 2);
    let winner = match h.store.commit_order(draft("ORD-aaaaaaaa")).await.unwrap() {
        CommitOutcome::Created(placed) => placed,
        CommitOutcome::AlreadyPlaced(_) => panic!("first commit must create the order"),
    };

    h.store.set_cart_line(user_id, product_id, 2);
    let loser = match h.store.commit_order(draft("ORD-bbbbbbbb")).await.unwrap() {
        CommitOutcome::AlreadyPlaced(placed) => placed,
        CommitOutcome::Created(_) => panic!("second commit must observe the winner"),
    };

    assert_eq!(loser.order.id, winner.order.id);
    assert_eq!(loser.order.order_number, winner.order.order_number);
    // The losing commit changed nothing: one decrement, one order.
    assert_eq!(h.store.stock_of(product_id), Some(3));
    assert_eq!(h.store.order_count(), 1);
}

#[tokio::test]
async fn last_unit_goes_to_exactly_one_buyer() {
    let h = harness();
    let product_id = h.store.add_product("Limited Print", 900, 1);

    let buyer_a = Uuid::new_v4();
    let address_a = h.store.add_address(buyer_a);
    h.store.set_cart_line(buyer_a, product_id, 1);

    let buyer_b = Uuid::new_v4();
    let address_b = h.store.add_address(buyer_b);
    h.store.set_cart_line(buyer_b, product_id, 1);

    let intent_a = h
        .service
        .begin_checkout(buyer_a, address_a, "pm_card")
        .await
        .unwrap();
    let intent_b = h
        .service
        .begin_checkout(buyer_b, address_b, "pm_card")
        .await
        .unwrap();
    assert_ne!(intent_a.payment_reference, intent_b.payment_reference);

    let (result_a, result_b) = tokio::join!(
        h.service
            .complete_checkout(buyer_a, &intent_a.payment_reference, address_a),
        h.service
            .complete_checkout(buyer_b, &intent_b.payment_reference, address_b),
    );

    let wins = [&result_a, &result_b]
        .iter()
        .filter(|r| r.is_ok())
        .count();
    assert_eq!(wins, 1, "exactly one buyer should get the last unit");

    let loser = if result_a.is_err() { result_a } else { result_b };
    assert!(matches!(loser.unwrap_err(), CheckoutError::Conflict));

    assert_eq!(h.store.stock_of(product_id), Some(0));
    assert_eq!(h.store.order_count(), 1);
}

#[tokio::test]
async fn requires_action_intent_is_confirmed_then_committed() {
    let h = harness();
    h.gateway
        .set_initial_status(PaymentIntentStatus::RequiresAction);

    let user_id = Uuid::new_v4();
    let address_id = h.store.add_address(user_id);
    let product_id = h.store.add_product("Canvas Backpack", 250, 5);
    h.store.set_cart_line(user_id, product_id, 1);

    let intent = h
        .service
        .begin_checkout(user_id, address_id, "pm_card")
        .await
        .unwrap();

    let placed = h
        .service
        .complete_checkout(user_id, &intent.payment_reference, address_id)
        .await
        .unwrap();
    assert_eq!(placed.order.total_amount, 250);
    assert_eq!(h.store.stock_of(product_id), Some(4));
}

#[tokio::test]
async fn failed_confirmation_leaves_state_untouched() {
    let h = harness();
    let user_id = Uuid::new_v4();
    let address_id = h.store.add_address(user_id);
    let product_id = h.store.add_product("Wireless Earbuds", 400, 5);
    h.store.set_cart_line(user_id, product_id, 1);

    let intent = h
        .service
        .begin_checkout(user_id, address_id, "pm_card")
        .await
        .unwrap();
    h.gateway.set_fail_on_confirm(true);

    let err = h
        .service
        .complete_checkout(user_id, &intent.payment_reference, address_id)
        .await
        .unwrap_err();
    assert!(matches!(err, CheckoutError::PaymentFailed(_)));

    assert_eq!(h.store.stock_of(product_id), Some(5));
    assert_eq!(h.store.cart_len(user_id), 1);
    assert_eq!(h.store.order_count(), 0);
}

#[tokio::test]
async fn non_succeeded_terminal_status_is_rejected() {
    let h = harness();
    let user_id = Uuid::new_v4();
    let address_id = h.store.add_address(user_id);
    let product_id = h.store.add_product("Steel Water Bottle", 130, 5);
    h.store.set_cart_line(user_id, product_id, 1);

    let intent = h
        .service
        .begin_checkout(user_id, address_id, "pm_card")
        .await
        .unwrap();
    h.gateway
        .force_status(&intent.payment_reference, PaymentIntentStatus::Failed);

    let err = h
        .service
        .complete_checkout(user_id, &intent.payment_reference, address_id)
        .await
        .unwrap_err();
    assert!(matches!(err, CheckoutError::PaymentNotSuccessful));
    assert_eq!(h.store.order_count(), 0);
}

#[tokio::test]
async fn completion_bills_the_cart_as_of_commit_time() {
    let h = harness();
    let user_id = Uuid::new_v4();
    let address_id = h.store.add_address(user_id);
    let product_id = h.store.add_product("Canvas Backpack", 250, 10);
    h.store.set_cart_line(user_id, product_id, 1);

    let intent = h
        .service
        .begin_checkout(user_id, address_id, "pm_card")
        .await
        .unwrap();
    assert_eq!(intent.total_amount, 250);

    // Cart changes between the two phases; the order reflects the cart at
    // commit time.
    h.store.set_cart_line(user_id, product_id, 3);

    let placed = h
        .service
        .complete_checkout(user_id, &intent.payment_reference, address_id)
        .await
        .unwrap();
    assert_eq!(placed.order.total_amount, 750);
    assert_eq!(h.store.stock_of(product_id), Some(7));
}
