use std::sync::Arc;

use axum_storefront_api::{
    checkout::{CheckoutService, InMemoryGateway, LogNotifier, PgCheckoutStore},
    db::{create_orm_conn, create_pool},
    dto::{
        cart::AddToCartRequest,
        orders::{CheckoutIntentRequest, CompleteCheckoutRequest},
    },
    entity::{
        addresses::ActiveModel as AddressActive,
        order_history::{Column as HistoryCol, Entity as OrderHistory},
        products::{ActiveModel as ProductActive, Entity as Products},
        users::ActiveModel as UserActive,
    },
    middleware::auth::AuthUser,
    models::OrderStatus,
    routes::admin::UpdateOrderStatusRequest,
    services::{admin_service, cart_service, order_service},
    state::AppState,
};
use sea_orm::ActiveValue::NotSet;
use sea_orm::{ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, Set, Statement};
use uuid::Uuid;

// Integration flow: cart -> intent -> complete (twice) -> admin status update.
#[tokio::test]
async fn two_phase_checkout_flow_against_postgres() -> anyhow::Result<()> {
    // Allow skipping when no DB is configured in the environment.
    let database_url = match std::env::var("TEST_DATABASE_URL")
        .or_else(|_| std::env::var("DATABASE_URL"))
    {
        Ok(url) => url,
        Err(_) => {
            eprintln!(
                "Skipping test: set TEST_DATABASE_URL or DATABASE_URL to run integration flow tests."
            );
            return Ok(());
        }
    };

    let state = setup_state(&database_url).await?;

    let user_id = create_user(&state, "user", "user@example.com").await?;
    let admin_id = create_user(&state, "admin", "admin@example.com").await?;

    let address = AddressActive {
        id: Set(Uuid::new_v4()),
        user_id: Set(user_id),
        line1: Set("42 Market Street".into()),
        city: Set("Pune".into()),
        state: Set("MH".into()),
        pincode: Set("411001".into()),
        country: Set("India".into()),
        mobile: Set("9999999999".into()),
        created_at: NotSet,
    }
    .insert(&state.orm)
    .await?;

    let product = ProductActive {
        id: Set(Uuid::new_v4()),
        name: Set("Test Widget".into()),
        description: Set(Some("A product for testing".into())),
        brand: Set("Testco".into()),
        price: Set(1000),
        stock: Set(10),
        rating: Set(0.0),
        num_reviews: Set(0),
        created_at: NotSet,
    }
    .insert(&state.orm)
    .await?;

    let auth_user = AuthUser {
        user_id,
        role: "user".into(),
    };
    let auth_admin = AuthUser {
        user_id: admin_id,
        role: "admin".into(),
    };

    cart_service::add_to_cart(
        &state.pool,
        &auth_user,
        AddToCartRequest {
            product_id: product.id,
            quantity: 2,
        },
    )
    .await?;

    // Phase 1: nothing is committed locally.
    let intent = order_service::begin_checkout(
        &state,
        &auth_user,
        CheckoutIntentRequest {
            address_id: address.id,
            payment_method: "pm_card".into(),
        },
    )
    .await?
    .data
    .unwrap();
    assert_eq!(intent.total_amount, 2000);

    let untouched = Products::find_by_id(product.id)
        .one(&state.orm)
        .await?
        .unwrap();
    assert_eq!(untouched.stock, 10);

    // Phase 2: commit.
    let placed = order_service::complete_checkout(
        &state,
        &auth_user,
        CompleteCheckoutRequest {
            payment_reference: intent.payment_reference.clone(),
            address_id: address.id,
        },
    )
    .await?
    .data
    .unwrap();
    assert_eq!(placed.order.total_amount, 2000);
    assert_eq!(placed.items.len(), 1);

    // Replay with the same reference returns the same order.
    let replayed = order_service::complete_checkout(
        &state,
        &auth_user,
        CompleteCheckoutRequest {
            payment_reference: intent.payment_reference.clone(),
            address_id: address.id,
        },
    )
    .await?
    .data
    .unwrap();
    assert_eq!(replayed.order.id, placed.order.id);

    // Stock decremented exactly once; cart cleared; history appended.
    let after = Products::find_by_id(product.id)
        .one(&state.orm)
        .await?
        .unwrap();
    assert_eq!(after.stock, 8);

    let cart_count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM cart_items WHERE user_id = $1")
        .bind(user_id)
        .fetch_one(&state.pool)
        .await?;
    assert_eq!(cart_count.0, 0);

    let history = OrderHistory::find()
        .filter(HistoryCol::UserId.eq(user_id))
        .all(&state.orm)
        .await?;
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].order_id, placed.order.id);

    // Admin moves the order forward; a backwards move is refused.
    let updated = admin_service::update_order_status(
        &state,
        &auth_admin,
        placed.order.id,
        UpdateOrderStatusRequest {
            status: OrderStatus::Shipped,
        },
    )
    .await?;
    assert_eq!(updated.data.unwrap().order_status, OrderStatus::Shipped);

    let backwards = admin_service::update_order_status(
        &state,
        &auth_admin,
        placed.order.id,
        UpdateOrderStatusRequest {
            status: OrderStatus::Pending,
        },
    )
    .await;
    assert!(backwards.is_err(), "status transitions only move forward");

    Ok(())
}

async fn setup_state(database_url: &str) -> anyhow::Result<AppState> {
    let pool = create_pool(database_url).await?;
    sqlx::migrate!("./migrations").run(&pool).await?;
    let orm = create_orm_conn(database_url).await?;

    // Clean tables between runs
    let backend = orm.get_database_backend();
    orm.execute(Statement::from_string(
        backend,
        "TRUNCATE TABLE order_history, order_items, orders, cart_items, reviews, audit_logs, addresses, products, users RESTART IDENTITY CASCADE",
    ))
    .await?;

    let checkout = Arc::new(CheckoutService::new(
        Arc::new(PgCheckoutStore::new(orm.clone())),
        Arc::new(InMemoryGateway::new()),
        Arc::new(LogNotifier),
        "inr",
    ));

    Ok(AppState {
        pool,
        orm,
        checkout,
    })
}

async fn create_user(state: &AppState, role: &str, email: &str) -> anyhow::Result<Uuid> {
    let user = UserActive {
        id: Set(Uuid::new_v4()),
        email: Set(email.to_string()),
        password_hash: Set("dummy".into()),
        role: Set(role.into()),
        created_at: NotSet,
    }
    .insert(&state.orm)
    .await?;

    Ok(user.id)
}
