//! Postgres-backed `CheckoutStore`.
//!
//! The commit runs in one transaction. Stock is decremented with a
//! conditional UPDATE (`stock >= quantity` in the WHERE clause), so the
//! authoritative stock check and the decrement are a single statement.
//! The unique index on `orders.payment_reference` resolves duplicate
//! commits: the loser re-reads the winner's order instead of erroring.

use anyhow::anyhow;
use chrono::Utc;
use sea_orm::ActiveValue::NotSet;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, DbErr, EntityTrait, FromQueryResult,
    JoinType, QueryFilter, QuerySelect, RelationTrait, Set, SqlErr, TransactionTrait,
};
use async_trait::async_trait;
use uuid::Uuid;

use crate::entity::{
    addresses::{Column as AddressCol, Entity as Addresses, Model as AddressModel},
    cart_items::{self, Column as CartCol, Entity as CartItems},
    order_history::ActiveModel as HistoryActive,
    order_items::{
        ActiveModel as OrderItemActive, Column as OrderItemCol, Entity as OrderItems,
        Model as OrderItemModel,
    },
    orders::{ActiveModel as OrderActive, Column as OrderCol, Entity as Orders, Model as OrderModel},
    products::{Column as ProdCol, Entity as Products},
};
use crate::models::{Address, Order, OrderItem, OrderStatus, PaymentStatus};

use super::{
    CartLine, CheckoutError, CheckoutStore, CommitOutcome, OrderDraft, PlacedOrder,
};

pub struct PgCheckoutStore {
    orm: DatabaseConnection,
}

impl PgCheckoutStore {
    pub fn new(orm: DatabaseConnection) -> Self {
        Self { orm }
    }

    async fn load_placed_order(
        &self,
        reference: &str,
    ) -> Result<Option<PlacedOrder>, CheckoutError> {
        let order = Orders::find()
            .filter(OrderCol::PaymentReference.eq(reference))
            .one(&self.orm)
            .await
            .map_err(storage)?;
        let order = match order {
            Some(o) => o,
            None => return Ok(None),
        };

        let items = OrderItems::find()
            .filter(OrderItemCol::OrderId.eq(order.id))
            .all(&self.orm)
            .await
            .map_err(storage)?
            .into_iter()
            .map(order_item_from_entity)
            .collect();

        Ok(Some(PlacedOrder {
            order: order_from_entity(order),
            items,
        }))
    }
}

#[derive(Debug, FromQueryResult)]
struct CartProductRow {
    product_id: Uuid,
    product_name: String,
    quantity: i32,
    price: i64,
    stock: i32,
}

#[async_trait]
impl CheckoutStore for PgCheckoutStore {
    async fn find_owned_address(
        &self,
        address_id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<Address>, CheckoutError> {
        let address = Addresses::find()
            .filter(AddressCol::Id.eq(address_id))
            .filter(AddressCol::UserId.eq(user_id))
            .one(&self.orm)
            .await
            .map_err(storage)?;
        Ok(address.map(address_from_entity))
    }

    async fn cart_lines(&self, user_id: Uuid) -> Result<Vec<CartLine>, CheckoutError> {
        let rows = CartItems::find()
            .select_only()
            .column_as(CartCol::ProductId, "product_id")
            .column_as(CartCol::Quantity, "quantity")
            .join(JoinType::InnerJoin, cart_items::Relation::Products.def())
            .column_as(ProdCol::Name, "product_name")
            .column_as(ProdCol::Price, "price")
            .column_as(ProdCol::Stock, "stock")
            .filter(CartCol::UserId.eq(user_id))
            .into_model::<CartProductRow>()
            .all(&self.orm)
            .await
            .map_err(storage)?;

        Ok(rows
            .into_iter()
            .map(|row| CartLine {
                product_id: row.product_id,
                product_name: row.product_name,
                quantity: row.quantity,
                unit_price: row.price,
                stock: row.stock,
            })
            .collect())
    }

    async fn order_by_payment_reference(
        &self,
        reference: &str,
    ) -> Result<Option<PlacedOrder>, CheckoutError> {
        self.load_placed_order(reference).await
    }

    async fn commit_order(&self, draft: OrderDraft) -> Result<CommitOutcome, CheckoutError> {
        let txn = self.orm.begin().await.map_err(commit_failed)?;

        let order = OrderActive {
            id: Set(Uuid::new_v4()),
            user_id: Set(draft.user_id),
            order_number: Set(draft.order_number.clone()),
            payment_reference: Set(draft.payment_reference.clone()),
            payment_status: Set(PaymentStatus::Completed),
            order_status: Set(OrderStatus::Processing),
            delivery_address_id: Set(draft.delivery_address_id),
            total_amount: Set(draft.total_amount),
            created_at: NotSet,
            updated_at: NotSet,
        };

        let order = match order.insert(&txn).await {
            Ok(order) => order,
            Err(err) => {
                let _ = txn.rollback().await;
                if is_unique_violation(&err) {
                    // Lost the race on payment_reference; the winner's
                    // order is the result.
                    let existing = self
                        .load_placed_order(&draft.payment_reference)
                        .await?
                        .ok_or_else(|| {
                            CheckoutError::CommitFailed(anyhow!(
                                "duplicate payment reference without a stored order"
                            ))
                        })?;
                    return Ok(CommitOutcome::AlreadyPlaced(existing));
                }
                return Err(commit_failed(err));
            }
        };

        let mut items = Vec::with_capacity(draft.lines.len());
        for line in &draft.lines {
            let item = OrderItemActive {
                id: Set(Uuid::new_v4()),
                order_id: Set(order.id),
                product_id: Set(line.product_id),
                quantity: Set(line.quantity),
                price_at_purchase: Set(line.price_at_purchase),
                created_at: NotSet,
            }
            .insert(&txn)
            .await
            .map_err(commit_failed)?;
            items.push(order_item_from_entity(item));

            let updated = Products::update_many()
                .col_expr(ProdCol::Stock, Expr::col(ProdCol::Stock).sub(line.quantity))
                .filter(ProdCol::Id.eq(line.product_id))
                .filter(ProdCol::Stock.gte(line.quantity))
                .exec(&txn)
                .await
                .map_err(commit_failed)?;
            if updated.rows_affected != 1 {
                let _ = txn.rollback().await;
                return Err(CheckoutError::Conflict);
            }
        }

        CartItems::delete_many()
            .filter(CartCol::UserId.eq(draft.user_id))
            .exec(&txn)
            .await
            .map_err(commit_failed)?;

        HistoryActive {
            id: Set(Uuid::new_v4()),
            user_id: Set(draft.user_id),
            order_id: Set(order.id),
            created_at: NotSet,
        }
        .insert(&txn)
        .await
        .map_err(commit_failed)?;

        txn.commit().await.map_err(commit_failed)?;

        Ok(CommitOutcome::Created(PlacedOrder {
            order: order_from_entity(order),
            items,
        }))
    }
}

fn is_unique_violation(err: &DbErr) -> bool {
    matches!(err.sql_err(), Some(SqlErr::UniqueConstraintViolation(_)))
}

fn storage(err: DbErr) -> CheckoutError {
    CheckoutError::Storage(err.into())
}

fn commit_failed(err: DbErr) -> CheckoutError {
    CheckoutError::CommitFailed(err.into())
}

fn address_from_entity(model: AddressModel) -> Address {
    Address {
        id: model.id,
        user_id: model.user_id,
        line1: model.line1,
        city: model.city,
        state: model.state,
        pincode: model.pincode,
        country: model.country,
        mobile: model.mobile,
        created_at: model.created_at.with_timezone(&Utc),
    }
}

pub(crate) fn order_from_entity(model: OrderModel) -> Order {
    Order {
        id: model.id,
        user_id: model.user_id,
        order_number: model.order_number,
        payment_reference: model.payment_reference,
        payment_status: model.payment_status,
        order_status: model.order_status,
        delivery_address_id: model.delivery_address_id,
        total_amount: model.total_amount,
        created_at: model.created_at.with_timezone(&Utc),
        updated_at: model.updated_at.with_timezone(&Utc),
    }
}

pub(crate) fn order_item_from_entity(model: OrderItemModel) -> OrderItem {
    OrderItem {
        id: model.id,
        order_id: model.order_id,
        product_id: model.product_id,
        quantity: model.quantity,
        price_at_purchase: model.price_at_purchase,
        created_at: model.created_at.with_timezone(&Utc),
    }
}
