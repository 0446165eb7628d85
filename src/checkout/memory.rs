//! In-memory `CheckoutStore`. A single lock around the whole state makes
//! the four-effect commit atomic, which is what the tests lean on.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use crate::models::{Address, Order, OrderItem, OrderStatus, PaymentStatus};

use super::{
    CartLine, CheckoutError, CheckoutStore, CommitOutcome, OrderDraft, PlacedOrder,
};

#[derive(Debug, Clone)]
struct ProductStub {
    name: String,
    price: i64,
    stock: i32,
}

#[derive(Debug, Default)]
struct MemoryState {
    addresses: HashMap<Uuid, Address>,
    products: HashMap<Uuid, ProductStub>,
    carts: HashMap<Uuid, Vec<(Uuid, i32)>>,
    orders_by_reference: HashMap<String, PlacedOrder>,
    history: HashMap<Uuid, Vec<Uuid>>,
}

#[derive(Debug, Clone, Default)]
pub struct MemoryCheckoutStore {
    state: Arc<RwLock<MemoryState>>,
}

impl MemoryCheckoutStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_address(&self, user_id: Uuid) -> Uuid {
        let id = Uuid::new_v4();
        let address = Address {
            id,
            user_id,
            line1: "42 Market Street".into(),
            city: "Pune".into(),
            state: "MH".into(),
            pincode: "411001".into(),
            country: "India".into(),
            mobile: "9999999999".into(),
            created_at: Utc::now(),
        };
        self.state.write().unwrap().addresses.insert(id, address);
        id
    }

    pub fn add_product(&self, name: &str, price: i64, stock: i32) -> Uuid {
        let id = Uuid::new_v4();
        self.state.write().unwrap().products.insert(
            id,
            ProductStub {
                name: name.to_string(),
                price,
                stock,
            },
        );
        id
    }

    pub fn set_cart_line(&self, user_id: Uuid, product_id: Uuid, quantity: i32) {
        let mut state = self.state.write().unwrap();
        let cart = state.carts.entry(user_id).or_default();
        match cart.iter_mut().find(|(id, _)| *id == product_id) {
            Some(entry) => entry.1 = quantity,
            None => cart.push((product_id, quantity)),
        }
    }

    pub fn stock_of(&self, product_id: Uuid) -> Option<i32> {
        self.state
            .read()
            .unwrap()
            .products
            .get(&product_id)
            .map(|p| p.stock)
    }

    pub fn cart_len(&self, user_id: Uuid) -> usize {
        self.state
            .read()
            .unwrap()
            .carts
            .get(&user_id)
            .map_or(0, Vec::len)
    }

    pub fn order_count(&self) -> usize {
        self.state.read().unwrap().orders_by_reference.len()
    }

    pub fn history_of(&self, user_id: Uuid) -> Vec<Uuid> {
        self.state
            .read()
            .unwrap()
            .history
            .get(&user_id)
            .cloned()
            .unwrap_or_default()
    }
}

#[async_trait]
impl CheckoutStore for MemoryCheckoutStore {
    async fn find_owned_address(
        &self,
        address_id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<Address>, CheckoutError> {
        let state = self.state.read().unwrap();
        Ok(state
            .addresses
            .get(&address_id)
            .filter(|address| address.user_id == user_id)
            .cloned())
    }

    async fn cart_lines(&self, user_id: Uuid) -> Result<Vec<CartLine>, CheckoutError> {
        let state = self.state.read().unwrap();
        let cart = match state.carts.get(&user_id) {
            Some(cart) => cart,
            None => return Ok(Vec::new()),
        };

        let mut lines = Vec::with_capacity(cart.len());
        for (product_id, quantity) in cart {
            let product = state
                .products
                .get(product_id)
                .ok_or(CheckoutError::NotFound)?;
            lines.push(CartLine {
                product_id: *product_id,
                product_name: product.name.clone(),
                quantity: *quantity,
                unit_price: product.price,
                stock: product.stock,
            });
        }
        Ok(lines)
    }

    async fn order_by_payment_reference(
        &self,
        reference: &str,
    ) -> Result<Option<PlacedOrder>, CheckoutError> {
        let state = self.state.read().unwrap();
        Ok(state.orders_by_reference.get(reference).cloned())
    }

    async fn commit_order(&self, draft: OrderDraft) -> Result<CommitOutcome, CheckoutError> {
        let mut state = self.state.write().unwrap();

        if let Some(existing) = state.orders_by_reference.get(&draft.payment_reference) {
            return Ok(CommitOutcome::AlreadyPlaced(existing.clone()));
        }

        // Validate every line before mutating anything; the lock makes the
        // whole block atomic.
        for line in &draft.lines {
            let product = state
                .products
                .get(&line.product_id)
                .ok_or(CheckoutError::NotFound)?;
            if product.stock < line.quantity {
                return Err(CheckoutError::Conflict);
            }
        }

        let now = Utc::now();
        let order_id = Uuid::new_v4();
        let items: Vec<OrderItem> = draft
            .lines
            .iter()
            .map(|line| OrderItem {
                id: Uuid::new_v4(),
                order_id,
                product_id: line.product_id,
                quantity: line.quantity,
                price_at_purchase: line.price_at_purchase,
                created_at: now,
            })
            .collect();

        for line in &draft.lines {
            if let Some(product) = state.products.get_mut(&line.product_id) {
                product.stock -= line.quantity;
            }
        }

        let placed = PlacedOrder {
            order: Order {
                id: order_id,
                user_id: draft.user_id,
                order_number: draft.order_number.clone(),
                payment_reference: draft.payment_reference.clone(),
                payment_status: PaymentStatus::Completed,
                order_status: OrderStatus::Processing,
                delivery_address_id: draft.delivery_address_id,
                total_amount: draft.total_amount,
                created_at: now,
                updated_at: now,
            },
            items,
        };

        state.carts.remove(&draft.user_id);
        state.history.entry(draft.user_id).or_default().push(order_id);
        state
            .orders_by_reference
            .insert(draft.payment_reference.clone(), placed.clone());

        Ok(CommitOutcome::Created(placed))
    }
}
