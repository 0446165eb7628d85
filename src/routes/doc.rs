use utoipa::{
    Modify, OpenApi,
    openapi::{
        self,
        OpenApi as OpenApiSpec,
        security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    },
};
use utoipa_scalar::{Scalar, Servable};

use crate::{
    checkout::{CheckoutIntent, PlacedOrder},
    dto::{
        addresses::{AddressList, CreateAddressRequest, UpdateAddressRequest},
        auth::{LoginRequest, LoginResponse, RegisterRequest},
        cart::{AddToCartRequest, CartItemDto, CartList},
        orders::{CheckoutIntentRequest, CompleteCheckoutRequest, OrderList},
        products::{CreateProductRequest, ProductList, UpdateProductRequest},
        reviews::{CreateReviewRequest, ReviewList},
    },
    models::{Address, CartItem, Order, OrderItem, Product, Review, User},
    response::{ApiResponse, Meta},
    routes::{
        addresses, admin, auth, cart, health, orders, params, products as product_routes, reviews,
    },
};

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer_auth",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        health::health_check,
        auth::login,
        auth::register,
        product_routes::list_products,
        product_routes::create_product,
        product_routes::get_product,
        product_routes::update_product,
        product_routes::delete_product,
        cart::cart_list,
        cart::add_to_cart,
        cart::remove_from_cart,
        addresses::list_addresses,
        addresses::create_address,
        addresses::update_address,
        addresses::delete_address,
        orders::list_orders,
        orders::checkout_intent,
        orders::checkout_complete,
        orders::get_order,
        reviews::create_review,
        reviews::list_reviews_for_product,
        reviews::delete_review,
        admin::update_order_status
    ),
    components(
        schemas(
            User,
            Product,
            Address,
            CartItem,
            Order,
            OrderItem,
            Review,
            RegisterRequest,
            LoginRequest,
            LoginResponse,
            CreateProductRequest,
            UpdateProductRequest,
            ProductList,
            AddToCartRequest,
            CartItemDto,
            CartList,
            CreateAddressRequest,
            UpdateAddressRequest,
            AddressList,
            CheckoutIntentRequest,
            CompleteCheckoutRequest,
            CheckoutIntent,
            PlacedOrder,
            OrderList,
            CreateReviewRequest,
            ReviewList,
            admin::UpdateOrderStatusRequest,
            params::Pagination,
            params::ProductQuery,
            params::OrderListQuery,
            Meta,
            ApiResponse<Product>,
            ApiResponse<ProductList>,
            ApiResponse<CheckoutIntent>,
            ApiResponse<PlacedOrder>,
            ApiResponse<OrderList>
        )
    ),
    security(
        ("bearer_auth" = [])
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Health", description = "Health check endpoint"),
        (name = "Auth", description = "Authentication endpoints"),
        (name = "Products", description = "Product catalog endpoints"),
        (name = "Cart", description = "Cart endpoints"),
        (name = "Addresses", description = "Delivery address endpoints"),
        (name = "Orders", description = "Checkout and order endpoints"),
        (name = "Reviews", description = "Product review endpoints"),
        (name = "Admin", description = "Admin endpoints"),
    )
)]
pub struct ApiDoc;

pub fn scalar_docs() -> Scalar<OpenApiSpec> {
    Scalar::with_url("/docs", ApiDoc::openapi())
}
