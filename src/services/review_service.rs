use chrono::Utc;
use sea_orm::ActiveValue::NotSet;
use sea_orm::sea_query::LockType;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseTransaction, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, QuerySelect, Set, SqlErr, TransactionTrait,
};
use uuid::Uuid;

use crate::dto::reviews::{CreateReviewRequest, ReviewList};
use crate::{
    audit::log_audit,
    entity::{
        products::{ActiveModel as ProductActive, Entity as Products},
        reviews::{
            ActiveModel as ReviewActive, Column as ReviewCol, Entity as Reviews,
            Model as ReviewModel,
        },
    },
    error::{AppError, AppResult},
    middleware::auth::AuthUser,
    models::Review,
    response::{ApiResponse, Meta},
    routes::params::Pagination,
};

pub async fn create_review(
    state: &crate::state::AppState,
    user: &AuthUser,
    payload: CreateReviewRequest,
) -> AppResult<ApiResponse<Review>> {
    if !(1..=5).contains(&payload.rating) {
        return Err(AppError::BadRequest("rating must be 1..=5".into()));
    }

    let txn = state.orm.begin().await?;

    let product = Products::find_by_id(payload.product_id)
        .lock(LockType::Update)
        .one(&txn)
        .await?;
    let product = match product {
        Some(p) => p,
        None => return Err(AppError::NotFound),
    };

    let review = ReviewActive {
        id: Set(Uuid::new_v4()),
        user_id: Set(user.user_id),
        product_id: Set(payload.product_id),
        rating: Set(payload.rating),
        comment: Set(payload.comment.unwrap_or_default()),
        created_at: NotSet,
    }
    .insert(&txn)
    .await;

    let review = match review {
        Ok(r) => r,
        Err(err) => {
            if matches!(err.sql_err(), Some(SqlErr::UniqueConstraintViolation(_))) {
                return Err(AppError::BadRequest(
                    "You have already reviewed this product".into(),
                ));
            }
            return Err(err.into());
        }
    };

    let (rating, num_reviews) = rating_aggregate(&txn, payload.product_id).await?;
    let mut active: ProductActive = product.into();
    active.rating = Set(rating);
    active.num_reviews = Set(num_reviews);
    active.update(&txn).await?;

    txn.commit().await?;

    if let Err(err) = log_audit(
        &state.pool,
        Some(user.user_id),
        "review_create",
        Some("reviews"),
        Some(serde_json::json!({ "review_id": review.id, "product_id": review.product_id })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(ApiResponse::success(
        "Review created",
        review_from_entity(review),
        Some(Meta::empty()),
    ))
}

pub async fn list_reviews_for_product(
    state: &crate::state::AppState,
    product_id: Uuid,
    pagination: Pagination,
) -> AppResult<ApiResponse<ReviewList>> {
    let (page, limit, offset) = pagination.normalize();

    let finder = Reviews::find()
        .filter(ReviewCol::ProductId.eq(product_id))
        .order_by_desc(ReviewCol::CreatedAt);

    let total = finder.clone().count(&state.orm).await? as i64;

    let items = finder
        .limit(limit as u64)
        .offset(offset as u64)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(review_from_entity)
        .collect();

    let meta = Meta::new(page, limit, total);
    Ok(ApiResponse::success(
        "Reviews",
        ReviewList { items },
        Some(meta),
    ))
}

pub async fn delete_review(
    state: &crate::state::AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<serde_json::Value>> {
    let txn = state.orm.begin().await?;

    let review = Reviews::find_by_id(id).one(&txn).await?;
    let review = match review {
        Some(r) if r.user_id == user.user_id => r,
        Some(_) => return Err(AppError::Forbidden),
        None => return Err(AppError::NotFound),
    };

    let product_id = review.product_id;
    Reviews::delete_by_id(review.id).exec(&txn).await?;

    let product = Products::find_by_id(product_id)
        .lock(LockType::Update)
        .one(&txn)
        .await?;
    if let Some(product) = product {
        let (rating, num_reviews) = rating_aggregate(&txn, product_id).await?;
        let mut active: ProductActive = product.into();
        active.rating = Set(rating);
        active.num_reviews = Set(num_reviews);
        active.update(&txn).await?;
    }

    txn.commit().await?;

    if let Err(err) = log_audit(
        &state.pool,
        Some(user.user_id),
        "review_delete",
        Some("reviews"),
        Some(serde_json::json!({ "review_id": id })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(ApiResponse::success(
        "Review deleted",
        serde_json::json!({}),
        Some(Meta::empty()),
    ))
}

async fn rating_aggregate(
    txn: &DatabaseTransaction,
    product_id: Uuid,
) -> Result<(f64, i32), AppError> {
    let ratings: Vec<i32> = Reviews::find()
        .filter(ReviewCol::ProductId.eq(product_id))
        .all(txn)
        .await?
        .into_iter()
        .map(|r| r.rating)
        .collect();

    let num_reviews = ratings.len() as i32;
    let rating = if num_reviews == 0 {
        0.0
    } else {
        f64::from(ratings.iter().sum::<i32>()) / f64::from(num_reviews)
    };
    Ok((rating, num_reviews))
}

fn review_from_entity(model: ReviewModel) -> Review {
    Review {
        id: model.id,
        user_id: model.user_id,
        product_id: model.product_id,
        rating: model.rating,
        comment: model.comment,
        created_at: model.created_at.with_timezone(&Utc),
    }
}
