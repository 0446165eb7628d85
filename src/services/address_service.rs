use uuid::Uuid;

use crate::{
    audit::log_audit,
    db::DbPool,
    dto::addresses::{AddressList, CreateAddressRequest, UpdateAddressRequest},
    error::{AppError, AppResult},
    middleware::auth::AuthUser,
    models::Address,
    response::{ApiResponse, Meta},
};

pub async fn list_addresses(pool: &DbPool, user: &AuthUser) -> AppResult<ApiResponse<AddressList>> {
    let items = sqlx::query_as::<_, Address>(
        "SELECT * FROM addresses WHERE user_id = $1 ORDER BY created_at DESC",
    )
    .bind(user.user_id)
    .fetch_all(pool)
    .await?;

    Ok(ApiResponse::success(
        "OK",
        AddressList { items },
        Some(Meta::empty()),
    ))
}

pub async fn create_address(
    pool: &DbPool,
    user: &AuthUser,
    payload: CreateAddressRequest,
) -> AppResult<ApiResponse<Address>> {
    let address = sqlx::query_as::<_, Address>(
        r#"
        INSERT INTO addresses (id, user_id, line1, city, state, pincode, country, mobile)
        VALUES ($1, $2, $3, $4, $5, $6, COALESCE($7, 'India'), $8)
        RETURNING *
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(user.user_id)
    .bind(payload.line1)
    .bind(payload.city)
    .bind(payload.state)
    .bind(payload.pincode)
    .bind(payload.country)
    .bind(payload.mobile)
    .fetch_one(pool)
    .await?;

    if let Err(err) = log_audit(
        pool,
        Some(user.user_id),
        "address_create",
        Some("addresses"),
        Some(serde_json::json!({ "address_id": address.id })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(ApiResponse::success("Address created", address, None))
}

pub async fn update_address(
    pool: &DbPool,
    user: &AuthUser,
    id: Uuid,
    payload: UpdateAddressRequest,
) -> AppResult<ApiResponse<Address>> {
    let address = sqlx::query_as::<_, Address>(
        r#"
        UPDATE addresses
        SET line1 = COALESCE($3, line1),
            city = COALESCE($4, city),
            state = COALESCE($5, state),
            pincode = COALESCE($6, pincode),
            country = COALESCE($7, country),
            mobile = COALESCE($8, mobile)
        WHERE id = $1 AND user_id = $2
        RETURNING *
        "#,
    )
    .bind(id)
    .bind(user.user_id)
    .bind(payload.line1)
    .bind(payload.city)
    .bind(payload.state)
    .bind(payload.pincode)
    .bind(payload.country)
    .bind(payload.mobile)
    .fetch_optional(pool)
    .await?;

    let address = match address {
        Some(a) => a,
        None => return Err(AppError::NotFound),
    };

    if let Err(err) = log_audit(
        pool,
        Some(user.user_id),
        "address_update",
        Some("addresses"),
        Some(serde_json::json!({ "address_id": address.id })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(ApiResponse::success("Address updated", address, None))
}

pub async fn delete_address(
    pool: &DbPool,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<serde_json::Value>> {
    let result = sqlx::query("DELETE FROM addresses WHERE id = $1 AND user_id = $2")
        .bind(id)
        .bind(user.user_id)
        .execute(pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound);
    }

    if let Err(err) = log_audit(
        pool,
        Some(user.user_id),
        "address_delete",
        Some("addresses"),
        Some(serde_json::json!({ "address_id": id })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(ApiResponse::success(
        "Address deleted",
        serde_json::json!({}),
        Some(Meta::empty()),
    ))
}
