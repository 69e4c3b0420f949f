use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use axum_extra::extract::CookieJar;
use cookie::{Cookie, SameSite};
use tower_governor::{
    governor::GovernorConfigBuilder,
    key_extractor::GlobalKeyExtractor,
    GovernorLayer,
};
use tracing::{debug, info, warn};

use crate::auth::{hash_password, verify_password};
use crate::model::{MAX_SCORE, MIN_QUANTITY, MIN_SCORE};
use crate::store::{
    DateRange, DeliveryUpdate, NewDelivery, NewProduct, NewUser, ProductFilter, ProductUpdate,
    UserUpdate,
};

use super::auth::{authorize, ensure_self, resolve_actor, Session, SESSION_COOKIE};
use super::error::ApiError;
use super::responses::{
    parse_date, parse_object_id, CreateDeliveryRequest, CreateProductRequest, DeliveryListQuery,
    DeliveryResponse, HealthResponse, LoginRequest, MessageResponse, ProductListQuery,
    ProductResponse, SignupRequest, UpdateDeliveryRequest, UpdateProductRequest,
    UpdateUserRequest, UserResponse,
};
use super::state::AppState;

pub fn router(state: AppState) -> Router {
    let governor_conf = Arc::new(
        GovernorConfigBuilder::default()
            .per_second(20)
            .burst_size(50)
            .key_extractor(GlobalKeyExtractor)
            .finish()
            .expect("default governor config is valid"),
    );

    Router::new()
        .route("/health", get(health))
        .route("/user/signup", post(signup))
        .route("/user/login", post(login))
        .route(
            "/user/{id}",
            get(get_user).put(update_user).delete(delete_user),
        )
        .route("/product", get(list_products).post(create_product))
        .route("/product/categories/{id}", get(user_categories))
        .route(
            "/product/{id}",
            get(get_product).put(update_product).delete(delete_product),
        )
        .route("/delivery", get(list_deliveries).post(create_delivery))
        .route("/delivery/{id}", get(get_delivery).put(update_delivery))
        .layer(GovernorLayer::new(governor_conf))
        .layer(tower_http::request_id::SetRequestIdLayer::new(
            axum::http::header::HeaderName::from_static("x-request-id"),
            tower_http::request_id::MakeRequestUuid::default(),
        ))
        .layer(tower_http::request_id::PropagateRequestIdLayer::new(
            axum::http::header::HeaderName::from_static("x-request-id"),
        ))
        .layer(tower_http::trace::TraceLayer::new_for_http())
        .with_state(state)
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok" })
}

async fn signup(
    State(state): State<AppState>,
    payload: Result<Json<SignupRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<UserResponse>), ApiError> {
    let Json(request) = payload?;
    let password = hash_password(&request.password)?;

    let user = state
        .store
        .create_user(NewUser {
            username: request.username,
            email: request.email,
            password,
            name: request.name,
            lastname: request.lastname,
            phone: request.phone,
            address: request.address,
        })
        .await?;

    info!(user = %user.id, username = %user.username, "user signed up");
    Ok((StatusCode::CREATED, Json(UserResponse::from(user))))
}

async fn login(
    State(state): State<AppState>,
    jar: CookieJar,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<(CookieJar, Json<MessageResponse>), ApiError> {
    let Json(request) = payload?;

    let user = state
        .store
        .find_user_by_email(&request.email)
        .await?
        .ok_or(ApiError::UserNotFound)?;

    if !verify_password(&request.password, &user.password)? {
        warn!(email = %request.email, "login rejected: password mismatch");
        return Err(ApiError::Unauthorized);
    }

    let token = state.tokens.issue(&user.email, &user.password)?;
    let cookie = Cookie::build((SESSION_COOKIE, token))
        .http_only(true)
        .secure(true)
        .same_site(SameSite::None)
        .path("/")
        .build();

    info!(user = %user.id, "login successful");
    Ok((
        jar.add(cookie),
        Json(MessageResponse {
            message: "Login successful",
        }),
    ))
}

async fn get_user(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<UserResponse>, ApiError> {
    let id = parse_object_id(&id, ApiError::UserNotFound)?;
    let user = state
        .store
        .find_user_by_id(id)
        .await?
        .ok_or(ApiError::UserNotFound)?;
    debug!(user = %user.id, "user fetched");
    Ok(Json(UserResponse::from(user)))
}

async fn update_user(
    State(state): State<AppState>,
    Path(id): Path<String>,
    session: Session,
    payload: Result<Json<UpdateUserRequest>, JsonRejection>,
) -> Result<Json<MessageResponse>, ApiError> {
    let Json(request) = payload?;
    let id = parse_object_id(&id, ApiError::UserNotFound)?;

    let user = state
        .store
        .find_user_by_id(id)
        .await?
        .ok_or(ApiError::UserNotFound)?;
    ensure_self(&session, &user)?;

    let password = match request.password {
        Some(plain) => Some(hash_password(&plain)?),
        None => None,
    };
    state
        .store
        .update_user(
            id,
            UserUpdate {
                username: request.username,
                email: request.email,
                password,
                name: request.name,
                lastname: request.lastname,
                phone: request.phone,
                address: request.address,
            },
        )
        .await?;

    info!(user = %id, "user updated");
    Ok(Json(MessageResponse {
        message: "User updated successfully",
    }))
}

async fn delete_user(
    State(state): State<AppState>,
    Path(id): Path<String>,
    session: Session,
) -> Result<Json<MessageResponse>, ApiError> {
    let id = parse_object_id(&id, ApiError::UserNotFound)?;

    let user = state
        .store
        .find_user_by_id(id)
        .await?
        .ok_or(ApiError::UserNotFound)?;
    ensure_self(&session, &user)?;

    state.store.deactivate_user(id).await?;
    info!(user = %id, "user soft-deleted");
    Ok(Json(MessageResponse {
        message: "User deleted successfully",
    }))
}

async fn create_product(
    State(state): State<AppState>,
    session: Session,
    payload: Result<Json<CreateProductRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<ProductResponse>), ApiError> {
    let Json(request) = payload?;
    let actor = resolve_actor(&state, &session).await?;

    let product = state
        .store
        .create_product(NewProduct {
            name: request.name,
            price: request.price,
            description: request.description,
            image: request.image,
            category: request.category,
            user: actor.id,
        })
        .await?;

    info!(product = %product.id, owner = %actor.id, "product created");
    Ok((StatusCode::CREATED, Json(ProductResponse::from(product))))
}

async fn get_product(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ProductResponse>, ApiError> {
    let id = parse_object_id(&id, ApiError::ProductNotFound)?;
    let product = state
        .store
        .find_product(id)
        .await?
        .ok_or(ApiError::ProductNotFound)?;
    debug!(product = %product.id, "product fetched");
    Ok(Json(ProductResponse::from(product)))
}

async fn list_products(
    State(state): State<AppState>,
    Query(query): Query<ProductListQuery>,
) -> Result<Json<Vec<ProductResponse>>, ApiError> {
    let owner = match query.user_id.as_deref() {
        Some(raw) => {
            let id = parse_object_id(raw, ApiError::UserNotFound)?;
            let user = state
                .store
                .find_user_by_id(id)
                .await?
                .ok_or(ApiError::UserNotFound)?;
            Some(user.id)
        }
        None => None,
    };

    let products = state
        .store
        .list_products(ProductFilter {
            category: query.category,
            name: query.name,
            owner,
        })
        .await?;
    debug!(results = products.len(), "products listed");

    Ok(Json(
        products.into_iter().map(ProductResponse::from).collect(),
    ))
}

async fn user_categories(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Vec<String>>, ApiError> {
    let id = parse_object_id(&id, ApiError::UserNotFound)?;
    let user = state
        .store
        .find_user_by_id(id)
        .await?
        .ok_or(ApiError::UserNotFound)?;

    let categories = state.store.product_categories(user.id).await?;
    debug!(user = %user.id, categories = categories.len(), "categories listed");
    Ok(Json(categories))
}

async fn update_product(
    State(state): State<AppState>,
    Path(id): Path<String>,
    session: Session,
    payload: Result<Json<UpdateProductRequest>, JsonRejection>,
) -> Result<Json<MessageResponse>, ApiError> {
    let Json(request) = payload?;
    let id = parse_object_id(&id, ApiError::ProductNotFound)?;

    let product = state
        .store
        .find_product(id)
        .await?
        .ok_or(ApiError::ProductNotFound)?;
    let actor = resolve_actor(&state, &session).await?;
    authorize(&actor, &product)?;

    state
        .store
        .update_product(
            id,
            ProductUpdate {
                name: request.name,
                price: request.price,
                description: request.description,
                image: request.image,
                category: request.category,
            },
        )
        .await?;

    info!(product = %id, "product updated");
    Ok(Json(MessageResponse {
        message: "Product updated successfully",
    }))
}

async fn delete_product(
    State(state): State<AppState>,
    Path(id): Path<String>,
    session: Session,
) -> Result<Json<MessageResponse>, ApiError> {
    let id = parse_object_id(&id, ApiError::ProductNotFound)?;

    let product = state
        .store
        .find_product(id)
        .await?
        .ok_or(ApiError::ProductNotFound)?;
    let actor = resolve_actor(&state, &session).await?;
    authorize(&actor, &product)?;

    state.store.deactivate_product(id).await?;
    info!(product = %id, "product soft-deleted");
    Ok(Json(MessageResponse {
        message: "Product deleted successfully",
    }))
}

async fn create_delivery(
    State(state): State<AppState>,
    session: Session,
    payload: Result<Json<CreateDeliveryRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<DeliveryResponse>), ApiError> {
    let Json(request) = payload?;
    let actor = resolve_actor(&state, &session).await?;

    let product = parse_object_id(
        &request.product,
        ApiError::InvalidRequest(String::from("invalid product reference")),
    )?;
    validate_quantity(request.quantity)?;
    validate_score(request.score)?;
    let date = match request.date.as_deref() {
        Some(raw) => parse_date(raw)?,
        None => chrono::Utc::now(),
    };

    let delivery = state
        .store
        .create_delivery(NewDelivery {
            user: actor.id,
            product,
            quantity: request.quantity,
            date,
            status: request.status.unwrap_or_default(),
            comments: request.comments,
            score: request.score,
        })
        .await?;

    info!(delivery = %delivery.id, owner = %actor.id, "delivery created");
    Ok((StatusCode::CREATED, Json(DeliveryResponse::from(delivery))))
}

async fn get_delivery(
    State(state): State<AppState>,
    Path(id): Path<String>,
    session: Session,
) -> Result<Json<DeliveryResponse>, ApiError> {
    let actor = resolve_actor(&state, &session).await?;
    let id = parse_object_id(&id, ApiError::DeliveryNotFound)?;

    let delivery = state
        .store
        .find_delivery(id)
        .await?
        .ok_or(ApiError::DeliveryNotFound)?;
    authorize(&actor, &delivery)?;

    debug!(delivery = %delivery.id, "delivery fetched");
    Ok(Json(DeliveryResponse::from(delivery)))
}

async fn list_deliveries(
    State(state): State<AppState>,
    Query(query): Query<DeliveryListQuery>,
    session: Session,
) -> Result<Json<Vec<DeliveryResponse>>, ApiError> {
    let actor = resolve_actor(&state, &session).await?;

    let range = DateRange {
        start: query.start.as_deref().map(parse_date).transpose()?,
        end: query.end.as_deref().map(parse_date).transpose()?,
    };
    let deliveries = state.store.list_deliveries(actor.id, range).await?;
    debug!(owner = %actor.id, results = deliveries.len(), "deliveries listed");

    Ok(Json(
        deliveries.into_iter().map(DeliveryResponse::from).collect(),
    ))
}

async fn update_delivery(
    State(state): State<AppState>,
    Path(id): Path<String>,
    session: Session,
    payload: Result<Json<UpdateDeliveryRequest>, JsonRejection>,
) -> Result<Json<MessageResponse>, ApiError> {
    let Json(request) = payload?;
    let actor = resolve_actor(&state, &session).await?;
    let id = parse_object_id(&id, ApiError::DeliveryNotFound)?;

    let delivery = state
        .store
        .find_delivery(id)
        .await?
        .ok_or(ApiError::DeliveryNotFound)?;
    authorize(&actor, &delivery)?;
    validate_score(request.score)?;

    state
        .store
        .update_delivery(
            id,
            DeliveryUpdate {
                comments: request.comments,
                score: request.score,
            },
        )
        .await?;

    info!(delivery = %id, "delivery updated");
    Ok(Json(MessageResponse {
        message: "Delivery updated successfully",
    }))
}

fn validate_quantity(quantity: i64) -> Result<(), ApiError> {
    if quantity < MIN_QUANTITY {
        return Err(ApiError::InvalidRequest(format!(
            "quantity must be at least {MIN_QUANTITY}"
        )));
    }
    Ok(())
}

fn validate_score(score: Option<i32>) -> Result<(), ApiError> {
    match score {
        Some(score) if !(MIN_SCORE..=MAX_SCORE).contains(&score) => Err(ApiError::InvalidRequest(
            format!("score must be between {MIN_SCORE} and {MAX_SCORE}"),
        )),
        _ => Ok(()),
    }
}
