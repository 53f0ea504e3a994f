//! Route definitions for ProfitBox

use axum::{
    extract::DefaultBodyLimit,
    middleware,
    routing::{get, post},
    Router,
};

use crate::{handlers, middleware::auth_middleware, services::bulk_upload::MAX_UPLOAD_BYTES, AppState};

/// Multipart framing on top of the largest accepted file
const UPLOAD_BODY_LIMIT: usize = MAX_UPLOAD_BYTES + 64 * 1024;

/// Create API routes
pub fn api_routes(state: AppState) -> Router<AppState> {
    Router::new()
        // Health check (public)
        .route("/health", get(handlers::health_check))
        // Protected routes
        .nest("/products", product_routes(state.clone()))
        .nest("/inventory", inventory_routes(state.clone()))
        .nest("/sales", sales_routes(state.clone()))
        .nest("/stock", stock_routes(state.clone()))
        .nest("/analytics", analytics_routes(state))
}

/// Product catalog routes (protected)
fn product_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route(
            "/",
            get(handlers::list_products).post(handlers::create_product),
        )
        .route("/analytics", get(handlers::product_analytics))
        .route("/bulk", post(handlers::create_products_bulk))
        .route(
            "/bulk-upload",
            get(handlers::product_template)
                .post(handlers::upload_products)
                .layer(DefaultBodyLimit::max(UPLOAD_BODY_LIMIT)),
        )
        .route(
            "/:product_id",
            get(handlers::get_product)
                .put(handlers::update_product)
                .patch(handlers::set_product_active)
                .delete(handlers::delete_product),
        )
        .route_layer(middleware::from_fn_with_state(state, auth_middleware))
}

/// Stock batch routes (protected)
fn inventory_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/", get(handlers::list_batches).post(handlers::create_batch))
        .route("/analytics", get(handlers::inventory_analytics))
        .route_layer(middleware::from_fn_with_state(state, auth_middleware))
}

/// Sales routes (protected)
fn sales_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/", get(handlers::list_sales).post(handlers::record_sale))
        .route("/analytics", get(handlers::sales_analytics))
        .route(
            "/bulk-upload",
            get(handlers::sales_template)
                .post(handlers::upload_sales)
                .layer(DefaultBodyLimit::max(UPLOAD_BODY_LIMIT)),
        )
        .route_layer(middleware::from_fn_with_state(state, auth_middleware))
}

/// Stock import routes (protected)
fn stock_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route(
            "/bulk-upload",
            get(handlers::stock_template)
                .post(handlers::upload_stock)
                .layer(DefaultBodyLimit::max(UPLOAD_BODY_LIMIT)),
        )
        .route("/check-products", get(handlers::check_products))
        .route_layer(middleware::from_fn_with_state(state, auth_middleware))
}

/// Analytics routes (protected)
fn analytics_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/profit", get(handlers::profit_analysis))
        .route("/performers", get(handlers::top_performers))
        .route("/search", get(handlers::search_performers))
        .route("/stock-alerts", get(handlers::stock_alerts))
        .route("/weekly-report", get(handlers::weekly_report))
        .route_layer(middleware::from_fn_with_state(state, auth_middleware))
}
