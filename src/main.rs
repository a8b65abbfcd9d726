use axum::{
    extract::DefaultBodyLimit,
    routing::{delete, get, post},
    Router,
};
use tower_http::cors::CorsLayer;

mod auth;
mod cars;
mod db_client;
mod error;
mod image_server;
mod rental;
mod search;
mod users;

use cars::{cars as catalog, images};
use rental::booking;
use users::users as accounts;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init();

    let db = db_client::db_client().await?;
    db_client::init_schema(&db).await?;
    db_client::ensure_admin_user(&db).await?;

    let app = Router::new()
        .route("/cars", get(catalog::list_cars).post(catalog::create_car))
        .route("/cars/available", get(catalog::available_cars))
        .route(
            "/cars/:id",
            get(catalog::get_car)
                .put(catalog::update_car)
                .delete(catalog::delete_car),
        )
        .route("/cars/:id/images", post(images::add_car_image))
        .route("/cars/:id/unavailable", get(booking::unavailable_dates))
        .route("/cars/images/:image_id", delete(images::delete_car_image))
        .route(
            "/cars/images/:image_id/primary",
            post(images::set_primary_image),
        )
        .route(
            "/rentals",
            post(booking::create_rental).get(booking::list_my_rentals),
        )
        .route("/rentals/active", get(booking::active_rentals))
        .route("/rentals/:id/cancel", post(booking::cancel_rental))
        .route("/users/new", post(accounts::register))
        .route("/users/login", post(accounts::login))
        .route("/users/me", get(accounts::profile))
        .route("/upload", post(image_server::upload))
        .route("/images/:file", get(image_server::image_handler))
        .route("/search", post(search::search))
        .route("/admin/rentals", get(booking::admin_list_rentals))
        .route("/admin/customers", get(accounts::admin_list_users))
        .route("/admin/stats", get(booking::admin_stats))
        // uploads may carry up to 5MB of image plus multipart framing
        .layer(DefaultBodyLimit::max(8 * 1024 * 1024))
        .layer(CorsLayer::permissive())
        .with_state(db);

    let addr = std::env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:4000".to_string());
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    log::info!("rental server listening on {}", addr);
    axum::serve(listener, app).await?;
    Ok(())
}
