use actix_web::web;

use super::handlers;

/// Configures the API routes
///
/// # Arguments
///
/// * `cfg` - The service configuration
pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api")
            .route("/blocks", web::get().to(handlers::get_blocks))
            .route("/blocks", web::post().to(handlers::receive_chain))
            .route("/transact", web::post().to(handlers::transact))
            .route(
                "/transaction-pool-map",
                web::get().to(handlers::get_transaction_pool_map),
            )
            .route(
                "/transaction-pool-map",
                web::post().to(handlers::receive_transaction_pool_map),
            )
            .route(
                "/mine-transactions",
                web::post().to(handlers::mine_transactions),
            )
            .route("/wallet-info", web::get().to(handlers::get_wallet_info)),
    );
}
