use actix_cors::Cors;
use actix_web::{middleware, web, App, HttpServer};
use log::info;
use std::sync::Mutex;

use cryptochain::api;
use cryptochain::blockchain::Wallet;
use cryptochain::config::NodeConfig;
use cryptochain::node::Node;

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logger
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    // Load configuration
    let config = NodeConfig::from_env()?;

    // Restore or create the node wallet
    let wallet = match &config.wallet_secret_key {
        Some(secret_key) => Wallet::from_secret_key_hex(secret_key)?,
        None => Wallet::new(),
    };
    info!("Node wallet address: {}", wallet.public_key());

    // Shared node state
    let node = web::Data::new(Mutex::new(Node::new(wallet)));

    info!(
        "Starting HTTP server at http://{}:{}",
        config.host, config.port
    );

    HttpServer::new(move || {
        // Configure CORS
        let cors = Cors::default()
            .allow_any_origin()
            .allow_any_method()
            .allow_any_header()
            .max_age(3600);

        App::new()
            .wrap(middleware::Logger::default())
            .wrap(cors)
            .app_data(node.clone())
            .configure(api::configure_routes)
    })
    .bind((config.host.as_str(), config.port))?
    .run()
    .await?;

    Ok(())
}
