use actix_web::{middleware::Logger, web, App, HttpServer};
use dotenv::dotenv;
use std::sync::Arc;

mod config;
mod controllers;
mod db;
mod gas;
mod keystore;
mod ledger;
mod models;
mod reconciler;
mod referral;
mod scheduler;
#[cfg(test)]
mod test_support;

use config::Config;
use db::Database;
use keystore::{FileKeyStore, KeyStore};
use ledger::{HttpLedgerGateway, LedgerGateway};
use models::TaskKind;
use reconciler::DepositReconciler;
use referral::ReferralCascade;
use scheduler::{HandlerRegistry, TaskScheduler};

pub struct AppState {
    pub db: Arc<Database>,
    pub config: Config,
    pub scheduler: Arc<TaskScheduler>,
    pub cascade: Arc<ReferralCascade>,
    pub ledger: Arc<dyn LedgerGateway>,
}

fn fatal(message: String) -> std::io::Error {
    log::error!("{}", message);
    std::io::Error::other(message)
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    dotenv().ok();
    env_logger::init();

    let config = Config::from_env().map_err(|e| fatal(format!("Configuration error: {}", e)))?;
    let bind_addr = config.bind_addr.clone();
    let port = config.port;

    log::info!("Initializing database at {}", config.database_url);
    let db = Arc::new(
        Database::new(&config.database_url)
            .map_err(|e| fatal(format!("Failed to open database: {}", e)))?,
    );

    let file_store = FileKeyStore::new(&config.keystore_path);
    match file_store.address(&config.hot_wallet_id).await {
        Ok(address) => log::info!("[KeyStore] Gas top-ups funded from {:?}", address),
        Err(e) => log::warn!(
            "[KeyStore] Hot wallet '{}' not usable yet ({}): {}",
            config.hot_wallet_id,
            file_store.path().display(),
            e
        ),
    }
    let keystore: Arc<dyn KeyStore> = Arc::new(file_store);

    let ledger: Arc<dyn LedgerGateway> = Arc::new(
        HttpLedgerGateway::from_config(&config, keystore.clone())
            .map_err(|e| fatal(format!("Failed to initialize ledger gateway: {}", e)))?,
    );

    // Only deposit polling is implemented here; the other kinds stay unregistered
    let reconciler = Arc::new(DepositReconciler::from_config(db.clone(), ledger.clone(), &config));
    let registry = HandlerRegistry::new().with(TaskKind::Deposit, reconciler);

    let scheduler = Arc::new(TaskScheduler::new(db.clone(), registry, config.tick_timeout));
    scheduler.boot().map_err(fatal)?;

    let cascade = Arc::new(ReferralCascade::new(db.clone(), config.referral_max_hops));

    log::info!("Starting HashVault server on {}:{}", bind_addr, port);

    let sched = scheduler.clone();
    let server_config = config.clone();
    let result = HttpServer::new(move || {
        App::new()
            .app_data(web::Data::new(AppState {
                db: Arc::clone(&db),
                config: server_config.clone(),
                scheduler: Arc::clone(&sched),
                cascade: Arc::clone(&cascade),
                ledger: Arc::clone(&ledger),
            }))
            .wrap(Logger::default())
            .configure(controllers::health::config)
            .configure(controllers::tasks::config)
            .configure(controllers::purchases::config)
            .configure(controllers::wallets::config)
    })
    .bind((bind_addr.as_str(), port))?
    .run()
    .await;

    log::info!("Server stopped, clearing task timers");
    scheduler.stop_all();
    result
}
