use actix_web::{web, HttpResponse};

use crate::ledger::{LedgerError, LedgerGateway};
use crate::AppState;

/// Wallet inspection routes
pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.service(web::resource("/api/wallets/{id}/balances").route(web::get().to(get_balances)));
}

/// Credited balances next to what the ledger reports right now
async fn get_balances(state: web::Data<AppState>, path: web::Path<i64>) -> HttpResponse {
    let wallet_id = path.into_inner();
    let wallet = match state.db.get_wallet(wallet_id) {
        Ok(Some(wallet)) => wallet,
        Ok(None) => {
            return HttpResponse::NotFound().json(serde_json::json!({
                "success": false,
                "error": format!("Wallet {} not found", wallet_id)
            }));
        }
        Err(e) => {
            log::error!("Failed to load wallet {}: {}", wallet_id, e);
            return HttpResponse::InternalServerError().json(serde_json::json!({
                "success": false,
                "error": format!("Database error: {}", e)
            }));
        }
    };

    let on_chain = async {
        let token = state.ledger.token_balance(&wallet.address).await?;
        let native = state.ledger.native_balance(&wallet.address).await?;
        Ok::<_, LedgerError>((token, native))
    };

    match on_chain.await {
        Ok((token, native)) => HttpResponse::Ok().json(serde_json::json!({
            "success": true,
            "wallet_id": wallet.id,
            "address": wallet.address,
            "token_symbol": state.config.token_symbol,
            "credited_token_balance": wallet.stable_token_balance,
            "cached_gas_balance": wallet.native_gas_balance,
            "ledger_token_balance": token,
            "ledger_gas_balance": native,
        })),
        Err(e) => {
            log::error!("[Explorer] Balance lookup for wallet {} failed: {}", wallet.id, e);
            HttpResponse::BadGateway().json(serde_json::json!({
                "success": false,
                "error": e.to_string()
            }))
        }
    }
}
