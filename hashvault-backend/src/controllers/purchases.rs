use actix_web::{web, HttpResponse};

use crate::models::PurchaseCompletedRequest;
use crate::AppState;

/// Purchase-completion hook; runs the referral cascade synchronously
pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.service(web::resource("/api/purchases/completed").route(web::post().to(purchase_completed)));
}

async fn purchase_completed(
    state: web::Data<AppState>,
    body: web::Json<PurchaseCompletedRequest>,
) -> HttpResponse {
    let body = body.into_inner();
    if body.payer_user_name.trim().is_empty() || body.package_type.trim().is_empty() {
        return HttpResponse::BadRequest().json(serde_json::json!({
            "success": false,
            "error": "payer_user_name and package_type are required"
        }));
    }

    let cascade = state.cascade.clone();
    let result = web::block(move || {
        cascade.run(&body.payer_user_name, &body.package_type, body.total_price)
    })
    .await;

    match result {
        Ok(Ok(outcome)) => HttpResponse::Ok().json(serde_json::json!({
            "success": true,
            "result": outcome
        })),
        Ok(Err(e)) => {
            log::error!("[Referral] Cascade failed: {}", e);
            HttpResponse::Conflict().json(serde_json::json!({
                "success": false,
                "error": e.to_string()
            }))
        }
        Err(e) => {
            log::error!("[Referral] Cascade task failed: {}", e);
            HttpResponse::InternalServerError().json(serde_json::json!({
                "success": false,
                "error": "Internal server error"
            }))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ReferrerEdge;
    use crate::test_support::test_state;
    use actix_web::{test, App};

    #[actix_web::test]
    async fn test_purchase_pays_referrer() {
        let state = test_state();
        state.db.create_user("alice", None).unwrap();
        state.db.create_user("bob", None).unwrap();
        state
            .db
            .upsert_referrer_edge(&ReferrerEdge {
                user_name: "alice".to_string(),
                referrer_user_name: "bob".to_string(),
                package_type: "gold".to_string(),
                fee_rate: 10.0,
                group_leader_name: None,
                fee_rate_leader: None,
            })
            .unwrap();
        let app = test::init_service(App::new().app_data(state.clone()).configure(config)).await;

        let req = test::TestRequest::post()
            .uri("/api/purchases/completed")
            .set_json(serde_json::json!({
                "payer_user_name": "alice",
                "package_type": "gold",
                "total_price": 100.0
            }))
            .to_request();
        let resp: serde_json::Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(resp["success"], true);
        assert_eq!(resp["result"]["outcome"], "settled");
        assert_eq!(resp["result"]["payouts"][0]["amount"], 10.0);
    }

    #[actix_web::test]
    async fn test_cycle_returns_conflict() {
        let state = test_state();
        state.db.create_user("a", None).unwrap();
        state.db.create_user("b", Some("a")).unwrap();
        state.db.set_generic_referrer("a", Some("b")).unwrap();
        let app = test::init_service(App::new().app_data(state).configure(config)).await;

        let req = test::TestRequest::post()
            .uri("/api/purchases/completed")
            .set_json(serde_json::json!({
                "payer_user_name": "a",
                "package_type": "gold",
                "total_price": 100.0
            }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), actix_web::http::StatusCode::CONFLICT);
    }
}
