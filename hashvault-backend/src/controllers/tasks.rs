use actix_web::{web, HttpResponse};
use std::str::FromStr;

use crate::models::{TaskKind, TaskResponse, UpdateMonitoringTaskRequest};
use crate::AppState;

/// Configure monitoring task routes
pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api/tasks")
            .route("", web::get().to(list_tasks))
            .route("/{kind}", web::get().to(get_task))
            .route("/{kind}", web::put().to(update_task)),
    );
}

fn error_response(mut builder: actix_web::HttpResponseBuilder, error: String) -> HttpResponse {
    builder.json(TaskResponse {
        success: false,
        task: None,
        tasks: None,
        error: Some(error),
    })
}

fn parse_kind(raw: &str) -> Result<TaskKind, HttpResponse> {
    TaskKind::from_str(raw).map_err(|_| {
        log::warn!("[Scheduler] Admin request for unknown task kind '{}'", raw);
        error_response(HttpResponse::NotFound(), format!("Unknown task kind '{}'", raw))
    })
}

/// Persisted rows joined with live scheduler state
async fn list_tasks(state: web::Data<AppState>) -> HttpResponse {
    match state.scheduler.status_all() {
        Ok(tasks) => HttpResponse::Ok().json(TaskResponse {
            success: true,
            task: None,
            tasks: Some(tasks),
            error: None,
        }),
        Err(e) => error_response(HttpResponse::InternalServerError(), e),
    }
}

async fn get_task(state: web::Data<AppState>, path: web::Path<String>) -> HttpResponse {
    let kind = match parse_kind(&path) {
        Ok(kind) => kind,
        Err(resp) => return resp,
    };

    match state.scheduler.status(kind) {
        Ok(Some(task)) => HttpResponse::Ok().json(TaskResponse {
            success: true,
            task: Some(task),
            tasks: None,
            error: None,
        }),
        Ok(None) => error_response(HttpResponse::NotFound(), format!("Task {} not seeded", kind)),
        Err(e) => error_response(HttpResponse::InternalServerError(), e),
    }
}

/// Persist the admin change, then bring the timer in line with it
async fn update_task(
    state: web::Data<AppState>,
    path: web::Path<String>,
    body: web::Json<UpdateMonitoringTaskRequest>,
) -> HttpResponse {
    let kind = match parse_kind(&path) {
        Ok(kind) => kind,
        Err(resp) => return resp,
    };

    if let Some(secs) = body.interval_seconds {
        if secs <= 0 {
            return error_response(
                HttpResponse::BadRequest(),
                "interval_seconds must be positive".to_string(),
            );
        }
    }

    match state.db.update_monitoring_task(kind, body.is_running, body.interval_seconds) {
        Ok(Some(_)) => {}
        Ok(None) => {
            return error_response(HttpResponse::NotFound(), format!("Task {} not seeded", kind));
        }
        Err(e) => {
            log::error!("Failed to update task {}: {}", kind, e);
            return error_response(HttpResponse::InternalServerError(), format!("Database error: {}", e));
        }
    }

    if let Err(e) = state.scheduler.reconcile_with_persisted(kind) {
        log::error!("[Scheduler] Failed to apply change to {}: {}", kind, e);
        return error_response(HttpResponse::InternalServerError(), e);
    }

    match state.scheduler.status(kind) {
        Ok(task) => HttpResponse::Ok().json(TaskResponse {
            success: true,
            task,
            tasks: None,
            error: None,
        }),
        Err(e) => error_response(HttpResponse::InternalServerError(), e),
    }
}
