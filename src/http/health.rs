use actix_web::{web, HttpResponse};
use crate::db::DbPool;

pub async fn health_check(db_pool: web::Data<DbPool>) -> HttpResponse {
    match crate::db::health_check(&db_pool).await {
        Ok(()) => HttpResponse::Ok().json(serde_json::json!({
            "status": "healthy",
            "database": "ok"
        })),
        Err(e) => {
            tracing::warn!(error = %e, "Database health check failed");
            HttpResponse::ServiceUnavailable().json(serde_json::json!({
                "status": "unhealthy",
                "database": e.to_string()
            }))
        }
    }
}
