use actix_web::{web, HttpResponse};

use crate::auth::Claims;
use crate::database::repositories::NotificationRepository;
use crate::error::AppError;
use crate::handlers::shared::ApiResponse;

pub async fn list(
    claims: Claims,
    notification_repo: web::Data<NotificationRepository>,
) -> Result<HttpResponse, AppError> {
    let notifications = notification_repo.list_for_user(claims.user_id()).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::success(notifications)))
}

pub async fn mark_read(
    claims: Claims,
    path: web::Path<String>,
    notification_repo: web::Data<NotificationRepository>,
) -> Result<HttpResponse, AppError> {
    // Scoped to the owner: another user's id behaves as not-found
    if !notification_repo
        .mark_read(&path.into_inner(), claims.user_id())
        .await?
    {
        return Err(AppError::NotFound("Notification not found".to_string()));
    }
    Ok(HttpResponse::Ok().json(ApiResponse::<()>::message("Notification marked as read")))
}

pub async fn mark_all_read(
    claims: Claims,
    notification_repo: web::Data<NotificationRepository>,
) -> Result<HttpResponse, AppError> {
    let updated = notification_repo.mark_all_read(claims.user_id()).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::<()>::message(&format!(
        "{} notifications marked as read",
        updated
    ))))
}

pub async fn remove(
    claims: Claims,
    path: web::Path<String>,
    notification_repo: web::Data<NotificationRepository>,
) -> Result<HttpResponse, AppError> {
    if !notification_repo
        .delete(&path.into_inner(), claims.user_id())
        .await?
    {
        return Err(AppError::NotFound("Notification not found".to_string()));
    }
    Ok(HttpResponse::Ok().json(ApiResponse::<()>::message("Notification deleted")))
}
