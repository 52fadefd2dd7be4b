use actix_web::{web, HttpResponse};

use crate::auth::Claims;
use crate::database::models::PostMessageRequest;
use crate::error::AppError;
use crate::handlers::shared::ApiResponse;
use crate::services::ChatRoomService;

pub async fn room(
    claims: Claims,
    path: web::Path<String>,
    chat_service: web::Data<ChatRoomService>,
) -> Result<HttpResponse, AppError> {
    let room = chat_service
        .get_or_create(&path.into_inner(), claims.user_id(), claims.is_admin())
        .await?;
    Ok(HttpResponse::Ok().json(ApiResponse::success(room)))
}

pub async fn post_message(
    claims: Claims,
    path: web::Path<String>,
    chat_service: web::Data<ChatRoomService>,
    input: web::Json<PostMessageRequest>,
) -> Result<HttpResponse, AppError> {
    let message = chat_service
        .post_message(&path.into_inner(), claims.user_id(), &input.message)
        .await?;
    Ok(HttpResponse::Created().json(ApiResponse::success(message)))
}

pub async fn unread_counts(
    claims: Claims,
    chat_service: web::Data<ChatRoomService>,
) -> Result<HttpResponse, AppError> {
    let counts = chat_service.unread_counts(claims.user_id()).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::success(counts)))
}

pub async fn mark_read(
    claims: Claims,
    path: web::Path<String>,
    chat_service: web::Data<ChatRoomService>,
) -> Result<HttpResponse, AppError> {
    chat_service
        .mark_read(&path.into_inner(), claims.user_id())
        .await?;
    Ok(HttpResponse::Ok().json(ApiResponse::<()>::message("Chat marked as read")))
}
