use actix_web::{web, HttpResponse};

use crate::auth::Claims;
use crate::database::repositories::UserRepository;
use crate::error::AppError;
use crate::handlers::shared::ApiResponse;
use crate::services::CascadeDeleteService;

pub async fn list_users(
    claims: Claims,
    user_repo: web::Data<UserRepository>,
) -> Result<HttpResponse, AppError> {
    claims.require_admin()?;

    let users = user_repo.get_all_users().await?;
    Ok(HttpResponse::Ok().json(ApiResponse::success(users)))
}

pub async fn delete_user(
    claims: Claims,
    path: web::Path<String>,
    cascade: web::Data<CascadeDeleteService>,
) -> Result<HttpResponse, AppError> {
    claims.require_admin()?;

    cascade
        .delete_user(&path.into_inner(), claims.user_id())
        .await?;
    Ok(HttpResponse::Ok().json(ApiResponse::<()>::message("User deleted")))
}
