use actix_web::{web, HttpResponse};

use crate::auth::{AuthService, Claims};
use crate::database::models::{LoginRequest, RegisterRequest};
use crate::error::AppError;
use crate::handlers::shared::ApiResponse;

pub async fn register(
    auth_service: web::Data<AuthService>,
    input: web::Json<RegisterRequest>,
) -> Result<HttpResponse, AppError> {
    let response = auth_service.register(input.into_inner()).await?;
    Ok(HttpResponse::Created().json(ApiResponse::success(response)))
}

pub async fn login(
    auth_service: web::Data<AuthService>,
    input: web::Json<LoginRequest>,
) -> Result<HttpResponse, AppError> {
    let response = auth_service.login(input.into_inner()).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::success(response)))
}

pub async fn me(
    claims: Claims,
    auth_service: web::Data<AuthService>,
) -> Result<HttpResponse, AppError> {
    let user = auth_service.current_user(&claims).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::success(user)))
}
