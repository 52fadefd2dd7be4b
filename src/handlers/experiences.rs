use actix_web::{web, HttpResponse};

use crate::auth::Claims;
use crate::database::models::{CreateExperienceRequest, EXPERIENCE_MAX_LEN};
use crate::database::repositories::ExperienceRepository;
use crate::error::AppError;
use crate::handlers::shared::ApiResponse;

pub async fn list(
    _claims: Claims,
    experience_repo: web::Data<ExperienceRepository>,
) -> Result<HttpResponse, AppError> {
    let experiences = experience_repo.list().await?;
    Ok(HttpResponse::Ok().json(ApiResponse::success(experiences)))
}

pub async fn create(
    claims: Claims,
    experience_repo: web::Data<ExperienceRepository>,
    input: web::Json<CreateExperienceRequest>,
) -> Result<HttpResponse, AppError> {
    let content = input.content.trim();
    if content.is_empty() {
        return Err(AppError::BadRequest(
            "Experience content cannot be empty".to_string(),
        ));
    }
    if content.chars().count() > EXPERIENCE_MAX_LEN {
        return Err(AppError::BadRequest(format!(
            "Experience content cannot exceed {} characters",
            EXPERIENCE_MAX_LEN
        )));
    }

    let experience = experience_repo.create(claims.user_id(), content).await?;
    Ok(HttpResponse::Created().json(ApiResponse::success(experience)))
}

pub async fn remove(
    claims: Claims,
    path: web::Path<String>,
    experience_repo: web::Data<ExperienceRepository>,
) -> Result<HttpResponse, AppError> {
    let id = path.into_inner();
    let experience = experience_repo
        .find_by_id(&id)
        .await?
        .ok_or_else(|| AppError::NotFound("Experience not found".to_string()))?;

    if experience.user_id != claims.user_id() && !claims.is_admin() {
        return Err(AppError::Forbidden(
            "You can only delete your own experiences".to_string(),
        ));
    }

    experience_repo.delete(&id).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::<()>::message("Experience deleted")))
}
