use actix_web::{web, HttpResponse};

use crate::auth::Claims;
use crate::database::models::{
    CreateScheduleRequest, MonthlyQuery, ScheduleWithAssignees, UpdateScheduleRequest,
};
use crate::database::repositories::ScheduleRepository;
use crate::domain::CalendarDay;
use crate::error::AppError;
use crate::handlers::shared::ApiResponse;
use crate::services::ReconciliationService;

pub async fn monthly(
    _claims: Claims,
    schedule_repo: web::Data<ScheduleRepository>,
    query: web::Query<MonthlyQuery>,
) -> Result<HttpResponse, AppError> {
    let (start, end) = CalendarDay::month_bounds(query.month, query.year).ok_or_else(|| {
        AppError::BadRequest(format!("Invalid month: {}/{}", query.month, query.year))
    })?;

    let schedules = schedule_repo.monthly(start, end).await?;
    let mut out = Vec::with_capacity(schedules.len());
    for schedule in schedules {
        let assigned_users = schedule_repo.assignees(&schedule.id).await?;
        out.push(ScheduleWithAssignees {
            schedule,
            assigned_users,
        });
    }

    Ok(HttpResponse::Ok().json(ApiResponse::success(out)))
}

pub async fn by_id(
    claims: Claims,
    path: web::Path<String>,
    schedule_repo: web::Data<ScheduleRepository>,
) -> Result<HttpResponse, AppError> {
    let id = path.into_inner();
    let schedule = schedule_repo
        .find_by_id(&id)
        .await?
        .ok_or_else(|| AppError::NotFound("Schedule not found".to_string()))?;

    let assigned_users = schedule_repo.assignees(&id).await?;
    if !claims.is_admin() && !assigned_users.iter().any(|a| a.user_id == claims.user_id()) {
        return Err(AppError::Forbidden(
            "You are not assigned to this shift".to_string(),
        ));
    }

    Ok(HttpResponse::Ok().json(ApiResponse::success(ScheduleWithAssignees {
        schedule,
        assigned_users,
    })))
}

pub async fn create(
    claims: Claims,
    reconciliation: web::Data<ReconciliationService>,
    input: web::Json<CreateScheduleRequest>,
) -> Result<HttpResponse, AppError> {
    claims.require_admin()?;

    let created = reconciliation.create_schedule(input.into_inner()).await?;
    Ok(HttpResponse::Created().json(ApiResponse::success(created)))
}

pub async fn update(
    claims: Claims,
    path: web::Path<String>,
    reconciliation: web::Data<ReconciliationService>,
    input: web::Json<UpdateScheduleRequest>,
) -> Result<HttpResponse, AppError> {
    claims.require_admin()?;

    let user_ids: Vec<String> = input
        .assigned_users
        .iter()
        .map(|r| r.user_id.clone())
        .collect();
    let updated = reconciliation
        .update_schedule(&path.into_inner(), &user_ids)
        .await?;
    Ok(HttpResponse::Ok().json(ApiResponse::success(updated)))
}

pub async fn remove(
    claims: Claims,
    path: web::Path<String>,
    schedule_repo: web::Data<ScheduleRepository>,
    hub: web::Data<crate::realtime::RealtimeHub>,
) -> Result<HttpResponse, AppError> {
    claims.require_admin()?;

    let id = path.into_inner();
    if !schedule_repo.delete(&id).await? {
        return Err(AppError::NotFound("Schedule not found".to_string()));
    }
    hub.broadcast_schedule_updated();

    Ok(HttpResponse::Ok().json(ApiResponse::<()>::message("Schedule deleted")))
}
