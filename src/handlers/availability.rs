use actix_web::{web, HttpResponse};
use chrono::{Duration, Utc};
use serde::Deserialize;

use crate::auth::Claims;
use crate::database::models::{
    Availability, AvailabilityFilter, AvailabilityStatus, Notification, NotificationKind,
    SetAvailabilityStatusRequest, SubmitAvailabilitiesRequest,
};
use crate::database::repositories::{AvailabilityRepository, UserRepository};
use crate::domain::{catalog, CalendarDay};
use crate::error::AppError;
use crate::handlers::shared::ApiResponse;
use crate::services::ReconciliationService;

/// A slot counts as imminent when its day (anchored at noon UTC) lies
/// between 24 hours ago and 48 hours ahead. Submissions touching such a
/// slot alert the admins immediately instead of waiting for their next
/// review pass.
fn is_imminent(date: CalendarDay) -> bool {
    let now = Utc::now();
    let anchor = date.noon_utc();
    anchor >= now - Duration::hours(24) && anchor <= now + Duration::hours(48)
}

pub async fn submit(
    claims: Claims,
    availability_repo: web::Data<AvailabilityRepository>,
    user_repo: web::Data<UserRepository>,
    reconciliation: web::Data<ReconciliationService>,
    input: web::Json<SubmitAvailabilitiesRequest>,
) -> Result<HttpResponse, AppError> {
    let input = input.into_inner();
    if input.availabilities.is_empty() {
        return Err(AppError::BadRequest(
            "At least one availability entry is required".to_string(),
        ));
    }
    for item in &input.availabilities {
        if !catalog::is_known_template(&item.shift) {
            return Err(AppError::BadRequest(format!(
                "Unknown shift slot: {}",
                item.shift
            )));
        }
    }

    let mut created = Vec::with_capacity(input.availabilities.len());
    for item in &input.availabilities {
        let entry = Availability::new(claims.user_id(), &item.shift, item.date);
        created.push(availability_repo.insert(&entry).await?);
    }

    let receipt = if created.len() == 1 {
        "Your availability has been submitted and awaits confirmation".to_string()
    } else {
        format!(
            "Your {} availability entries have been submitted and await confirmation",
            created.len()
        )
    };
    reconciliation
        .notify(Notification::new(
            claims.user_id(),
            receipt,
            NotificationKind::Availability,
        ))
        .await;

    alert_admins_for_imminent(&claims, &created, &user_repo, &reconciliation).await;

    Ok(HttpResponse::Created().json(ApiResponse::success(created)))
}

/// One batched alert per submission, not one per entry: the message names
/// the first imminent slot and folds the rest into a count.
async fn alert_admins_for_imminent(
    claims: &Claims,
    created: &[Availability],
    user_repo: &UserRepository,
    reconciliation: &ReconciliationService,
) {
    let imminent: Vec<&Availability> = created.iter().filter(|e| is_imminent(e.date)).collect();
    let Some(first) = imminent.first() else {
        return;
    };

    let submitter = match user_repo.find_by_id(claims.user_id()).await {
        Ok(Some(user)) => user.full_name(),
        Ok(None) => claims.email.clone(),
        Err(e) => {
            log::warn!("failed to resolve submitter for admin alert: {}", e);
            return;
        }
    };

    let mut message = format!(
        "{} is available for the {} shift at {}",
        submitter, first.date, first.location
    );
    if imminent.len() > 1 {
        message.push_str(&format!(" (+{} more)", imminent.len() - 1));
    }

    let admins = match user_repo.get_active_admins().await {
        Ok(admins) => admins,
        Err(e) => {
            log::warn!("failed to load admins for imminent-slot alert: {}", e);
            return;
        }
    };
    for admin in admins {
        reconciliation
            .notify(Notification::new(
                &admin.id,
                message.clone(),
                NotificationKind::Availability,
            ))
            .await;
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct OwnRangeQuery {
    pub month: Option<u32>,
    pub year: Option<i32>,
}

pub async fn my(
    claims: Claims,
    availability_repo: web::Data<AvailabilityRepository>,
    query: web::Query<OwnRangeQuery>,
) -> Result<HttpResponse, AppError> {
    let range = match (query.month, query.year) {
        (Some(month), Some(year)) => Some(CalendarDay::month_bounds(month, year).ok_or_else(
            || AppError::BadRequest(format!("Invalid month: {}/{}", month, year)),
        )?),
        _ => None,
    };

    let entries = availability_repo
        .list_for_owner(claims.user_id(), range)
        .await?;
    Ok(HttpResponse::Ok().json(ApiResponse::success(entries)))
}

pub async fn all(
    claims: Claims,
    availability_repo: web::Data<AvailabilityRepository>,
    filter: web::Query<AvailabilityFilter>,
) -> Result<HttpResponse, AppError> {
    claims.require_admin()?;

    let entries = availability_repo.list_all(&filter).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::success(entries)))
}

pub async fn set_status(
    claims: Claims,
    path: web::Path<String>,
    availability_repo: web::Data<AvailabilityRepository>,
    reconciliation: web::Data<ReconciliationService>,
    input: web::Json<SetAvailabilityStatusRequest>,
) -> Result<HttpResponse, AppError> {
    claims.require_admin()?;

    let id = path.into_inner();
    let entry = availability_repo
        .find_by_id(&id)
        .await?
        .ok_or_else(|| AppError::NotFound("Availability not found".to_string()))?;

    let next = input.status;
    match (entry.status, next) {
        // Re-confirming a confirmed entry is a harmless no-op
        (AvailabilityStatus::Confirmed, AvailabilityStatus::Confirmed) => {
            return Ok(HttpResponse::Ok().json(ApiResponse::success(entry)));
        }
        (AvailabilityStatus::Pending, AvailabilityStatus::Confirmed)
        | (AvailabilityStatus::Pending, AvailabilityStatus::Rejected) => {}
        (from, to) => {
            return Err(AppError::BadRequest(format!(
                "Cannot change availability status from {} to {}",
                from, to
            )));
        }
    }

    let updated = availability_repo
        .set_status(&id, next)
        .await?
        .ok_or_else(|| AppError::NotFound("Availability not found".to_string()))?;

    match next {
        AvailabilityStatus::Confirmed => {
            // Fold into the schedule aggregate before telling the owner, so
            // a reconciliation failure surfaces instead of a stale promise
            reconciliation.reconcile_confirm(&updated).await?;
            reconciliation
                .notify(Notification::new(
                    &updated.user_id,
                    format!(
                        "Your availability for the {} shift at {} has been confirmed",
                        updated.date, updated.location
                    ),
                    NotificationKind::Confirmation,
                ))
                .await;
        }
        AvailabilityStatus::Rejected => {
            reconciliation
                .notify(Notification::new(
                    &updated.user_id,
                    format!(
                        "Your availability for the {} shift at {} was declined",
                        updated.date, updated.location
                    ),
                    NotificationKind::Confirmation,
                ))
                .await;
        }
        AvailabilityStatus::Pending => {}
    }

    Ok(HttpResponse::Ok().json(ApiResponse::success(updated)))
}

pub async fn remove(
    claims: Claims,
    path: web::Path<String>,
    availability_repo: web::Data<AvailabilityRepository>,
    reconciliation: web::Data<ReconciliationService>,
) -> Result<HttpResponse, AppError> {
    let id = path.into_inner();
    let entry = availability_repo
        .find_by_id(&id)
        .await?
        .ok_or_else(|| AppError::NotFound("Availability not found".to_string()))?;

    if entry.user_id != claims.user_id() && !claims.is_admin() {
        return Err(AppError::Forbidden(
            "You can only delete your own availability".to_string(),
        ));
    }

    // Unwind the aggregate first; if that fails the entry stays visible
    if entry.status == AvailabilityStatus::Confirmed {
        reconciliation.reconcile_retract(&entry).await?;
    }

    availability_repo.delete(&id).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::<()>::message("Availability deleted")))
}
