use axum::{extract::State, Extension};

use crate::auth::AuthUser;
use crate::db::{queries, AppState};
use crate::error::{msg, AppError, OptionExt, Result};
use crate::extractors::{Json, Path};
use crate::models::{Booking, CreateBooking, Subject, UserRole};

/// `GET /subjects` - all teachable subjects.
pub async fn list_subjects(State(state): State<AppState>) -> Result<Json<Vec<Subject>>> {
    let conn = state.db.get()?;
    let subjects = queries::list_subjects(&conn)?;
    Ok(Json(subjects))
}

/// `POST /bookings` - student schedules a session with a teacher.
pub async fn create_booking(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Json(request): Json<CreateBooking>,
) -> Result<Json<Booking>> {
    auth.require_role(UserRole::Student)?;

    if request.total_price <= 0 {
        return Err(AppError::BadRequest("Price must be positive".into()));
    }
    if request.duration_minutes <= 0 {
        return Err(AppError::BadRequest("Duration must be positive".into()));
    }

    let conn = state.db.get()?;

    let teacher = queries::get_user_by_id(&conn, &request.teacher_id)?
        .or_not_found(msg::USER_NOT_FOUND)?;
    if teacher.role != UserRole::Teacher {
        return Err(AppError::BadRequest("teacher_id does not refer to a teacher".into()));
    }

    queries::get_subject_by_id(&conn, &request.subject_id)?
        .or_not_found(msg::SUBJECT_NOT_FOUND)?;

    let booking = queries::create_booking(&conn, &auth.user_id, &request)?;

    Ok(Json(booking))
}

/// `GET /bookings` - bookings where the caller is a party.
pub async fn list_bookings(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
) -> Result<Json<Vec<Booking>>> {
    let conn = state.db.get()?;
    let bookings = queries::list_bookings_for_user(&conn, &auth.user_id)?;
    Ok(Json(bookings))
}

/// `POST /bookings/{id}/confirm` - direct teacher confirmation,
/// the non-payment path into CONFIRMED.
pub async fn confirm_booking(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(booking_id): Path<String>,
) -> Result<Json<Booking>> {
    auth.require_role(UserRole::Teacher)?;

    let conn = state.db.get()?;

    let booking = queries::get_booking_by_id(&conn, &booking_id)?
        .or_not_found(msg::BOOKING_NOT_FOUND)?;
    if booking.teacher_id != auth.user_id {
        return Err(AppError::Forbidden(msg::NOT_BOOKING_PARTY.into()));
    }

    if !queries::confirm_booking(&conn, &booking.id)? {
        return Err(AppError::Conflict("Booking is not pending".into()));
    }

    let updated = queries::get_booking_by_id(&conn, &booking.id)?
        .or_not_found(msg::BOOKING_NOT_FOUND)?;
    Ok(Json(updated))
}

/// `POST /bookings/{id}/cancel` - either party may cancel a booking that
/// has not reached a terminal state.
pub async fn cancel_booking(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(booking_id): Path<String>,
) -> Result<Json<Booking>> {
    let conn = state.db.get()?;

    let booking = queries::get_booking_by_id(&conn, &booking_id)?
        .or_not_found(msg::BOOKING_NOT_FOUND)?;
    if booking.student_id != auth.user_id && booking.teacher_id != auth.user_id {
        return Err(AppError::Forbidden(msg::NOT_BOOKING_PARTY.into()));
    }

    if !queries::cancel_booking(&conn, &booking.id)? {
        return Err(AppError::Conflict("Booking is already in a terminal state".into()));
    }

    let updated = queries::get_booking_by_id(&conn, &booking.id)?
        .or_not_found(msg::BOOKING_NOT_FOUND)?;
    Ok(Json(updated))
}
