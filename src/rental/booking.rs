use axum::{
	extract::{Path, State},
	Json,
};
use chrono::{DateTime, Datelike, NaiveDate, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio_postgres::{error::SqlState, Row};

use crate::auth::{AdminUser, AuthUser};
use crate::db_client::DbClient;
use crate::error::ApiError;
use crate::rental::availability::DateRange;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RentalStatus {
	Pending,
	Active,
	Completed,
	Cancelled,
}

impl RentalStatus {
	pub fn as_str(&self) -> &'static str {
		match self {
			RentalStatus::Pending => "pending",
			RentalStatus::Active => "active",
			RentalStatus::Completed => "completed",
			RentalStatus::Cancelled => "cancelled",
		}
	}

	/// The status column is only ever written through `as_str`, so an
	/// unknown value can only mean a manual edit; treat it as pending.
	pub fn from_db(s: &str) -> RentalStatus {
		match s {
			"active" => RentalStatus::Active,
			"completed" => RentalStatus::Completed,
			"cancelled" => RentalStatus::Cancelled,
			_ => RentalStatus::Pending,
		}
	}

	/// Completed and already-cancelled rentals stay as they are.
	pub fn cancellable(&self) -> bool {
		matches!(self, RentalStatus::Pending | RentalStatus::Active)
	}
}

#[derive(Debug, Serialize)]
pub struct Rental {
	pub id: i32,
	pub reference: String,
	pub user_id: i32,
	pub car_id: i32,
	pub start_date: NaiveDate,
	pub end_date: NaiveDate,
	pub total_price: f64,
	pub status: RentalStatus,
	pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct CarSummary {
	pub id: i32,
	pub make: String,
	pub model: String,
	pub year: i32,
	pub price_per_day: f64,
}

#[derive(Debug, Serialize)]
pub struct RentalWithCar {
	#[serde(flatten)]
	pub rental: Rental,
	pub car: CarSummary,
}

#[derive(Debug, Deserialize)]
pub struct NewRental {
	pub car_id: i32,
	pub start_date: NaiveDate,
	pub end_date: NaiveDate,
}

fn rental_from_row(row: &Row) -> Rental {
	let status: String = row.get("status");
	Rental {
		id: row.get("id"),
		reference: row.get("reference"),
		user_id: row.get("user_id"),
		car_id: row.get("car_id"),
		start_date: row.get("start_date"),
		end_date: row.get("end_date"),
		total_price: row.get("total_price"),
		status: RentalStatus::from_db(&status),
		created_at: row.get("created_at"),
	}
}

fn rental_with_car_from_row(row: &Row) -> RentalWithCar {
	RentalWithCar {
		rental: rental_from_row(row),
		car: CarSummary {
			id: row.get("car_id"),
			make: row.get("make"),
			model: row.get("model"),
			year: row.get("year"),
			price_per_day: row.get("price_per_day"),
		},
	}
}

fn booking_reference(year: i32, serial: u32) -> String {
	format!("BK-{}-{:04}", year, serial)
}

/// Every non-cancelled rental of the car blocks its day range.
pub async fn unavailable_ranges_for(db: &DbClient, car_id: i32) -> Result<Vec<DateRange>, ApiError> {
	let rows = db
		.query(
			"SELECT start_date, end_date FROM rentals
			 WHERE car_id=$1 AND status <> 'cancelled'
			 ORDER BY start_date",
			&[&car_id],
		)
		.await?;
	Ok(rows
		.iter()
		.map(|row| DateRange {
			start: row.get("start_date"),
			end: row.get("end_date"),
		})
		.collect())
}

pub async fn unavailable_dates(
	db: State<DbClient>,
	car_id: Path<i32>,
) -> Result<Json<Vec<DateRange>>, ApiError> {
	let rows = db.query("SELECT id FROM cars WHERE id=$1", &[&car_id.0]).await?;
	if rows.is_empty() {
		return Err(ApiError::NotFound("car"));
	}
	Ok(Json(unavailable_ranges_for(&db, car_id.0).await?))
}

pub async fn create_rental(
	user: AuthUser,
	db: State<DbClient>,
	input: Json<NewRental>,
) -> Result<Json<Rental>, ApiError> {
	let input = input.0;
	let today = Utc::now().date_naive();
	let range = DateRange::new_booking(input.start_date, input.end_date, today)?;

	let rows = db
		.query(
			"SELECT price_per_day, available FROM cars WHERE id=$1",
			&[&input.car_id],
		)
		.await?;
	let car_row = rows.first().ok_or(ApiError::NotFound("car"))?;
	let price_per_day: f64 = car_row.get("price_per_day");
	let available: bool = car_row.get("available");
	if !available {
		return Err(ApiError::Validation("car is not open for booking".into()));
	}

	let unavailable = unavailable_ranges_for(&db, input.car_id).await?;
	let conflicts = range.conflicts(&unavailable);
	if !conflicts.is_empty() {
		return Err(ApiError::DatesUnavailable(conflicts));
	}

	let total_price = range.quote(price_per_day);
	// The conflict check above is advisory: two requests can both pass it
	// before either insert lands. The rentals_no_overlap exclusion
	// constraint is what actually arbitrates the race, so a violation here
	// is reported the same way as a conflict seen up front.
	let mut attempts = 0;
	let row = loop {
		let reference = booking_reference(today.year(), rand::thread_rng().gen_range(0..10_000));
		let insert = db
			.query_one(
				"INSERT INTO rentals (reference, user_id, car_id, start_date, end_date, total_price, status)
				 VALUES ($1, $2, $3, $4, $5, $6, 'pending')
				 RETURNING id, reference, user_id, car_id, start_date, end_date, total_price, status, created_at",
				&[
					&reference,
					&user.user_id,
					&input.car_id,
					&range.start,
					&range.end,
					&total_price,
				],
			)
			.await;
		match insert {
			Ok(row) => break row,
			Err(e) if e.code() == Some(&SqlState::EXCLUSION_VIOLATION) => {
				let unavailable = unavailable_ranges_for(&db, input.car_id).await?;
				return Err(ApiError::DatesUnavailable(range.conflicts(&unavailable)));
			}
			// reference collided; 10k serials per year makes that routine
			Err(e) if e.code() == Some(&SqlState::UNIQUE_VIOLATION) && attempts < 8 => {
				attempts += 1;
			}
			Err(e) => return Err(e.into()),
		}
	};
	let rental = rental_from_row(&row);
	log::info!(
		"rental {} created: user {} car {} {} to {} at {}",
		rental.reference,
		rental.user_id,
		rental.car_id,
		rental.start_date,
		rental.end_date,
		rental.total_price
	);
	Ok(Json(rental))
}

const RENTAL_WITH_CAR: &str =
	"SELECT r.id, r.reference, r.user_id, r.car_id, r.start_date, r.end_date, r.total_price,
	        r.status, r.created_at, c.make, c.model, c.year, c.price_per_day
	 FROM rentals r JOIN cars c ON c.id = r.car_id";

pub async fn list_my_rentals(
	user: AuthUser,
	db: State<DbClient>,
) -> Result<Json<Vec<RentalWithCar>>, ApiError> {
	let q = format!("{} WHERE r.user_id=$1 ORDER BY r.created_at DESC", RENTAL_WITH_CAR);
	let rows = db.query(q.as_str(), &[&user.user_id]).await?;
	Ok(Json(rows.iter().map(rental_with_car_from_row).collect()))
}

pub async fn active_rentals(
	user: AuthUser,
	db: State<DbClient>,
) -> Result<Json<Vec<RentalWithCar>>, ApiError> {
	let q = format!(
		"{} WHERE r.user_id=$1 AND r.status IN ('pending', 'active') ORDER BY r.start_date",
		RENTAL_WITH_CAR
	);
	let rows = db.query(q.as_str(), &[&user.user_id]).await?;
	Ok(Json(rows.iter().map(rental_with_car_from_row).collect()))
}

pub async fn cancel_rental(
	user: AuthUser,
	db: State<DbClient>,
	id: Path<i32>,
) -> Result<Json<Value>, ApiError> {
	let rows = db
		.query("SELECT user_id, status FROM rentals WHERE id=$1", &[&id.0])
		.await?;
	let row = rows.first().ok_or(ApiError::NotFound("rental"))?;
	let owner_id: i32 = row.get("user_id");
	let status = RentalStatus::from_db(row.get("status"));
	if owner_id != user.user_id && !user.is_admin() {
		return Err(ApiError::Forbidden);
	}
	if !status.cancellable() {
		return Err(ApiError::Validation(
			"only pending or active rentals can be cancelled".into(),
		));
	}
	db.execute("UPDATE rentals SET status='cancelled' WHERE id=$1", &[&id.0])
		.await?;
	log::info!("rental {} cancelled by user {}", id.0, user.user_id);
	Ok(Json(json!({
		"id": id.0,
		"status": RentalStatus::Cancelled,
	})))
}

pub async fn admin_list_rentals(
	_admin: AdminUser,
	db: State<DbClient>,
) -> Result<Json<Vec<RentalWithCar>>, ApiError> {
	let q = format!("{} ORDER BY r.created_at DESC", RENTAL_WITH_CAR);
	let rows = db.query(q.as_str(), &[]).await?;
	Ok(Json(rows.iter().map(rental_with_car_from_row).collect()))
}

/// Dashboard figures: fleet size, customer count, rentals per status and
/// realized revenue (active + completed).
pub async fn admin_stats(_admin: AdminUser, db: State<DbClient>) -> Result<Json<Value>, ApiError> {
	let cars: i64 = db.query_one("SELECT count(*) FROM cars", &[]).await?.get(0);
	let customers: i64 = db
		.query_one("SELECT count(*) FROM users WHERE role='user'", &[])
		.await?
		.get(0);
	let rows = db
		.query(
			"SELECT status, count(*), COALESCE(sum(total_price), 0) FROM rentals GROUP BY status",
			&[],
		)
		.await?;
	let mut by_status = json!({
		"pending": 0i64, "active": 0i64, "completed": 0i64, "cancelled": 0i64,
	});
	let mut revenue = 0.0;
	for row in rows {
		let status: String = row.get(0);
		let count: i64 = row.get(1);
		let amount: f64 = row.get(2);
		by_status[&status] = json!(count);
		if matches!(
			RentalStatus::from_db(&status),
			RentalStatus::Active | RentalStatus::Completed
		) {
			revenue += amount;
		}
	}
	Ok(Json(json!({
		"cars": cars,
		"customers": customers,
		"rentals": by_status,
		"revenue": revenue,
	})))
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn status_round_trips_through_its_text_form() {
		for status in [
			RentalStatus::Pending,
			RentalStatus::Active,
			RentalStatus::Completed,
			RentalStatus::Cancelled,
		] {
			assert_eq!(RentalStatus::from_db(status.as_str()), status);
		}
	}

	#[test]
	fn only_pending_and_active_rentals_are_cancellable() {
		assert!(RentalStatus::Pending.cancellable());
		assert!(RentalStatus::Active.cancellable());
		assert!(!RentalStatus::Completed.cancellable());
		assert!(!RentalStatus::Cancelled.cancellable());
	}

	#[test]
	fn status_serializes_lowercase() {
		assert_eq!(
			serde_json::to_string(&RentalStatus::Cancelled).unwrap(),
			"\"cancelled\""
		);
	}

	#[test]
	fn booking_reference_format() {
		assert_eq!(booking_reference(2025, 1), "BK-2025-0001");
		assert_eq!(booking_reference(2025, 9999), "BK-2025-9999");
	}
}
