use axum::{
	extract::{Path, Query, State},
	Json,
};
use hyper::StatusCode;
use postgres_from_row::FromRow;
use serde::{Deserialize, Serialize};

use crate::auth::AdminUser;
use crate::cars::images::{self, CarImage};
use crate::db_client::DbClient;
use crate::error::ApiError;
use crate::rental::availability::DateRange;

#[derive(Debug, Serialize, Deserialize, FromRow)]
pub struct Car {
	pub id: i32,
	pub make: String,
	pub model: String,
	pub year: i32,
	pub color: String,
	pub price_per_day: f64,
	pub available: bool,
	pub seats: i32,
	pub fuel_type: String,
	pub transmission: String,
	pub description: String,
}

#[derive(Debug, Serialize)]
pub struct CarWithImages {
	#[serde(flatten)]
	pub car: Car,
	pub images: Vec<CarImage>,
}

#[derive(Debug, Deserialize)]
pub struct CarInput {
	pub make: String,
	pub model: String,
	pub year: i32,
	pub color: String,
	pub price_per_day: f64,
	#[serde(default = "default_available")]
	pub available: bool,
	#[serde(default = "default_seats")]
	pub seats: i32,
	#[serde(default)]
	pub fuel_type: String,
	#[serde(default)]
	pub transmission: String,
	#[serde(default)]
	pub description: String,
}

fn default_available() -> bool {
	true
}

fn default_seats() -> i32 {
	5
}

#[derive(Debug, Deserialize)]
pub struct CarUpdate {
	pub make: Option<String>,
	pub model: Option<String>,
	pub year: Option<i32>,
	pub color: Option<String>,
	pub price_per_day: Option<f64>,
	pub available: Option<bool>,
	pub seats: Option<i32>,
	pub fuel_type: Option<String>,
	pub transmission: Option<String>,
	pub description: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ListFilter {
	pub q: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct AvailabilityWindow {
	pub start_date: chrono::NaiveDate,
	pub end_date: chrono::NaiveDate,
}

const CAR_COLUMNS: &str =
	"id, make, model, year, color, price_per_day, available, seats, fuel_type, transmission, description";

/// The substring filter the catalog pages apply: case-insensitive match on
/// make, model or color.
pub fn matches_keyword(car: &Car, keyword: &str) -> bool {
	let k = keyword.trim().to_lowercase();
	if k.is_empty() {
		return true;
	}
	[&car.make, &car.model, &car.color]
		.iter()
		.any(|field| field.to_lowercase().contains(&k))
}

fn validate_input(input: &CarInput) -> Result<(), ApiError> {
	if input.make.trim().is_empty() || input.model.trim().is_empty() {
		return Err(ApiError::Validation("make and model are required".into()));
	}
	if input.price_per_day <= 0.0 {
		return Err(ApiError::Validation("price per day must be positive".into()));
	}
	if input.year < 1950 || input.year > 2100 {
		return Err(ApiError::Validation("year is out of range".into()));
	}
	Ok(())
}

async fn with_images(db: &DbClient, cars: Vec<Car>) -> Result<Vec<CarWithImages>, ApiError> {
	let ids: Vec<i32> = cars.iter().map(|c| c.id).collect();
	let mut by_car = images::images_by_car(db, &ids).await?;
	Ok(cars
		.into_iter()
		.map(|car| {
			let images = by_car.remove(&car.id).unwrap_or_default();
			CarWithImages { car, images }
		})
		.collect())
}

pub async fn list_cars(
	db: State<DbClient>,
	filter: Query<ListFilter>,
) -> Result<Json<Vec<CarWithImages>>, ApiError> {
	let q = format!("SELECT {} FROM cars ORDER BY id", CAR_COLUMNS);
	let rows = db.query(q.as_str(), &[]).await?;
	let mut cars: Vec<Car> = rows.iter().map(Car::from_row).collect();
	if let Some(keyword) = &filter.q {
		cars.retain(|car| matches_keyword(car, keyword));
	}
	Ok(Json(with_images(&db, cars).await?))
}

/// Cars with no non-cancelled rental overlapping the requested window.
pub async fn available_cars(
	db: State<DbClient>,
	window: Query<AvailabilityWindow>,
) -> Result<Json<Vec<CarWithImages>>, ApiError> {
	// same validation as booking: a window in the past can never be booked
	let today = chrono::Utc::now().date_naive();
	let range = DateRange::new_booking(window.start_date, window.end_date, today)?;
	let q = format!(
		"SELECT {} FROM cars c
		 WHERE c.available AND NOT EXISTS (
		     SELECT 1 FROM rentals r
		     WHERE r.car_id = c.id AND r.status <> 'cancelled'
		       AND r.start_date <= $2 AND r.end_date >= $1
		 )
		 ORDER BY c.id",
		CAR_COLUMNS
	);
	let rows = db.query(q.as_str(), &[&range.start, &range.end]).await?;
	let cars: Vec<Car> = rows.iter().map(Car::from_row).collect();
	Ok(Json(with_images(&db, cars).await?))
}

pub async fn get_car(db: State<DbClient>, id: Path<i32>) -> Result<Json<CarWithImages>, ApiError> {
	let car = fetch_car(&db, id.0).await?;
	let images = images::images_by_car(&db, &[car.id])
		.await?
		.remove(&car.id)
		.unwrap_or_default();
	Ok(Json(CarWithImages { car, images }))
}

pub async fn fetch_car(db: &DbClient, id: i32) -> Result<Car, ApiError> {
	let q = format!("SELECT {} FROM cars WHERE id=$1", CAR_COLUMNS);
	let rows = db.query(q.as_str(), &[&id]).await?;
	match rows.first() {
		Some(row) => Ok(Car::from_row(row)),
		None => Err(ApiError::NotFound("car")),
	}
}

pub async fn create_car(
	_admin: AdminUser,
	db: State<DbClient>,
	input: Json<CarInput>,
) -> Result<Json<Car>, ApiError> {
	let input = input.0;
	validate_input(&input)?;
	let q = format!(
		"INSERT INTO cars (make, model, year, color, price_per_day, available, seats, fuel_type, transmission, description)
		 VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
		 RETURNING {}",
		CAR_COLUMNS
	);
	let row = db
		.query_one(
			q.as_str(),
			&[
				&input.make,
				&input.model,
				&input.year,
				&input.color,
				&input.price_per_day,
				&input.available,
				&input.seats,
				&input.fuel_type,
				&input.transmission,
				&input.description,
			],
		)
		.await?;
	let car = Car::from_row(&row);
	log::info!("car {} created: {} {}", car.id, car.make, car.model);
	Ok(Json(car))
}

pub async fn update_car(
	_admin: AdminUser,
	db: State<DbClient>,
	id: Path<i32>,
	update: Json<CarUpdate>,
) -> Result<Json<Car>, ApiError> {
	let mut car = fetch_car(&db, id.0).await?;
	let update = update.0;
	if let Some(make) = update.make {
		car.make = make;
	}
	if let Some(model) = update.model {
		car.model = model;
	}
	if let Some(year) = update.year {
		car.year = year;
	}
	if let Some(color) = update.color {
		car.color = color;
	}
	if let Some(price) = update.price_per_day {
		car.price_per_day = price;
	}
	if let Some(available) = update.available {
		car.available = available;
	}
	if let Some(seats) = update.seats {
		car.seats = seats;
	}
	if let Some(fuel_type) = update.fuel_type {
		car.fuel_type = fuel_type;
	}
	if let Some(transmission) = update.transmission {
		car.transmission = transmission;
	}
	if let Some(description) = update.description {
		car.description = description;
	}
	db.execute(
		"UPDATE cars SET make=$1, model=$2, year=$3, color=$4, price_per_day=$5, available=$6,
		 seats=$7, fuel_type=$8, transmission=$9, description=$10 WHERE id=$11",
		&[
			&car.make,
			&car.model,
			&car.year,
			&car.color,
			&car.price_per_day,
			&car.available,
			&car.seats,
			&car.fuel_type,
			&car.transmission,
			&car.description,
			&car.id,
		],
	)
	.await?;
	Ok(Json(car))
}

pub async fn delete_car(
	_admin: AdminUser,
	db: State<DbClient>,
	id: Path<i32>,
) -> Result<StatusCode, ApiError> {
	let deleted = db.execute("DELETE FROM cars WHERE id=$1", &[&id.0]).await?;
	if deleted == 0 {
		return Err(ApiError::NotFound("car"));
	}
	log::info!("car {} deleted", id.0);
	Ok(StatusCode::OK)
}

#[cfg(test)]
mod tests {
	use super::*;

	fn car(make: &str, model: &str, color: &str) -> Car {
		Car {
			id: 1,
			make: make.to_string(),
			model: model.to_string(),
			year: 2023,
			color: color.to_string(),
			price_per_day: 120.0,
			available: true,
			seats: 5,
			fuel_type: "electric".to_string(),
			transmission: "automatic".to_string(),
			description: String::new(),
		}
	}

	#[test]
	fn keyword_filter_is_case_insensitive_substring() {
		let tesla = car("Tesla", "Model S", "Red");
		assert!(matches_keyword(&tesla, "tesla"));
		assert!(matches_keyword(&tesla, "MODEL"));
		assert!(matches_keyword(&tesla, "red"));
		assert!(matches_keyword(&tesla, "odel"));
		assert!(!matches_keyword(&tesla, "bmw"));
	}

	#[test]
	fn blank_keyword_matches_everything() {
		let tesla = car("Tesla", "Model S", "Red");
		assert!(matches_keyword(&tesla, ""));
		assert!(matches_keyword(&tesla, "   "));
	}

	#[test]
	fn car_input_validation() {
		let ok = CarInput {
			make: "BMW".into(),
			model: "M8".into(),
			year: 2024,
			color: "Black".into(),
			price_per_day: 185.0,
			available: true,
			seats: 4,
			fuel_type: String::new(),
			transmission: String::new(),
			description: String::new(),
		};
		assert!(validate_input(&ok).is_ok());

		let mut bad = CarInput { make: " ".into(), ..ok };
		assert!(validate_input(&bad).is_err());
		bad.make = "BMW".into();
		bad.price_per_day = 0.0;
		assert!(validate_input(&bad).is_err());
		bad.price_per_day = 185.0;
		bad.year = 1800;
		assert!(validate_input(&bad).is_err());
	}
}
