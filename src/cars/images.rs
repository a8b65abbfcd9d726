use std::collections::HashMap;

use axum::{
	extract::{Path, State},
	Json,
};
use hyper::StatusCode;
use postgres_from_row::FromRow;
use serde::{Deserialize, Serialize};

use crate::auth::AdminUser;
use crate::db_client::DbClient;
use crate::error::ApiError;

#[derive(Debug, Serialize, Deserialize, FromRow)]
pub struct CarImage {
	pub id: i32,
	pub car_id: i32,
	pub image_url: String,
	pub is_primary: bool,
}

#[derive(Debug, Deserialize)]
pub struct NewImage {
	pub image_url: String,
	#[serde(default)]
	pub is_primary: bool,
}

const IMAGE_COLUMNS: &str = "id, car_id, image_url, is_primary";

/// A car's first image becomes the default display image whether or not the
/// caller asked for it.
fn primary_for_new_image(requested: bool, existing: i64) -> bool {
	requested || existing == 0
}

pub async fn images_by_car(
	db: &DbClient,
	car_ids: &[i32],
) -> Result<HashMap<i32, Vec<CarImage>>, ApiError> {
	let mut by_car: HashMap<i32, Vec<CarImage>> = HashMap::new();
	if car_ids.is_empty() {
		return Ok(by_car);
	}
	let q = format!(
		"SELECT {} FROM car_images WHERE car_id = ANY($1) ORDER BY id",
		IMAGE_COLUMNS
	);
	let rows = db.query(q.as_str(), &[&car_ids]).await?;
	for row in rows {
		let image = CarImage::from_row(&row);
		by_car.entry(image.car_id).or_default().push(image);
	}
	Ok(by_car)
}

pub async fn add_car_image(
	_admin: AdminUser,
	db: State<DbClient>,
	car_id: Path<i32>,
	input: Json<NewImage>,
) -> Result<Json<CarImage>, ApiError> {
	let car_id = car_id.0;
	let input = input.0;
	if input.image_url.trim().is_empty() {
		return Err(ApiError::Validation("image_url is required".into()));
	}
	let rows = db.query("SELECT id FROM cars WHERE id=$1", &[&car_id]).await?;
	if rows.is_empty() {
		return Err(ApiError::NotFound("car"));
	}
	let count_row = db
		.query_one("SELECT count(*) FROM car_images WHERE car_id=$1", &[&car_id])
		.await?;
	let existing: i64 = count_row.get(0);
	let is_primary = primary_for_new_image(input.is_primary, existing);
	if is_primary {
		db.execute(
			"UPDATE car_images SET is_primary=FALSE WHERE car_id=$1",
			&[&car_id],
		)
		.await?;
	}
	let q = format!(
		"INSERT INTO car_images (car_id, image_url, is_primary) VALUES ($1, $2, $3) RETURNING {}",
		IMAGE_COLUMNS
	);
	let row = db
		.query_one(q.as_str(), &[&car_id, &input.image_url, &is_primary])
		.await?;
	Ok(Json(CarImage::from_row(&row)))
}

pub async fn delete_car_image(
	_admin: AdminUser,
	db: State<DbClient>,
	image_id: Path<i32>,
) -> Result<StatusCode, ApiError> {
	let deleted = db
		.execute("DELETE FROM car_images WHERE id=$1", &[&image_id.0])
		.await?;
	if deleted == 0 {
		return Err(ApiError::NotFound("image"));
	}
	Ok(StatusCode::OK)
}

/// Single statement keeps the one-primary-per-car invariant: every image of
/// the car is rewritten, only the chosen one ends up flagged.
pub async fn set_primary_image(
	_admin: AdminUser,
	db: State<DbClient>,
	image_id: Path<i32>,
) -> Result<Json<CarImage>, ApiError> {
	let image_id = image_id.0;
	let rows = db
		.query("SELECT car_id FROM car_images WHERE id=$1", &[&image_id])
		.await?;
	let car_id: i32 = match rows.first() {
		Some(row) => row.get(0),
		None => return Err(ApiError::NotFound("image")),
	};
	db.execute(
		"UPDATE car_images SET is_primary = (id = $2) WHERE car_id = $1",
		&[&car_id, &image_id],
	)
	.await?;
	let q = format!("SELECT {} FROM car_images WHERE id=$1", IMAGE_COLUMNS);
	let row = db.query_one(q.as_str(), &[&image_id]).await?;
	Ok(Json(CarImage::from_row(&row)))
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn first_image_is_forced_primary() {
		assert!(primary_for_new_image(false, 0));
		assert!(primary_for_new_image(true, 0));
	}

	#[test]
	fn later_images_are_primary_only_on_request() {
		assert!(!primary_for_new_image(false, 3));
		assert!(primary_for_new_image(true, 3));
	}
}
