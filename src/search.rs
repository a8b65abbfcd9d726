use axum::{extract::State, Json};
use postgres_from_row::FromRow;

use crate::cars::cars::{matches_keyword, Car};
use crate::db_client::DbClient;
use crate::error::ApiError;

/// Substring hit, or a near-miss within two edits of make, model or color.
pub fn keyword_matches(keyword: &str, car: &Car) -> bool {
	let k = keyword.trim().to_lowercase();
	if k.is_empty() {
		return false;
	}
	if matches_keyword(car, &k) {
		return true;
	}
	[&car.make, &car.model, &car.color]
		.iter()
		.any(|field| levenshtein::levenshtein(&field.to_lowercase(), &k) <= 2)
}

pub async fn search(db: State<DbClient>, keyword: Json<String>) -> Result<Json<Vec<Car>>, ApiError> {
	let keyword = keyword.0;
	let rows = db
		.query(
			"SELECT id, make, model, year, color, price_per_day, available, seats,
			        fuel_type, transmission, description
			 FROM cars ORDER BY id",
			&[],
		)
		.await?;
	let hits = rows
		.iter()
		.map(Car::from_row)
		.filter(|car| keyword_matches(&keyword, car))
		.collect();
	Ok(Json(hits))
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
	fn substring_and_near_miss_both_match() {
		let tesla = car("Tesla", "Model S", "Red");
		assert!(keyword_matches("tesla", &tesla));
		assert!(keyword_matches("esla", &tesla));
		// one edit away from "tesla"
		assert!(keyword_matches("tesal", &tesla));
		assert!(!keyword_matches("ferrari", &tesla));
	}

	#[test]
	fn empty_keyword_matches_nothing() {
		let tesla = car("Tesla", "Model S", "Red");
		assert!(!keyword_matches("", &tesla));
		assert!(!keyword_matches("  ", &tesla));
	}
}
