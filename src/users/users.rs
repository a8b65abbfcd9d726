use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio_postgres::Row;

use crate::auth::{self, AdminUser, AuthUser, Role};
use crate::db_client::DbClient;
use crate::error::ApiError;

#[derive(Debug, Serialize)]
pub struct User {
	pub id: i32,
	pub email: String,
	pub name: String,
	pub role: Role,
}

#[derive(Debug, Deserialize)]
pub struct NewUser {
	pub email: String,
	#[serde(default)]
	pub name: String,
	pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct Credentials {
	pub email: String,
	pub password: String,
}

fn user_from_row(row: &Row) -> User {
	User {
		id: row.get("id"),
		email: row.get("email"),
		name: row.get("name"),
		role: Role::from_db(row.get("role")),
	}
}

/// Missing display name falls back to the email's local part.
fn display_name(email: &str, name: &str) -> String {
	let name = name.trim();
	if !name.is_empty() {
		return name.to_string();
	}
	email.split('@').next().unwrap_or(email).to_string()
}

fn validate_registration(input: &NewUser) -> Result<(), ApiError> {
	let email = input.email.trim();
	if email.is_empty() || !email.contains('@') {
		return Err(ApiError::Validation("a valid email is required".into()));
	}
	if input.password.len() < 6 {
		return Err(ApiError::Validation(
			"password must be at least 6 characters".into(),
		));
	}
	Ok(())
}

pub async fn register(db: State<DbClient>, input: Json<NewUser>) -> Result<Json<Value>, ApiError> {
	let input = input.0;
	validate_registration(&input)?;
	let email = input.email.trim().to_lowercase();
	let rows = db.query("SELECT id FROM users WHERE email=$1", &[&email]).await?;
	if !rows.is_empty() {
		return Err(ApiError::Validation("email is already registered".into()));
	}
	let name = display_name(&email, &input.name);
	let hash = auth::hash_password(&input.password)?;
	let row = db
		.query_one(
			"INSERT INTO users (email, name, password_hash, role) VALUES ($1, $2, $3, 'user')
			 RETURNING id, email, name, role",
			&[&email, &name, &hash],
		)
		.await?;
	let user = user_from_row(&row);
	let token = auth::issue_token(user.id, user.role)?;
	log::info!("user {} registered: {}", user.id, user.email);
	Ok(Json(json!({ "token": token, "user": user })))
}

pub async fn login(db: State<DbClient>, creds: Json<Credentials>) -> Result<Json<Value>, ApiError> {
	let creds = creds.0;
	let email = creds.email.trim().to_lowercase();
	let rows = db
		.query(
			"SELECT id, email, name, role, password_hash FROM users WHERE email=$1",
			&[&email],
		)
		.await?;
	let row = rows.first().ok_or(ApiError::Unauthorized)?;
	let hash: String = row.get("password_hash");
	if !auth::verify_password(&creds.password, &hash) {
		return Err(ApiError::Unauthorized);
	}
	let user = user_from_row(row);
	let token = auth::issue_token(user.id, user.role)?;
	Ok(Json(json!({ "token": token, "user": user })))
}

pub async fn profile(user: AuthUser, db: State<DbClient>) -> Result<Json<User>, ApiError> {
	let rows = db
		.query(
			"SELECT id, email, name, role FROM users WHERE id=$1",
			&[&user.user_id],
		)
		.await?;
	match rows.first() {
		Some(row) => Ok(Json(user_from_row(row))),
		None => Err(ApiError::NotFound("user")),
	}
}

pub async fn admin_list_users(
	_admin: AdminUser,
	db: State<DbClient>,
) -> Result<Json<Vec<User>>, ApiError> {
	let rows = db
		.query("SELECT id, email, name, role FROM users ORDER BY id", &[])
		.await?;
	Ok(Json(rows.iter().map(user_from_row).collect()))
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn display_name_falls_back_to_email_local_part() {
		assert_eq!(display_name("jane@example.com", "Jane Doe"), "Jane Doe");
		assert_eq!(display_name("jane@example.com", "  "), "jane");
		assert_eq!(display_name("jane@example.com", ""), "jane");
	}

	#[test]
	fn registration_rejects_bad_email_and_short_password() {
		let ok = NewUser {
			email: "jane@example.com".into(),
			name: String::new(),
			password: "secret1".into(),
		};
		assert!(validate_registration(&ok).is_ok());

		let bad_email = NewUser {
			email: "not-an-email".into(),
			name: String::new(),
			password: "secret1".into(),
		};
		assert!(validate_registration(&bad_email).is_err());

		let short = NewUser {
			email: "jane@example.com".into(),
			name: String::new(),
			password: "12345".into(),
		};
		assert!(validate_registration(&short).is_err());
	}
}
