use axum::{
	body::Body,
	extract::{Multipart, Path},
	response::IntoResponse,
	Json,
};
use hyper::StatusCode;
use serde_json::{json, Value};
use tokio::fs::File;
use tokio_util::io::ReaderStream;

use crate::auth::AuthUser;
use crate::error::ApiError;

const MAX_IMAGE_BYTES: usize = 5 * 1024 * 1024;

fn image_dir() -> String {
	std::env::var("IMAGE_DIR").unwrap_or_else(|_| "images".to_string())
}

fn extension_for(content_type: &str) -> Option<&'static str> {
	match content_type {
		"image/jpeg" | "image/jpg" => Some("jpg"),
		"image/png" => Some("png"),
		"image/gif" => Some("gif"),
		_ => None,
	}
}

/// Type and size are checked before anything touches the disk.
fn validate_upload(content_type: &str, len: usize) -> Result<&'static str, ApiError> {
	let ext = extension_for(content_type).ok_or_else(|| {
		ApiError::Validation("only jpeg, png or gif images are accepted".into())
	})?;
	if len > MAX_IMAGE_BYTES {
		return Err(ApiError::Validation("image size must be less than 5MB".into()));
	}
	Ok(ext)
}

fn safe_file_name(name: &str) -> bool {
	!name.is_empty() && !name.contains("..") && !name.contains('/') && !name.contains('\\')
}

/// `POST /upload`: multipart with an `image` field. Returns the relative URL
/// the gallery mutations then attach to a car.
pub async fn upload(user: AuthUser, mut multipart: Multipart) -> Result<Json<Value>, ApiError> {
	loop {
		let field = multipart
			.next_field()
			.await
			.map_err(|e| ApiError::Validation(format!("bad multipart body: {}", e)))?;
		let field = match field {
			Some(field) => field,
			None => break,
		};
		if field.name() != Some("image") {
			continue;
		}
		let content_type = field.content_type().unwrap_or_default().to_owned();
		let data = field
			.bytes()
			.await
			.map_err(|e| ApiError::Validation(format!("bad multipart body: {}", e)))?;
		let ext = validate_upload(&content_type, data.len())?;
		let img = image::load_from_memory(&data)
			.map_err(|_| ApiError::Validation("file is not a valid image".into()))?;

		let dir = image_dir();
		std::fs::create_dir_all(&dir)
			.map_err(|e| ApiError::Internal(anyhow::anyhow!("failed to create {}: {}", dir, e)))?;
		let name = format!("{}.{}", uuid::Uuid::new_v4(), ext);
		let path = format!("{}/{}", dir, name);
		img.save(&path)
			.map_err(|e| ApiError::Internal(anyhow::anyhow!("failed to save image: {}", e)))?;
		log::info!("user {} uploaded {} ({} bytes)", user.user_id, path, data.len());
		return Ok(Json(json!({ "imageUrl": format!("/images/{}", name) })));
	}
	Err(ApiError::Validation("multipart field `image` is required".into()))
}

pub async fn image_handler(file: Path<String>) -> Result<impl IntoResponse, ApiError> {
	if !safe_file_name(&file.0) {
		return Err(ApiError::Validation("invalid file name".into()));
	}
	let path = format!("{}/{}", image_dir(), file.0);
	match File::open(&path).await {
		Ok(f) => Ok((StatusCode::OK, Body::from_stream(ReaderStream::new(f)))),
		Err(_) => Err(ApiError::NotFound("image")),
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn accepted_types_map_to_extensions() {
		assert_eq!(validate_upload("image/jpeg", 100).unwrap(), "jpg");
		assert_eq!(validate_upload("image/png", 100).unwrap(), "png");
		assert_eq!(validate_upload("image/gif", 100).unwrap(), "gif");
	}

	#[test]
	fn other_types_are_rejected() {
		assert!(validate_upload("image/webp", 100).is_err());
		assert!(validate_upload("application/pdf", 100).is_err());
		assert!(validate_upload("", 100).is_err());
	}

	#[test]
	fn oversized_payloads_are_rejected() {
		assert!(validate_upload("image/png", MAX_IMAGE_BYTES).is_ok());
		assert!(validate_upload("image/png", MAX_IMAGE_BYTES + 1).is_err());
	}

	#[test]
	fn traversal_attempts_are_not_valid_file_names() {
		assert!(safe_file_name("car.png"));
		assert!(!safe_file_name("../etc/passwd"));
		assert!(!safe_file_name("a/b.png"));
		assert!(!safe_file_name("a\\b.png"));
		assert!(!safe_file_name(""));
	}
}
