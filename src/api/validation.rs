use actix_multipart::form::MultipartFormConfig;
use actix_web::HttpResponse;
use serde::Serialize;

#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub fields: serde_json::Value,
}

fn bad_request(error: &str, fields: serde_json::Value) -> actix_web::Error {
    let error_response = ErrorResponse {
        error: error.to_string(),
        fields,
    };
    actix_web::error::InternalError::from_response("", HttpResponse::BadRequest().json(error_response))
        .into()
}

/// Creates a configured QueryConfig with standardized error handling for the entire project
pub fn query_config() -> actix_web_validator::QueryConfig {
    actix_web_validator::QueryConfig::default().error_handler(|err, _req| {
        let mut fields = serde_json::Map::new();

        match err {
            actix_web_validator::Error::Validate(validation_errors) => {
                for (field, errors) in validation_errors.field_errors() {
                    let messages: Vec<String> = errors
                        .iter()
                        .map(|e| {
                            e.message
                                .as_ref()
                                .map(|m| m.to_string())
                                .unwrap_or_else(|| format!("Validation error in field: {}", field))
                        })
                        .collect();
                    fields.insert(field.to_string(), serde_json::json!({"errors": messages}));
                }

                bad_request("Validation failed", serde_json::Value::Object(fields))
            }
            _ => {
                fields.insert(
                    "message".to_string(),
                    serde_json::json!("Invalid query parameters"),
                );
                bad_request("Request validation failed", serde_json::Value::Object(fields))
            }
        }
    })
}

/// Creates a MultipartFormConfig with the upload size limit and the shared error shape
pub fn multipart_config(max_payload_size: usize) -> MultipartFormConfig {
    MultipartFormConfig::default()
        .total_limit(max_payload_size)
        .memory_limit(max_payload_size)
        .error_handler(|err, _req| {
            bad_request(
                "Request validation failed",
                serde_json::json!({
                    "message": err.to_string(),
                    "expected": "multipart form with `kind` (menu_translation | photo_mask) and `file`",
                }),
            )
        })
}
