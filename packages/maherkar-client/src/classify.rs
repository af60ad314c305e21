//! HTTP error classification.
//!
//! The backend reports failures in several shapes:
//!
//! ```text
//! {"phone": ["شماره تلفن موجود نیست"]}               serializer raised, unwrapped
//! {"Detail": {"phone": ["... already exists."]}}      serializer errors under Detail
//! {"code": ["Invalid OTP code."]}                     wrong code
//! {"non_field_errors": ["Inactive OTP"]}              expired challenge
//! {"detail": "Not found."}                            unknown token (404)
//! {"error": "کاربر فعال نیست"}                        deactivated account (401)
//! {"error_code": "phone_not_found", ...}              typed errors, preferred
//! ```
//!
//! Checks run in priority order; the first match wins.

use serde_json::{Map, Value};

use otp_flow::AuthApiError;

/// Which endpoint produced the response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    IssueLoginOtp,
    IssueRegisterOtp,
    ValidateOtp,
    CheckPhone,
}

const PHONE_NOT_FOUND_MESSAGES: &[&str] = &["شماره تلفن موجود نیست", "phone number does not exist"];
const DUPLICATE_MARKERS: &[&str] = &["already exists", "قبلاً ثبت شده", "تکراری"];
const INACTIVE_OTP: &str = "Inactive OTP";

/// Map a non-success response onto the collaborator error taxonomy.
pub fn classify(op: Operation, status: u16, body: &str) -> AuthApiError {
    let json: Value = serde_json::from_str(body).unwrap_or(Value::Null);
    let errors = error_object(&json);

    if let Some(error) = typed_error(&json) {
        return error;
    }

    let messages = collect_messages(&json);
    if messages
        .iter()
        .any(|m| PHONE_NOT_FOUND_MESSAGES.iter().any(|needle| m.contains(needle)))
    {
        return AuthApiError::PhoneNotFound;
    }

    if let Some(message) = errors.and_then(|e| field_message(e, "phone")) {
        if DUPLICATE_MARKERS.iter().any(|marker| message.contains(marker)) {
            return AuthApiError::DuplicatePhone;
        }
        return AuthApiError::Validation {
            field: Some("phone".to_string()),
            message,
        };
    }

    if errors.is_some_and(|e| e.contains_key("code")) {
        return AuthApiError::InvalidCode;
    }

    if op == Operation::ValidateOtp {
        if status == 404 || messages.iter().any(|m| m.contains(INACTIVE_OTP)) {
            return AuthApiError::ExpiredSession;
        }
        if status == 400 {
            return AuthApiError::InvalidCode;
        }
    }

    if (400..500).contains(&status) {
        if let Some(errors) = errors {
            for field in ["full_name", "user_type"] {
                if let Some(message) = field_message(errors, field) {
                    return AuthApiError::Validation {
                        field: Some(field.to_string()),
                        message,
                    };
                }
            }
        }
        if let Some(message) = messages.into_iter().next() {
            return AuthApiError::Validation {
                field: None,
                message,
            };
        }
    }

    AuthApiError::Unexpected {
        status,
        message: truncate(body, 200),
    }
}

fn typed_error(json: &Value) -> Option<AuthApiError> {
    let code = json
        .get("error_code")
        .or_else(|| json.get("Detail").and_then(|d| d.get("error_code")))
        .and_then(Value::as_str)?;

    match code {
        "phone_not_found" => Some(AuthApiError::PhoneNotFound),
        "duplicate_phone" => Some(AuthApiError::DuplicatePhone),
        "invalid_code" => Some(AuthApiError::InvalidCode),
        "otp_expired" | "expired_session" => Some(AuthApiError::ExpiredSession),
        _ => None,
    }
}

/// The map holding field errors: `Detail` when it is an object, else the root.
fn error_object(json: &Value) -> Option<&Map<String, Value>> {
    match json.get("Detail") {
        Some(Value::Object(detail)) => Some(detail),
        _ => json.as_object(),
    }
}

fn field_message(errors: &Map<String, Value>, field: &str) -> Option<String> {
    errors.get(field).and_then(first_message)
}

fn first_message(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Array(items) => items.iter().find_map(first_message),
        Value::Object(map) => map.values().find_map(first_message),
        _ => None,
    }
}

fn collect_messages(value: &Value) -> Vec<String> {
    let mut out = Vec::new();
    collect_into(value, &mut out);
    out
}

fn collect_into(value: &Value, out: &mut Vec<String>) {
    match value {
        Value::String(s) => out.push(s.clone()),
        Value::Array(items) => items.iter().for_each(|v| collect_into(v, out)),
        Value::Object(map) => map.values().for_each(|v| collect_into(v, out)),
        _ => {}
    }
}

fn truncate(body: &str, max_chars: usize) -> String {
    body.chars().take(max_chars).collect()
}
