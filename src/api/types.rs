//! Request and response shapes of the JSON API.

use axum::extract::rejection::JsonRejection;
use axum::Json;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::db::entities::{academic_year, class, student};
use crate::error::{Result, ServerError};
use crate::promotion::{AttendanceSummary, PromotionDecision, StudentProposal};

// ============================================================================
// Envelope
// ============================================================================

/// Every response body is `{ success, data?, message? }`
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl<T> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            message: None,
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            message: Some(message.into()),
        }
    }
}

/// Decode a JSON body into `T`, mapping every failure to a 400.
///
/// Handlers take `Result<Json<Value>, JsonRejection>` so malformed bodies get
/// the envelope instead of axum's plain-text rejection.
pub fn parse_body<T: DeserializeOwned>(body: std::result::Result<Json<Value>, JsonRejection>) -> Result<T> {
    let Json(value) = body.map_err(|e| ServerError::Validation(e.body_text()))?;
    serde_json::from_value(value).map_err(|e| ServerError::Validation(e.to_string()))
}

/// `field` must be present and hold a JSON array
fn require_array(value: &Value, field: &str) -> Result<()> {
    match value.get(field) {
        Some(Value::Array(_)) => Ok(()),
        _ => Err(ServerError::Validation(format!("{} must be an array", field))),
    }
}

/// Like [`parse_body`], but first checks that `field` is an array so the
/// caller gets a precise message rather than a serde error.
pub fn parse_batch_body<T: DeserializeOwned>(
    body: std::result::Result<Json<Value>, JsonRejection>,
    field: &str,
) -> Result<T> {
    let Json(value) = body.map_err(|e| ServerError::Validation(e.body_text()))?;
    require_array(&value, field)?;
    serde_json::from_value(value).map_err(|e| ServerError::Validation(e.to_string()))
}

// ============================================================================
// Request Types
// ============================================================================

/// POST /auth/login request body
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

/// PATCH /homeroom/promote-students request body
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HomeroomPromoteRequest {
    pub promotions: Vec<PromotionDecision>,
    pub target_class_id: Option<i32>,
}

/// PATCH /admin/promote-students/process request body
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminPromoteRequest {
    pub class_id: i32,
    pub target_class_id: Option<i32>,
    pub promotions: Vec<PromotionDecision>,
}

/// PATCH /homeroom/propose-students request body
#[derive(Debug, Deserialize)]
pub struct ProposeRequest {
    pub proposals: Vec<PromotionDecision>,
}

/// PATCH /admin/class-history/:id request body
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryCorrectionRequest {
    pub naik_kelas: Option<bool>,
    pub nilai_akhir: Option<f64>,
}

/// Query params for the admin review queue
#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct PendingQuery {
    pub class_id: Option<i32>,
}

// ============================================================================
// Response Types
// ============================================================================

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub token: String,
    pub username: String,
    pub role: &'static str,
}

/// A student as shown to a reviewer: the student row plus its scores
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProposalView {
    #[serde(flatten)]
    pub student: student::Model,
    pub nilai_akhir: f64,
    pub attendance_summary: AttendanceSummary,
}

impl ProposalView {
    pub fn new(student: student::Model, proposal: &StudentProposal) -> Self {
        Self {
            student,
            nilai_akhir: proposal.average_final_score,
            attendance_summary: proposal.attendance,
        }
    }
}

/// GET /homeroom/my-students-for-promotion response data
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RosterView {
    pub class: class::Model,
    pub academic_year: academic_year::Model,
    pub students: Vec<ProposalView>,
}
