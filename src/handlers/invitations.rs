use axum::{
    extract::{Json, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::post,
    Router,
};
use serde::Deserialize;
use serde_json::json;
use validator::Validate;

use crate::errors::ServiceError;
use crate::handlers::AppState;
use crate::models::InvitationStatus;
use crate::services::invitations::{InvitationConfirmation, InvitationRejection};

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ConfirmInvitationRequest {
    #[validate(length(min = 1))]
    pub token: String,
    #[validate(email)]
    pub email: String,
}

fn rejection_status(rejection: InvitationRejection) -> StatusCode {
    match rejection {
        InvitationRejection::NotFound => StatusCode::NOT_FOUND,
        InvitationRejection::Expired
        | InvitationRejection::NotPending(InvitationStatus::Expired) => StatusCode::GONE,
        InvitationRejection::NotPending(_) | InvitationRejection::AlreadyAffiliated => {
            StatusCode::CONFLICT
        }
        InvitationRejection::CodeUnavailable => StatusCode::SERVICE_UNAVAILABLE,
    }
}

async fn confirm_invitation(
    State(state): State<AppState>,
    Json(request): Json<ConfirmInvitationRequest>,
) -> Result<Response, ServiceError> {
    request.validate()?;

    let confirmation = state
        .services
        .invitations
        .confirm(&request.token, &request.email)
        .await?;

    Ok(match confirmation {
        InvitationConfirmation::Accepted {
            affiliate,
            user_created,
        } => (
            StatusCode::OK,
            Json(json!({
                "success": true,
                "message": "Convite aceito! Você agora é afiliado desta loja",
                "affiliateId": affiliate.id,
                "inviteCode": affiliate.invite_code,
                "companyId": affiliate.company_relationed,
                "userCreated": user_created,
            })),
        )
            .into_response(),
        InvitationConfirmation::Rejected(rejection) => (
            rejection_status(rejection),
            Json(json!({
                "success": false,
                "error": rejection.code(),
                "message": rejection.message(),
            })),
        )
            .into_response(),
    })
}

pub fn invitation_routes() -> Router<AppState> {
    Router::new().route("/confirm", post(confirm_invitation))
}
