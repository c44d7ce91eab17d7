use std::error::Error as StdError;

use axum::{
    Json,
    extract::{State, rejection::JsonRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};

use crate::{
    application::{
        error::ErrorReport,
        render::{RenderError, RenderFailure, RenderResponse},
    },
    domain::{error::ValidationError, request::RenderRequest},
};

use super::{HttpState, models::RenderBody};

const SERVICE_RUNNING: &str = "LaTeX Rendering Service is running.";

pub(super) async fn health() -> Json<RenderResponse> {
    Json(RenderResponse::message(SERVICE_RUNNING))
}

pub(super) async fn render(
    State(state): State<HttpState>,
    payload: Result<Json<RenderBody>, JsonRejection>,
) -> Response {
    // Unreadable bodies are reported the same way as a missing field.
    let body = match payload {
        Ok(Json(body)) => body,
        Err(rejection) => {
            let err = RenderError::from(ValidationError::MissingMarkup);
            let failure = state.render.classify(&err, "");
            return failure_response(failure, &rejection);
        }
    };

    let request = match RenderRequest::parse(body.latex_code.as_deref(), body.requested_format())
    {
        Ok(request) => request,
        Err(err) => {
            let err = RenderError::from(err);
            let failure = state.render.classify(&err, "");
            return failure_response(failure, &err);
        }
    };

    match state.render.render(&request).await {
        Ok(image) => (StatusCode::OK, Json(RenderResponse::success(image.payload()))).into_response(),
        Err(err) => {
            let failure = state.render.classify(&err, request.markup());
            failure_response(failure, &err)
        }
    }
}

fn failure_response(failure: RenderFailure, error: &dyn StdError) -> Response {
    let status = failure.status;
    let mut response = (status, Json(RenderResponse::from(failure))).into_response();
    ErrorReport::from_error("infra::http::render", status, error).attach(&mut response);
    response
}
