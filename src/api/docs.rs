use std::sync::Arc;

use aide::{
    axum::{
        ApiRouter, IntoApiResponse,
        routing::{get, get_with},
    },
    openapi::OpenApi,
    scalar::Scalar,
    swagger::Swagger,
};
use axum::{Extension, Json, response::IntoResponse};

const SPEC_PATH: &str = "/docs/api.json";

pub fn docs_routes() -> ApiRouter {
    aide::generate::infer_responses(true);

    let router = ApiRouter::new()
        .api_route(
            "/",
            get_with(
                Scalar::new(SPEC_PATH)
                    .with_title("CommuteSense API")
                    .axum_handler(),
                |op| op.description("This documentation page."),
            ),
        )
        .api_route(
            "/swagger",
            get_with(
                Swagger::new(SPEC_PATH)
                    .with_title("CommuteSense API")
                    .axum_handler(),
                |op| op.description("Swagger UI for this API."),
            ),
        )
        .route("/api.json", get(serve_docs));

    aide::generate::infer_responses(false);

    router
}

async fn serve_docs(Extension(api): Extension<Arc<OpenApi>>) -> impl IntoApiResponse {
    Json(api.as_ref()).into_response()
}
