use serde::Serialize;

use crate::response::ApiResponse;

#[derive(Serialize)]
pub struct Health {
    status: &'static str,
}

pub async fn healthcheck() -> ApiResponse<Health> {
    ApiResponse::ok(Health { status: "OK" }, "Health check passed")
}
