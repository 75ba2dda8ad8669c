// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Health check endpoint.

use axum::Json;
use serde::Serialize;

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub service: &'static str,
}

/// API information response.
#[derive(Debug, Serialize)]
pub struct ApiInfoResponse {
    pub service: &'static str,
    pub version: &'static str,
    pub description: &'static str,
    pub endpoints: Vec<EndpointInfo>,
}

/// Endpoint information.
#[derive(Debug, Serialize)]
pub struct EndpointInfo {
    pub method: &'static str,
    pub path: &'static str,
    pub description: &'static str,
}

const ENDPOINTS: &[(&str, &str, &str)] = &[
    ("GET", "/api/v1/health", "Health check endpoint"),
    ("POST", "/api/v1/model", "Load an IFC model from a multipart upload"),
    ("POST", "/api/v1/model/url", "Load an IFC model from a URL"),
    ("GET", "/api/v1/model", "Model session status"),
    ("POST", "/api/v1/selection/pick", "Select the element under the pointer"),
    ("POST", "/api/v1/selection/element", "Select an element from the spatial tree"),
    ("POST", "/api/v1/selection/focus", "Zoom to the pending selection"),
    ("GET", "/api/v1/selection", "Pending selection and record form"),
    ("DELETE", "/api/v1/selection", "Cancel the pending selection"),
    ("PUT", "/api/v1/selection/form", "Update the record form"),
    ("POST", "/api/v1/records", "Register the pending selection"),
    ("GET", "/api/v1/records", "Records of the loaded model"),
    ("GET", "/api/v1/records/export", "Download the records as CSV"),
    ("GET", "/api/v1/log", "Activity log panel, optionally filtered"),
    ("GET", "/api/v1/log/export", "Download the session log as text"),
    ("GET", "/api/v1/tree", "Spatial tree, optionally filtered"),
];

/// GET /api/v1/health - Health check endpoint.
pub async fn check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
        service: "visor-ifc-server",
    })
}

/// GET / - API information endpoint.
pub async fn info() -> Json<ApiInfoResponse> {
    Json(ApiInfoResponse {
        service: "visor-ifc-server",
        version: env!("CARGO_PKG_VERSION"),
        description: "IFC element selection and construction status records",
        endpoints: ENDPOINTS
            .iter()
            .map(|&(method, path, description)| EndpointInfo {
                method,
                path,
                description,
            })
            .collect(),
    })
}
