pub mod admin;
pub mod public;
pub mod salesperson;

use axum::{
    http::header,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};

use crate::keys::{Export, ExportFormat};

/// Body for the enable/disable endpoints.
#[derive(Debug, Deserialize)]
pub struct SetActive {
    pub is_active: bool,
}

#[derive(Debug, Default, Deserialize)]
pub struct ExportQuery {
    #[serde(default)]
    pub format: ExportFormat,
}

#[derive(Serialize)]
pub struct Deleted {
    pub deleted: bool,
}

fn export_response(export: Export) -> Response {
    (
        [
            (header::CONTENT_TYPE, export.content_type.to_string()),
            (
                header::CONTENT_DISPOSITION,
                crate::util::attachment(&export.filename),
            ),
        ],
        export.body,
    )
        .into_response()
}
