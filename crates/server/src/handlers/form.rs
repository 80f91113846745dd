//! Browser upload form.

use crate::error::ApiError;
use axum::http::Method;
use axum::response::{Html, IntoResponse, Response};

const UPLOAD_FORM: &str = r#"<!DOCTYPE html>
<html>
<head><title>cask</title></head>
<body>
<form action="/upload" enctype="multipart/form-data" method="post">
<input type="text" name="name" placeholder="application name">
<input type="file" name="zippedExtension" accept=".zip,application/zip">
<input type="submit" value="Upload">
</form>
</body>
</html>
"#;

/// Fallback for unmatched paths: GET serves the upload form.
pub async fn upload_page(method: Method) -> Response {
    if method == Method::GET || method == Method::HEAD {
        Html(UPLOAD_FORM).into_response()
    } else {
        ApiError::NotFound(format!("no route for {method}")).into_response()
    }
}
