//! End-to-end scenarios over the real router and interceptor chain.

pub mod access_control;

use crate::api::models::files::FileResponse;
use axum::http::{StatusCode, header};
use axum_test::{
    TestRequest, TestServer,
    multipart::{MultipartForm, Part},
};

pub(crate) fn get(server: &TestServer, path: &str, cookie: &str) -> TestRequest {
    server.get(path).add_header(header::COOKIE, cookie.to_string())
}

pub(crate) fn post(server: &TestServer, path: &str, cookie: &str) -> TestRequest {
    server.post(path).add_header(header::COOKIE, cookie.to_string())
}

pub(crate) async fn upload(server: &TestServer, cookie: &str, name: &str, content: &[u8], tags: &str) -> FileResponse {
    let form = MultipartForm::new()
        .add_part("file", Part::bytes(content.to_vec()).file_name(name.to_string()))
        .add_text("tags", tags.to_string());
    let response = post(server, "/file/upload", cookie).multipart(form).await;
    response.assert_status(StatusCode::CREATED);
    response.json::<FileResponse>()
}
