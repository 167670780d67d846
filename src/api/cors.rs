use axum::{
    body::Body,
    http::{
        header::{
            HeaderValue, ACCESS_CONTROL_ALLOW_HEADERS, ACCESS_CONTROL_ALLOW_METHODS,
            ACCESS_CONTROL_ALLOW_ORIGIN,
        },
        Response,
    },
};

// any response gets these headers
pub fn add_cors_headers(resp: &mut Response<Body>) {
    let headers = resp.headers_mut();

    headers.insert(ACCESS_CONTROL_ALLOW_ORIGIN, HeaderValue::from_static("*"));
    headers.insert(
        ACCESS_CONTROL_ALLOW_METHODS,
        HeaderValue::from_static("GET, POST, PUT, DELETE, OPTIONS"),
    );
    headers.insert(
        ACCESS_CONTROL_ALLOW_HEADERS,
        HeaderValue::from_static("Content-Type, Authorization, Accept"),
    );
}

// handle OPTIONS preflight requests
pub fn cors_preflight() -> Response<Body> {
    let mut resp = Response::builder()
        .status(204)
        .body(Body::empty())
        .unwrap();
    add_cors_headers(&mut resp);
    resp
}
