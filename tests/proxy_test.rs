//! End-to-end proxy behavior against a mock upstream.
//!
//! These tests exercise content negotiation and passthrough without
//! assuming any encoder binary is installed: when a tool is missing the
//! adapter errors out and the dispatcher falls back to the original, which
//! is itself a correct (and asserted) outcome.

use std::sync::Arc;

use slimg::config::AppConfig;
use slimg::server::{build_router, AppState};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Bind the proxy against the given upstream and return its base url.
async fn spawn_app(upstream_url: &str) -> String {
    let config = Arc::new(
        AppConfig::new(upstream_url.to_string(), "127.0.0.1:0".to_string()).unwrap(),
    );
    let state = AppState::new(config);
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    format!("http://{addr}")
}

fn png_bytes() -> Vec<u8> {
    let img = image::DynamicImage::ImageRgb8(image::RgbImage::from_fn(64, 64, |x, y| {
        image::Rgb([(x * 4) as u8, (y * 4) as u8, 128])
    }));
    let mut buf = std::io::Cursor::new(Vec::new());
    img.write_to(&mut buf, image::ImageFormat::Png).unwrap();
    buf.into_inner()
}

fn transparent_png_bytes() -> Vec<u8> {
    let mut img = image::RgbaImage::from_pixel(64, 64, image::Rgba([10, 200, 80, 255]));
    img.put_pixel(5, 5, image::Rgba([10, 200, 80, 0]));
    let mut buf = std::io::Cursor::new(Vec::new());
    image::DynamicImage::ImageRgba8(img)
        .write_to(&mut buf, image::ImageFormat::Png)
        .unwrap();
    buf.into_inner()
}

fn jpeg_bytes() -> Vec<u8> {
    let img = image::DynamicImage::ImageRgb8(image::RgbImage::from_fn(64, 64, |x, y| {
        image::Rgb([(x * 3) as u8, 90, (y * 3) as u8])
    }));
    let mut buf = std::io::Cursor::new(Vec::new());
    img.write_to(&mut buf, image::ImageFormat::Jpeg).unwrap();
    buf.into_inner()
}

#[tokio::test]
async fn health_endpoint_responds() {
    let upstream = MockServer::start().await;
    let app = spawn_app(&upstream.uri()).await;

    let response = reqwest::get(format!("{app}/health")).await.unwrap();
    assert_eq!(response.status(), 200);
    assert_eq!(response.text().await.unwrap(), "OK");
}

#[tokio::test]
async fn non_image_responses_pass_through_unchanged() {
    let upstream = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/page.html"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_bytes("<html>hello</html>".as_bytes().to_vec())
                .insert_header("content-type", "text/html")
                .insert_header("x-origin", "upstream"),
        )
        .mount(&upstream)
        .await;
    let app = spawn_app(&upstream.uri()).await;

    let client = reqwest::Client::new();
    let response = client
        .get(format!("{app}/page.html"))
        .header("accept", "text/html,image/webp")
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 200);
    assert_eq!(
        response.headers().get("content-type").unwrap(),
        "text/html"
    );
    assert_eq!(response.headers().get("x-origin").unwrap(), "upstream");
    assert_eq!(response.text().await.unwrap(), "<html>hello</html>");
}

#[tokio::test]
async fn upstream_errors_pass_through() {
    let upstream = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/missing.png"))
        .respond_with(
            ResponseTemplate::new(404)
                .set_body_string("not found")
                .insert_header("content-type", "text/plain"),
        )
        .mount(&upstream)
        .await;
    let app = spawn_app(&upstream.uri()).await;

    let client = reqwest::Client::new();
    let response = client
        .get(format!("{app}/missing.png"))
        .header("accept", "image/webp,*/*")
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 404);
    assert_eq!(response.text().await.unwrap(), "not found");
}

#[tokio::test]
async fn missing_accept_header_passes_images_through() {
    let original = png_bytes();
    let upstream = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/img.png"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_bytes(original.clone())
                .insert_header("content-type", "image/png"),
        )
        .mount(&upstream)
        .await;
    let app = spawn_app(&upstream.uri()).await;

    let client = reqwest::Client::new();
    let response = client
        .get(format!("{app}/img.png"))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 200);
    // No accept list means no adapter is eligible: byte-identical relay.
    assert_eq!(response.bytes().await.unwrap().as_ref(), &original[..]);
}

#[tokio::test]
async fn png_request_stays_png_without_webp_accept() {
    let original = png_bytes();
    let upstream = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/img.png"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_bytes(original.clone())
                .insert_header("content-type", "image/png"),
        )
        .mount(&upstream)
        .await;
    let app = spawn_app(&upstream.uri()).await;

    let client = reqwest::Client::new();
    let response = client
        .get(format!("{app}/img.png"))
        .header("accept", "image/png")
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 200);
    assert_eq!(
        response.headers().get("content-type").unwrap(),
        "image/png"
    );
    let body = response.bytes().await.unwrap();
    // The winner can be the original or an optipng recompression, but it is
    // never larger than the original and always decodes as a PNG.
    assert!(body.len() <= original.len());
    assert_eq!(
        image::guess_format(&body).unwrap(),
        image::ImageFormat::Png
    );
}

#[tokio::test]
async fn jpeg_request_stays_jpeg_for_wildcard_accept() {
    let original = jpeg_bytes();
    let upstream = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/photo.jpg"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_bytes(original.clone())
                .insert_header("content-type", "image/jpeg"),
        )
        .mount(&upstream)
        .await;
    let app = spawn_app(&upstream.uri()).await;

    let client = reqwest::Client::new();
    let response = client
        .get(format!("{app}/photo.jpg"))
        .header("accept", "*/*")
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 200);
    assert_eq!(
        response.headers().get("content-type").unwrap(),
        "image/jpeg"
    );
    let body = response.bytes().await.unwrap();
    assert!(body.len() <= original.len());
    assert_eq!(
        image::guess_format(&body).unwrap(),
        image::ImageFormat::Jpeg
    );
}

#[tokio::test]
async fn transparent_png_is_never_served_as_jpeg() {
    let original = transparent_png_bytes();
    let upstream = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/logo.png"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_bytes(original.clone())
                .insert_header("content-type", "image/png"),
        )
        .mount(&upstream)
        .await;
    let app = spawn_app(&upstream.uri()).await;

    let client = reqwest::Client::new();
    let response = client
        .get(format!("{app}/logo.png"))
        .header("accept", "image/webp,image/jpeg")
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 200);
    // The lossy PNG adapters decline transparent sources in their
    // prechecks, so the answer can be WebP (lossless) or the original PNG,
    // but never a JPEG.
    let content_type = response
        .headers()
        .get("content-type")
        .unwrap()
        .to_str()
        .unwrap()
        .to_string();
    assert_ne!(content_type, "image/jpeg");
}

#[tokio::test]
async fn query_strings_are_forwarded() {
    let original = png_bytes();
    let upstream = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/img.png"))
        .and(wiremock::matchers::query_param("v", "42"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_bytes(original)
                .insert_header("content-type", "image/png"),
        )
        .mount(&upstream)
        .await;
    let app = spawn_app(&upstream.uri()).await;

    let client = reqwest::Client::new();
    let response = client
        .get(format!("{app}/img.png?v=42"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
}
