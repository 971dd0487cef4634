use actix_files::Files;
use actix_multipart::Multipart;
use actix_web::http::header;
use actix_web::{web, HttpRequest, HttpResponse};
use futures::{StreamExt, TryStreamExt};
use log::{info, warn};
use shared::{ImageCount, MessageResponse};
use std::path::PathBuf;

use crate::config::AppConfig;
use crate::error::AppError;
use crate::processing::batch::{BatchProcessor, UploadItem};
use crate::processing::urls::{PublicUrls, STATIC_MOUNT};
use crate::processing::views::EmotionViews;
use crate::progress::{sse_frame, ProgressTicker};
use crate::storage::paths::StoragePaths;

const UPLOAD_FIELD: &str = "images";

pub fn configure_routes(cfg: &mut web::ServiceConfig, static_dir: PathBuf) {
    cfg.service(web::resource("/clear_images").route(web::post().to(clear_images)))
        .service(web::resource("/detect_emotion").route(web::post().to(detect_emotion)))
        .service(web::resource("/progress").route(web::get().to(progress)))
        .service(web::resource("/get_image_count").route(web::get().to(get_image_count)))
        .service(web::resource("/get_emotion_counts").route(web::get().to(get_emotion_counts)))
        .service(web::resource("/get_processed_images").route(web::get().to(get_processed_images)))
        .service(Files::new(STATIC_MOUNT, static_dir));
}

fn public_urls(req: &HttpRequest, config: &AppConfig) -> PublicUrls {
    match &config.server.public_base_url {
        Some(base) => PublicUrls::new(base.clone()),
        None => {
            let conn = req.connection_info();
            PublicUrls::new(format!("{}://{}", conn.scheme(), conn.host()))
        }
    }
}

async fn clear_images(paths: web::Data<StoragePaths>) -> Result<HttpResponse, AppError> {
    let paths = paths.clone();
    let failures = web::block(move || paths.clear_all()).await?;
    if failures.is_empty() {
        info!("Cleared output images and text files");
    } else {
        warn!("Clear finished with {} entries left behind", failures.len());
    }
    Ok(HttpResponse::Ok().json(MessageResponse {
        message: "Files cleared successfully".into(),
    }))
}

/// Collects the `images` parts of a multipart upload. Empty file inputs are
/// skipped; other fields are read and discarded.
async fn read_uploads(mut payload: Multipart) -> Result<Vec<UploadItem>, AppError> {
    let mut items = Vec::new();
    while let Some(mut field) = payload.try_next().await? {
        let is_upload = field.name() == Some(UPLOAD_FIELD);
        let filename = field
            .content_disposition()
            .and_then(|cd| cd.get_filename())
            .unwrap_or_default()
            .to_string();

        let mut bytes = Vec::new();
        while let Some(chunk) = field.next().await {
            bytes.extend_from_slice(&chunk?);
        }

        if !is_upload || (filename.is_empty() && bytes.is_empty()) {
            continue;
        }
        items.push(UploadItem::new(filename, bytes));
    }
    Ok(items)
}

async fn detect_emotion(
    req: HttpRequest,
    payload: Multipart,
    processor: web::Data<BatchProcessor>,
    config: web::Data<AppConfig>,
) -> Result<HttpResponse, AppError> {
    let items = read_uploads(payload).await?;
    if items.is_empty() {
        return Err(AppError::NoImages);
    }

    let processor = processor.clone();
    let report = web::block(move || processor.process_batch(items)).await??;
    info!("Batch {} finished, sending response", report.batch_id);
    let response = report.into_response(&public_urls(&req, &config));
    Ok(HttpResponse::Ok().json(response))
}

async fn progress(ticker: web::Data<ProgressTicker>) -> HttpResponse {
    let frames = ticker
        .ticks()
        .map(|value| Ok::<_, actix_web::Error>(sse_frame(value)));
    HttpResponse::Ok()
        .insert_header((header::CACHE_CONTROL, "no-cache"))
        .content_type("text/event-stream")
        .streaming(frames)
}

async fn get_image_count(views: web::Data<EmotionViews>) -> Result<HttpResponse, AppError> {
    let views = views.clone();
    let image_count = web::block(move || views.image_count()).await??;
    Ok(HttpResponse::Ok().json(ImageCount { image_count }))
}

async fn get_emotion_counts(views: web::Data<EmotionViews>) -> Result<HttpResponse, AppError> {
    let views = views.clone();
    let counts = web::block(move || views.emotion_counts()).await??;
    Ok(HttpResponse::Ok().json(counts))
}

async fn get_processed_images(
    req: HttpRequest,
    views: web::Data<EmotionViews>,
    config: web::Data<AppConfig>,
) -> Result<HttpResponse, AppError> {
    let urls = public_urls(&req, &config);
    let views = views.clone();
    let images = web::block(move || views.processed_images(&urls)).await??;
    Ok(HttpResponse::Ok().json(images))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BatchPolicy;
    use crate::imaging::annotate::Annotator;
    use crate::processing::batch::tests::{png, width_keyed_detector};
    use crate::storage::emotion_log::EmotionLogStore;
    use actix_web::body::MessageBody;
    use actix_web::http::StatusCode;
    use actix_web::{test, App};
    use serde_json::{json, Value};
    use std::sync::Arc;
    use std::time::Duration;
    use tempfile::TempDir;

    const BOUNDARY: &str = "emotion-test-boundary";

    fn services(root: &TempDir) -> impl FnOnce(&mut web::ServiceConfig) {
        let mut config = AppConfig::default();
        config.storage.static_dir = root.path().join("static");
        config.server.public_base_url = Some("http://emotions.test".to_string());

        let paths = StoragePaths::from_config(&config.storage);
        paths.ensure_dirs().unwrap();
        let log = EmotionLogStore::new(config.storage.log_file());
        let processor = BatchProcessor::new(
            paths.clone(),
            log.clone(),
            Arc::new(width_keyed_detector),
            Annotator::new(None),
            BatchPolicy::Unlocked,
        );
        let static_dir = config.storage.static_dir.clone();

        move |cfg: &mut web::ServiceConfig| {
            cfg.app_data(web::Data::new(processor))
                .app_data(web::Data::new(EmotionViews::new(log)))
                .app_data(web::Data::new(paths))
                .app_data(web::Data::new(ProgressTicker::new(Duration::from_millis(1))))
                .app_data(web::Data::new(config));
            configure_routes(cfg, static_dir);
        }
    }

    fn multipart(parts: &[(&str, &str, Vec<u8>)]) -> Vec<u8> {
        let mut body = Vec::new();
        for (field, filename, bytes) in parts {
            body.extend_from_slice(
                format!(
                    "--{}\r\nContent-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\nContent-Type: application/octet-stream\r\n\r\n",
                    BOUNDARY, field, filename
                )
                .as_bytes(),
            );
            body.extend_from_slice(bytes);
            body.extend_from_slice(b"\r\n");
        }
        body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());
        body
    }

    fn upload(parts: &[(&str, &str, Vec<u8>)]) -> test::TestRequest {
        test::TestRequest::post()
            .uri("/detect_emotion")
            .insert_header((
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={}", BOUNDARY),
            ))
            .set_payload(multipart(parts))
    }

    #[actix_web::test]
    async fn views_are_empty_before_any_batch() {
        let root = TempDir::new().unwrap();
        let app = test::init_service(App::new().configure(services(&root))).await;

        let req = test::TestRequest::get().uri("/get_image_count").to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body, json!({ "image_count": 0 }));

        let req = test::TestRequest::get().uri("/get_emotion_counts").to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body, json!({}));

        let req = test::TestRequest::get().uri("/get_processed_images").to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body, json!([]));
    }

    #[actix_web::test]
    async fn upload_without_images_is_rejected() {
        let root = TempDir::new().unwrap();
        let app = test::init_service(App::new().configure(services(&root))).await;

        let req = upload(&[("other", "a.png", png(2, 2)), ("images", "", Vec::new())]).to_request();
        let resp = test::call_service(&app, req).await;

        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body, json!({ "error": "No image files provided" }));
        assert!(!root.path().join("static/text_files/detected_emotions.txt").exists());
    }

    #[actix_web::test]
    async fn batch_then_views() {
        let root = TempDir::new().unwrap();
        let app = test::init_service(App::new().configure(services(&root))).await;

        let req = upload(&[
            ("images", "corrupt.png", b"\x00\x01garbage".to_vec()),
            ("images", "two faces.png", png(2, 4)),
            ("images", "nobody.jpg", png(7, 4)),
        ])
        .to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;

        assert_eq!(
            body["errors"],
            json!([
                { "filename": "corrupt.png", "error": "Unable to decode the image file" },
                { "filename": "nobody.jpg", "error": "No faces detected in the image" },
            ])
        );
        let results = body["results"].as_array().unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0]["filename"], "two_faces_happy.png");
        assert_eq!(results[0]["emotions"].as_array().unwrap().len(), 2);
        assert_eq!(
            results[0]["url"],
            "http://emotions.test/static/output_images/two_faces_happy.png"
        );
        assert_eq!(results[1]["filename"], "nobody_nofacialexpressions.jpg");
        assert_eq!(
            results[1]["emotions"],
            json!([{ "emo_label": "nofacialexpressions" }])
        );

        let req = test::TestRequest::get().uri("/get_image_count").to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body, json!({ "image_count": 2 }));

        let req = test::TestRequest::get().uri("/get_emotion_counts").to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body, json!({ "happy": 1, "nofacialexpressions": 1 }));

        let req = test::TestRequest::get().uri("/get_processed_images").to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(
            body,
            json!([
                {
                    "filename": "two_faces_happy.png",
                    "url": "http://emotions.test/static/output_images/two_faces_happy.png",
                    "emo_label": "happy"
                },
                {
                    "filename": "nobody_nofacialexpressions.jpg",
                    "url": "http://emotions.test/static/output_images/nobody_nofacialexpressions.jpg",
                    "emo_label": "nofacialexpressions"
                }
            ])
        );

        let req = test::TestRequest::get()
            .uri("/static/output_images/two_faces_happy.png")
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);
    }

    #[actix_web::test]
    async fn clear_resets_views() {
        let root = TempDir::new().unwrap();
        let app = test::init_service(App::new().configure(services(&root))).await;

        let req = upload(&[("images", "a.png", png(2, 2))]).to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);

        let req = test::TestRequest::post().uri("/clear_images").to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body, json!({ "message": "Files cleared successfully" }));

        let req = test::TestRequest::get().uri("/get_image_count").to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body, json!({ "image_count": 0 }));
        assert_eq!(
            std::fs::read_dir(root.path().join("static/output_images")).unwrap().count(),
            0
        );
    }

    #[actix_web::test]
    async fn progress_streams_event_frames() {
        let root = TempDir::new().unwrap();
        let app = test::init_service(App::new().configure(services(&root))).await;

        let req = test::TestRequest::get().uri("/progress").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(
            resp.headers().get(header::CONTENT_TYPE).unwrap(),
            "text/event-stream"
        );

        let mut body = std::pin::pin!(resp.into_body());
        let mut frames = Vec::new();
        for _ in 0..3 {
            let chunk = futures::future::poll_fn(|cx| body.as_mut().poll_next(cx))
                .await
                .unwrap()
                .unwrap();
            frames.push(chunk);
        }
        assert_eq!(frames, vec!["data: 0\n\n", "data: 10\n\n", "data: 20\n\n"]);
    }
}
