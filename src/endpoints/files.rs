use actix_web::{
    get,
    http::header::{ContentDisposition, DispositionParam, DispositionType},
    web::{self, ServiceConfig},
    HttpResponse, Responder,
};
use serde_json::json;
use std::fs;
use tracing::{error, info};

use crate::app_state::AppState;
use crate::services::storage::{list_runs, resolve_run_dir};

/// GET /glue/files
/// Returns every stored run, sorted by the timestamp embedded in the
/// folder name (e.g. "2025-04-03-14:03:09"), oldest first.
#[get("/glue/files")]
async fn list_glue_files(state: web::Data<AppState>) -> impl Responder {
    match list_runs(&state.config) {
        Ok(runs) => {
            info!("Listing {} stored run(s)", runs.len());
            HttpResponse::Ok().json(runs)
        }
        Err(e) => {
            error!("Failed to list runs: {:?}", e);
            HttpResponse::InternalServerError()
                .json(json!({ "error": format!("Failed to list runs: {e}") }))
        }
    }
}

/// Reads one artifact of a stored run, mapping a bad name to 400 and a
/// missing file to 404.
fn read_artifact(state: &AppState, dir_name: &str, file_name: &str) -> Result<Vec<u8>, HttpResponse> {
    let dir = resolve_run_dir(&state.config, dir_name)
        .map_err(|e| HttpResponse::BadRequest().json(json!({ "error": e.to_string() })))?;
    let path = dir.join(file_name);

    if fs::metadata(&path).is_err() {
        return Err(HttpResponse::NotFound()
            .json(json!({ "error": format!("{file_name} not found") })));
    }

    fs::read(&path).map_err(|e| {
        HttpResponse::InternalServerError()
            .json(json!({ "error": format!("Failed to read {file_name}: {e}") }))
    })
}

fn attachment(file_name: &str) -> ContentDisposition {
    ContentDisposition {
        disposition: DispositionType::Attachment,
        parameters: vec![DispositionParam::Filename(file_name.to_string())],
    }
}

/// GET /glue/files/{dir_name}/wav
#[get("/glue/files/{dir_name}/wav")]
async fn wav_for_run(state: web::Data<AppState>, path: web::Path<String>) -> impl Responder {
    let dir_name = path.into_inner();
    let file_name = &state.config.wav_file_name;

    match read_artifact(&state, &dir_name, file_name) {
        Ok(bytes) => HttpResponse::Ok()
            .content_type("audio/wav")
            .insert_header(attachment(file_name))
            .body(bytes),
        Err(resp) => resp,
    }
}

/// GET /glue/files/{dir_name}/timestamps
#[get("/glue/files/{dir_name}/timestamps")]
async fn timestamps_for_run(state: web::Data<AppState>, path: web::Path<String>) -> impl Responder {
    let dir_name = path.into_inner();
    let file_name = &state.config.timestamps_file_name;

    match read_artifact(&state, &dir_name, file_name) {
        Ok(bytes) => HttpResponse::Ok()
            .content_type("text/plain; charset=utf-8")
            .insert_header(attachment(file_name))
            .body(bytes),
        Err(resp) => resp,
    }
}

pub fn configure(cfg: &mut ServiceConfig) {
    cfg.service(list_glue_files)
        .service(wav_for_run)
        .service(timestamps_for_run);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GlueConfig;
    use crate::pcm::StereoBuffer;
    use crate::services::storage::save_run;
    use crate::utils::encode_wav::encode_wav;
    use actix_web::{http::StatusCode, test, App};
    use chrono::NaiveDate;
    use serde_json::Value;
    use std::time::{SystemTime, UNIX_EPOCH};

    fn temp_state() -> AppState {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .as_nanos();
        AppState::new(GlueConfig {
            output_root: std::env::temp_dir().join(format!("mp3-glue-files-{nanos}")),
            ..GlueConfig::default()
        })
    }

    #[actix_web::test]
    async fn serves_stored_artifacts() {
        let state = temp_state();
        let root = state.config.output_root.clone();
        let wav = encode_wav(&StereoBuffer::new(vec![0.5; 4], vec![-0.5; 4], 8000).unwrap());
        let when = NaiveDate::from_ymd_opt(2025, 4, 3)
            .unwrap()
            .and_hms_opt(14, 3, 9)
            .unwrap();
        let saved = save_run(&state.config, when, &wav, "00:00 - Song").unwrap();

        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(state))
                .configure(configure),
        )
        .await;

        let req = test::TestRequest::get().uri("/glue/files").to_request();
        let listing: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(listing[0]["dir_name"], saved.dir_name.as_str());
        assert_eq!(listing[0]["sample_rate"], 8000);

        let req = test::TestRequest::get()
            .uri(&format!("/glue/files/{}/wav", saved.dir_name))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(resp.headers().get("content-type").unwrap(), "audio/wav");
        let body = test::read_body(resp).await;
        assert_eq!(body.as_ref(), wav.as_slice());

        let req = test::TestRequest::get()
            .uri(&format!("/glue/files/{}/timestamps", saved.dir_name))
            .to_request();
        let body = test::call_and_read_body(&app, req).await;
        assert_eq!(body.as_ref(), b"00:00 - Song");

        let _ = fs::remove_dir_all(root);
    }

    #[actix_web::test]
    async fn missing_run_is_not_found() {
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(temp_state()))
                .configure(configure),
        )
        .await;

        let req = test::TestRequest::get()
            .uri("/glue/files/2020-01-01-00:00:00/wav")
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[actix_web::test]
    async fn dotted_run_name_is_rejected() {
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(temp_state()))
                .configure(configure),
        )
        .await;

        let req = test::TestRequest::get()
            .uri("/glue/files/..hidden/timestamps")
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }
}
