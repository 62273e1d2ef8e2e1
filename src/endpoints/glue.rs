use actix_web::{
    post,
    web::{self, Json},
    HttpResponse, Responder,
};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use chrono::Local;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{error, info};

use crate::app_state::AppState;
use crate::error::GlueError;
use crate::pcm::ClipRecord;
use crate::services::pipeline::{ClipInput, RunFailure, RunRequest};
use crate::services::storage::{public_url, save_run};
use crate::utils::order_clips::sort_by_display_name;

#[derive(Deserialize)]
pub struct ClipPayload {
    pub name: String,
    /// Base64 clip bytes; a `data:...;base64,` prefix is accepted.
    pub data: String,
}

#[derive(Deserialize)]
pub struct GlueInput {
    pub clips: Vec<ClipPayload>,
    #[serde(default)]
    pub sort_by_name: bool,
}

#[derive(Serialize)]
struct GlueResponse {
    dir_name: String,
    wav_path: String,
    timestamps_path: String,
    timestamps: String,
    clips: Vec<ClipRecord>,
    upmixed: Vec<String>,
    notice: Option<String>,
    sample_rate: u32,
    frame_count: usize,
    sample_rate_mismatches: Vec<String>,
}

fn decode_payload(payload: ClipPayload) -> Result<ClipInput, (String, GlueError)> {
    let encoded = match payload.data.split_once("base64,") {
        Some((prefix, rest)) if prefix.starts_with("data:") => rest,
        _ => payload.data.as_str(),
    };
    match STANDARD.decode(encoded.trim()) {
        Ok(raw_bytes) => Ok(ClipInput {
            display_name: payload.name,
            raw_bytes,
        }),
        Err(e) => {
            let err = GlueError::Payload(format!("clip data is not valid base64: {e}"));
            Err((payload.name, err))
        }
    }
}

fn failure_response(failure: &RunFailure) -> HttpResponse {
    let body = json!({
        "error": failure.to_string(),
        "stage": failure.stage,
        "clip": failure.clip,
    });
    match failure.source {
        GlueError::EmptyInput | GlueError::TooManyClips { .. } | GlueError::Payload(_) => {
            HttpResponse::BadRequest().json(body)
        }
        GlueError::Io(_) | GlueError::Config(_) | GlueError::Aborted(_) => {
            HttpResponse::InternalServerError().json(body)
        }
        _ => HttpResponse::UnprocessableEntity().json(body),
    }
}

/// POST /glue
/// Decodes the uploaded clips, joins them into one stereo WAV and a
/// timestamp list, stores both under a new run directory and describes
/// the result.
#[post("/glue")]
pub async fn glue_clips(state: web::Data<AppState>, payload: Json<GlueInput>) -> impl Responder {
    info!("POST /glue endpoint called");
    let input = payload.into_inner();

    // 1) Decode base64 payloads, keeping request order
    info!("Received {} clip(s)", input.clips.len());
    let mut clips = Vec::with_capacity(input.clips.len());
    for clip in input.clips {
        match decode_payload(clip) {
            Ok(clip) => clips.push(clip),
            Err((name, e)) => {
                info!("Rejecting clip {}: {}", name, e);
                return HttpResponse::BadRequest().json(json!({
                    "error": format!("\"{name}\": {e}"),
                    "clip": name,
                }));
            }
        }
    }

    // 2) Optionally order by file name, like the file picker does
    if input.sort_by_name {
        info!("Sorting clips by name");
        sort_by_display_name(&mut clips, |c| c.display_name.as_str());
    }

    // 3) Decode, merge and encode
    let artifacts = match state.pipeline.run(RunRequest { clips }).await {
        Ok(artifacts) => artifacts,
        Err(failure) => {
            info!("Pipeline failed: {}", failure);
            return failure_response(&failure);
        }
    };
    info!(
        "Pipeline produced {} bytes of WAV for {} clip(s)",
        artifacts.wav.len(),
        artifacts.clips.len()
    );

    // 4) Persist both artifacts
    let now = Local::now().naive_local();
    let saved = match save_run(&state.config, now, &artifacts.wav, &artifacts.timestamps) {
        Ok(saved) => saved,
        Err(e) => {
            error!("Failed to store run: {:?}", e);
            let err = json!({ "error": format!("Failed to store compiled audio: {e}") });
            return HttpResponse::InternalServerError().json(err);
        }
    };
    info!("Stored run in {}", saved.wav_path.display());

    // 5) Describe the result
    let notice = artifacts.upmix_notice();
    HttpResponse::Ok().json(GlueResponse {
        wav_path: public_url(&saved.dir_name, &state.config.wav_file_name),
        timestamps_path: public_url(&saved.dir_name, &state.config.timestamps_file_name),
        dir_name: saved.dir_name,
        timestamps: artifacts.timestamps,
        clips: artifacts.clips,
        upmixed: artifacts.upmixed,
        notice,
        sample_rate: artifacts.sample_rate,
        frame_count: artifacts.frame_count,
        sample_rate_mismatches: artifacts.sample_rate_mismatches,
    })
}
