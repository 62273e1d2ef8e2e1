use actix_files::Files;
use actix_web::web::{self, ServiceConfig};

use config::GlueConfig;
use endpoints::files::configure as files_configure;
use endpoints::glue::glue_clips;

use shuttle_actix_web::ShuttleActixWeb;
use shuttle_runtime::SecretStore;
mod app_state;
mod config;
mod endpoints;
mod error;
mod pcm;
mod services;
mod utils;

#[shuttle_runtime::main]
async fn main(
    #[shuttle_runtime::Secrets] secrets: SecretStore,
) -> ShuttleActixWeb<impl FnOnce(&mut ServiceConfig) + Send + Clone + 'static> {
    let config = GlueConfig::from_lookup(|key| secrets.get(key))
        .expect("glue configuration is invalid");
    tracing::info!("Starting with {:?}", config);

    let app_config = move |cfg: &mut ServiceConfig| {
        // Create the output root so that Actix won't throw an error.
        if let Err(e) = std::fs::create_dir_all(&config.output_root) {
            tracing::error!("Failed to create {}: {:?}", config.output_root.display(), e);
        }

        let json_config = web::JsonConfig::default().limit(config.max_payload_bytes);
        let output_root = config.output_root.clone();
        let state = web::Data::new(app_state::AppState::new(config));

        cfg.service(
            Files::new("/user_files", output_root)
                .prefer_utf8(true)
                .use_last_modified(true),
        );

        cfg.service(
            web::scope("/api")
                .app_data(json_config)
                .service(glue_clips)
                .configure(files_configure),
        )
        .app_data(state);
    };

    Ok(app_config.into())
}
