// src/main.rs
use actix_web::{App, HttpResponse, HttpServer, middleware, web};
use log::info;
use std::sync::Arc;

mod errors;
mod handlers;
mod models;
mod services;

use crate::handlers::{edit_image, edit_with_mask, generate_render, upload_images, upscale_image};
use crate::services::render_service::{DEFAULT_RENDER_MODEL, DEFAULT_UPSCALE_MODEL};
use crate::services::{GeminiClient, RenderService};

#[derive(Clone)]
pub struct AppState {
    render_service: Arc<RenderService>,
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    info!("Starting archviz service...");

    let api_key = std::env::var("GEMINI_API_KEY").expect("GEMINI_API_KEY must be set");
    let render_model = std::env::var("ARCHVIZ_RENDER_MODEL")
        .unwrap_or_else(|_| DEFAULT_RENDER_MODEL.to_string());
    let upscale_model = std::env::var("ARCHVIZ_UPSCALE_MODEL")
        .unwrap_or_else(|_| DEFAULT_UPSCALE_MODEL.to_string());
    let bind_addr =
        std::env::var("ARCHVIZ_BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:8080".to_string());

    let client = Arc::new(GeminiClient::new(api_key));
    let render_service = Arc::new(RenderService::new(client, render_model, upscale_model));

    let app_state = AppState { render_service };

    info!("Starting HTTP server on {}", bind_addr);

    HttpServer::new(move || {
        App::new()
            .app_data(web::Data::new(app_state.clone()))
            .wrap(middleware::Logger::default())
            .service(
                web::scope("/api/v1")
                    .route("/upload", web::post().to(upload_images))
                    .route("/render", web::post().to(generate_render))
                    .route("/edit", web::post().to(edit_image))
                    .route("/edit/masked", web::post().to(edit_with_mask))
                    .route("/upscale", web::post().to(upscale_image)),
            )
            .route("/health", web::get().to(health_check))
    })
    .bind(bind_addr)?
    .run()
    .await
}

async fn health_check() -> HttpResponse {
    HttpResponse::Ok().json(serde_json::json!({
        "status": "healthy",
        "service": "archviz",
        "version": "0.1.0"
    }))
}
