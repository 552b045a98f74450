// src/services/mod.rs
pub mod gemini;
pub mod image_input;
pub mod mask;
pub mod prompt;
pub mod render_service;
pub mod retry;

pub use gemini::GeminiClient;
pub use image_input::ImageNormalizer;
pub use render_service::RenderService;
