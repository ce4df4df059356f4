use std::env;

#[derive(Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub video_dir: String,
    pub thumbnail_dir: String,
    pub admin_username: String,
    pub admin_password: String,
    pub cors_origin: String,
    pub static_dir: Option<String>,
}

impl Config {
    pub fn from_env() -> Self {
        Self {
            host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: env::var("PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(5001),
            video_dir: env::var("VIDEO_DIR").unwrap_or_else(|_| "./videos".to_string()),
            thumbnail_dir: env::var("THUMBNAIL_DIR")
                .unwrap_or_else(|_| "./videos/thumbnails".to_string()),
            admin_username: env::var("ADMIN_USERNAME").unwrap_or_else(|_| "admin".to_string()),
            admin_password: env::var("ADMIN_PASSWORD")
                .unwrap_or_else(|_| "dev-password-change-in-production".to_string()),
            cors_origin: env::var("CORS_ORIGIN")
                .unwrap_or_else(|_| "http://localhost:5173".to_string()),
            static_dir: env::var("STATIC_DIR").ok(),
        }
    }
}
