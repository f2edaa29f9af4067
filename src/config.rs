use std::{env, net::SocketAddr};

use url::Url;

use crate::error::AppError;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub listen_addr: SocketAddr,
    pub cookie_secret: String,
    pub weather_base_url: Url,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, AppError> {
        let database_url =
            env::var("DATABASE_URL").unwrap_or_else(|_| "sqlite://wayfarer.db".to_string());
        let listen_addr: SocketAddr = env::var("APP_LISTEN_ADDR")
            .unwrap_or_else(|_| "127.0.0.1:3000".to_string())
            .parse()
            .map_err(|err| AppError::Config(format!("invalid APP_LISTEN_ADDR: {err}")))?;

        let cookie_secret = env::var("COOKIE_SECRET")
            .unwrap_or_else(|_| "change-me-wayfarer-cookie-secret".to_string());

        let weather_base_url = env::var("WEATHER_BASE_URL")
            .unwrap_or_else(|_| "https://api.open-meteo.com/v1/forecast".to_string());
        let weather_base_url = Url::parse(&weather_base_url)
            .map_err(|err| AppError::Config(format!("invalid WEATHER_BASE_URL: {err}")))?;

        Ok(Self {
            database_url,
            listen_addr,
            cookie_secret,
            weather_base_url,
        })
    }
}
