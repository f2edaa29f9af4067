//! Open-Meteo forecast client with a small in-process cache.
//!
//! Failures never propagate: every path returns a `WeatherReport` carrying
//! a status line, so the trip page renders with or without weather.

use std::{
    collections::HashMap,
    sync::Arc,
    time::{Duration, Instant},
};

use reqwest::Client;
use serde_json::Value;
use tokio::sync::Mutex;
use tracing::warn;
use url::Url;

use crate::error::AppError;

const CACHE_TTL: Duration = Duration::from_secs(20 * 60);
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);
const MAX_FORECAST_DAYS: usize = 7;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ForecastSource {
    Fresh,
    Cache,
    Unavailable,
}

#[derive(Debug, Clone)]
pub struct WeatherReport {
    pub ok: bool,
    pub summary: String,
    pub source: ForecastSource,
    pub data: Option<Value>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ForecastDay {
    pub date: String,
    pub temp_max: f64,
    pub temp_min: f64,
    pub precipitation_chance: f64,
}

impl WeatherReport {
    fn degraded(summary: &str) -> Self {
        Self {
            ok: false,
            summary: summary.to_string(),
            source: ForecastSource::Unavailable,
            data: None,
        }
    }

    /// Up to 7 aligned rows out of the raw `daily` arrays. A payload with
    /// ragged arrays yields only the aligned prefix.
    pub fn daily_rows(&self) -> Vec<ForecastDay> {
        let Some(daily) = self.data.as_ref().and_then(|data| data.get("daily")) else {
            return Vec::new();
        };
        let times = string_items(daily.get("time"));
        let highs = number_items(daily.get("temperature_2m_max"));
        let lows = number_items(daily.get("temperature_2m_min"));
        let rain = number_items(daily.get("precipitation_probability_max"));

        let count = times
            .len()
            .min(highs.len())
            .min(lows.len())
            .min(rain.len())
            .min(MAX_FORECAST_DAYS);
        (0..count)
            .map(|i| ForecastDay {
                date: times[i].clone(),
                temp_max: highs[i],
                temp_min: lows[i],
                precipitation_chance: rain[i],
            })
            .collect()
    }
}

struct CacheEntry {
    payload: Value,
    stored_at: Instant,
}

#[derive(Clone)]
pub struct WeatherService {
    client: Client,
    base_url: Url,
    ttl: Duration,
    cache: Arc<Mutex<HashMap<(i64, i64), CacheEntry>>>,
}

impl WeatherService {
    pub fn new(base_url: Url) -> Result<Self, AppError> {
        Self::with_ttl(base_url, CACHE_TTL)
    }

    pub fn with_ttl(base_url: Url, ttl: Duration) -> Result<Self, AppError> {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|err| AppError::Other(anyhow::anyhow!("http client init failed: {err}")))?;
        Ok(Self {
            client,
            base_url,
            ttl,
            cache: Arc::new(Mutex::new(HashMap::new())),
        })
    }

    pub async fn forecast(&self, latitude: Option<f64>, longitude: Option<f64>) -> WeatherReport {
        let (Some(lat), Some(lon)) = (latitude, longitude) else {
            return WeatherReport::degraded("No coordinates for destination.");
        };

        let key = cache_key(lat, lon);
        if let Some(payload) = self.cached(key).await {
            return WeatherReport {
                ok: true,
                summary: "Forecast loaded from cache.".to_string(),
                source: ForecastSource::Cache,
                data: Some(payload),
            };
        }

        match self.fetch(lat, lon).await {
            Ok(payload) => {
                self.store(key, payload.clone()).await;
                WeatherReport {
                    ok: true,
                    summary: "Forecast loaded from Open-Meteo.".to_string(),
                    source: ForecastSource::Fresh,
                    data: Some(payload),
                }
            }
            Err(err) => {
                warn!("weather fetch failed: {err}");
                WeatherReport::degraded("Weather service is temporarily unavailable.")
            }
        }
    }

    async fn fetch(&self, lat: f64, lon: f64) -> Result<Value, reqwest::Error> {
        let response = self
            .client
            .get(self.base_url.clone())
            .query(&[
                ("latitude", lat.to_string()),
                ("longitude", lon.to_string()),
                ("current", "temperature_2m,wind_speed_10m".to_string()),
                (
                    "daily",
                    "temperature_2m_max,temperature_2m_min,precipitation_probability_max"
                        .to_string(),
                ),
                ("timezone", "auto".to_string()),
            ])
            .send()
            .await?
            .error_for_status()?;
        response.json::<Value>().await
    }

    async fn cached(&self, key: (i64, i64)) -> Option<Value> {
        let cache = self.cache.lock().await;
        cache
            .get(&key)
            .filter(|entry| entry.stored_at.elapsed() < self.ttl)
            .map(|entry| entry.payload.clone())
    }

    async fn store(&self, key: (i64, i64), payload: Value) {
        let mut cache = self.cache.lock().await;
        cache.insert(
            key,
            CacheEntry {
                payload,
                stored_at: Instant::now(),
            },
        );
    }
}

/// Coordinates rounded to four decimals so nearby lookups share an entry.
fn cache_key(lat: f64, lon: f64) -> (i64, i64) {
    (
        (lat * 10_000.0).round() as i64,
        (lon * 10_000.0).round() as i64,
    )
}

fn string_items(value: Option<&Value>) -> Vec<String> {
    value
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(|item| item.as_str().map(str::to_string))
                .collect()
        })
        .unwrap_or_default()
}

fn number_items(value: Option<&Value>) -> Vec<f64> {
    value
        .and_then(Value::as_array)
        .map(|items| items.iter().filter_map(Value::as_f64).collect())
        .unwrap_or_default()
}
