use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;
use tracing::{debug, error, info};

use crate::model::{WeatherQuery, WeatherResponse};

use super::{WeatherError, WeatherProvider};

pub const DEFAULT_BASE_URL: &str = "https://api.openweathermap.org/data/2.5/weather";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone)]
pub struct OpenWeatherProvider {
    base_url: String,
    http: Client,
}

#[derive(Debug, Clone)]
pub struct OpenWeatherProviderBuilder {
    base_url: String,
    timeout: Duration,
}

impl Default for OpenWeatherProviderBuilder {
    fn default() -> Self {
        Self { base_url: DEFAULT_BASE_URL.to_string(), timeout: DEFAULT_TIMEOUT }
    }
}

impl OpenWeatherProviderBuilder {
    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn build(self) -> anyhow::Result<OpenWeatherProvider> {
        let http = Client::builder().timeout(self.timeout).build()?;
        Ok(OpenWeatherProvider { base_url: self.base_url, http })
    }
}

impl OpenWeatherProvider {
    pub fn builder() -> OpenWeatherProviderBuilder {
        OpenWeatherProviderBuilder::default()
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn fetch_current(&self, query: &WeatherQuery) -> Result<WeatherResponse, WeatherError> {
        let lat = query.coordinates.latitude.to_string();
        let lon = query.coordinates.longitude.to_string();

        debug!(url = %self.base_url, %lat, %lon, units = %query.units, "requesting current weather");

        let res = self
            .http
            .get(&self.base_url)
            .query(&[
                ("lat", lat.as_str()),
                ("lon", lon.as_str()),
                ("units", query.units.as_str()),
                ("appid", query.api_key.as_str()),
            ])
            .send()
            .await
            .map_err(|e| {
                error!(error = %e, "failed to send request to OpenWeather");
                WeatherError::Transport(e.to_string())
            })?;

        let status = res.status();
        let body = res.text().await.map_err(|e| {
            error!(error = %e, "failed to read OpenWeather response body");
            WeatherError::Transport(e.to_string())
        })?;

        if !status.is_success() {
            let err = WeatherError::from_status(status.as_u16());
            error!(status = status.as_u16(), body = %truncate_body(&body), "{err}");
            return Err(err);
        }

        let parsed: WeatherResponse = serde_json::from_str(&body).map_err(|e| {
            error!(error = %e, body = %truncate_body(&body), "malformed OpenWeather response");
            WeatherError::Transport(format!("malformed response body: {e}"))
        })?;

        info!(
            name = parsed.name.as_deref().unwrap_or("?"),
            conditions = parsed.weather.len(),
            "received current weather"
        );

        Ok(parsed)
    }
}

#[async_trait]
impl WeatherProvider for OpenWeatherProvider {
    async fn get_weather(&self, query: &WeatherQuery) -> Result<WeatherResponse, WeatherError> {
        self.fetch_current(query).await
    }
}

fn truncate_body(body: &str) -> String {
    const MAX: usize = 200;
    if body.len() > MAX {
        let mut end = MAX;
        while !body.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}...", &body[..end])
    } else {
        body.to_string()
    }
}
