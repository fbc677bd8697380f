use crate::{
    Config, WeatherQuery, WeatherResponse, provider::openweather::OpenWeatherProvider,
};
use async_trait::async_trait;
use std::fmt::Debug;

pub mod openweather;

/// Terminal failure of a single weather request.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WeatherError {
    #[error("Bad request (HTTP 400)")]
    BadRequest,
    #[error("Not found (HTTP 404)")]
    NotFound,
    #[error("Weather API returned HTTP {0}")]
    Http(u16),
    #[error("Weather request failed: {0}")]
    Transport(String),
}

impl WeatherError {
    /// Classify a non-2xx status code.
    pub fn from_status(code: u16) -> Self {
        match code {
            400 => WeatherError::BadRequest,
            404 => WeatherError::NotFound,
            other => WeatherError::Http(other),
        }
    }
}

#[async_trait]
pub trait WeatherProvider: Send + Sync + Debug {
    async fn get_weather(&self, query: &WeatherQuery) -> Result<WeatherResponse, WeatherError>;
}

/// Construct the OpenWeather provider from config.
pub fn provider_from_config(config: &Config) -> anyhow::Result<Box<dyn WeatherProvider>> {
    let provider = OpenWeatherProvider::builder()
        .base_url(config.api.base_url.clone())
        .timeout(config.api.timeout())
        .build()?;

    Ok(Box::new(provider))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_classification() {
        assert_eq!(WeatherError::from_status(400), WeatherError::BadRequest);
        assert_eq!(WeatherError::from_status(404), WeatherError::NotFound);
        assert_eq!(WeatherError::from_status(401), WeatherError::Http(401));
        assert_eq!(WeatherError::from_status(503), WeatherError::Http(503));
    }

    #[test]
    fn provider_from_default_config_builds() {
        let cfg = Config::default();
        assert!(provider_from_config(&cfg).is_ok());
    }
}
