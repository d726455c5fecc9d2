//! Current weather from OpenWeatherMap.

use async_trait::async_trait;
use quotebar_core::error::{ConfigError, FetchError};
use quotebar_core::traits::Provider;
use quotebar_core::types::QuoteRecord;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;

use crate::http::{build_client, check_status, transport_error};
use crate::settings::WeatherSettings;

#[derive(Debug, Deserialize)]
struct WeatherResponse {
    name: Option<String>,
    main: WeatherMain,
    #[serde(default)]
    weather: Vec<WeatherCondition>,
}

#[derive(Debug, Deserialize)]
struct WeatherMain {
    temp: f64,
}

#[derive(Debug, Deserialize)]
struct WeatherCondition {
    description: String,
}

fn unit_for(units: &str) -> &'static str {
    match units {
        "imperial" => "°F",
        "standard" => "K",
        _ => "°C",
    }
}

fn to_record(city: &str, units: &str, resp: WeatherResponse) -> QuoteRecord {
    let name = resp
        .name
        .filter(|n| !n.is_empty())
        .unwrap_or_else(|| city.to_string());
    let mut record = QuoteRecord::new(city, name, resp.main.temp, 0.0).with_unit(unit_for(units));
    if let Some(condition) = resp.weather.into_iter().next() {
        record = record.with_detail(condition.description);
    }
    record
}

/// Weather provider; instruments are city names.
pub struct WeatherProvider {
    settings: WeatherSettings,
    client: Client,
}

impl WeatherProvider {
    pub fn new(settings: WeatherSettings) -> Result<Self, ConfigError> {
        let client = build_client(&[])?;
        Ok(Self { settings, client })
    }
}

#[async_trait]
impl Provider for WeatherProvider {
    async fn fetch(&self, instrument_id: &str, timeout: Duration) -> Result<QuoteRecord, FetchError> {
        if self.settings.api_key.is_empty() {
            return Err(FetchError::Network(
                "weather API key not configured (providers.weather.api_key)".to_string(),
            ));
        }

        let resp = self
            .client
            .get(&self.settings.base_url)
            .query(&[
                ("q", instrument_id),
                ("appid", self.settings.api_key.as_str()),
                ("units", self.settings.units.as_str()),
            ])
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| transport_error(e, timeout))?;

        let body: WeatherResponse = check_status(resp, instrument_id)
            .await?
            .json()
            .await
            .map_err(|e| transport_error(e, timeout))?;

        Ok(to_record(instrument_id, &self.settings.units, body))
    }

    fn name(&self) -> &str {
        "weather"
    }

    fn description(&self) -> &str {
        "Current temperature and conditions for a city"
    }

    fn examples(&self) -> &[&'static str] {
        &["Beijing", "London"]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_to_record() {
        let resp: WeatherResponse = serde_json::from_str(
            r#"{"name":"Beijing","main":{"temp":21.4,"humidity":40},"weather":[{"id":800,"description":"clear sky"}]}"#,
        )
        .unwrap();
        let record = to_record("beijing", "metric", resp);

        assert_eq!(record.display_name, "Beijing");
        assert_eq!(record.value, 21.4);
        assert_eq!(record.unit.as_deref(), Some("°C"));
        assert_eq!(record.detail.as_deref(), Some("clear sky"));
    }

    #[test]
    fn test_unit_for() {
        assert_eq!(unit_for("imperial"), "°F");
        assert_eq!(unit_for("standard"), "K");
        assert_eq!(unit_for("metric"), "°C");
    }

    #[tokio::test]
    async fn test_missing_api_key() {
        let provider = WeatherProvider::new(WeatherSettings::default()).unwrap();
        let err = provider
            .fetch("London", Duration::from_secs(1))
            .await
            .unwrap_err();

        match err {
            FetchError::Network(msg) => assert!(msg.contains("api_key")),
            other => panic!("unexpected error: {:?}", other),
        }
    }
}
