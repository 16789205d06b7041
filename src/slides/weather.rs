//! Current conditions and short forecast from the National Weather Service.

use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{DateTime, FixedOffset, TimeDelta};
use embedded_graphics::pixelcolor::Rgb888;
use futures::future::BoxFuture;
use parking_lot::RwLock;
use reqwest::header::{ACCEPT, HeaderValue};
use reqwest::{Method, Request, Url};
use serde::Deserialize;
use tokio::time::Duration;
use tracing::warn;

use crate::clock::Clock;
use crate::fetcher::{FetchContext, Fetcher, FetcherConfig};
use crate::render::{AQUA, Align, WHITE, YELLOW, draw_no_data, write_small_text, write_text};
use crate::slide::{Cadence, Slide};
use crate::surface::Surface;

const API_BASE: &str = "https://api.weather.gov/";
const OBSERVATION_INTERVAL: Duration = Duration::from_secs(5 * 60);
const FORECAST_INTERVAL: Duration = Duration::from_secs(30 * 60);
/// Observations older than this many hours are treated as unusable.
const MAX_OBSERVATION_AGE_HOURS: i64 = 6;
const TITLE: &str = "Weather";
const FORECAST_COLUMNS: usize = 2;
const LABEL_CHARS: usize = 10;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForecastPeriod {
    pub name: String,
    pub temperature: i32,
    pub unit: String,
    pub ends_at: DateTime<FixedOffset>,
}

#[derive(Debug, Default)]
struct Conditions {
    current_f: Option<i32>,
    forecast: Vec<ForecastPeriod>,
}

pub struct WeatherSlide {
    name: String,
    observations: Fetcher,
    forecast: Fetcher,
    conditions: Arc<RwLock<Conditions>>,
    clock: Arc<dyn Clock>,
}

impl WeatherSlide {
    pub fn new(
        office: &str,
        station: &str,
        clock: Arc<dyn Clock>,
        context: FetchContext,
    ) -> Result<Self> {
        let base = Url::parse(API_BASE).context("invalid weather api base")?;
        let observations_url = base
            .join(&format!("stations/{station}/observations/latest"))
            .with_context(|| format!("invalid weather station {station:?}"))?;
        let forecast_url = base
            .join(&format!("gridpoints/{office}/forecast"))
            .with_context(|| format!("invalid weather office {office:?}"))?;

        let conditions = Arc::new(RwLock::new(Conditions::default()));

        let observations = Fetcher::new(
            FetcherConfig::new(format!("weather-observations-{station}"), OBSERVATION_INTERVAL),
            move || weather_request(&observations_url),
            {
                let conditions = conditions.clone();
                let clock = clock.clone();
                move |body: &[u8]| match parse_observation(body, &clock.now()) {
                    Ok(temp) => {
                        conditions.write().current_f = Some(temp);
                        true
                    }
                    Err(err) => {
                        warn!("could not interpret weather observation: {err:#}");
                        false
                    }
                }
            },
            context.clone(),
        );

        let forecast = Fetcher::new(
            FetcherConfig::new(format!("weather-forecast-{office}"), FORECAST_INTERVAL),
            move || weather_request(&forecast_url),
            {
                let conditions = conditions.clone();
                move |body: &[u8]| match parse_forecast(body) {
                    Ok(periods) => {
                        conditions.write().forecast = periods;
                        true
                    }
                    Err(err) => {
                        warn!("could not interpret weather forecast: {err:#}");
                        false
                    }
                }
            },
            context,
        );

        Ok(Self {
            name: format!("weather-{station}"),
            observations,
            forecast,
            conditions,
            clock,
        })
    }

    pub fn observations(&self) -> &Fetcher {
        &self.observations
    }

    pub fn forecast(&self) -> &Fetcher {
        &self.forecast
    }
}

fn weather_request(url: &Url) -> Result<Request> {
    let mut request = Request::new(Method::GET, url.clone());
    request
        .headers_mut()
        .insert(ACCEPT, HeaderValue::from_static("application/ld+json"));
    Ok(request)
}

fn celsius_to_fahrenheit(celsius: f64) -> i32 {
    (celsius * 9.0 / 5.0 + 32.0).round() as i32
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Observation {
    timestamp: DateTime<FixedOffset>,
    temperature: Measurement,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Measurement {
    value: Option<f64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Forecast {
    periods: Vec<Period>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Period {
    name: String,
    end_time: DateTime<FixedOffset>,
    temperature: i32,
    #[serde(default)]
    temperature_unit: String,
}

/// Temperature in °F from a latest-observation document.
fn parse_observation(body: &[u8], now: &DateTime<FixedOffset>) -> Result<i32> {
    let observation: Observation = serde_json::from_slice(body)?;
    let age = *now - observation.timestamp;
    anyhow::ensure!(
        age <= TimeDelta::hours(MAX_OBSERVATION_AGE_HOURS),
        "observation from {} is too old",
        observation.timestamp
    );
    let celsius = observation
        .temperature
        .value
        .context("observation has no temperature")?;
    Ok(celsius_to_fahrenheit(celsius))
}

fn parse_forecast(body: &[u8]) -> Result<Vec<ForecastPeriod>> {
    let forecast: Forecast = serde_json::from_slice(body)?;
    anyhow::ensure!(!forecast.periods.is_empty(), "forecast has no periods");
    Ok(forecast
        .periods
        .into_iter()
        .map(|period| ForecastPeriod {
            name: period.name,
            temperature: period.temperature,
            unit: period.temperature_unit,
            ends_at: period.end_time,
        })
        .collect())
}

fn draw_column(surface: &mut Surface, centre: i32, label: &str, temperature: &str, color: Rgb888) {
    write_small_text(surface, label, color, Align::Center, centre, 2);
    write_text(surface, temperature, WHITE, Align::Center, centre, 14);
}

impl Slide for WeatherSlide {
    fn name(&self) -> &str {
        &self.name
    }

    fn initialize(&self) -> BoxFuture<'_, ()> {
        Box::pin(async move {
            let _ = self.observations.start().await;
            let _ = self.forecast.start().await;
        })
    }

    fn terminate(&self) -> BoxFuture<'_, ()> {
        Box::pin(async move {
            let _ = self.observations.stop().await;
            let _ = self.forecast.stop().await;
        })
    }

    fn start_draw(&self) -> Cadence {
        Cadence::EVERY_SECOND
    }

    fn draw(&self, surface: &mut Surface) {
        let conditions = self.conditions.read();
        let Some(current) = conditions.current_f else {
            draw_no_data(surface, TITLE);
            return;
        };

        let column = surface.width() as i32 / 3;
        draw_column(surface, column / 2, "NOW", &format!("{current}F"), YELLOW);

        let now = self.clock.now();
        let upcoming = conditions
            .forecast
            .iter()
            .filter(|period| period.ends_at > now)
            .take(FORECAST_COLUMNS);
        for (idx, period) in upcoming.enumerate() {
            let label: String = period.name.to_uppercase().chars().take(LABEL_CHARS).collect();
            let temperature = format!("{}{}", period.temperature, period.unit);
            let centre = column * (idx as i32 + 1) + column / 2;
            draw_column(surface, centre, &label, &temperature, AQUA);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testkit::{FixedClock, ScriptedTransport};

    const OBSERVATION: &str = r#"{
        "@context": [],
        "timestamp": "2026-01-15T13:54:00+00:00",
        "temperature": {"unitCode": "wmoUnit:degC", "value": -2.2, "qualityControl": "V"}
    }"#;

    const FORECAST: &str = r#"{
        "updateTime": "2026-01-15T12:00:00+00:00",
        "periods": [
            {"number": 1, "name": "This Afternoon", "startTime": "2026-01-15T09:00:00-05:00",
             "endTime": "2026-01-15T18:00:00-05:00", "temperature": 31, "temperatureUnit": "F"},
            {"number": 2, "name": "Tonight", "startTime": "2026-01-15T18:00:00-05:00",
             "endTime": "2026-01-16T06:00:00-05:00", "temperature": 20, "temperatureUnit": "F"},
            {"number": 3, "name": "Friday", "startTime": "2026-01-16T06:00:00-05:00",
             "endTime": "2026-01-16T18:00:00-05:00", "temperature": 35, "temperatureUnit": "F"}
        ]
    }"#;

    #[test]
    fn converts_observed_temperature() {
        let now = DateTime::parse_from_rfc3339("2026-01-15T14:10:00+00:00").unwrap();
        assert_eq!(parse_observation(OBSERVATION.as_bytes(), &now).unwrap(), 28);
    }

    #[test]
    fn stale_or_missing_observations_are_rejected() {
        let later = DateTime::parse_from_rfc3339("2026-01-15T20:00:00+00:00").unwrap();
        assert!(parse_observation(OBSERVATION.as_bytes(), &later).is_err());

        let now = DateTime::parse_from_rfc3339("2026-01-15T14:00:00+00:00").unwrap();
        let missing = OBSERVATION.replace("-2.2", "null");
        assert!(parse_observation(missing.as_bytes(), &now).is_err());
    }

    #[test]
    fn forecast_periods_keep_order() {
        let periods = parse_forecast(FORECAST.as_bytes()).unwrap();
        let names: Vec<_> = periods.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, ["This Afternoon", "Tonight", "Friday"]);
        assert!(parse_forecast(br#"{"periods": []}"#).is_err());
    }

    #[tokio::test]
    async fn shows_placeholder_until_observation_loads() {
        let clock = Arc::new(FixedClock::at_rfc3339("2026-01-15T14:10:00+00:00"));
        let transport = Arc::new(ScriptedTransport::new());
        transport.push_status(503);
        transport.push_ok(FORECAST.as_bytes().to_vec());
        let slide =
            WeatherSlide::new("BOX/69,76", "KBOS", clock, FetchContext::new(transport.clone()))
                .unwrap();

        slide.initialize().await;
        assert!(!slide.observations().last_fetch_success());
        assert!(slide.forecast().last_fetch_success());

        let mut surface = Surface::blank(128, 32);
        slide.draw(&mut surface);
        let mut placeholder = Surface::blank(128, 32);
        draw_no_data(&mut placeholder, TITLE);
        assert_eq!(surface, placeholder);

        transport.push_ok(OBSERVATION.as_bytes().to_vec());
        assert!(slide.observations().fetch().await);
        let mut surface = Surface::blank(128, 32);
        slide.draw(&mut surface);
        assert_ne!(surface, placeholder);

        let requests = transport.requested_urls();
        assert_eq!(
            requests[0],
            "https://api.weather.gov/stations/KBOS/observations/latest"
        );
        assert_eq!(requests[1], "https://api.weather.gov/gridpoints/BOX/69,76/forecast");
        slide.terminate().await;
    }
}
