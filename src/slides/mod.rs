//! Concrete slides and the factory that builds them from configuration.

mod christmas;
mod countdown;
mod covid;
mod idle;
mod new_year;
mod pandemic;
mod time;
mod transit;
mod vaccination;
mod weather;
mod welcome;

use std::sync::Arc;

use anyhow::{Context, Result};

use crate::clock::Clock;
use crate::config::SlideConfig;
use crate::fetcher::FetchContext;
use crate::render::parse_hex_color;
use crate::slide::SharedSlide;

pub use christmas::ChristmasSlide;
pub use countdown::{CountdownEvent, CountdownSlide};
pub use covid::{CovidSlide, parse_daily_report, report_url};
pub use idle::IdleSlide;
pub use new_year::NewYearSlide;
pub use pandemic::{DailySeries, format_count};
pub use time::TimeSlide;
pub use transit::{Route, RouteDepartures, RouteKind, TransitSlide, parse_predictions};
pub use vaccination::{VaccinationSlide, parse_vaccinations};
pub use weather::{ForecastPeriod, WeatherSlide};
pub use welcome::WelcomeSlide;

/// Shared collaborators handed to every slide at construction.
#[derive(Clone)]
pub struct SlideContext {
    pub clock: Arc<dyn Clock>,
    pub fetch: FetchContext,
}

pub fn build_slides(configs: &[SlideConfig], context: &SlideContext) -> Result<Vec<SharedSlide>> {
    configs
        .iter()
        .enumerate()
        .map(|(idx, config)| {
            build_slide(config, context).with_context(|| format!("invalid slide #{idx}"))
        })
        .collect()
}

fn build_slide(config: &SlideConfig, context: &SlideContext) -> Result<SharedSlide> {
    let clock = context.clock.clone();
    let slide: SharedSlide = match config {
        SlideConfig::Time => Arc::new(TimeSlide::new(clock)),
        SlideConfig::Countdown { events } => {
            let events = events
                .iter()
                .map(|event| {
                    Ok(CountdownEvent {
                        date: event.date,
                        label: event.label.clone(),
                        color: parse_hex_color(&event.color)?,
                    })
                })
                .collect::<Result<Vec<_>>>()?;
            Arc::new(CountdownSlide::new(events, clock))
        }
        SlideConfig::Christmas => Arc::new(ChristmasSlide::new(clock)),
        SlideConfig::NewYear => Arc::new(NewYearSlide::new(clock)),
        SlideConfig::Transit { station } => {
            Arc::new(TransitSlide::new(station, clock, context.fetch.clone())?)
        }
        SlideConfig::Weather { office, station } => Arc::new(WeatherSlide::new(
            office,
            station,
            clock,
            context.fetch.clone(),
        )?),
        SlideConfig::Vaccination { regions } => Arc::new(VaccinationSlide::new(
            regions,
            clock,
            context.fetch.clone(),
        )?),
        SlideConfig::Covid { regions } => {
            Arc::new(CovidSlide::new(regions, clock, context.fetch.clone()))
        }
    };
    Ok(slide)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{CountdownEventConfig, RegionConfig};
    use crate::testkit::{FixedClock, ScriptedTransport};
    use chrono::NaiveDate;

    fn context() -> SlideContext {
        SlideContext {
            clock: Arc::new(FixedClock::at_hms(2026, 12, 1, 9, 0, 0)),
            fetch: FetchContext::new(Arc::new(ScriptedTransport::new())),
        }
    }

    #[test]
    fn builds_slides_in_configured_order() {
        let configs = vec![
            SlideConfig::Time,
            SlideConfig::Transit {
                station: "place-davis".into(),
            },
            SlideConfig::Christmas,
            SlideConfig::Covid {
                regions: vec![RegionConfig::new("US", "US")],
            },
        ];
        let slides = build_slides(&configs, &context()).unwrap();
        let names: Vec<_> = slides.iter().map(|s| s.name().to_owned()).collect();
        assert_eq!(names, ["time", "transit-place-davis", "christmas", "covid"]);
    }

    #[test]
    fn bad_countdown_color_names_the_slide() {
        let configs = vec![SlideConfig::Countdown {
            events: vec![CountdownEventConfig {
                date: NaiveDate::from_ymd_opt(2027, 1, 1).unwrap(),
                label: "PARTY".into(),
                color: "nope".into(),
            }],
        }];
        let err = build_slides(&configs, &context()).err().unwrap();
        assert!(format!("{err:#}").contains("slide #0"), "{err:#}");
    }
}
