//! People vaccinated per region, from the Our World in Data US state CSV.

use std::sync::Arc;

use anyhow::{Context, Result, ensure};
use chrono::NaiveDate;
use futures::future::BoxFuture;
use parking_lot::RwLock;
use serde::Deserialize;
use tokio::time::Duration;
use tracing::{debug, warn};

use crate::clock::Clock;
use crate::config::RegionConfig;
use crate::fetcher::{FetchContext, Fetcher, FetcherConfig, StaticUrl};
use crate::render::{Align, GREEN, LINE_HEIGHT, YELLOW, draw_no_data, write_text};
use crate::slide::{Cadence, Slide};
use crate::slides::pandemic::{DailySeries, draw_series_row, window_start};
use crate::surface::Surface;

const VACCINATIONS_URL: &str = "https://github.com/owid/covid-19-data/raw/master/public/data/vaccinations/us_state_vaccinations.csv";
const REFRESH_INTERVAL: Duration = Duration::from_secs(6 * 60 * 60);
const TITLE: &str = "COVID-19 VACCINATIONS";

#[derive(Debug, Deserialize)]
struct VaccinationRow {
    date: NaiveDate,
    location: String,
    people_vaccinated: Option<f64>,
}

pub struct VaccinationSlide {
    fetcher: Fetcher,
    series: Arc<RwLock<Vec<DailySeries>>>,
    clock: Arc<dyn Clock>,
}

impl VaccinationSlide {
    pub fn new(
        regions: &[RegionConfig],
        clock: Arc<dyn Clock>,
        context: FetchContext,
    ) -> Result<Self> {
        let series = Arc::new(RwLock::new(
            regions.iter().map(DailySeries::new).collect::<Vec<_>>(),
        ));
        let fetcher = Fetcher::new(
            FetcherConfig::new("vaccination", REFRESH_INTERVAL),
            StaticUrl::parse(VACCINATIONS_URL)?,
            {
                let series = series.clone();
                let regions = regions.to_vec();
                let clock = clock.clone();
                move |body: &[u8]| {
                    let today = clock.now().date_naive();
                    match parse_vaccinations(body, &regions, today) {
                        Ok(parsed) => {
                            *series.write() = parsed;
                            true
                        }
                        Err(err) => {
                            warn!("could not interpret vaccination data: {err:#}");
                            false
                        }
                    }
                }
            },
            context,
        );
        Ok(Self {
            fetcher,
            series,
            clock,
        })
    }

    pub fn fetcher(&self) -> &Fetcher {
        &self.fetcher
    }
}

/// Totals per configured region for the days inside the history window.
/// Rows with a blank count are skipped rather than read as zero, so a late
/// report does not show up as a huge jump the next day.
pub fn parse_vaccinations(
    body: &[u8],
    regions: &[RegionConfig],
    today: NaiveDate,
) -> Result<Vec<DailySeries>> {
    let mut reader = csv::Reader::from_reader(body);
    let headers = reader.headers().context("missing csv header")?;
    for column in ["date", "location", "people_vaccinated"] {
        ensure!(
            headers.iter().any(|header| header == column),
            "vaccination csv has no {column:?} column"
        );
    }

    let oldest = window_start(today);
    let mut series: Vec<DailySeries> = regions.iter().map(DailySeries::new).collect();
    for (line, row) in reader.deserialize::<VaccinationRow>().enumerate() {
        let row = match row {
            Ok(row) => row,
            Err(err) => {
                debug!(line = line + 2, "skipping vaccination row: {err}");
                continue;
            }
        };
        if row.date < oldest {
            continue;
        }
        let Some(count) = row.people_vaccinated else {
            continue;
        };
        if let Some(region) = series.iter_mut().find(|s| s.name == row.location) {
            region.totals.insert(row.date, count as u64);
        }
    }
    Ok(series)
}

impl Slide for VaccinationSlide {
    fn name(&self) -> &str {
        "vaccination"
    }

    fn initialize(&self) -> BoxFuture<'_, ()> {
        Box::pin(async move {
            let _ = self.fetcher.start().await;
        })
    }

    fn terminate(&self) -> BoxFuture<'_, ()> {
        Box::pin(async move {
            let _ = self.fetcher.stop().await;
        })
    }

    fn start_draw(&self) -> Cadence {
        Cadence::Once
    }

    fn draw(&self, surface: &mut Surface) {
        if !self.fetcher.has_loaded() {
            draw_no_data(surface, "Vaccinations");
            return;
        }
        let today = self.clock.now().date_naive();
        write_text(surface, TITLE, GREEN, Align::Center, surface.midpoint(), 0);
        for (row, series) in self.series.read().iter().enumerate() {
            let y = (row as i32 + 1) * LINE_HEIGHT;
            draw_series_row(surface, y, series, today, YELLOW);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testkit::{FixedClock, ScriptedTransport};

    const SAMPLE: &str = "\
date,location,total_vaccinations,people_vaccinated,people_fully_vaccinated
2021-02-01,Arizona,100,90,10
2021-03-01,Massachusetts,1000,800,200
2021-03-02,Massachusetts,1200,,250
2021-03-03,Massachusetts,1500,1100,300
2021-03-03,United States,90000000,60000000,30000000
2021-03-03,New York,9000,8000,1000
not-a-date,Massachusetts,1,1,1
";

    fn regions() -> Vec<RegionConfig> {
        vec![
            RegionConfig::new("United States", "US"),
            RegionConfig::new("Massachusetts", "Mass"),
            RegionConfig::new("Arizona", "Ariz"),
        ]
    }

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2021, 3, 4).unwrap()
    }

    #[test]
    fn keeps_configured_regions_inside_the_window() {
        let parsed = parse_vaccinations(SAMPLE.as_bytes(), &regions(), today()).unwrap();
        assert_eq!(parsed.len(), 3);

        let us = &parsed[0];
        assert_eq!(us.totals.len(), 1);
        assert_eq!(us.totals.values().next(), Some(&60_000_000));

        let mass = &parsed[1];
        let days: Vec<_> = mass.totals.keys().map(|d| d.to_string()).collect();
        assert_eq!(days, ["2021-03-01", "2021-03-03"]);
        assert_eq!(mass.daily_increases(today()).last(), Some(&300));

        // Arizona's only row is older than the history window.
        assert!(parsed[2].totals.is_empty());
    }

    #[test]
    fn rejects_a_body_without_the_needed_columns() {
        let err = parse_vaccinations(b"<html>oops</html>", &regions(), today()).unwrap_err();
        assert!(format!("{err:#}").contains("date"), "{err:#}");
    }

    #[tokio::test]
    async fn failed_refresh_keeps_the_last_totals() {
        let clock = Arc::new(FixedClock::at_hms(2021, 3, 4, 12, 0, 0));
        let transport = Arc::new(ScriptedTransport::new());
        transport.push_ok(SAMPLE.as_bytes().to_vec());
        transport.push_ok(b"garbage".to_vec());
        let slide = VaccinationSlide::new(
            &regions(),
            clock,
            FetchContext::new(transport.clone()),
        )
        .unwrap();

        let mut placeholder = Surface::blank(128, 32);
        slide.draw(&mut placeholder);

        slide.initialize().await;
        assert!(slide.fetcher().last_fetch_success());
        assert!(!slide.fetcher().fetch().await);
        assert_eq!(slide.series.read()[1].totals.len(), 2);

        let mut drawn = Surface::blank(128, 32);
        slide.draw(&mut drawn);
        assert!(drawn != placeholder);
        slide.terminate().await;

        assert_eq!(transport.requested_urls(), [VACCINATIONS_URL; 2]);
    }
}
