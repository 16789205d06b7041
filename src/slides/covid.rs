//! Confirmed cases per region from the JHU CSSE daily reports.
//!
//! Each report is a separate file named after its date, so the request is
//! rebuilt every cycle: one report per fetch, filling the history window from
//! the oldest missing day forward.

use std::collections::BTreeSet;
use std::sync::Arc;

use anyhow::{Context, Result, ensure};
use chrono::{Days, NaiveDate};
use futures::future::BoxFuture;
use parking_lot::Mutex;
use reqwest::{Method, Request, Url};
use serde::Deserialize;
use tokio::time::Duration;
use tracing::{debug, warn};

use crate::clock::Clock;
use crate::config::RegionConfig;
use crate::fetcher::{FetchContext, Fetcher, FetcherConfig};
use crate::render::{Align, LINE_HEIGHT, RED, YELLOW, draw_no_data, write_text};
use crate::slide::{Cadence, Slide};
use crate::slides::pandemic::{DailySeries, HISTORY_DAYS, draw_series_row, window_start};
use crate::surface::Surface;

const REPORTS_URL: &str = "https://raw.githubusercontent.com/CSSEGISandData/COVID-19/master/csse_covid_19_data/csse_covid_19_daily_reports/";
/// One report per cycle, so a full window takes HISTORY_DAYS cycles.
const REFRESH_INTERVAL: Duration = Duration::from_secs(2 * 60);
const TITLE: &str = "COVID-19 CASES";

#[derive(Debug, Deserialize)]
struct ReportRow {
    #[serde(rename = "Province_State")]
    province_state: String,
    #[serde(rename = "Country_Region")]
    country_region: String,
    #[serde(rename = "Confirmed")]
    confirmed: Option<u64>,
}

#[derive(Debug)]
struct ReportState {
    series: Vec<DailySeries>,
    /// Report dates that parsed.
    loaded: BTreeSet<NaiveDate>,
    /// Dates requested without a usable report since the last full pass.
    failed: BTreeSet<NaiveDate>,
    requested: Option<NaiveDate>,
}

impl ReportState {
    fn new(regions: &[RegionConfig]) -> Self {
        Self {
            series: regions.iter().map(DailySeries::new).collect(),
            loaded: BTreeSet::new(),
            failed: BTreeSet::new(),
            requested: None,
        }
    }

    /// Oldest missing report that has not failed in this pass. When every
    /// missing report has failed the pass starts over; when nothing is missing
    /// yesterday's report is refreshed since it is sometimes revised.
    fn next_date(&mut self, today: NaiveDate) -> NaiveDate {
        let yesterday = today - Days::new(1);
        let missing: Vec<NaiveDate> = (1..=HISTORY_DAYS)
            .rev()
            .map(|offset| today - Days::new(offset))
            .filter(|day| !self.loaded.contains(day))
            .collect();
        if let Some(day) = missing.iter().find(|day| !self.failed.contains(day)) {
            return *day;
        }
        self.failed.clear();
        missing.first().copied().unwrap_or(yesterday)
    }

    fn begin_request(&mut self, today: NaiveDate) -> NaiveDate {
        let date = self.next_date(today);
        self.requested = Some(date);
        self.failed.insert(date);
        date
    }

    fn record(&mut self, date: NaiveDate, sums: &[u64], today: NaiveDate) {
        for (series, sum) in self.series.iter_mut().zip(sums) {
            if *sum > 0 {
                series.totals.insert(date, *sum);
            }
            series.trim(today);
        }
        self.loaded.insert(date);
        self.failed.remove(&date);
        let oldest = window_start(today);
        self.loaded.retain(|day| *day >= oldest);
        self.failed.retain(|day| *day >= oldest);
    }
}

pub fn report_url(date: NaiveDate) -> Result<Url> {
    let url = format!("{REPORTS_URL}{}.csv", date.format("%m-%d-%Y"));
    Url::parse(&url).with_context(|| format!("invalid report url {url:?}"))
}

/// Sum of confirmed cases per region. A region matches rows by state or by
/// country, since reports are broken down by county.
pub fn parse_daily_report(body: &[u8], regions: &[RegionConfig]) -> Result<Vec<u64>> {
    let mut reader = csv::Reader::from_reader(body);
    let headers = reader.headers().context("missing csv header")?;
    for column in ["Province_State", "Country_Region", "Confirmed"] {
        ensure!(
            headers.iter().any(|header| header == column),
            "daily report has no {column:?} column"
        );
    }

    let mut sums = vec![0_u64; regions.len()];
    for (line, row) in reader.deserialize::<ReportRow>().enumerate() {
        let row = match row {
            Ok(row) => row,
            Err(err) => {
                debug!(line = line + 2, "skipping daily report row: {err}");
                continue;
            }
        };
        let confirmed = row.confirmed.unwrap_or_default();
        for (sum, region) in sums.iter_mut().zip(regions) {
            if row.province_state == region.name || row.country_region == region.name {
                *sum += confirmed;
            }
        }
    }
    Ok(sums)
}

pub struct CovidSlide {
    fetcher: Fetcher,
    state: Arc<Mutex<ReportState>>,
    clock: Arc<dyn Clock>,
}

impl CovidSlide {
    pub fn new(regions: &[RegionConfig], clock: Arc<dyn Clock>, context: FetchContext) -> Self {
        let state = Arc::new(Mutex::new(ReportState::new(regions)));
        let request = {
            let state = state.clone();
            let clock = clock.clone();
            move || -> Result<Request> {
                let today = clock.now().date_naive();
                let date = state.lock().begin_request(today);
                Ok(Request::new(Method::GET, report_url(date)?))
            }
        };
        let parse = {
            let state = state.clone();
            let clock = clock.clone();
            let regions = regions.to_vec();
            move |body: &[u8]| {
                let mut state = state.lock();
                let Some(date) = state.requested else {
                    return false;
                };
                match parse_daily_report(body, &regions) {
                    Ok(sums) => {
                        debug!(%date, ?sums, "daily report loaded");
                        state.record(date, &sums, clock.now().date_naive());
                        true
                    }
                    Err(err) => {
                        warn!(%date, "could not interpret daily report: {err:#}");
                        false
                    }
                }
            }
        };
        let fetcher = Fetcher::new(
            FetcherConfig::new("covid", REFRESH_INTERVAL),
            request,
            parse,
            context,
        );
        Self {
            fetcher,
            state,
            clock,
        }
    }

    pub fn fetcher(&self) -> &Fetcher {
        &self.fetcher
    }
}

impl Slide for CovidSlide {
    fn name(&self) -> &str {
        "covid"
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
            draw_no_data(surface, "Covid cases");
            return;
        }
        let today = self.clock.now().date_naive();
        write_text(surface, TITLE, RED, Align::Center, surface.midpoint(), 0);
        for (row, series) in self.state.lock().series.iter().enumerate() {
            let y = (row as i32 + 1) * LINE_HEIGHT;
            draw_series_row(surface, y, series, today, YELLOW);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testkit::{FixedClock, ScriptedTransport};

    const REPORT: &str = "\
FIPS,Admin2,Province_State,Country_Region,Last_Update,Lat,Long_,Confirmed,Deaths
25017,Middlesex,Massachusetts,US,2021-03-03 05:22:24,42.48,-71.39,120000,3000
25025,Suffolk,Massachusetts,US,2021-03-03 05:22:24,42.36,-71.06,80000,1500
4013,Maricopa,Arizona,US,2021-03-03 05:22:24,33.35,-112.49,500000,8000
,,Ontario,Canada,2021-03-03 05:22:24,51.25,-85.32,300000,7000
,,Oregon,US,2021-03-03 05:22:24,44.57,-122.07,,0
";

    fn regions() -> Vec<RegionConfig> {
        vec![
            RegionConfig::new("US", "US"),
            RegionConfig::new("Massachusetts", "Mass"),
            RegionConfig::new("Arizona", "Ariz"),
        ]
    }

    fn day(month: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2021, month, d).unwrap()
    }

    #[test]
    fn sums_county_rows_per_region() {
        let sums = parse_daily_report(REPORT.as_bytes(), &regions()).unwrap();
        assert_eq!(sums, [700_000, 200_000, 500_000]);
    }

    #[test]
    fn report_without_case_column_is_rejected() {
        let body = "Province/State,Country/Region,Last Update\nHubei,China,2020-01-22\n";
        assert!(parse_daily_report(body.as_bytes(), &regions()).is_err());
    }

    #[test]
    fn report_url_is_named_after_its_date() {
        let url = report_url(day(3, 3)).unwrap();
        assert!(url.as_str().ends_with("/csse_covid_19_daily_reports/03-03-2021.csv"), "{url}");
    }

    #[test]
    fn requests_backfill_oldest_first_then_refresh_yesterday() {
        let today = day(3, 30);
        let mut state = ReportState::new(&regions());

        assert_eq!(state.begin_request(today), day(3, 1));
        // The 1st failed, so the next pass moves on to the 2nd.
        assert_eq!(state.begin_request(today), day(3, 2));
        state.record(day(3, 2), &[10, 1, 1], today);

        for offset in 1..=HISTORY_DAYS {
            let date = today - Days::new(offset);
            if date != day(3, 1) {
                state.record(date, &[10, 1, 1], today);
            }
        }
        // Only the failed 1st is left, so the pass starts over with it.
        assert_eq!(state.begin_request(today), day(3, 1));
        state.record(day(3, 1), &[10, 1, 1], today);

        assert_eq!(state.begin_request(today), day(3, 29));
    }

    #[tokio::test]
    async fn each_cycle_requests_the_next_report() {
        let clock = Arc::new(FixedClock::at_hms(2021, 3, 30, 12, 0, 0));
        let transport = Arc::new(ScriptedTransport::new());
        transport.push_ok(REPORT.as_bytes().to_vec());
        transport.push_status(404);
        let slide = CovidSlide::new(&regions(), clock, FetchContext::new(transport.clone()));

        slide.initialize().await;
        assert!(slide.fetcher().last_fetch_success());
        assert!(!slide.fetcher().fetch().await);
        slide.terminate().await;

        let urls = transport.requested_urls();
        assert_eq!(urls.len(), 2);
        assert!(urls[0].ends_with("/03-01-2021.csv"), "{}", urls[0]);
        assert!(urls[1].ends_with("/03-02-2021.csv"), "{}", urls[1]);

        let state = slide.state.lock();
        assert_eq!(state.series[1].totals.get(&day(3, 1)), Some(&200_000));
        assert!(state.loaded.contains(&day(3, 1)));
        assert!(state.failed.contains(&day(3, 2)));
    }
}
