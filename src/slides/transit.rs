//! Departure board for one MBTA station.

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{DateTime, FixedOffset};
use parking_lot::RwLock;
use reqwest::Url;
use serde::Deserialize;
use tokio::time::Duration;
use tracing::warn;

use crate::clock::Clock;
use crate::fetcher::{FetchContext, Fetcher, FetcherConfig, StaticUrl};
use crate::render::{
    AQUA, Align, LINE_HEIGHT, WHITE, YELLOW, draw_message, draw_no_data, fill_box, parse_hex_color,
    reduce_color, text_width, write_text, write_text_boxed,
};
use crate::slide::{Cadence, Slide};
use crate::surface::Surface;

const PREDICTIONS_URL: &str = "https://api-v3.mbta.com/predictions";
const REFRESH_INTERVAL: Duration = Duration::from_secs(60);
const TITLE: &str = "MBTA Trains";
const MAX_ROWS: usize = 3;
const TIMES_PER_ROW: usize = 3;

/// Display names for the stations this sign is usually pointed at.
const STATION_NAMES: &[(&str, &str)] = &[
    ("place-davis", "DAVIS SQUARE"),
    ("place-pktrm", "PARK STREET"),
    ("place-knncl", "KENDALL SQUARE"),
    ("place-chmnl", "CHARLES/MGH"),
    ("place-gover", "GOVERNMENT CENTER"),
    ("place-harsq", "HARVARD SQUARE"),
    ("place-spmnl", "SCIENCE PARK"),
    ("place-lech", "LECHMERE"),
    ("place-unsqu", "UNION SQUARE"),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RouteKind {
    LightRail,
    HeavyRail,
    CommuterRail,
    Bus,
    Unknown,
}

impl From<u8> for RouteKind {
    fn from(value: u8) -> Self {
        match value {
            0 => RouteKind::LightRail,
            1 => RouteKind::HeavyRail,
            2 => RouteKind::CommuterRail,
            3 => RouteKind::Bus,
            _ => RouteKind::Unknown,
        }
    }
}

/// A route heading to one destination.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Route {
    pub kind: RouteKind,
    pub id: String,
    pub color: String,
    pub destination: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RouteDepartures {
    pub route: Route,
    pub departures: Vec<DateTime<FixedOffset>>,
}

impl RouteDepartures {
    fn first_after(&self, now: &DateTime<FixedOffset>) -> Option<DateTime<FixedOffset>> {
        self.departures.iter().copied().filter(|t| t >= now).min()
    }
}

pub struct TransitSlide {
    name: String,
    station_name: String,
    fetcher: Fetcher,
    departures: Arc<RwLock<Vec<RouteDepartures>>>,
    clock: Arc<dyn Clock>,
}

impl TransitSlide {
    pub fn new(station: &str, clock: Arc<dyn Clock>, context: FetchContext) -> Result<Self> {
        let url = Url::parse_with_params(
            PREDICTIONS_URL,
            [("include", "route,trip"), ("filter[stop]", station)],
        )
        .with_context(|| format!("invalid station id {station:?}"))?;

        let station_name = match STATION_NAMES.iter().find(|(id, _)| *id == station) {
            Some((_, name)) => (*name).to_owned(),
            None => {
                warn!(station, "unknown station name");
                "?????".to_owned()
            }
        };

        let departures = Arc::new(RwLock::new(Vec::new()));
        let fetcher = Fetcher::new(
            FetcherConfig::new(format!("transit-{station}"), REFRESH_INTERVAL),
            StaticUrl(url),
            {
                let departures = departures.clone();
                move |body: &[u8]| match parse_predictions(body) {
                    Ok(parsed) => {
                        *departures.write() = parsed;
                        true
                    }
                    Err(err) => {
                        warn!("could not interpret transit predictions: {err}");
                        false
                    }
                }
            },
            context,
        );

        Ok(Self {
            name: format!("transit-{station}"),
            station_name,
            fetcher,
            departures,
            clock,
        })
    }

    pub fn fetcher(&self) -> &Fetcher {
        &self.fetcher
    }
}

impl Slide for TransitSlide {
    fn name(&self) -> &str {
        &self.name
    }

    fn initialize(&self) -> futures::future::BoxFuture<'_, ()> {
        Box::pin(async move {
            let _ = self.fetcher.start().await;
        })
    }

    fn terminate(&self) -> futures::future::BoxFuture<'_, ()> {
        Box::pin(async move {
            let _ = self.fetcher.stop().await;
        })
    }

    fn start_draw(&self) -> Cadence {
        Cadence::EVERY_SECOND
    }

    fn draw(&self, surface: &mut Surface) {
        // A failed refresh keeps showing the previous board.
        if !self.fetcher.has_loaded() {
            draw_no_data(surface, TITLE);
            return;
        }

        let now = self.clock.now();
        let mut rows: Vec<(DateTime<FixedOffset>, &RouteDepartures)> = Vec::new();
        let departures = self.departures.read();
        for route in departures.iter() {
            if let Some(first) = route.first_after(&now) {
                rows.push((first, route));
            }
        }
        if rows.is_empty() {
            draw_message(surface, TITLE, "No predictions");
            return;
        }
        rows.sort_by_key(|(first, _)| *first);

        let mid = surface.midpoint();
        let right = surface.width() as i32 - 1;
        write_text(surface, &self.station_name, YELLOW, Align::Center, mid, 0);

        for (row, (_, route)) in rows.iter().take(MAX_ROWS).enumerate() {
            let y = (row as i32 + 1) * LINE_HEIGHT;

            let mut upcoming: Vec<_> = route.departures.iter().filter(|t| **t >= now).collect();
            upcoming.sort();
            let minutes: Vec<String> = upcoming
                .iter()
                .take(TIMES_PER_ROW)
                .map(|t| (**t - now).num_minutes().to_string())
                .collect();
            let estimate = format!("{} MIN", minutes.join(","));

            let route = &route.route;
            if route.kind == RouteKind::Bus {
                write_text(surface, &route.id, YELLOW, Align::Center, 5, y);
            } else {
                let color = parse_hex_color(&route.color).map(reduce_color).unwrap_or(WHITE);
                fill_box(surface, color, 0, y, 11, 7);
            }

            let dest_width = (surface.width() - 12).saturating_sub(text_width(&estimate) + 1);
            let mut destination = route.destination.to_uppercase();
            if text_width(&destination) > dest_width {
                if let Some(first_word) = destination.split(' ').next() {
                    destination = first_word.to_owned();
                }
            }
            write_text_boxed(surface, &destination, WHITE, 12, y, dest_width);
            write_text(surface, &estimate, AQUA, Align::Right, right, y);
        }
    }
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    #[serde(default)]
    data: Vec<Resource>,
    #[serde(default)]
    included: Vec<Resource>,
}

#[derive(Debug, Deserialize)]
struct Resource {
    #[serde(rename = "type")]
    kind: String,
    id: String,
    #[serde(default)]
    attributes: Attributes,
    #[serde(default)]
    relationships: Relationships,
}

#[derive(Debug, Default, Deserialize)]
struct Attributes {
    departure_time: Option<String>,
    headsign: Option<String>,
    color: Option<String>,
    #[serde(rename = "type")]
    route_type: Option<u8>,
}

#[derive(Debug, Default, Deserialize)]
struct Relationships {
    trip: Option<Relationship>,
    route: Option<Relationship>,
}

#[derive(Debug, Deserialize)]
struct Relationship {
    data: Option<ResourceRef>,
}

#[derive(Debug, Deserialize)]
struct ResourceRef {
    id: String,
}

fn related_id(relationship: &Option<Relationship>) -> Option<&str> {
    relationship
        .as_ref()
        .and_then(|rel| rel.data.as_ref())
        .map(|data| data.id.as_str())
}

/// Groups predicted departures by route and destination, ordered by each
/// group's earliest departure.
pub fn parse_predictions(body: &[u8]) -> Result<Vec<RouteDepartures>, serde_json::Error> {
    let response: ApiResponse = serde_json::from_slice(body)?;

    let routes: HashMap<&str, (RouteKind, &str)> = response
        .included
        .iter()
        .filter(|resource| resource.kind == "route")
        .map(|resource| {
            let kind = resource
                .attributes
                .route_type
                .map_or(RouteKind::Unknown, RouteKind::from);
            let color = resource.attributes.color.as_deref().unwrap_or_default();
            (resource.id.as_str(), (kind, color))
        })
        .collect();

    let mut trips: HashMap<&str, Route> = HashMap::new();
    for trip in response.included.iter().filter(|r| r.kind == "trip") {
        let Some(route_id) = related_id(&trip.relationships.route) else {
            continue;
        };
        match routes.get(route_id) {
            Some((kind, color)) => {
                trips.insert(
                    trip.id.as_str(),
                    Route {
                        kind: *kind,
                        id: route_id.to_owned(),
                        color: (*color).to_owned(),
                        destination: trip.attributes.headsign.clone().unwrap_or_default(),
                    },
                );
            }
            None => warn!(route = route_id, "transit route missing from response"),
        }
    }

    let mut grouped: HashMap<Route, Vec<DateTime<FixedOffset>>> = HashMap::new();
    for prediction in response.data.iter().filter(|r| r.kind == "prediction") {
        let Some(raw) = prediction.attributes.departure_time.as_deref() else {
            continue;
        };
        let departure = match DateTime::parse_from_rfc3339(raw) {
            Ok(departure) => departure,
            Err(err) => {
                warn!(value = raw, "could not interpret departure time: {err}");
                continue;
            }
        };
        let Some(route) = related_id(&prediction.relationships.trip).and_then(|id| trips.get(id))
        else {
            warn!(prediction = %prediction.id, "prediction refers to an unknown trip");
            continue;
        };
        grouped.entry(route.clone()).or_default().push(departure);
    }

    let mut result: Vec<RouteDepartures> = grouped
        .into_iter()
        .map(|(route, mut departures)| {
            departures.sort();
            RouteDepartures { route, departures }
        })
        .collect();
    result.sort_by(|a, b| {
        a.departures
            .first()
            .cmp(&b.departures.first())
            .then_with(|| a.route.destination.cmp(&b.route.destination))
    });
    Ok(result)
}
