use std::borrow::Cow;
use std::net::IpAddr;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, ensure};
use chrono::NaiveDate;
use chrono_tz::Tz;
use config_model::{NightModeConfig, WelcomeScreenConfig};
use serde::Deserialize;
use tokio::time::Duration;

use crate::render::parse_hex_color;

/// Rows below the title line on a 32-dot panel.
pub const MAX_PANDEMIC_REGIONS: usize = 3;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", default, deny_unknown_fields)]
pub struct Configuration {
    pub display: DisplayConfig,
    /// Time each slide stays up before the show advances.
    #[serde(with = "humantime_serde")]
    pub advance_interval: Duration,
    /// IANA timezone for every clock reading. The host's local time when unset.
    pub timezone: Option<Tz>,
    /// Daily quiet hours during which the display is blanked.
    pub night_mode: Option<NightModeConfig>,
    pub readiness: ReadinessConfig,
    pub controller: ControllerConfig,
    /// Writes every raw fetch body into this directory when set.
    pub debug_http_dir: Option<PathBuf>,
    pub welcome: WelcomeScreenConfig,
    pub slides: Vec<SlideConfig>,
}

impl Default for Configuration {
    fn default() -> Self {
        Self {
            display: DisplayConfig::default(),
            advance_interval: Duration::from_secs(15),
            timezone: None,
            night_mode: None,
            readiness: ReadinessConfig::default(),
            controller: ControllerConfig::default(),
            debug_http_dir: None,
            welcome: WelcomeScreenConfig::default(),
            slides: Vec::new(),
        }
    }
}

impl Configuration {
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self> {
        let s = std::fs::read_to_string(path)?;
        Ok(serde_yaml::from_str(&s)?)
    }

    /// Validate runtime invariants that cannot be expressed via serde defaults alone.
    pub fn validated(self) -> Result<Self> {
        ensure!(
            !self.advance_interval.is_zero(),
            "advance-interval must be greater than zero"
        );
        self.display
            .validate()
            .context("invalid display configuration")?;
        if let Some(night) = &self.night_mode {
            night.validate().context("invalid night-mode configuration")?;
        }
        self.readiness
            .validate()
            .context("invalid readiness configuration")?;
        self.welcome
            .validate()
            .context("invalid welcome configuration")?;
        for (idx, slide) in self.slides.iter().enumerate() {
            slide
                .validate()
                .with_context(|| format!("invalid slide #{idx} ({})", slide.kind()))?;
        }
        Ok(self)
    }
}

#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "kebab-case")]
pub enum DisplaySink {
    /// Simulated panel written to a PNG file on every frame.
    #[default]
    Png,
    /// Frames are discarded.
    None,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", default, deny_unknown_fields)]
pub struct DisplayConfig {
    pub width: u32,
    pub height: u32,
    pub sink: DisplaySink,
    /// Output file for the png sink.
    pub output: PathBuf,
    /// Rendered pixels per panel dot.
    pub scale: u32,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            width: 128,
            height: 32,
            sink: DisplaySink::default(),
            output: PathBuf::from("render/display.png"),
            scale: 8,
        }
    }
}

impl DisplayConfig {
    fn validate(&self) -> Result<()> {
        ensure!(
            self.width > 0 && self.height > 0,
            "width and height must be greater than zero"
        );
        ensure!(self.scale > 0, "scale must be greater than zero");
        if self.sink == DisplaySink::Png {
            ensure!(
                !self.output.as_os_str().is_empty(),
                "output must be set for the png sink"
            );
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", default, deny_unknown_fields)]
pub struct ReadinessConfig {
    /// Any response from this URL means the network is up.
    pub probe_url: String,
    #[serde(with = "humantime_serde")]
    pub probe_interval: Duration,
    pub sync_clock: bool,
    pub clock_sync_command: Vec<String>,
}

impl Default for ReadinessConfig {
    fn default() -> Self {
        Self {
            probe_url: "http://clients3.google.com/generate_204".into(),
            probe_interval: Duration::from_secs(1),
            sync_clock: false,
            clock_sync_command: vec![
                "/usr/sbin/ntpdate".into(),
                "-s".into(),
                "time.google.com".into(),
            ],
        }
    }
}

impl ReadinessConfig {
    fn validate(&self) -> Result<()> {
        ensure!(!self.probe_url.trim().is_empty(), "probe-url must not be empty");
        ensure!(
            !self.probe_interval.is_zero(),
            "probe-interval must be greater than zero"
        );
        if self.sync_clock {
            ensure!(
                !self.clock_sync_command.is_empty(),
                "clock-sync-command must not be empty when sync-clock is enabled"
            );
        }
        Ok(())
    }

    /// The command to run after connectivity is confirmed, if enabled.
    pub fn clock_sync(&self) -> Option<Vec<String>> {
        self.sync_clock.then(|| self.clock_sync_command.clone())
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", default, deny_unknown_fields)]
pub struct ControllerConfig {
    pub bind_address: IpAddr,
    pub port: u16,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            bind_address: IpAddr::from([0, 0, 0, 0]),
            port: 5000,
        }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct CountdownEventConfig {
    pub date: NaiveDate,
    pub label: String,
    /// `RRGGBB` hex.
    pub color: String,
}

/// A place whose rows are summed into one line of a pandemic slide.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct RegionConfig {
    /// Location as spelled in the feed (`Massachusetts`, `United States`, `US`).
    pub name: String,
    /// Short label drawn at the start of the row.
    pub label: String,
}

impl RegionConfig {
    pub fn new(name: &str, label: &str) -> Self {
        Self {
            name: name.to_owned(),
            label: label.to_owned(),
        }
    }
}

fn default_vaccination_regions() -> Vec<RegionConfig> {
    vec![
        RegionConfig::new("United States", "US"),
        RegionConfig::new("Massachusetts", "Mass"),
        RegionConfig::new("Arizona", "Ariz"),
    ]
}

fn default_covid_regions() -> Vec<RegionConfig> {
    vec![
        RegionConfig::new("US", "US"),
        RegionConfig::new("Massachusetts", "Mass"),
        RegionConfig::new("Arizona", "Ariz"),
    ]
}

/// One entry of the rotation, tagged by `kind`.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum SlideConfig {
    Time,
    Countdown {
        events: Vec<CountdownEventConfig>,
    },
    Christmas,
    NewYear,
    /// MBTA departures for a stop id such as `place-davis`.
    Transit {
        station: String,
    },
    /// NWS forecast office gridpoint (`BOX/69,76`) and observation station.
    Weather {
        office: String,
        station: String,
    },
    /// People vaccinated per region from the OWID state vaccination CSV.
    Vaccination {
        #[serde(default = "default_vaccination_regions")]
        regions: Vec<RegionConfig>,
    },
    /// Confirmed cases per region from the JHU CSSE daily reports.
    Covid {
        #[serde(default = "default_covid_regions")]
        regions: Vec<RegionConfig>,
    },
}

impl SlideConfig {
    pub fn kind(&self) -> Cow<'static, str> {
        Cow::Borrowed(match self {
            SlideConfig::Time => "time",
            SlideConfig::Countdown { .. } => "countdown",
            SlideConfig::Christmas => "christmas",
            SlideConfig::NewYear => "new-year",
            SlideConfig::Transit { .. } => "transit",
            SlideConfig::Weather { .. } => "weather",
            SlideConfig::Vaccination { .. } => "vaccination",
            SlideConfig::Covid { .. } => "covid",
        })
    }

    fn validate(&self) -> Result<()> {
        match self {
            SlideConfig::Countdown { events } => {
                for event in events {
                    ensure!(
                        !event.label.trim().is_empty(),
                        "countdown event on {} needs a label",
                        event.date
                    );
                    parse_hex_color(&event.color)
                        .with_context(|| format!("countdown event {:?}", event.label))?;
                }
            }
            SlideConfig::Transit { station } => {
                ensure!(!station.trim().is_empty(), "station must not be empty");
            }
            SlideConfig::Weather { office, station } => {
                ensure!(!office.trim().is_empty(), "office must not be empty");
                ensure!(!station.trim().is_empty(), "station must not be empty");
            }
            SlideConfig::Vaccination { regions } | SlideConfig::Covid { regions } => {
                ensure!(!regions.is_empty(), "at least one region is required");
                ensure!(
                    regions.len() <= MAX_PANDEMIC_REGIONS,
                    "at most {MAX_PANDEMIC_REGIONS} regions fit on the panel"
                );
                for region in regions {
                    ensure!(!region.name.trim().is_empty(), "region name must not be empty");
                    ensure!(
                        !region.label.trim().is_empty(),
                        "region {:?} needs a label",
                        region.name
                    );
                }
            }
            SlideConfig::Time | SlideConfig::Christmas | SlideConfig::NewYear => {}
        }
        Ok(())
    }
}
