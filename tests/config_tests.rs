use std::io::Write;
use std::time::Duration;

use chrono::NaiveDate;
use chrono_tz::Tz;
use config_model::NightModeConfig;
use signboard::config::{Configuration, CountdownEventConfig, DisplaySink, SlideConfig};

fn parse(yaml: &str) -> anyhow::Result<Configuration> {
    serde_yaml::from_str::<Configuration>(yaml)?.validated()
}

#[test]
fn full_configuration_round_trips_from_disk() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(
        file,
        r##"
display:
  width: 64
  height: 32
  sink: none
advance-interval: 20s
timezone: America/New_York
night-mode:
  start-hour: 23
  end-hour: 6
readiness:
  probe-url: http://example.com/
  probe-interval: 2s
  sync-clock: true
controller:
  bind-address: 127.0.0.1
  port: 8080
debug-http-dir: /tmp/signboard-debug
welcome:
  title: HI THERE
slides:
  - kind: time
  - kind: countdown
    events:
      - date: 2026-07-04
        label: JULY 4
        color: "#FF0000"
  - kind: transit
    station: place-davis
"##
    )
    .unwrap();

    let cfg = Configuration::from_yaml_file(file.path())
        .unwrap()
        .validated()
        .unwrap();
    assert_eq!(cfg.display.sink, DisplaySink::None);
    assert_eq!(cfg.display.width, 64);
    assert_eq!(cfg.advance_interval, Duration::from_secs(20));
    assert_eq!(cfg.timezone, Some(Tz::America__New_York));
    assert_eq!(cfg.night_mode, Some(NightModeConfig::new(23, 6)));
    assert_eq!(cfg.readiness.probe_interval, Duration::from_secs(2));
    assert_eq!(
        cfg.readiness.clock_sync().unwrap()[0],
        "/usr/sbin/ntpdate"
    );
    assert_eq!(cfg.controller.port, 8080);
    assert_eq!(cfg.welcome.title_or_default(), "HI THERE");
    assert_eq!(cfg.welcome.subtitle_or_default(), "LOADING...");
    assert_eq!(
        cfg.slides[1],
        SlideConfig::Countdown {
            events: vec![CountdownEventConfig {
                date: NaiveDate::from_ymd_opt(2026, 7, 4).unwrap(),
                label: "JULY 4".into(),
                color: "#FF0000".into(),
            }]
        }
    );
}

#[test]
fn invalid_values_are_rejected() {
    let cases = [
        "night-mode:\n  start-hour: 24\n  end-hour: 5\n",
        "display:\n  width: 0\n",
        "readiness:\n  probe-url: \"  \"\n",
        "slides:\n  - kind: countdown\n    events:\n      - date: 2026-01-01\n        label: X\n        color: purple\n",
        "slides:\n  - kind: transit\n    station: \"\"\n",
        "welcome:\n  title: \"Grüße\"\n",
    ];
    for yaml in cases {
        assert!(parse(yaml).is_err(), "accepted: {yaml}");
    }
}

#[test]
fn unknown_keys_and_kinds_fail_to_parse() {
    assert!(parse("displays: {}\n").is_err());
    assert!(parse("slides:\n  - kind: flights\n").is_err());
    assert!(parse("timezone: Mars/Olympus_Mons\n").is_err());
}

#[test]
fn equal_night_hours_are_accepted_as_an_empty_window() {
    let cfg = parse("night-mode:\n  start-hour: 7\n  end-hour: 7\n").unwrap();
    assert!(cfg.night_mode.unwrap().is_empty());
}

#[test]
fn missing_file_is_an_error() {
    let tmp = tempfile::tempdir().unwrap();
    assert!(Configuration::from_yaml_file(tmp.path().join("absent.yaml")).is_err());
}

#[test]
fn shipped_sample_configuration_is_valid() {
    let path = concat!(env!("CARGO_MANIFEST_DIR"), "/config.yaml");
    let cfg = Configuration::from_yaml_file(path)
        .unwrap()
        .validated()
        .unwrap();
    let kinds: Vec<_> = cfg.slides.iter().map(|slide| slide.kind()).collect();
    assert!(kinds.iter().any(|kind| kind.as_ref() == "vaccination"));
    assert!(kinds.iter().any(|kind| kind.as_ref() == "covid"));
}
