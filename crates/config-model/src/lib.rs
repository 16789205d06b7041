use std::borrow::Cow;

use anyhow::{Result, ensure};
use serde::Deserialize;

pub use night::NightModeConfig;
pub use welcome::WelcomeScreenConfig;

mod welcome {
    use super::*;

    /// Text shown by the welcome pseudo-slide while the show waits for
    /// connectivity and the first round of slide data.
    #[derive(Debug, Clone, Deserialize, Default, PartialEq, Eq)]
    #[serde(rename_all = "kebab-case", default, deny_unknown_fields)]
    pub struct WelcomeScreenConfig {
        pub title: Option<String>,
        pub subtitle: Option<String>,
    }

    impl WelcomeScreenConfig {
        pub fn title_or_default(&self) -> Cow<'_, str> {
            match &self.title {
                Some(title) if !title.trim().is_empty() => Cow::Borrowed(title.as_str()),
                _ => Cow::Borrowed("HELLO!"),
            }
        }

        pub fn subtitle_or_default(&self) -> Cow<'_, str> {
            match &self.subtitle {
                Some(subtitle) if !subtitle.trim().is_empty() => Cow::Borrowed(subtitle.as_str()),
                _ => Cow::Borrowed("LOADING..."),
            }
        }

        pub fn validate(&self) -> Result<()> {
            for (field, value) in [("title", &self.title), ("subtitle", &self.subtitle)] {
                if let Some(text) = value {
                    ensure!(
                        text.is_ascii(),
                        "welcome.{} must only contain ASCII characters",
                        field
                    );
                }
            }
            Ok(())
        }
    }
}

mod night {
    use super::*;

    /// Daily quiet window, in whole hours on a 24-hour clock.
    ///
    /// `start-hour > end-hour` wraps past midnight. Equal hours describe an
    /// empty window, so night mode never engages.
    #[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
    #[serde(rename_all = "kebab-case", deny_unknown_fields)]
    pub struct NightModeConfig {
        pub start_hour: u32,
        pub end_hour: u32,
    }

    impl NightModeConfig {
        pub fn new(start_hour: u32, end_hour: u32) -> Self {
            Self {
                start_hour,
                end_hour,
            }
        }

        pub fn wraps_midnight(&self) -> bool {
            self.start_hour > self.end_hour
        }

        pub fn is_empty(&self) -> bool {
            self.start_hour == self.end_hour
        }

        pub fn validate(&self) -> Result<()> {
            ensure!(
                self.start_hour < 24,
                "night-mode.start-hour must be between 0 and 23"
            );
            ensure!(
                self.end_hour < 24,
                "night-mode.end-hour must be between 0 and 23"
            );
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn night_mode_parses_kebab_case_hours() {
        let cfg: NightModeConfig = serde_yaml::from_str("start-hour: 23\nend-hour: 5\n").unwrap();
        assert_eq!(cfg, NightModeConfig::new(23, 5));
        assert!(cfg.wraps_midnight());
        assert!(!cfg.is_empty());
        cfg.validate().unwrap();
    }

    #[test]
    fn night_mode_rejects_out_of_range_hours() {
        assert!(NightModeConfig::new(24, 5).validate().is_err());
        assert!(NightModeConfig::new(22, 30).validate().is_err());
    }

    #[test]
    fn night_mode_rejects_unknown_fields() {
        let parsed: Result<NightModeConfig, _> =
            serde_yaml::from_str("start-hour: 1\nend-hour: 2\nminutes: 3\n");
        assert!(parsed.is_err());
    }

    #[test]
    fn welcome_falls_back_to_defaults_for_blank_text() {
        let cfg: WelcomeScreenConfig = serde_yaml::from_str("title: \"  \"\n").unwrap();
        assert_eq!(cfg.title_or_default(), "HELLO!");
        assert_eq!(cfg.subtitle_or_default(), "LOADING...");

        let cfg: WelcomeScreenConfig =
            serde_yaml::from_str("title: HI\nsubtitle: Corner Sign\n").unwrap();
        assert_eq!(cfg.title_or_default(), "HI");
        assert_eq!(cfg.subtitle_or_default(), "Corner Sign");
    }

    #[test]
    fn welcome_rejects_non_ascii_text() {
        let cfg: WelcomeScreenConfig = serde_yaml::from_str("title: \"Grüße\"\n").unwrap();
        assert!(cfg.validate().is_err());
    }
}
