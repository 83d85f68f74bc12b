extern crate anyhow;
extern crate chrono_tz;
extern crate hex;
extern crate image;
extern crate serde;
extern crate serde_json;
extern crate serde_with;
extern crate std;

use anyhow::Context;
use serde_with::{serde_as, DurationMilliSeconds, DurationSeconds};
use std::time::Duration;

use crate::result;

pub const DEFAULT_DATA_URL: &str = "https://baptistepauletto.github.io/metro/data.json";

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct Palette {
    #[serde(deserialize_with = "deserialize_hex_color")]
    pub metro: image::Rgb<u8>,
    #[serde(deserialize_with = "deserialize_hex_color")]
    pub stock_up: image::Rgb<u8>,
    #[serde(deserialize_with = "deserialize_hex_color")]
    pub stock_down: image::Rgb<u8>,
    #[serde(deserialize_with = "deserialize_hex_color")]
    pub time: image::Rgb<u8>,
    #[serde(deserialize_with = "deserialize_hex_color")]
    pub status: image::Rgb<u8>,
    #[serde(deserialize_with = "deserialize_hex_color")]
    pub dim: image::Rgb<u8>,
    #[serde(deserialize_with = "deserialize_hex_color")]
    pub alert: image::Rgb<u8>,
}

impl Default for Palette {
    fn default() -> Palette {
        return Palette{
            metro: image::Rgb([217, 87, 0]),
            stock_up: image::Rgb([0, 255, 0]),
            stock_down: image::Rgb([255, 0, 0]),
            time: image::Rgb([255, 200, 0]),
            status: image::Rgb([255, 255, 255]),
            dim: image::Rgb([100, 100, 100]),
            alert: image::Rgb([255, 0, 0]),
        };
    }
}

/// Everything the device reads once at startup. Built by `Config::load`
/// and handed out by reference; nothing mutates it afterwards.
#[serde_as]
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct Config {
    pub data_url: String,
    pub fallback_path: std::path::PathBuf,

    #[serde_as(as = "DurationSeconds<u64>")]
    pub poll_interval: Duration,
    #[serde_as(as = "DurationSeconds<u64>")]
    pub countdown_interval: Duration,
    #[serde_as(as = "DurationSeconds<u64>")]
    pub fetch_timeout: Duration,
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    pub frame_interval: Duration,

    pub background_fetch: bool,

    pub panel_width: u32,
    pub panel_height: u32,
    pub bit_depth: u8,
    pub brightness: f32,
    pub scroll_step: i32,

    pub font_path: std::path::PathBuf,
    pub font_size: f32,

    #[serde(deserialize_with = "deserialize_timezone")]
    pub timezone: chrono_tz::Tz,

    pub colors: Palette,
}

impl Default for Config {
    fn default() -> Config {
        return Config{
            data_url: DEFAULT_DATA_URL.to_string(),
            fallback_path: std::path::PathBuf::from("schedule.json"),
            poll_interval: Duration::from_secs(300),
            countdown_interval: Duration::from_secs(30),
            fetch_timeout: Duration::from_secs(10),
            frame_interval: Duration::from_millis(33),
            background_fetch: true,
            panel_width: 64,
            panel_height: 32,
            bit_depth: 4,
            brightness: 0.3,
            scroll_step: 1,
            font_path: std::path::PathBuf::from(
                "/usr/share/fonts/truetype/roboto/hinted/RobotoCondensed-Regular.ttf"),
            font_size: 10.0,
            timezone: chrono_tz::America::Montreal,
            colors: Palette::default(),
        };
    }
}

impl Config {
    /// Defaults, overridden by the JSON file at `path` when one is given.
    pub fn load<P: AsRef<std::path::Path>>(path: Option<P>) -> result::DashResult<Config> {
        let config = match path {
            None => Config::default(),
            Some(path) => Config::from_file(path)?,
        };
        config.validate()?;
        return Ok(config);
    }

    fn from_file<P: AsRef<std::path::Path>>(path: P) -> result::DashResult<Config> {
        let debug_path = path.as_ref().display().to_string();
        let file = std::fs::File::open(path.as_ref())
            .with_context(|| format!("Opening config from '{}'", debug_path))?;
        let reader = std::io::BufReader::new(file);
        let config: Config = serde_json::from_reader(reader)
            .with_context(|| format!("while parsing config '{}'", debug_path))?;
        return Ok(config);
    }

    pub fn validate(&self) -> result::DashResult<()> {
        if self.data_url.trim().is_empty() {
            return Err(result::make_error("data_url must not be empty"));
        }
        if !(0.0..=1.0).contains(&self.brightness) {
            return Err(result::make_error(&format!(
                "brightness must be within 0.0..=1.0, got {}", self.brightness)));
        }
        if self.scroll_step < 1 {
            return Err(result::make_error("scroll_step must be at least 1"));
        }
        if self.panel_width == 0 || self.panel_height == 0 {
            return Err(result::make_error("panel dimensions must be non-zero"));
        }
        // Three text bands, and the panel lights rows in top/bottom pairs.
        if self.panel_height < 3 || self.panel_height % 2 != 0 {
            return Err(result::make_error(&format!(
                "panel_height must be even and at least 3, got {}", self.panel_height)));
        }
        if self.bit_depth == 0 || self.bit_depth > 8 {
            return Err(result::make_error("bit_depth must be within 1..=8"));
        }
        if self.font_size <= 0.0 {
            return Err(result::make_error("font_size must be positive"));
        }
        for (name, interval) in &[
            ("poll_interval", self.poll_interval),
            ("countdown_interval", self.countdown_interval),
            ("fetch_timeout", self.fetch_timeout),
            ("frame_interval", self.frame_interval)] {
            if *interval == Duration::from_secs(0) {
                return Err(result::make_error(&format!("{} must be non-zero", name)));
            }
        }
        return Ok(());
    }
}

pub fn parse_hex_color(raw: &str) -> result::DashResult<image::Rgb<u8>> {
    let trimmed = raw.trim().trim_start_matches('#');
    let bytes = hex::decode(trimmed)
        .with_context(|| format!("Invalid color '{}'", raw))?;
    if bytes.len() != 3 {
        return Err(result::make_error(&format!(
            "Color '{}' must be 3 bytes of hex, like D95700", raw)));
    }
    return Ok(image::Rgb([bytes[0], bytes[1], bytes[2]]));
}

fn deserialize_hex_color<'de, D>(deserializer: D) -> Result<image::Rgb<u8>, D::Error>
where D: serde::Deserializer<'de> {
    use serde::Deserialize;
    let raw = String::deserialize(deserializer)?;
    return parse_hex_color(&raw).map_err(serde::de::Error::custom);
}

fn deserialize_timezone<'de, D>(deserializer: D) -> Result<chrono_tz::Tz, D::Error>
where D: serde::Deserializer<'de> {
    use serde::Deserialize;
    let raw = String::deserialize(deserializer)?;
    return raw.parse::<chrono_tz::Tz>()
        .map_err(|e| serde::de::Error::custom(format!("unknown timezone '{}': {}", raw, e)));
}

#[cfg(test)]
mod tests {
    use super::Config;
    use std::time::Duration;

    #[test]
    fn defaults_match_device_constants() {
        let config = Config::load::<&str>(None).expect("default config");
        assert_eq!(Duration::from_secs(300), config.poll_interval);
        assert_eq!(Duration::from_secs(30), config.countdown_interval);
        assert_eq!(0.3, config.brightness);
        assert_eq!(64, config.panel_width);
        assert_eq!(32, config.panel_height);
        assert_eq!(image::Rgb([217, 87, 0]), config.colors.metro);
        assert_eq!(chrono_tz::America::Montreal, config.timezone);
    }

    #[test]
    fn file_overrides_only_named_fields() {
        let config: Config = serde_json::from_str(r##"{
            "data_url": "https://example.com/data.json",
            "poll_interval": 60,
            "frame_interval": 50,
            "timezone": "America/Toronto",
            "colors": {"metro": "#00A650"}
        }"##).expect("parse config");

        assert_eq!("https://example.com/data.json", config.data_url);
        assert_eq!(Duration::from_secs(60), config.poll_interval);
        assert_eq!(Duration::from_millis(50), config.frame_interval);
        assert_eq!(chrono_tz::America::Toronto, config.timezone);
        assert_eq!(image::Rgb([0x00, 0xA6, 0x50]), config.colors.metro);
        assert_eq!(image::Rgb([255, 200, 0]), config.colors.time);
        assert_eq!(Duration::from_secs(10), config.fetch_timeout);
        config.validate().expect("valid");
    }

    #[test]
    fn bad_values_are_rejected() {
        assert!(serde_json::from_str::<Config>(r#"{"timezone": "Mars/Olympus"}"#).is_err());
        assert!(serde_json::from_str::<Config>(r#"{"colors": {"time": "FFF"}}"#).is_err());

        let mut config = Config::default();
        config.brightness = 1.5;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.poll_interval = Duration::from_secs(0);
        assert!(config.validate().is_err());
    }

    #[test]
    fn missing_config_file() {
        assert!(Config::load(Some("testdata/no-such-config.json")).is_err());
    }

    #[test]
    fn config_file_from_testdata() {
        let config = Config::load(Some("testdata/config.json")).expect("load config");
        assert_eq!(std::path::PathBuf::from("testdata/schedule.json"), config.fallback_path);
        assert!(!config.background_fetch);
    }
}
