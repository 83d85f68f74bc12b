extern crate chrono;
extern crate chrono_tz;
extern crate image;

use crate::config;
use crate::result;
use crate::schedule;
use crate::scroll;
use crate::snapshot;

pub const LINE_COUNT: usize = 3;

pub const NO_DATA: &str = "NO DATA";
const NOT_AVAILABLE: &str = "N/A";

#[derive(Debug, Clone, PartialEq)]
pub struct LineContent {
    pub text: String,
    pub color: image::Rgb<u8>,
}

impl LineContent {
    pub fn blank() -> LineContent {
        return LineContent{
            text: "".to_string(),
            color: image::Rgb([0, 0, 0]),
        };
    }
}

pub fn metro_line(metro: &snapshot::MetroInfo, palette: &config::Palette) -> LineContent {
    let countdown = match metro.minutes_until {
        Some(minutes) if minutes >= 0 => format!("{} MIN", minutes),
        _ => NOT_AVAILABLE.to_string(),
    };
    return LineContent{
        text: format!("METRO: {} • {}", metro.station.to_uppercase(), countdown),
        color: palette.metro,
    };
}

pub fn stock_line(stock: &snapshot::StockInfo, palette: &config::Palette) -> LineContent {
    let status = if stock.market_open { "OPEN" } else { "CLOSED" };
    // -0.0 would otherwise print as "-0.0" while being colored as a gain.
    let change = if stock.change_percent == 0.0 { 0.0 } else { stock.change_percent };
    let color = if change >= 0.0 { palette.stock_up } else { palette.stock_down };
    return LineContent{
        text: format!("STOCK: {} ${:.2} {:+.1}% • {}",
                      stock.symbol, stock.price.unwrap_or(0.0), change, status),
        color: color,
    };
}

pub fn time_line(time: &snapshot::TimeInfo, palette: &config::Palette) -> LineContent {
    return LineContent{
        text: format!("TIME: {} • {}", time.display, time.date),
        color: palette.time,
    };
}

/// The three rows for a fetched snapshot. Same snapshot in, same bytes out.
pub fn derive_lines(snapshot: &snapshot::Snapshot, palette: &config::Palette) -> [LineContent; LINE_COUNT] {
    return [
        metro_line(&snapshot.metro, palette),
        stock_line(&snapshot.stock, palette),
        time_line(&snapshot.time, palette),
    ];
}

pub fn fallback_lines(metro: &snapshot::MetroInfo, palette: &config::Palette) -> [LineContent; LINE_COUNT] {
    return [
        metro_line(metro, palette),
        LineContent{text: format!("STOCK: {}", NOT_AVAILABLE), color: palette.dim},
        LineContent{text: format!("TIME: {}", NOT_AVAILABLE), color: palette.dim},
    ];
}

pub fn no_data_lines(palette: &config::Palette) -> [LineContent; LINE_COUNT] {
    let line = LineContent{text: NO_DATA.to_string(), color: palette.alert};
    return [line.clone(), line.clone(), line];
}

#[derive(Debug, Clone, PartialEq)]
pub enum DataSource {
    /// Nothing attempted yet.
    Empty,
    Live(snapshot::Snapshot),
    /// The local timetable, and the metro row last computed from it.
    Fallback(schedule::FallbackSchedule, snapshot::MetroInfo),
    NoData,
}

impl DataSource {
    pub fn label(&self) -> &'static str {
        match *self {
            DataSource::Empty => "empty",
            DataSource::Live(_) => "live",
            DataSource::Fallback(..) => "fallback",
            DataSource::NoData => "no data",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FetchOutcome {
    Updated,
    KeptPrevious,
    UsedFallback,
    NoData,
}

/// What is on the panel right now: where the data came from, and the
/// three rows derived from it.
pub struct RenderState {
    source: DataSource,
    lines: [scroll::ScrollingLine; LINE_COUNT],
    palette: config::Palette,
}

impl RenderState {
    pub fn new(palette: &config::Palette, display_width: i32) -> RenderState {
        return RenderState{
            source: DataSource::Empty,
            lines: [
                scroll::ScrollingLine::new(display_width),
                scroll::ScrollingLine::new(display_width),
                scroll::ScrollingLine::new(display_width),
            ],
            palette: palette.clone(),
        };
    }

    pub fn source(&self) -> &DataSource {
        return &self.source;
    }

    pub fn lines(&self) -> &[scroll::ScrollingLine; LINE_COUNT] {
        return &self.lines;
    }

    pub fn lines_mut(&mut self) -> &mut [scroll::ScrollingLine; LINE_COUNT] {
        return &mut self.lines;
    }

    pub fn has_content(&self) -> bool {
        return self.source != DataSource::Empty;
    }

    pub fn texts(&self) -> Vec<String> {
        return self.lines.iter().map(|l| l.content().text.clone()).collect();
    }

    /// Folds one fetch attempt into the state. A good snapshot replaces
    /// everything. A failure keeps the last good snapshot; without one, the
    /// metro row comes from the timetable `load_fallback` returns, counted
    /// from `now`, and if that fails too every row reads NO DATA.
    pub fn apply_fetch<F>(&mut self,
                          outcome: result::DashResult<snapshot::Snapshot>,
                          now: &chrono::DateTime<chrono_tz::Tz>,
                          load_fallback: F,
                          measure: &dyn scroll::TextMeasure) -> FetchOutcome
    where F: FnOnce() -> result::DashResult<schedule::FallbackSchedule> {
        let err = match outcome {
            Ok(snapshot) => {
                let lines = derive_lines(&snapshot, &self.palette);
                self.source = DataSource::Live(snapshot);
                self.set_lines(lines, measure);
                return FetchOutcome::Updated;
            },
            Err(err) => err,
        };

        if let DataSource::Live(_) = self.source {
            warn!("Fetch failed, keeping previous snapshot: {}", err);
            return FetchOutcome::KeptPrevious;
        }

        warn!("Fetch failed with no previous snapshot: {}", err);
        match load_fallback() {
            Ok(timetable) => {
                let metro = schedule::fallback_metro(&timetable, now);
                match metro.next_departure {
                    Some(ref departure) => info!("Fallback next departure from {}: {}", metro.station, departure),
                    None => warn!("Fallback schedule for {} has no departures", metro.station),
                }
                let lines = fallback_lines(&metro, &self.palette);
                self.source = DataSource::Fallback(timetable, metro);
                self.set_lines(lines, measure);
                return FetchOutcome::UsedFallback;
            },
            Err(fallback_err) => {
                if let DataSource::Fallback(..) = self.source {
                    warn!("Fallback reload failed, keeping the one we had: {}", fallback_err);
                    return FetchOutcome::KeptPrevious;
                }
                error!("{}", fallback_err);
                self.source = DataSource::NoData;
                let lines = no_data_lines(&self.palette);
                self.set_lines(lines, measure);
                return FetchOutcome::NoData;
            },
        }
    }

    /// Recomputes the metro countdown. A fetched departure that has gone
    /// reads N/A until the next fetch; the timetable moves on to its next
    /// train. Only the metro row can change. Returns whether it did.
    pub fn refresh_countdown(&mut self, now: &chrono::DateTime<chrono_tz::Tz>, measure: &dyn scroll::TextMeasure) -> bool {
        let metro = match self.source {
            DataSource::Live(ref mut snapshot) => {
                let metro = &mut snapshot.metro;
                match metro.next_departure {
                    Some(ref departure) => metro.minutes_until = schedule::minutes_until(departure, now),
                    None => return false,
                }
                metro
            },
            DataSource::Fallback(ref timetable, ref mut metro) => {
                *metro = schedule::fallback_metro(timetable, now);
                metro
            },
            _ => return false,
        };

        let line = metro_line(metro, &self.palette);
        return self.lines[0].set_content(line, measure);
    }

    pub fn tick(&mut self, step: i32) {
        for line in self.lines.iter_mut() {
            line.tick(step);
        }
    }

    /// Puts every row at the left edge, for a still picture of the text.
    pub fn align_left(&mut self) {
        for line in self.lines.iter_mut() {
            line.park_at(0);
        }
    }

    fn set_lines(&mut self, lines: [LineContent; LINE_COUNT], measure: &dyn scroll::TextMeasure) {
        for (line, content) in self.lines.iter_mut().zip(lines.iter()) {
            line.set_content(content.clone(), measure);
        }
    }
}
