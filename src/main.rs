// sudo apt-get install fonts-roboto libssl-dev
extern crate chrono;
extern crate chrono_tz;
extern crate flexi_logger;
extern crate getopts;
extern crate image;
#[macro_use]
extern crate log;
#[macro_use]
extern crate serde_derive;

mod config;
mod debug;
mod display;
mod drawing;
mod lines;
mod poll;
mod result;
mod schedule;
mod scroll;
mod snapshot;
mod worker;

pub const VERSION: Option<&'static str> = option_env!("METRODASH_VERSION");

struct MetroDash<'a> {
    config: &'a config::Config,
    styles: drawing::Styles,
    state: lines::RenderState,
    frame: image::RgbImage,
    panel: Box<dyn display::Panel>,

    fetch_timer: poll::PollTimer,
    countdown_timer: poll::PollTimer,
    worker: Option<worker::FetchWorker>,

    debug_server: Option<debug::DebugServer>,
    png_out: Option<String>,

    // A status screen is covering the lines; repaint everything next frame.
    status_shown: bool,
    // The lines changed; write the PNG once they are drawn.
    save_pending: bool,
    last_fetch: String,
}

impl<'a> MetroDash<'a> {
    fn new(config: &'a config::Config,
           panel: Box<dyn display::Panel>,
           debug_server: Option<debug::DebugServer>,
           png_out: Option<String>) -> result::DashResult<MetroDash<'a>> {
        let styles = drawing::Styles::load(&config.font_path, config.font_size)?;

        let worker = if config.background_fetch {
            Some(worker::FetchWorker::spawn(&config.data_url, config.fetch_timeout)?)
        } else {
            None
        };

        return Ok(MetroDash{
            config: config,
            styles: styles,
            state: lines::RenderState::new(&config.colors, config.panel_width as i32),
            frame: drawing::new_frame(config.panel_width, config.panel_height),
            panel: panel,
            fetch_timer: poll::PollTimer::new(config.poll_interval),
            countdown_timer: poll::PollTimer::new(config.countdown_interval),
            worker: worker,
            debug_server: debug_server,
            png_out: png_out,
            status_shown: false,
            save_pending: false,
            last_fetch: "never".to_string(),
        });
    }

    fn local_now(&self) -> chrono::DateTime<chrono_tz::Tz> {
        return chrono::Utc::now().with_timezone(&self.config.timezone);
    }

    fn show_status(&mut self, message: &str, color: image::Rgb<u8>) -> result::DashResult<()> {
        drawing::draw_status(&mut self.frame, &self.styles, message, color);
        self.status_shown = true;
        return self.panel.show(&self.frame, self.config.frame_interval);
    }

    fn fetch_blocking(&mut self) {
        info!("Fetching {}", self.config.data_url);
        let outcome = snapshot::fetch_snapshot(&self.config.data_url, self.config.fetch_timeout);
        self.apply(outcome);
    }

    fn apply(&mut self, outcome: result::DashResult<snapshot::Snapshot>) {
        if let Err(ref err) = outcome {
            if !err.is_fetch_failure() {
                error!("Unexpected fetch error: {}", err);
            }
        }

        let now = self.local_now();
        let fallback_path = self.config.fallback_path.clone();
        let before = self.state.texts();

        let applied = self.state.apply_fetch(
            outcome,
            &now,
            || schedule::load_schedule(&fallback_path),
            &self.styles);

        self.last_fetch = format!("{:?} at {}", applied, now.format("%Y-%m-%d %H:%M:%S %Z"));
        info!("Fetch result: {:?} (source: {}), next fetch in {:?}",
              applied, self.state.source().label(),
              self.fetch_timer.time_until_due(std::time::Instant::now()));

        let after = self.state.texts();
        if before != after {
            for (index, text) in after.iter().enumerate() {
                info!("Line {}: {}", index + 1, text);
            }
            self.save_pending = true;
        }
    }

    fn save_png(&self) {
        if let Some(ref png_out) = self.png_out {
            if let Err(err) = self.frame.save(png_out) {
                warn!("Couldn't save {}: {}", png_out, err);
            }
        }
    }

    /// Starts, collects or runs a fetch, depending on the mode and timers.
    fn poll_data(&mut self, now: std::time::Instant) {
        let mut finished = None;
        if let Some(ref mut worker) = self.worker {
            finished = worker.try_result();
            if self.fetch_timer.is_due(now) && !worker.is_in_flight() {
                self.fetch_timer.mark_attempt(now);
                debug!("Requesting background fetch of {}", self.config.data_url);
                worker.request();
            }
        } else if self.fetch_timer.take_due(now) {
            self.fetch_blocking();
            self.countdown_timer.mark_attempt(now);
        }

        if let Some(outcome) = finished {
            self.apply(outcome);
            self.countdown_timer.mark_attempt(now);
        }
    }

    fn one_iteration(&mut self) -> result::DashResult<()> {
        let frame_start = std::time::Instant::now();

        self.poll_data(frame_start);

        if self.countdown_timer.take_due(frame_start) {
            let now = self.local_now();
            if self.state.refresh_countdown(&now, &self.styles) {
                info!("Countdown updated: {}", self.state.texts()[0]);
            }
        }

        if self.state.has_content() {
            self.state.tick(self.config.scroll_step);
            drawing::render_lines(&mut self.frame, &self.styles, &mut self.state, self.status_shown);
            self.status_shown = false;
            if self.save_pending {
                self.save_png();
                self.save_pending = false;
            }
        } else if !self.status_shown {
            drawing::draw_status(&mut self.frame, &self.styles, "LOADING", self.config.colors.status);
            self.status_shown = true;
        }

        if let Some(ref debug_server) = self.debug_server {
            let texts = self.state.texts();
            let status = debug::DebugStatus{
                version: VERSION,
                source: self.state.source().label(),
                last_fetch: &self.last_fetch,
                lines: texts,
            };
            debug_server.poll(&status, &self.frame);
        }

        let hold = self.config.frame_interval.checked_sub(frame_start.elapsed())
            .unwrap_or(std::time::Duration::from_millis(0));
        return self.panel.show(&self.frame, hold);
    }

    /// Fetch once and leave a still picture of the text behind.
    fn one_shot(&mut self) -> result::DashResult<()> {
        self.fetch_blocking();
        self.state.align_left();
        drawing::render_lines(&mut self.frame, &self.styles, &mut self.state, true);
        self.save_png();
        return self.panel.show(&self.frame, self.config.frame_interval);
    }

    fn run(&mut self) -> result::DashResult<()> {
        loop {
            self.one_iteration()?;
        }
    }
}

fn run(matches: &getopts::Matches) -> result::DashResult<()> {
    let config = config::Config::load(matches.opt_str("config"))?;
    info!("Config: url={} poll={:?} frame={:?} background_fetch={} fallback={}",
          config.data_url, config.poll_interval, config.frame_interval,
          config.background_fetch, config.fallback_path.display());

    let panel: Box<dyn display::Panel> = if matches.opt_present("skip-display") {
        Box::new(display::HeadlessPanel::new())
    } else {
        Box::new(display::Hub75Panel::new(&config)?)
    };

    let debug_server = match matches.opt_str("debug-port") {
        Some(port) => Some(debug::DebugServer::start(&port)?),
        None => None,
    };

    let mut dash = MetroDash::new(&config, panel, debug_server, matches.opt_str("save-image"))?;
    dash.show_status("STARTING", config.colors.status)?;

    if matches.opt_present("one-shot") {
        return dash.one_shot();
    }
    return dash.run();
}

fn main() {
    let args: Vec<String> = std::env::args().collect();
    let mut opts = getopts::Options::new();
    opts.optopt("c", "config", "JSON config file overriding the defaults.", "FILENAME");
    opts.optflag("d", "skip-display", "don't drive the LED panel");
    opts.optflag("o", "one-shot", "fetch once, draw one frame and exit");
    opts.optopt("i", "save-image", "Where to put a png of the current frame.", "FILENAME");
    opts.optopt("p", "debug-port", "Serve a debug status page on this port.", "PORT");
    opts.optflag("h", "help", "print this help");

    let matches = match opts.parse(&args[1..]) {
        Ok(matches) => matches,
        Err(err) => {
            eprintln!("{}\n{}", err, opts.usage("Usage: metrodash [options]"));
            std::process::exit(2);
        },
    };

    if matches.opt_present("help") {
        print!("{}", opts.usage("Usage: metrodash [options]"));
        return;
    }

    let _logger = match flexi_logger::Logger::try_with_env_or_str("info")
        .and_then(|logger| logger
                  .log_to_file(flexi_logger::FileSpec::default())
                  .duplicate_to_stderr(flexi_logger::Duplicate::Info)
                  .rotate(flexi_logger::Criterion::Size(1_000_000),
                          flexi_logger::Naming::Numbers,
                          flexi_logger::Cleanup::KeepLogFiles(5))
                  .start()) {
        Ok(handle) => Some(handle),
        Err(err) => {
            eprintln!("Logging disabled: {}", err);
            None
        },
    };

    info!("Running. version={} display={} one-shot={}",
          VERSION.unwrap_or("[unknown]"),
          !matches.opt_present("skip-display"),
          matches.opt_present("one-shot"));

    if let Err(err) = run(&matches) {
        error!("{}", err);
        std::process::exit(1);
    }
}
