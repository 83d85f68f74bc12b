extern crate image;
extern crate rppal;
extern crate std;

use rppal::gpio::{Gpio, Level, OutputPin};

use crate::config;
use crate::result;

// Adafruit RGB Matrix Bonnet wiring.
const R1_PIN: u8 = 5;
const G1_PIN: u8 = 13;
const B1_PIN: u8 = 6;
const R2_PIN: u8 = 12;
const G2_PIN: u8 = 16;
const B2_PIN: u8 = 23;
const A_PIN: u8 = 22;
const B_PIN: u8 = 26;
const C_PIN: u8 = 27;
const D_PIN: u8 = 20;
const E_PIN: u8 = 24;
const CLK_PIN: u8 = 17;
const LAT_PIN: u8 = 21;
const OE_PIN: u8 = 4;

// On-time of the least significant bit plane. Each higher plane doubles it.
const PLANE_BASE_NANOS: u64 = 150;

/// Something that can put a frame in front of people.
pub trait Panel {
    /// Shows `frame` for roughly `hold`, and at least once.
    fn show(&mut self, frame: &image::RgbImage, hold: std::time::Duration) -> result::DashResult<()>;

    fn blank(&mut self) -> result::DashResult<()> {
        return Ok(());
    }
}

/// Stand-in when the panel is skipped: paces the loop and nothing else.
pub struct HeadlessPanel {
    pub frames_shown: u64,
}

impl HeadlessPanel {
    pub fn new() -> HeadlessPanel {
        return HeadlessPanel{frames_shown: 0};
    }
}

impl Panel for HeadlessPanel {
    fn show(&mut self, _frame: &image::RgbImage, hold: std::time::Duration) -> result::DashResult<()> {
        self.frames_shown += 1;
        std::thread::sleep(hold);
        return Ok(());
    }
}

/// A HUB75 matrix bit-banged over the Pi's GPIO. The panel has no memory of
/// its own: rows are lit one pair at a time, so `show` keeps scanning the
/// frame until its hold time is used up.
pub struct Hub75Panel {
    width: u32,
    height: u32,
    bit_depth: u8,
    brightness: f32,

    rgb_pins: [OutputPin; 6],
    address_pins: Vec<OutputPin>,
    clk_pin: OutputPin,
    lat_pin: OutputPin,
    oe_pin: OutputPin,

    scaled: Vec<[u8; 3]>,
}

impl Hub75Panel {
    pub fn new(config: &config::Config) -> result::DashResult<Hub75Panel> {
        let gpio = Gpio::new()?;
        let output = |pin: u8| -> result::DashResult<OutputPin> {
            return Ok(gpio.get(pin)?.into_output());
        };

        let rows = config.panel_height / 2;
        let address_bits = address_bits(rows);
        let mut address_pins = vec![];
        for pin in [A_PIN, B_PIN, C_PIN, D_PIN, E_PIN].iter().take(address_bits) {
            address_pins.push(output(*pin)?);
        }

        let mut panel = Hub75Panel{
            width: config.panel_width,
            height: config.panel_height,
            bit_depth: config.bit_depth,
            brightness: config.brightness,
            rgb_pins: [
                output(R1_PIN)?, output(G1_PIN)?, output(B1_PIN)?,
                output(R2_PIN)?, output(G2_PIN)?, output(B2_PIN)?,
            ],
            address_pins: address_pins,
            clk_pin: output(CLK_PIN)?,
            lat_pin: output(LAT_PIN)?,
            oe_pin: output(OE_PIN)?,
            scaled: vec![[0u8; 3]; (config.panel_width * config.panel_height) as usize],
        };
        panel.blank()?;

        info!("HUB75 panel ready: {}x{}, {} address lines, {} bit planes, brightness {}",
              panel.width, panel.height, address_bits, panel.bit_depth, panel.brightness);
        return Ok(panel);
    }

    fn load_frame(&mut self, frame: &image::RgbImage) {
        for y in 0..self.height {
            for x in 0..self.width {
                let index = (y * self.width + x) as usize;
                let pixel = if x < frame.width() && y < frame.height() {
                    *frame.get_pixel(x, y)
                } else {
                    image::Rgb([0, 0, 0])
                };
                for channel in 0..3 {
                    self.scaled[index][channel] = (pixel[channel] as f32 * self.brightness) as u8;
                }
            }
        }
    }

    fn scan_once(&mut self) {
        let rows = self.height / 2;
        let lowest_plane = 8 - self.bit_depth;

        for plane in lowest_plane..8 {
            let mask = 1u8 << plane;
            let on_time = std::time::Duration::from_nanos(PLANE_BASE_NANOS << (plane - lowest_plane));

            for row in 0..rows {
                for x in 0..self.width {
                    let top = self.scaled[(row * self.width + x) as usize];
                    let bottom = self.scaled[((row + rows) * self.width + x) as usize];
                    for channel in 0..3 {
                        self.rgb_pins[channel].write(level(top[channel] & mask != 0));
                        self.rgb_pins[channel + 3].write(level(bottom[channel] & mask != 0));
                    }
                    self.clk_pin.set_high();
                    self.clk_pin.set_low();
                }

                self.oe_pin.set_high();
                for (bit, pin) in self.address_pins.iter_mut().enumerate() {
                    pin.write(level(row & (1 << bit) != 0));
                }
                self.lat_pin.set_high();
                self.lat_pin.set_low();
                self.oe_pin.set_low();

                spin_for(on_time);
            }
        }

        self.oe_pin.set_high();
    }
}

impl Panel for Hub75Panel {
    fn show(&mut self, frame: &image::RgbImage, hold: std::time::Duration) -> result::DashResult<()> {
        let deadline = std::time::Instant::now() + hold;
        self.load_frame(frame);
        loop {
            self.scan_once();
            if std::time::Instant::now() >= deadline {
                break;
            }
        }
        return Ok(());
    }

    fn blank(&mut self) -> result::DashResult<()> {
        // OE is active low.
        self.oe_pin.set_high();
        self.lat_pin.set_low();
        self.clk_pin.set_low();
        return Ok(());
    }
}

impl Drop for Hub75Panel {
    fn drop(&mut self) {
        let _ = self.blank();
    }
}

/// Address lines needed to select one of `rows` row pairs.
fn address_bits(rows: u32) -> usize {
    let mut bits = 0;
    while (1u32 << bits) < rows {
        bits += 1;
    }
    return bits;
}

fn level(on: bool) -> Level {
    if on {
        return Level::High;
    }
    return Level::Low;
}

// thread::sleep can't do sub-microsecond holds.
fn spin_for(duration: std::time::Duration) {
    let start = std::time::Instant::now();
    while start.elapsed() < duration {
        std::hint::spin_loop();
    }
}

#[cfg(test)]
mod tests {
    use super::Panel;

    #[test]
    fn address_lines_for_common_panels() {
        assert_eq!(4, super::address_bits(16));
        assert_eq!(5, super::address_bits(32));
        assert_eq!(3, super::address_bits(8));
    }

    #[test]
    fn headless_panel_counts_frames() {
        let mut panel = super::HeadlessPanel::new();
        let frame = image::RgbImage::new(64, 32);
        panel.show(&frame, std::time::Duration::from_millis(1)).expect("show");
        panel.show(&frame, std::time::Duration::from_millis(1)).expect("show");
        assert_eq!(2, panel.frames_shown);
    }
}
