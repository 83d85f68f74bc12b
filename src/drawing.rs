extern crate anyhow;
extern crate image;
extern crate imageproc;
extern crate rusttype;
extern crate std;

use anyhow::Context;
use crate::lines;
use crate::result;
use crate::scroll;

pub struct Styles {
    pub font: rusttype::Font<'static>,
    pub scale: rusttype::Scale,
    pub color_background: image::Rgb<u8>,
}

impl Styles {
    pub fn load<P: AsRef<std::path::Path>>(font_path: P, font_size: f32) -> result::DashResult<Styles> {
        let debug_path = font_path.as_ref().display().to_string();
        let font_bytes = std::fs::read(font_path.as_ref())
            .with_context(|| format!("Reading font '{}'", debug_path))?;
        let font = rusttype::Font::try_from_vec(font_bytes)
            .ok_or(result::make_error(&format!("'{}' is not a usable font", debug_path)))?;

        return Ok(Styles{
            font: font,
            scale: scale(font_size),
            color_background: image::Rgb([0, 0, 0]),
        });
    }
}

impl scroll::TextMeasure for Styles {
    fn text_width(&self, text: &str) -> i32 {
        return text_width(&self.font, self.scale, text);
    }
}

pub fn new_frame(width: u32, height: u32) -> image::RgbImage {
    return image::RgbImage::new(width, height);
}

/// Horizontal strip (top, height) that row `index` of `LINE_COUNT` owns.
pub fn line_band(frame_height: u32, index: usize) -> (u32, u32) {
    let count = lines::LINE_COUNT as u32;
    let top = index as u32 * frame_height / count;
    let bottom = (index as u32 + 1) * frame_height / count;
    return (top, bottom - top);
}

/// Redraws the rows that moved or changed since the last frame and returns
/// how many that was. `force` repaints all of them, e.g. after a status
/// screen covered the panel.
pub fn render_lines(imgbuf: &mut image::RgbImage, styles: &Styles, state: &mut lines::RenderState, force: bool) -> usize {
    return render_lines_with(imgbuf, state, force, |imgbuf, line, top, band_height| {
        clear_band(imgbuf, styles, top, band_height);
        draw_text_clipped(
            imgbuf, styles, line.content().color,
            line.position(), top, band_height,
            &line.content().text);
    });
}

fn render_lines_with<F>(imgbuf: &mut image::RgbImage, state: &mut lines::RenderState, force: bool, mut draw_line: F) -> usize
where F: FnMut(&mut image::RgbImage, &scroll::ScrollingLine, u32, u32) {
    let height = imgbuf.height();
    let mut redrawn = 0;

    for (index, line) in state.lines_mut().iter_mut().enumerate() {
        if !force && !line.is_dirty() {
            continue;
        }

        let (top, band_height) = line_band(height, index);
        draw_line(imgbuf, line, top, band_height);
        line.mark_clean();
        redrawn += 1;
    }

    return redrawn;
}

/// One message across the whole panel, left aligned and vertically centered.
pub fn draw_status(imgbuf: &mut image::RgbImage, styles: &Styles, message: &str, color: image::Rgb<u8>) {
    let (width, height) = imgbuf.dimensions();
    imageproc::drawing::draw_filled_rect_mut(
        imgbuf, imageproc::rect::Rect::at(0, 0).of_size(width, height), styles.color_background);

    let line_height = line_height(&styles.font, styles.scale);
    let top = (height as i32 - line_height).max(0) as u32 / 2;
    draw_text_clipped(imgbuf, styles, color, 2, top, height - top, message);
}

pub fn text_width(font: &rusttype::Font, scale: rusttype::Scale, text: &str) -> i32 {
    let glyphs: Vec<rusttype::PositionedGlyph> = font.layout(text, scale, rusttype::point(0.0, 0.0)).collect();
    match glyphs.last() {
        None => return 0,
        Some(last) => {
            let right = last.position().x + last.unpositioned().h_metrics().advance_width;
            return right.ceil() as i32;
        },
    }
}

fn line_height(font: &rusttype::Font, scale: rusttype::Scale) -> i32 {
    let v_metrics = font.v_metrics(scale);
    return (v_metrics.ascent - v_metrics.descent).ceil() as i32;
}

fn clear_band(imgbuf: &mut image::RgbImage, styles: &Styles, top: u32, band_height: u32) {
    let width = imgbuf.width();
    imageproc::drawing::draw_filled_rect_mut(
        imgbuf,
        imageproc::rect::Rect::at(0, top as i32).of_size(width, band_height),
        styles.color_background);
}

/// Draws `text` starting at `x` with its ascent at `top`, touching only
/// pixels inside the band. Glyph coverage scales the color since the
/// background is black.
// Not imageproc's draw_text_mut: that clips to the image, not to a band,
// so descenders would bleed into the row below.
fn draw_text_clipped(imgbuf: &mut image::RgbImage, styles: &Styles, color: image::Rgb<u8>,
                     x: i32, top: u32, band_height: u32, text: &str) {
    let (width, height) = imgbuf.dimensions();
    let band_bottom = std::cmp::min(top + band_height, height) as i32;
    let baseline = top as f32 + styles.font.v_metrics(styles.scale).ascent;

    for glyph in styles.font.layout(text, styles.scale, rusttype::point(x as f32, baseline)) {
        let bounding_box = match glyph.pixel_bounding_box() {
            Some(bb) => bb,
            None => continue,
        };
        if bounding_box.max.x < 0 || bounding_box.min.x >= width as i32 {
            continue;
        }

        glyph.draw(|gx, gy, coverage| {
            let px = bounding_box.min.x + gx as i32;
            let py = bounding_box.min.y + gy as i32;
            if px < 0 || px >= width as i32 || py < top as i32 || py >= band_bottom {
                return;
            }
            let pixel = imgbuf.get_pixel_mut(px as u32, py as u32);
            for channel in 0..3 {
                let value = (color[channel] as f32 * coverage).round() as u8;
                pixel[channel] = std::cmp::max(pixel[channel], value);
            }
        });
    }
}

fn scale(s: f32) -> rusttype::Scale {
    return rusttype::Scale{x: s, y: s};
}

#[cfg(test)]
mod tests {
    use crate::config::Palette;
    use crate::lines::RenderState;
    use crate::scroll::FixedAdvance;
    use chrono::TimeZone;

    fn bands_drawn(state: &mut RenderState, force: bool) -> Vec<(u32, u32)> {
        let mut frame = super::new_frame(64, 32);
        let mut drawn = vec![];
        let count = super::render_lines_with(&mut frame, state, force, |_, _, top, band_height| {
            drawn.push((top, band_height));
        });
        assert_eq!(drawn.len(), count);
        return drawn;
    }

    #[test]
    fn bands_cover_the_panel() {
        assert_eq!((0, 10), super::line_band(32, 0));
        assert_eq!((10, 11), super::line_band(32, 1));
        assert_eq!((21, 11), super::line_band(32, 2));
    }

    #[test]
    fn bands_split_evenly() {
        assert_eq!((0, 16), super::line_band(48, 0));
        assert_eq!((16, 16), super::line_band(48, 1));
        assert_eq!((32, 16), super::line_band(48, 2));
    }

    #[test]
    fn only_dirty_rows_are_redrawn() {
        let now = chrono_tz::America::Montreal.with_ymd_and_hms(2026, 2, 8, 15, 30, 0).unwrap();
        let snapshot = crate::snapshot::parse_snapshot(
            &std::fs::read_to_string("testdata/snapshot.json").expect("read snapshot.json"))
            .expect("parse snapshot.json");
        let mut state = RenderState::new(&Palette::default(), 64);
        state.apply_fetch(Ok(snapshot), &now, || panic!("no fallback needed"), &FixedAdvance(6));

        assert_eq!(vec![(0, 10), (10, 11), (21, 11)], bands_drawn(&mut state, false));
        assert!(bands_drawn(&mut state, false).is_empty());

        let later = chrono_tz::America::Montreal.with_ymd_and_hms(2026, 2, 8, 15, 33, 0).unwrap();
        assert!(state.refresh_countdown(&later, &FixedAdvance(6)));
        assert_eq!(vec![(0, 10)], bands_drawn(&mut state, false));

        assert_eq!(3, bands_drawn(&mut state, true).len());
    }
}
