use crate::lines::LineContent;

/// Anything that can tell how many pixels a string occupies when drawn.
pub trait TextMeasure {
    fn text_width(&self, text: &str) -> i32;
}

/// Every character the same width, like the built-in terminal font.
pub struct FixedAdvance(pub i32);

impl TextMeasure for FixedAdvance {
    fn text_width(&self, text: &str) -> i32 {
        return text.chars().count() as i32 * self.0;
    }
}

/// Horizontal offset of one line. Starts just off the right edge, moves
/// left, and jumps back to the right edge on the tick after the text has
/// completely left the panel.
#[derive(Debug, Clone, PartialEq)]
pub struct Scroller {
    position: i32,
    display_width: i32,
}

impl Scroller {
    pub fn new(display_width: i32) -> Scroller {
        return Scroller{
            position: display_width,
            display_width: display_width,
        };
    }

    pub fn position(&self) -> i32 {
        return self.position;
    }

    pub fn reset(&mut self) {
        self.position = self.display_width;
    }

    pub fn set_position(&mut self, position: i32) {
        self.position = position;
    }

    /// Returns false when this tick wrapped the text back to the right edge.
    pub fn tick(&mut self, step: i32, text_width: i32) -> bool {
        self.position -= step;
        if self.position + text_width < 0 {
            self.reset();
            return false;
        }
        return true;
    }
}

pub struct ScrollingLine {
    content: LineContent,
    text_width: i32,
    scroller: Scroller,
    dirty: bool,
}

impl ScrollingLine {
    pub fn new(display_width: i32) -> ScrollingLine {
        return ScrollingLine{
            content: LineContent::blank(),
            text_width: 0,
            scroller: Scroller::new(display_width),
            dirty: true,
        };
    }

    pub fn content(&self) -> &LineContent {
        return &self.content;
    }

    pub fn position(&self) -> i32 {
        return self.scroller.position();
    }

    pub fn text_width(&self) -> i32 {
        return self.text_width;
    }

    pub fn is_dirty(&self) -> bool {
        return self.dirty;
    }

    pub fn mark_clean(&mut self) {
        self.dirty = false;
    }

    /// Swaps in new text and color. The scroll offset is left alone so an
    /// update doesn't make the line jump. Returns whether anything changed.
    pub fn set_content(&mut self, content: LineContent, measure: &dyn TextMeasure) -> bool {
        if content == self.content {
            return false;
        }
        if content.text != self.content.text {
            self.text_width = measure.text_width(&content.text);
        }
        self.content = content;
        self.dirty = true;
        return true;
    }

    pub fn park_at(&mut self, position: i32) {
        self.scroller.set_position(position);
        self.dirty = true;
    }

    pub fn tick(&mut self, step: i32) {
        if self.content.text.is_empty() {
            return;
        }
        self.scroller.tick(step, self.text_width);
        self.dirty = true;
    }
}

#[cfg(test)]
mod tests {
    use super::{FixedAdvance, Scroller, ScrollingLine};
    use crate::lines::LineContent;

    fn content(text: &str) -> LineContent {
        return LineContent{text: text.to_string(), color: image::Rgb([255, 200, 0])};
    }

    #[test]
    fn starts_at_right_edge() {
        assert_eq!(64, Scroller::new(64).position());
    }

    #[test]
    fn wraps_to_right_edge_without_skipping() {
        let mut scroller = Scroller::new(64);
        let text_width = 30;

        let mut positions = vec![];
        for _ in 0..(64 + text_width + 2) {
            scroller.tick(1, text_width);
            positions.push(scroller.position());
        }

        // Last fully-visible-or-partially-visible offset is -30, then
        // straight back to 64.
        let wrap = positions.iter().position(|p| *p == 64).expect("wrapped");
        assert_eq!(-text_width, positions[wrap - 1]);
        assert_eq!(63, positions[wrap + 1]);
        assert!(positions.iter().all(|p| *p >= -text_width));
    }

    #[test]
    fn tick_reports_wrap() {
        let mut scroller = Scroller::new(4);
        assert!(scroller.tick(3, 2));
        assert!(scroller.tick(3, 2));
        assert_eq!(-2, scroller.position());
        assert!(!scroller.tick(3, 2));
        assert_eq!(4, scroller.position());
    }

    #[test]
    fn ticks_never_touch_text_or_color() {
        let measure = FixedAdvance(6);
        let mut line = ScrollingLine::new(64);
        line.set_content(content("TIME: 15:30 • FEB 8"), &measure);
        let before = line.content().clone();

        for _ in 0..1000 {
            line.tick(1);
        }

        assert_eq!(&before, line.content());
        assert_eq!(19 * 6, line.text_width());
    }

    #[test]
    fn dirty_tracking() {
        let measure = FixedAdvance(6);
        let mut line = ScrollingLine::new(64);
        line.set_content(content("TIME: N/A"), &measure);
        assert!(line.is_dirty());
        line.mark_clean();

        assert!(!line.set_content(content("TIME: N/A"), &measure));
        assert!(!line.is_dirty());

        line.tick(1);
        assert!(line.is_dirty());
        assert_eq!(63, line.position());
    }

    #[test]
    fn content_update_keeps_offset() {
        let measure = FixedAdvance(6);
        let mut line = ScrollingLine::new(64);
        line.set_content(content("METRO: ROSEMONT • 8 MIN"), &measure);
        for _ in 0..10 {
            line.tick(1);
        }
        line.set_content(content("METRO: ROSEMONT • 7 MIN"), &measure);
        assert_eq!(54, line.position());
    }

    #[test]
    fn blank_line_stays_put() {
        let mut line = ScrollingLine::new(64);
        line.mark_clean();
        line.tick(1);
        assert_eq!(64, line.position());
        assert!(!line.is_dirty());
    }
}
