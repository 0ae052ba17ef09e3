//! Fixed-spacing horizontal packing with row wrap.
//!
//! The only layout the generator performs: sections go left to right with a
//! constant gap, and a new row starts after a configured number of sections.
//! The default configuration keeps everything in one row.

/// Margin, spacing, and wrap threshold for one page.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LayoutConfig {
    pub margin: f64,
    pub spacing: f64,
    pub sections_per_row: usize,
}

/// Mutable packing accumulator, scoped to one page's assembly.
#[derive(Debug)]
pub struct LayoutCursor {
    config: LayoutConfig,
    x: f64,
    y: f64,
    row_height: f64,
    sections_in_row: usize,
}

impl LayoutCursor {
    pub fn new(config: LayoutConfig) -> Self {
        Self {
            config,
            x: config.margin,
            y: config.margin,
            row_height: 0.0,
            sections_in_row: 0,
        }
    }

    /// Where the next section lands.
    pub fn position(&self) -> (f64, f64) {
        (self.x, self.y)
    }

    /// Accounts for a section of the given footprint at the current position
    /// and moves the cursor past it, wrapping to a new row when the threshold
    /// is reached.
    pub fn advance(&mut self, width: f64, height: f64) {
        self.row_height = self.row_height.max(height);
        self.x += width + self.config.spacing;
        self.sections_in_row += 1;

        if self.sections_in_row >= self.config.sections_per_row {
            self.x = self.config.margin;
            self.y += self.row_height + self.config.spacing;
            self.row_height = 0.0;
            self.sections_in_row = 0;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(sections_per_row: usize) -> LayoutConfig {
        LayoutConfig {
            margin: 100.0,
            spacing: 250.0,
            sections_per_row,
        }
    }

    #[test]
    fn x_is_margin_plus_prefix_sum_of_widths_and_spacing() {
        let widths = [120.0, 300.0, 45.0, 800.0];
        let mut cursor = LayoutCursor::new(config(999));

        let mut expected = 100.0;
        for (i, width) in widths.iter().enumerate() {
            let (x, y) = cursor.position();
            assert_eq!(x, expected, "section {i}");
            assert_eq!(y, 100.0);
            cursor.advance(*width, 50.0);
            expected += width + 250.0;
        }
    }

    #[test]
    fn wraps_after_the_threshold_using_the_tallest_section() {
        let mut cursor = LayoutCursor::new(config(2));
        cursor.advance(100.0, 40.0);
        cursor.advance(100.0, 90.0);

        let (x, y) = cursor.position();
        assert_eq!(x, 100.0);
        assert_eq!(y, 100.0 + 90.0 + 250.0);
    }

    #[test]
    fn default_threshold_keeps_one_row() {
        let mut cursor = LayoutCursor::new(config(999));
        for _ in 0..13 {
            cursor.advance(200.0, 100.0);
        }
        let (_, y) = cursor.position();
        assert_eq!(y, 100.0);
    }
}
