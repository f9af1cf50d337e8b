//! Text layout for the track fields
//!
//! A field either fits on one line, or is split into two lines at the word
//! boundary that balances the word count. The split counts words, not glyph
//! widths, so one very long word next to several short ones can still run
//! past the budget. Text without a space is never split.

use embedded_graphics::prelude::Point;

/// Geometry used to place the fields on the frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LayoutConfig {
    /// Strings with at least this many chars get split
    pub max_chars_per_line: usize,
    /// Left edge of every line
    pub left_margin: i32,
    /// Baseline of the first artist line
    pub first_baseline: i32,
    /// Distance between the two lines of one field
    pub line_spacing: i32,
    /// Distance from the last artist line to the first title line
    pub field_gap: i32,
    /// Baseline of the battery footer
    pub footer_baseline: i32,
}

impl LayoutConfig {
    /// Fit the char budget to the panel width for a fixed-advance font
    pub fn for_panel(width: u32, height: u32, char_advance: u32, line_height: u32) -> Self {
        let left_margin = 2;
        let usable = width.saturating_sub(2 * left_margin);
        let max_chars_per_line = (usable / char_advance.max(1)).max(1) as usize;
        let line_height = line_height as i32;

        Self {
            max_chars_per_line,
            left_margin: left_margin as i32,
            first_baseline: line_height,
            line_spacing: line_height + 2,
            field_gap: line_height + 10,
            footer_baseline: height as i32 - line_height / 2,
        }
    }
}

/// One line of text and where its baseline goes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineSegment {
    pub text: String,
    pub position: Point,
}

/// One or two lines produced for a single field
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LayoutPlan {
    first: LineSegment,
    second: Option<LineSegment>,
}

impl LayoutPlan {
    pub fn segments(&self) -> impl Iterator<Item = &LineSegment> {
        std::iter::once(&self.first).chain(self.second.as_ref())
    }

    pub fn len(&self) -> usize {
        if self.second.is_some() {
            2
        } else {
            1
        }
    }

    pub fn is_split(&self) -> bool {
        self.second.is_some()
    }

    /// Baseline of the last emitted line, the next field cascades from here
    pub fn last_baseline(&self) -> i32 {
        self.second.as_ref().unwrap_or(&self.first).position.y
    }
}

/// Lay out `text` starting at `start`.
///
/// Pure function of its inputs.
pub fn layout(text: &str, config: &LayoutConfig, start: Point) -> LayoutPlan {
    let single = |text: &str| LayoutPlan {
        first: LineSegment {
            text: text.to_string(),
            position: start,
        },
        second: None,
    };

    if text.chars().count() < config.max_chars_per_line {
        return single(text);
    }

    let words: Vec<&str> = text.split(' ').collect();
    if words.len() < 2 {
        log::debug!("No split point in {:?}, drawing as one line", text);
        return single(text);
    }

    // first line takes the larger half on odd counts
    let n = words.len() - words.len() / 2;

    LayoutPlan {
        first: LineSegment {
            text: words[..n].join(" "),
            position: start,
        },
        second: Some(LineSegment {
            text: words[n..].join(" "),
            position: Point::new(start.x, start.y + config.line_spacing),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(budget: usize) -> LayoutConfig {
        LayoutConfig {
            max_chars_per_line: budget,
            left_margin: 2,
            first_baseline: 20,
            line_spacing: 15,
            field_gap: 25,
            footer_baseline: 250,
        }
    }

    fn texts(plan: &LayoutPlan) -> Vec<&str> {
        plan.segments().map(|s| s.text.as_str()).collect()
    }

    #[test]
    fn short_string_is_a_single_unmodified_segment() {
        let start = Point::new(2, 20);
        let plan = layout("The Beatles", &config(19), start);

        assert_eq!(plan.len(), 1);
        assert_eq!(texts(&plan), ["The Beatles"]);
        assert_eq!(plan.segments().next().map(|s| s.position), Some(start));
        assert_eq!(plan.last_baseline(), 20);
    }

    #[test]
    fn long_string_splits_at_the_middle_word() {
        let start = Point::new(2, 20);
        let plan = layout("Like a Rolling Stone Revisited Tonight", &config(19), start);

        assert_eq!(texts(&plan), ["Like a Rolling", "Stone Revisited Tonight"]);
        let positions: Vec<Point> = plan.segments().map(|s| s.position).collect();
        assert_eq!(positions, [Point::new(2, 20), Point::new(2, 35)]);
        assert_eq!(plan.last_baseline(), 35);
    }

    #[test]
    fn odd_word_count_gives_the_first_line_the_extra_word() {
        let plan = layout("one two three four five", &config(10), Point::zero());

        assert_eq!(texts(&plan), ["one two three", "four five"]);
    }

    #[test]
    fn split_balance_holds_for_every_word_count() {
        for k in 2..12 {
            let text = vec!["word"; k].join(" ");
            let plan = layout(&text, &config(5), Point::zero());
            let lines: Vec<usize> = plan
                .segments()
                .map(|s| s.text.split(' ').count())
                .collect();

            assert_eq!(lines, [k - k / 2, k / 2], "k = {k}");
        }
    }

    #[test]
    fn split_lines_rejoin_to_the_input() {
        for text in [
            "Like a Rolling Stone Revisited Tonight",
            "a b",
            "Double  spaced  title here",
            " leading space is kept",
            "trailing space too ",
            "Sigur Rós Ágætis byrjun",
        ] {
            let plan = layout(text, &config(3), Point::zero());
            assert!(plan.is_split(), "{text:?}");
            assert_eq!(texts(&plan).join(" "), text);
        }
    }

    #[test]
    fn length_exactly_at_budget_is_split() {
        let plan = layout("abcd efgh", &config(9), Point::zero());

        assert_eq!(texts(&plan), ["abcd", "efgh"]);
    }

    #[test]
    fn budget_counts_chars_not_bytes() {
        // 10 chars, 12 bytes
        let plan = layout("Björk Guðm", &config(11), Point::zero());

        assert!(!plan.is_split());
    }

    #[test]
    fn long_text_without_spaces_is_not_split() {
        let text = "Supercalifragilisticexpialidocious";
        let plan = layout(text, &config(19), Point::new(2, 40));

        assert_eq!(texts(&plan), [text]);
        assert_eq!(plan.last_baseline(), 40);
    }

    #[test]
    fn layout_is_deterministic() {
        let text = "Bohemian Rhapsody Remastered 2011 Version";
        let a = layout(text, &config(19), Point::new(2, 20));
        let b = layout(text, &config(19), Point::new(2, 20));

        assert_eq!(a, b);
    }

    #[test]
    fn panel_budget_follows_width_and_font() {
        let config = LayoutConfig::for_panel(400, 300, 10, 20);

        assert_eq!(config.max_chars_per_line, 39);
        assert_eq!(config.left_margin, 2);
        assert_eq!(config.footer_baseline, 290);
        assert!(config.line_spacing >= 20);
    }
}
