//! Layout constants and the text size estimator

use crate::model::Size;
use serde::{Deserialize, Serialize};

/// Fixed metrics used to size and place nodes without a text-layout pass.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LayoutConfig {
    /// Width of one monospace character.
    pub char_width: f64,
    pub line_height: f64,
    /// Columns a tab expands to.
    pub tab_width: usize,
    pub padding: f64,
    /// Space reserved above a node's content for its title bar.
    pub header_height: f64,
    /// Gap between stacked sibling frames.
    pub spacing: f64,
    pub min_width: f64,
    pub min_height: f64,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        LayoutConfig {
            char_width: 8.0,
            line_height: 18.0,
            tab_width: 4,
            padding: 16.0,
            header_height: 40.0,
            spacing: 24.0,
            min_width: 160.0,
            min_height: 48.0,
        }
    }
}

impl LayoutConfig {
    /// Approximate rendered size of a code box holding `text`.
    ///
    /// A pure function of line count and widest line, so equal input always
    /// yields an equal box.
    pub fn estimate_size(&self, text: &str) -> Size {
        let lines = text.lines().count();
        let columns = text
            .lines()
            .map(|line| self.display_columns(line))
            .max()
            .unwrap_or(0);

        let width = columns as f64 * self.char_width + 2.0 * self.padding;
        let height = lines as f64 * self.line_height + 2.0 * self.padding;
        Size::new(width.max(self.min_width), height.max(self.min_height))
    }

    fn display_columns(&self, line: &str) -> usize {
        line.chars()
            .map(|c| if c == '\t' { self.tab_width } else { 1 })
            .sum()
    }
}

/// [`LayoutConfig::estimate_size`] with the default metrics.
pub fn estimate_size(text: &str) -> Size {
    LayoutConfig::default().estimate_size(text)
}
