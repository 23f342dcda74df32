//! Color constants for the terminal user interface.

use ratatui::style::Color;

// Status colors follow the dashboard convention:
// green = completed, blue = in progress, amber = pending, red = failed.

/// Used for completed tasks and runs.
pub const DARK_GREEN: Color = Color::Rgb(0, 110, 0);
/// Used for in-progress rows.
pub const STEEL_BLUE: Color = Color::Rgb(70, 130, 180);
/// Used for pending rows.
pub const AMBER: Color = Color::Rgb(255, 176, 0);
/// Used for failed rows and destructive confirmations.
pub const DARK_RED: Color = Color::Rgb(114, 0, 0);
