use colored::Color;

pub const PRIMARY: Color = Color::TrueColor { r: 120, g: 200, b: 150 };
pub const ACCENT: Color = Color::TrueColor { r: 240, g: 190, b: 90 };
pub const SEPARATOR: Color = Color::BrightBlack;
pub const TEXT_DEFAULT: Color = Color::TrueColor { r: 210, g: 210, b: 210 };

pub const CONFIRMED: Color = Color::Green;
pub const REJECTED: Color = Color::Red;
pub const REQUIRES_AUTH: Color = Color::Yellow;
pub const CANDIDATE: Color = Color::BrightBlack;
