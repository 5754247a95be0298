use ratatui::style::Color;

// Handheld pokédex palette: red shell, dark bezel, pale green screen.
pub const SHELL: Color = Color::Rgb(190, 30, 45);
pub const BEZEL: Color = Color::Rgb(23, 23, 28);
pub const BAR_BG: Color = Color::Rgb(120, 16, 28);

pub const SCREEN_BG: Color = Color::Rgb(202, 220, 159);
pub const SCREEN_FG: Color = Color::Rgb(15, 56, 15);

pub const FG: Color = Color::Rgb(236, 236, 236);
pub const MUTED: Color = Color::Rgb(160, 160, 170);
pub const BORDER: Color = Color::Rgb(70, 70, 82);

pub const HIGHLIGHT: Color = Color::Rgb(255, 203, 5);

// Link indicator.
pub const LINKED: Color = Color::Rgb(134, 239, 172);
pub const PENDING: Color = Color::Rgb(255, 159, 26);
pub const ERROR: Color = Color::Rgb(248, 113, 113);
