use crate::terminal::colors;
use crate::terminal::logging::PRINT_TARGET;
use colored::*;
use tracing::info;
use unicode_width::UnicodeWidthStr;

pub const WIDTH: usize = 64;

const LENS: [&str; 3] = ["╭──────╮   ", "│ (◉)  ├═╗ ", "╰──────╯ ╚═"];

pub fn print(msg: &str) {
    info!(target: PRINT_TARGET, raw_msg = msg);
}

pub fn blank() {
    print("");
}

/// Camera glyph next to the tool name and version.
pub fn banner(hidden: bool) {
    if hidden {
        return;
    }
    let caption = [
        format!("camfleet {}", env!("CARGO_PKG_VERSION"))
            .color(colors::PRIMARY)
            .bold(),
        "network camera fleet provisioning".color(colors::SEPARATOR),
        "".normal(),
    ];
    for (lens, caption) in LENS.iter().zip(caption) {
        print(&format!("  {} {caption}", lens.color(colors::ACCENT)));
    }
    blank();
}

/// `▌ TITLE ┄┄┄┄` across the full width.
pub fn section(title: &str, quiet: bool) {
    if quiet {
        return;
    }
    let label = format!("▌ {} ", title.to_uppercase());
    let fill = "┄".repeat(WIDTH.saturating_sub(label.width()));
    print(&format!(
        "{}{}",
        label.color(colors::PRIMARY).bold(),
        fill.color(colors::SEPARATOR)
    ));
}

pub fn rule() {
    print(&"━".repeat(WIDTH).color(colors::SEPARATOR).to_string());
}

pub fn entry(idx: usize, name: &str) {
    print(&format!(
        "{} {}",
        format!("#{}", idx + 1).color(colors::ACCENT),
        name.color(colors::PRIMARY).bold()
    ));
}

/// Key/value lines under an [`entry`], keys padded to the longest one.
pub fn fields(pairs: Vec<(String, ColoredString)>) {
    let width = key_width(pairs.iter().map(|(key, _)| key.as_str()));
    let count = pairs.len();
    for (i, (key, value)) in pairs.into_iter().enumerate() {
        let gutter = if i + 1 == count { "╰" } else { "│" };
        print(&format!(
            "  {} {} {}",
            gutter.color(colors::SEPARATOR),
            format!("{key:<width$}").color(colors::TEXT_DEFAULT),
            value
        ));
    }
}

/// A standalone key/value line padded to `width`.
pub fn field(key: &str, value: ColoredString, width: usize) {
    print(&format!(
        "{} {} {value}",
        "›".color(colors::SEPARATOR),
        format!("{key:<width$}").color(colors::PRIMARY)
    ));
}

pub fn key_width<'a>(keys: impl IntoIterator<Item = &'a str>) -> usize {
    keys.into_iter().map(console::measure_text_width).max().unwrap_or(0)
}

pub fn summary(msg: &str) {
    print(&centered(msg, WIDTH));
}

/// Framed notice used when a command has nothing to show.
pub fn nothing_found(what: &str) {
    for line in framed(what) {
        print(&line.color(colors::REJECTED).to_string());
    }
}

pub fn footer(quiet: bool) {
    if quiet {
        return;
    }
    rule();
}

fn centered(msg: &str, width: usize) -> String {
    let pad = width.saturating_sub(console::measure_text_width(msg)) / 2;
    format!("{}{msg}", " ".repeat(pad))
}

fn framed(what: &str) -> [String; 3] {
    let inner = format!(" ∅  {what} ");
    let span = inner.width();
    let border = "─".repeat(span);
    [
        centered(&format!("┌{border}┐"), WIDTH),
        centered(&format!("│{inner}│"), WIDTH),
        centered(&format!("└{border}┘"), WIDTH),
    ]
}

// ╔════════════════════════════════════════════╗
// ║ ████████╗███████╗███████╗████████╗███████╗ ║
// ║ ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝██╔════╝ ║
// ║    ██║   █████╗  ███████╗   ██║   ███████╗ ║
// ║    ██║   ██╔══╝  ╚════██║   ██║   ╚════██║ ║
// ║    ██║   ███████╗███████║   ██║   ███████║ ║
// ║    ╚═╝   ╚══════╝╚══════╝   ╚═╝   ╚══════╝ ║
// ╚════════════════════════════════════════════╝
