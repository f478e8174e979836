use indicatif::ProgressStyle;
use tracing::{Span, info_span};
use tracing_indicatif::span_ext::IndicatifSpanExt;

const TICKS: &[&str] = &[
    "▁▁▁▁▁",
    "▁▂▂▂▁",
    "▁▄▂▄▁",
    "▂▄▆▄▂",
    "▄▆█▆▄",
    "▂▄▆▄▂",
    "▁▄▂▄▁",
    "▁▂▂▂▁",
];

fn spinner_style() -> ProgressStyle {
    ProgressStyle::with_template("{spinner:.blue} {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_spinner())
        .tick_strings(TICKS)
}

fn bar_style(prefix: &str) -> ProgressStyle {
    let template = format!(
        "[{prefix}] {{elapsed_precise}} {{bar:36.cyan/blue}} {{pos:>4}}/{{len:4}} {{msg}}"
    );
    ProgressStyle::with_template(&template)
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("■■□")
}

/// A spinner for a single long request. Shown while a future instrumented with the
/// returned span is being polled.
pub fn spinner(message: &str) -> Span {
    let span = info_span!("spinner", indicatif.pb_show = true);
    span.pb_set_style(&spinner_style());
    span.pb_set_message(message);
    span
}

/// A bar over `total` units of work, labelled with `prefix`.
pub fn progress_bar(prefix: &str, total: usize) -> Span {
    let span = info_span!("progress", indicatif.pb_show = true);
    span.pb_set_style(&bar_style(prefix));
    span.pb_set_length(total as u64);
    span
}
