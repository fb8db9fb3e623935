use trendwatch_common::types::{format_volume, AlertKind, TrendAlert};

/// Markdown-safe inline code: backticks inside would end the span.
fn code(s: &str) -> String {
    format!("`{}`", s.replace('`', "'"))
}

/// Relative growth over `previous`, as shown in escalation messages.
pub fn growth_percent(previous: u64, volume: u64) -> f64 {
    if previous == 0 {
        return 0.0;
    }
    (volume as f64 - previous as f64) / previous as f64 * 100.0
}

/// Render the chat message for an alert.
pub fn render_alert_message(alert: &TrendAlert) -> String {
    let headline = match alert.kind {
        AlertKind::FirstCrossing => "🚨 *TREND ALERT* 🚨",
        AlertKind::Escalation => "📈 *TREND STILL GROWING* 📈",
    };

    let escalation_line = match (alert.kind, alert.previous_volume) {
        (AlertKind::Escalation, Some(previous)) => format!(
            "\n📈 *Previous alert*: {} (+{:.1}%)",
            code(&format!("{} searches", format_volume(previous))),
            growth_percent(previous, alert.volume),
        ),
        _ => String::new(),
    };

    format!(
        "{headline}\n\n\
         🔍 *Keyword*: {keyword}\n\
         📊 *Volume*: {volume}\n\
         ⏱️ *Window*: {window}\n\
         🌍 *Region*: {region}{escalation_line}\n\
         📅 *Time*: {time}\n\n\
         #TrendAlert #{tag}",
        keyword = code(&alert.keyword),
        volume = code(&format!("{} searches", format_volume(alert.volume))),
        window = code(alert.timeframe.label()),
        region = code(&alert.region),
        time = code(&alert.triggered_at.format("%H:%M %d/%m/%Y UTC").to_string()),
        tag = alert.region.replace(|c: char| !c.is_ascii_alphanumeric(), ""),
    )
}
