//! Rendering one record through the display template.

use quotebar_config::{DisplayTemplate, Placeholder, Segment};
use quotebar_core::types::{FetchKey, QuoteRecord, Trend};
use std::fmt::Write;

/// Prepended to fragments whose record is long overdue.
pub const DEGRADED_MARKER: &str = "⚪";

/// Formatting knobs taken from the configuration.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FragmentStyle {
    pub flat_band: f64,
    pub use_color: bool,
}

fn indicator(trend: Trend, use_color: bool) -> &'static str {
    if use_color {
        return trend.marker();
    }
    match trend {
        Trend::Up => "↑",
        Trend::Down => "↓",
        Trend::Flat => "→",
    }
}

/// Render `record` for `key`. The result is trimmed; `degraded` adds the
/// degraded marker in front.
pub fn render_fragment(
    template: &DisplayTemplate,
    key: &FetchKey,
    record: &QuoteRecord,
    style: FragmentStyle,
    degraded: bool,
) -> String {
    let numeric = record.value.is_finite();
    let trend = Trend::from_change(record.change_percent, style.flat_band);
    let detail = record.detail.as_deref().unwrap_or("");

    let mut out = String::new();
    for segment in template.segments() {
        match segment {
            Segment::Literal(text) => out.push_str(text),
            Segment::Slot(slot) => match slot {
                Placeholder::Indicator => out.push_str(indicator(trend, style.use_color)),
                Placeholder::Name => out.push_str(&record.display_name),
                Placeholder::Symbol => out.push_str(key.instrument()),
                Placeholder::Provider => out.push_str(key.provider()),
                Placeholder::Unit => out.push_str(record.unit.as_deref().unwrap_or("")),
                Placeholder::Detail => out.push_str(detail),
                Placeholder::Value if numeric => {
                    let _ = write!(out, "{:.2}", record.value);
                }
                // textual readings such as addresses
                Placeholder::Value => out.push_str(detail),
                Placeholder::Change if numeric && record.change_percent.is_finite() => {
                    let _ = write!(out, "{:+.2}%", record.change_percent);
                }
                Placeholder::Change => {}
            },
        }
    }

    let body = out.trim();
    if degraded {
        format!("{} {}", DEGRADED_MARKER, body)
    } else {
        body.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const STYLE: FragmentStyle = FragmentStyle {
        flat_band: 0.005,
        use_color: true,
    };

    fn moutai() -> QuoteRecord {
        QuoteRecord::new("600519", "贵州茅台", 1426.0, 2.15)
    }

    #[test]
    fn test_default_template() {
        let key = FetchKey::new("stock", "600519");
        let text = render_fragment(&DisplayTemplate::default(), &key, &moutai(), STYLE, false);

        assert_eq!(text, "🔴📈 贵州茅台(600519) 1426.00 (+2.15%)");
    }

    #[test]
    fn test_plain_indicator_and_flat_band() {
        let key = FetchKey::new("stock", "000001");
        let record = QuoteRecord::new("000001", "平安银行", 11.2, 0.004);
        let style = FragmentStyle {
            use_color: false,
            ..STYLE
        };

        let text = render_fragment(&DisplayTemplate::default(), &key, &record, style, false);
        assert!(text.starts_with("→ "));

        let wide = FragmentStyle {
            flat_band: 0.0,
            use_color: false,
        };
        let text = render_fragment(&DisplayTemplate::default(), &key, &record, wide, false);
        assert!(text.starts_with("↑ "));
    }

    #[test]
    fn test_textual_value_uses_detail() {
        let key = FetchKey::new("network", "local_ip");
        let record = QuoteRecord::new("local_ip", "Local IP", f64::NAN, 0.0).with_detail("10.0.0.2");
        let template = DisplayTemplate::parse("{name}: {value}{change}").unwrap();

        assert_eq!(
            render_fragment(&template, &key, &record, STYLE, false),
            "Local IP: 10.0.0.2"
        );
    }

    #[test]
    fn test_unit_provider_and_degraded() {
        let key = FetchKey::new("system", "cpu");
        let record = QuoteRecord::new("cpu", "CPU", 37.5, 0.0).with_unit("%");
        let template = DisplayTemplate::parse("{provider}/{symbol} {value}{unit}").unwrap();

        assert_eq!(
            render_fragment(&template, &key, &record, STYLE, true),
            "⚪ system/cpu 37.50%"
        );
    }
}
