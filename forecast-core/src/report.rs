//! Plain-text notification body built from a consensus forecast.

use std::fmt::Write;

use crate::model::WeatherConsensus;
use crate::stats::{mean, round_to};

/// Hourly precipitation above which an hour counts as rainy.
pub const RAIN_HOUR_MM: f64 = 0.5;
/// Peak wind speed above which the day counts as windy.
pub const WINDY_MS: f64 = 7.0;

const LISTED_RAIN_HOURS: usize = 5;

/// Apparent temperature in °C, rounded to one decimal.
///
/// Wind chill below 10 °C with wind over 4.8 km/h, a simplified heat index
/// above 27 °C with humidity over 40 %, otherwise a linear wind adjustment
/// once wind exceeds 10 km/h.
pub fn feels_like(temperature_c: f64, humidity_pct: f64, wind_speed_ms: f64) -> f64 {
    let t = temperature_c;
    let h = humidity_pct;
    let wind_kmh = wind_speed_ms * 3.6;

    let apparent = if t < 10.0 && wind_kmh > 4.8 {
        let v = wind_kmh.powf(0.16);
        13.12 + 0.6215 * t - 11.37 * v + 0.3965 * t * v
    } else if t > 27.0 && h > 40.0 {
        -8.78469475556 + 1.61139411 * t + 2.33854883889 * h
            - 0.14611605 * t * h
            - 0.012308094 * t.powi(2)
            - 0.0164248277778 * h.powi(2)
            + 0.002211732 * t.powi(2) * h
            + 0.00072546 * t * h.powi(2)
            - 0.000003582 * t.powi(2) * h.powi(2)
    } else if wind_kmh > 10.0 {
        t - (wind_kmh - 10.0) * 0.3
    } else {
        t
    };

    round_to(apparent, 1)
}

fn min_max(values: &[f64]) -> (f64, f64) {
    values
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| (lo.min(*v), hi.max(*v)))
}

/// Composes the notification body: temperature, rain and wind sections
/// followed by the recommendation.
pub fn format_report(consensus: &WeatherConsensus, recommendation: &str) -> String {
    let hours = &consensus.hourly_data;
    let mut out = String::new();

    let _ = writeln!(out, "Weather for the next {} hours", hours.len());
    let sources: Vec<&str> = consensus.sources_used.iter().map(String::as_str).collect();
    let _ = writeln!(
        out,
        "Sources: {} (reliability {:.0}%)\n",
        sources.join(", "),
        consensus.reliability_score * 100.0
    );

    let temps = consensus.temperatures();
    let (low, high) = min_max(&temps);
    let apparent: Vec<f64> =
        hours.iter().map(|h| feels_like(h.temperature_c, h.humidity_pct, h.wind_speed_ms)).collect();
    let (apparent_low, apparent_high) = min_max(&apparent);

    let _ = writeln!(out, "🌡️ Temperature");
    if hours.is_empty() {
        let _ = writeln!(out, "• No temperature data");
    } else {
        let _ = writeln!(out, "• Low: {low:.1}°C");
        let _ = writeln!(out, "• High: {high:.1}°C");
        let _ = writeln!(out, "• Feels like: {:.1}°C", mean(&apparent));
        let _ = writeln!(out, "  (Range: {apparent_low:.1}°C - {apparent_high:.1}°C)");
    }
    out.push('\n');

    let total_precip = consensus.total_precipitation();
    let peak_precip = hours.iter().map(|h| h.precipitation_mm).fold(0.0, f64::max);
    let rain_hours: Vec<usize> = hours
        .iter()
        .enumerate()
        .filter(|(_, h)| h.precipitation_mm > RAIN_HOUR_MM)
        .map(|(i, _)| i)
        .collect();

    let _ = writeln!(out, "☁️ Rain");
    if total_precip <= RAIN_HOUR_MM {
        let _ = writeln!(out, "• ✅ No rain expected");
    } else if rain_hours.is_empty() {
        let _ = writeln!(out, "• ⚠️ Light rain possible ({total_precip:.1}mm total)");
    } else {
        let mut listed: Vec<String> =
            rain_hours.iter().take(LISTED_RAIN_HOURS).map(|h| format!("+{h}h")).collect();
        if rain_hours.len() > LISTED_RAIN_HOURS {
            listed.push(format!("(+{} more)", rain_hours.len() - LISTED_RAIN_HOURS));
        }
        let _ = writeln!(out, "• ⚠️ Rain expected");
        let _ = writeln!(out, "• Total: {total_precip:.1}mm");
        let _ = writeln!(out, "• Peak: {peak_precip:.1}mm");
        let _ = writeln!(out, "• Hours: {}", listed.join(", "));
    }
    out.push('\n');

    let winds: Vec<f64> =
        hours.iter().map(|h| h.wind_speed_ms).filter(|w| w.is_finite()).collect();
    let peak_wind = consensus.max_wind_speed();

    let _ = writeln!(out, "🌬️ Wind");
    if peak_wind > WINDY_MS {
        let _ = writeln!(out, "• ⚠️ Windy conditions");
    } else {
        let _ = writeln!(out, "• ✅ Light winds");
    }
    let _ = writeln!(out, "• Speed: {:.1} m/s (avg)", mean(&winds));
    let _ = writeln!(out, "• Peak: {peak_wind:.1} m/s\n");

    let _ = writeln!(out, "👔 Recommendation");
    let _ = writeln!(out, "{}\n", recommendation.trim());
    out.push_str("Have a great day!\n");

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::fixtures::consensus;
    use crate::rubric::RubricScorer;

    const ADVICE: &str = "Wear a warm coat and take an umbrella, light rain is likely after lunch.";

    #[test]
    fn calm_mild_weather_feels_like_air_temperature() {
        assert_eq!(feels_like(15.0, 60.0, 2.0), 15.0);
    }

    #[test]
    fn wind_chill_applies_when_cold_and_breezy() {
        // 0 °C at 5 m/s (18 km/h)
        assert_eq!(feels_like(0.0, 70.0, 5.0), -4.9);
    }

    #[test]
    fn heat_index_applies_when_hot_and_humid() {
        let hi = feels_like(32.0, 70.0, 1.0);
        assert!(hi > 32.0, "heat index {hi} should exceed air temperature");
    }

    #[test]
    fn moderate_wind_lowers_perceived_temperature() {
        // 20 °C at 5 m/s: 18 km/h, 8 over the threshold
        assert_eq!(feels_like(20.0, 50.0, 5.0), 17.6);
    }

    #[test]
    fn report_has_every_section_label() {
        let report = format_report(&consensus(8.0, 0.0), ADVICE);
        for label in ["🌡️ Temperature", "☁️ Rain", "🌬️ Wind", "👔 Recommendation"] {
            assert!(report.contains(label), "missing {label}");
        }
        assert!(report.contains("• Low: 8.0°C"));
        assert!(report.contains("• ✅ No rain expected"));
        assert!(report.contains("• ✅ Light winds"));
        assert!(report.contains(ADVICE));
    }

    #[test]
    fn rainy_hours_are_listed_up_to_five() {
        let report = format_report(&consensus(8.0, 1.2), ADVICE);
        assert!(report.contains("• ⚠️ Rain expected"));
        assert!(report.contains("• Total: 12.0mm"));
        assert!(report.contains("• Hours: +0h, +1h, +2h, +3h, +4h, (+5 more)"));
    }

    #[test]
    fn scattered_drizzle_is_light_rain() {
        let report = format_report(&consensus(8.0, 0.1), ADVICE);
        assert!(report.contains("• ⚠️ Light rain possible (1.0mm total)"));
    }

    #[test]
    fn unreported_wind_and_humidity_are_left_out() {
        let mut data = consensus(8.0, 0.0);
        data.hourly_data[0].wind_speed_ms = f64::NAN;
        data.hourly_data[0].humidity_pct = f64::NAN;
        let report = format_report(&data, ADVICE);
        assert!(!report.contains("NaN"));
        assert!(report.contains("• Speed: 4.0 m/s (avg)"));
    }

    #[test]
    fn strong_peak_wind_is_flagged() {
        let mut data = consensus(8.0, 0.0);
        data.hourly_data[4].wind_speed_ms = 9.5;
        let report = format_report(&data, ADVICE);
        assert!(report.contains("• ⚠️ Windy conditions"));
        assert!(report.contains("• Peak: 9.5 m/s"));
    }

    #[test]
    fn report_passes_message_rubric() {
        let report = format_report(&consensus(8.0, 0.2), ADVICE);
        let result = RubricScorer::default().evaluate_message(&report, ADVICE);
        assert!(result.passed, "issues: {:?}", result.issues);
        assert_eq!(result.overall_score, 1.0);
    }
}
