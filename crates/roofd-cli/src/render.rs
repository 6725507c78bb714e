//! Terminal rendering of responses for the `roof` client.

use chrono::Utc;
use colored::{ColoredString, Colorize};
use roofd_types::{Color, CommandResult, Emphasis, HeartbeatState, Response, RoofState, StatusReport};

/// Apply a state's emphasis to `label`.
pub fn paint(label: &str, emphasis: Emphasis) -> ColoredString {
    let colored = match emphasis.color {
        Color::Default => label.normal(),
        Color::Red => label.red(),
        Color::Green => label.green(),
        Color::Yellow => label.yellow(),
        Color::Cyan => label.cyan(),
    };
    if emphasis.bold { colored.bold() } else { colored }
}

fn roof_label(state: RoofState) -> ColoredString {
    paint(state.text(), state.emphasis())
}

fn heartbeat_label(state: HeartbeatState) -> ColoredString {
    paint(state.text(), state.emphasis())
}

/// Status table printed for `status`.
pub fn status_table(report: &StatusReport) -> String {
    let mut out = format!(
        "Data received {}:\n",
        report.date.format("%Y-%m-%d %H:%M:%S UTC").to_string().bold()
    );
    out.push_str(&format!("   Roof: {}\n", roof_label(report.roof)));

    let mut heartbeat = heartbeat_label(report.heartbeat).to_string();
    if let Some(until) = report.heartbeat_until {
        let remaining = (until - Utc::now()).num_milliseconds().max(0) as f64 / 1000.0;
        heartbeat.push_str(&format!(" ({remaining:.1}s remaining)"));
    }
    out.push_str(&format!("   Heartbeat: {heartbeat}\n"));

    if report.engineering_mode {
        out.push_str(&format!("   Engineering mode: {}\n", paint("ENABLED", Emphasis::ERROR)));
    }
    out
}

/// One-line rendering of a non-status result.  Errors are red.
pub fn result_line(result: &CommandResult) -> String {
    if result.is_success() {
        result.message.clone()
    } else {
        result.message.red().to_string()
    }
}

/// Full text printed for `response`.
pub fn response_text(response: &Response) -> String {
    match &response.status {
        Some(report) if response.result.is_success() => status_table(report),
        _ => result_line(&response.result),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use roofd_types::CommandStatus;

    fn plain() {
        colored::control::set_override(false);
    }

    fn report() -> StatusReport {
        StatusReport {
            date: Utc.with_ymd_and_hms(2026, 3, 1, 21, 30, 0).unwrap(),
            roof: RoofState::Open,
            heartbeat: HeartbeatState::Disabled,
            heartbeat_until: None,
            heartbeat_timeout: None,
            engineering_mode: false,
        }
    }

    #[test]
    fn status_table_lists_states() {
        plain();
        let text = status_table(&report());
        assert!(text.contains("2026-03-01 21:30:00 UTC"));
        assert!(text.contains("Roof: OPEN"));
        assert!(text.contains("Heartbeat: DISABLED"));
        assert!(!text.contains("Engineering"));
    }

    #[test]
    fn status_table_shows_heartbeat_expiry_and_engineering() {
        plain();
        let mut report = report();
        report.heartbeat = HeartbeatState::Active;
        report.heartbeat_until = Some(Utc::now() + Duration::seconds(30));
        let text = status_table(&report);
        assert!(text.contains("Heartbeat: ACTIVE ("), "{text}");
        assert!(text.contains("s remaining"));

        report.heartbeat = HeartbeatState::Disabled;
        report.heartbeat_until = None;
        report.engineering_mode = true;
        assert!(status_table(&report).contains("Engineering mode: ENABLED"));
    }

    #[test]
    fn error_results_use_their_message() {
        plain();
        let response: Response = CommandStatus::Blocked.into();
        assert_eq!(response_text(&response), "error: another command is already running");

        let unknown = CommandResult::from_code(42);
        assert_eq!(result_line(&unknown), "error: Unknown error code 42");
    }
}
