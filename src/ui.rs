use std::io::{self, IsTerminal};

use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

use crate::app::ScheduleView;
use crate::ticker::TickReport;

pub fn print_schedule_list(rows: &[ScheduleView]) {
    let palette = Palette::auto();
    println!("{}", palette.heading("Schedules"));
    if rows.is_empty() {
        println!("{}", palette.dim("nothing tracked"));
        return;
    }
    for row in rows {
        println!("{}", format_schedule_row(row, &palette));
    }
    println!("{}", palette.dim(&format!("{} item(s)", rows.len())));
}

fn format_schedule_row(row: &ScheduleView, palette: &Palette) -> String {
    let mut line = format!(
        "{} {}",
        palette.kind(row.kind.as_str()),
        palette.id(&row.id)
    );
    match row.mode.as_deref() {
        Some(mode) => {
            let label = match row.step {
                Some(step) => format!("{mode}#{step}"),
                None => mode.to_string(),
            };
            line.push(' ');
            line.push_str(&palette.mode(&label, row.exhausted));
            line.push_str(&format!(" next={}", instant_label(row.next_fire_at)));
            if let Some(last) = row.last_fired_at {
                line.push_str(&palette.dim(&format!(" last={}", instant_label(Some(last)))));
            }
        }
        None => line.push_str(&palette.dim(" (untracked)")),
    }
    if row.muted {
        line.push(' ');
        line.push_str(&palette.muted("muted"));
    }
    line
}

pub fn print_tick_reports(reports: &[TickReport]) {
    let palette = Palette::auto();
    for report in reports {
        if report.is_quiet() && report.muted.is_empty() {
            println!(
                "{} {}",
                palette.kind(report.kind.as_str()),
                palette.dim("nothing due")
            );
            continue;
        }
        for (label, ids) in [
            ("fired", &report.fired),
            ("activated", &report.activations),
            ("muted", &report.muted),
            ("skipped", &report.skipped_stale),
            ("failed", &report.alert_failures),
        ] {
            if !ids.is_empty() {
                println!(
                    "{} {} {}",
                    palette.kind(report.kind.as_str()),
                    label,
                    ids.join(", ")
                );
            }
        }
    }
}

pub fn print_channel_results(results: &[(String, Result<(), String>)]) {
    let palette = Palette::auto();
    for (channel, result) in results {
        match result {
            Ok(()) => println!("{} {}", palette.ok("ok"), channel),
            Err(err) => println!("{} {}: {}", palette.muted("failed"), channel, err),
        }
    }
}

fn instant_label(instant: Option<OffsetDateTime>) -> String {
    match instant {
        Some(value) => value.format(&Rfc3339).unwrap_or_else(|_| value.to_string()),
        None => "never".to_string(),
    }
}

struct Palette {
    enabled: bool,
}

impl Palette {
    fn auto() -> Self {
        let enabled = std::env::var_os("NO_COLOR").is_none() && io::stdout().is_terminal();
        Self { enabled }
    }

    fn paint(&self, code: &str, text: &str) -> String {
        if self.enabled {
            format!("\x1b[{code}m{text}\x1b[0m")
        } else {
            text.to_string()
        }
    }

    fn heading(&self, text: &str) -> String {
        self.paint("1;36", text)
    }

    fn dim(&self, text: &str) -> String {
        self.paint("2", text)
    }

    fn id(&self, text: &str) -> String {
        self.paint("1;94", text)
    }

    fn kind(&self, kind: &str) -> String {
        self.paint("35", &format!("({kind})"))
    }

    fn mode(&self, label: &str, exhausted: bool) -> String {
        let code = if exhausted { "90" } else { "33" };
        self.paint(code, &format!("[{}]", label.to_ascii_uppercase()))
    }

    fn ok(&self, text: &str) -> String {
        self.paint("32", text)
    }

    fn muted(&self, text: &str) -> String {
        self.paint("31", text)
    }
}
