use std::io::IsTerminal;
use std::time::Duration;

use anstyle::{AnsiColor, Effects, Style};
use ccmup_installer::{InstallEvent, InstallOutcome, LockState, UpdateStatus};
use ccmup_security::VerificationOutcome;
use indicatif::{ProgressBar, ProgressStyle};

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub(crate) enum OutputStyle {
    Plain,
    Rich,
}

#[derive(Copy, Clone, Debug)]
pub(crate) struct TerminalRenderer {
    style: OutputStyle,
}

pub(crate) struct TerminalProgress {
    style: OutputStyle,
    progress_bar: Option<ProgressBar>,
}

impl TerminalRenderer {
    pub(crate) fn from_style(style: OutputStyle) -> Self {
        Self { style }
    }

    pub(crate) fn current() -> Self {
        Self::from_style(current_output_style())
    }

    pub(crate) fn style(self) -> OutputStyle {
        self.style
    }

    pub(crate) fn print_status(self, status: &str, message: &str) {
        println!("{}", self.styled_status_line(status, message));
    }

    pub(crate) fn print_error(self, message: &str) {
        eprintln!("{}", self.styled_status_line("error", message));
    }

    pub(crate) fn print_lines(self, lines: &[String]) {
        for line in lines {
            println!("{line}");
        }
    }

    pub(crate) fn start_progress(self, label: &str) -> TerminalProgress {
        let progress_bar = if self.style == OutputStyle::Rich {
            let progress_bar = ProgressBar::new_spinner();
            if let Ok(style) = ProgressStyle::with_template("{spinner:.cyan.bold} {msg}") {
                progress_bar.set_style(style.tick_chars(".oO@* "));
            }
            progress_bar.set_message(label.to_string());
            progress_bar.enable_steady_tick(Duration::from_millis(80));
            Some(progress_bar)
        } else {
            None
        };

        TerminalProgress {
            style: self.style,
            progress_bar,
        }
    }

    fn styled_status_line(self, status: &str, message: &str) -> String {
        match self.style {
            OutputStyle::Plain => render_status_line(self.style, status, message),
            OutputStyle::Rich => format!(
                "{} {message}",
                colorize(status_style(status), &status_badge(status))
            ),
        }
    }
}

impl TerminalProgress {
    /// Updates the spinner for an install event; plain mode only reports what a user must see.
    pub(crate) fn observe(&mut self, event: &InstallEvent) {
        let Some(message) = describe_event(event) else {
            return;
        };
        let warning = event_is_warning(event);

        match &self.progress_bar {
            Some(progress_bar) if warning => {
                progress_bar.println(render_status_line(self.style, "warn", &message));
            }
            Some(progress_bar) => progress_bar.set_message(message),
            None if warning => {
                eprintln!("{}", render_status_line(self.style, "warn", &message));
            }
            None => {}
        }
    }

    pub(crate) fn finish_success(mut self) {
        if let Some(progress_bar) = self.progress_bar.take() {
            progress_bar.finish_and_clear();
        }
    }

    pub(crate) fn finish_abandon(mut self) {
        if let Some(progress_bar) = self.progress_bar.take() {
            progress_bar.finish_and_clear();
        }
    }
}

pub(crate) fn current_output_style() -> OutputStyle {
    if std::env::var_os("NO_COLOR").is_some_and(|value| !value.is_empty()) {
        return OutputStyle::Plain;
    }
    resolve_output_style(
        std::io::stdout().is_terminal(),
        std::io::stderr().is_terminal(),
    )
}

pub(crate) fn resolve_output_style(stdout_is_tty: bool, _stderr_is_tty: bool) -> OutputStyle {
    if stdout_is_tty {
        OutputStyle::Rich
    } else {
        OutputStyle::Plain
    }
}

pub(crate) fn render_status_line(style: OutputStyle, status: &str, message: &str) -> String {
    match style {
        OutputStyle::Plain => match status {
            "warn" => format!("warning: {message}"),
            "error" => format!("error: {message}"),
            _ => message.to_string(),
        },
        OutputStyle::Rich => format!("{} {message}", status_badge(status)),
    }
}

fn status_badge(status: &str) -> String {
    match status {
        "ok" => "[OK]".to_string(),
        "warn" => "[WARN]".to_string(),
        "error" => "[ERR]".to_string(),
        "step" => "[..]".to_string(),
        other => format!("[{}]", other.to_ascii_uppercase()),
    }
}

fn status_style(status: &str) -> Style {
    let color = match status {
        "ok" => AnsiColor::BrightGreen,
        "warn" => AnsiColor::BrightYellow,
        "error" => AnsiColor::BrightRed,
        _ => AnsiColor::BrightCyan,
    };
    Style::new()
        .fg_color(Some(color.into()))
        .effects(Effects::BOLD)
}

fn colorize(style: Style, text: &str) -> String {
    format!("{}{}{}", style.render(), text, style.render_reset())
}

fn event_is_warning(event: &InstallEvent) -> bool {
    matches!(
        event,
        InstallEvent::Repairing { .. } | InstallEvent::Verified(VerificationOutcome::Skipped { .. })
    )
}

pub(crate) fn describe_event(event: &InstallEvent) -> Option<String> {
    match event {
        InstallEvent::StaleEntriesRemoved(count) => {
            Some(format!("removed {count} leftover temporary entries"))
        }
        InstallEvent::ReleaseResolved {
            version,
            download_tag,
        } => Some(match download_tag {
            Some(tag) if tag != version => format!("resolved release {tag} as {version}"),
            Some(tag) => format!("resolved release {tag}"),
            None => format!("using latest release as {version}"),
        }),
        InstallEvent::Fetching { asset } => Some(format!("downloading {asset}")),
        InstallEvent::Verified(VerificationOutcome::Verified { .. }) => {
            Some("checksum verified".to_string())
        }
        InstallEvent::Verified(VerificationOutcome::Skipped { reason, .. }) => Some(format!(
            "checksum verification skipped ({reason}); installing unverified bundle"
        )),
        InstallEvent::Activated { version } => Some(format!("activated {version}")),
        InstallEvent::Repairing { reason } => Some(format!(
            "installation was not runnable ({reason}); resetting and reinstalling once"
        )),
    }
}

pub(crate) fn format_install_outcome_lines(
    verb: &str,
    outcome: &InstallOutcome,
    style: OutputStyle,
) -> Vec<String> {
    let mut lines = vec![render_status_line(
        style,
        "ok",
        &format!("{verb} ccm {} ({})", outcome.tag, outcome.asset),
    )];
    lines.push(format!("entrypoint: {}", outcome.entrypoint.display()));
    lines.push(format!(
        "verification: {}",
        outcome.verification.receipt_token()
    ));
    for link in &outcome.links.created {
        lines.push(format!("linked: {}", link.display()));
    }
    for failure in &outcome.links.failures {
        lines.push(render_status_line(
            style,
            "warn",
            &format!("could not link {}: {}", failure.link.display(), failure.reason),
        ));
    }
    if outcome.repaired {
        lines.push(render_status_line(
            style,
            "warn",
            "the install store was reset once to recover from a broken installation",
        ));
    }
    lines
}

pub(crate) fn format_update_status_lines(status: &UpdateStatus, style: OutputStyle) -> Vec<String> {
    let installed = status.installed.as_deref().unwrap_or("none");
    let mut lines = vec![
        format!("installed: {installed}"),
        format!("latest: {}", status.latest),
        format!("preferred asset: {}", status.preferred_asset),
    ];
    let verdict = match (status.installed.is_some(), status.update_available) {
        (false, _) => render_status_line(style, "step", "ccm is not installed"),
        (true, Some(true)) => render_status_line(style, "ok", "update available"),
        (true, Some(false)) => render_status_line(style, "ok", "up to date"),
        (true, None) => render_status_line(style, "warn", "installed version is unknown"),
    };
    lines.push(verdict);
    if status.asset_mismatch {
        lines.push(render_status_line(
            style,
            "warn",
            "installed bundle uses a different runtime variant; upgrading will switch it",
        ));
    }
    lines
}

pub(crate) fn format_lock_state(state: &LockState) -> String {
    match state {
        LockState::Free => "free".to_string(),
        LockState::Held {
            owner: Some(owner),
            owner_alive,
        } => match owner_alive {
            Some(true) => format!("held by {owner} (running)"),
            Some(false) => format!("held by {owner} (stale)"),
            None => format!("held by {owner}"),
        },
        LockState::Held { owner: None, .. } => "held (owner unknown)".to_string(),
    }
}
