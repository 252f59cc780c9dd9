use ratatui::style::{Color, Modifier, Style};
use sysmon_core::ServiceStatus;
use sysmon_sync::{ConfirmVariant, NoticeLevel};

pub const HEADER_STYLE: Style = Style::new()
    .fg(Color::Rgb(142, 192, 124))
    .add_modifier(Modifier::BOLD);
pub const SELECTED_STYLE: Style = Style::new()
    .bg(Color::Rgb(131, 165, 152))
    .fg(Color::Black)
    .add_modifier(Modifier::BOLD);
pub const FOCUS_BORDER: Style = Style::new().fg(Color::Cyan);
pub const MUTED: Style = Style::new().fg(Color::Rgb(146, 131, 116));

pub fn zebra_row_style(index: usize) -> Style {
    let bg = if index % 2 == 0 {
        Color::Rgb(18, 20, 26)
    } else {
        Color::Rgb(24, 27, 34)
    };
    Style::new().bg(bg)
}

pub fn service_status_color(status: ServiceStatus) -> Color {
    match status {
        ServiceStatus::Running => Color::Rgb(184, 187, 38),
        ServiceStatus::Stopped => Color::Rgb(214, 93, 14),
        ServiceStatus::Paused => Color::Rgb(250, 189, 47),
        ServiceStatus::Unknown => Color::Rgb(146, 131, 116),
        _ => Color::Rgb(131, 165, 152),
    }
}

pub fn notice_style(level: NoticeLevel) -> Style {
    let color = match level {
        NoticeLevel::Success => Color::Rgb(184, 187, 38),
        NoticeLevel::Error => Color::Rgb(251, 73, 52),
        NoticeLevel::Info => Color::Rgb(131, 165, 152),
    };
    Style::new().fg(color)
}

pub fn confirm_border(variant: ConfirmVariant) -> Style {
    let color = match variant {
        ConfirmVariant::Danger => Color::Rgb(251, 73, 52),
        ConfirmVariant::Warning => Color::Rgb(250, 189, 47),
        ConfirmVariant::Info => Color::Rgb(131, 165, 152),
    };
    Style::new().fg(color).add_modifier(Modifier::BOLD)
}

pub mod icons {
    pub const FOLDER: &str = "+";
    pub const PARENT: &str = "..";
    pub const TAILING: &str = ">";
    pub const NOT_RESPONDING: &str = "!";
    pub const LOADING: &str = "~";
}
