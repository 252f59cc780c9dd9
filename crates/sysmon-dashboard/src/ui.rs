use crate::state::{
    files_in, listing_in, processes_in, services_in, App, LogsFocus, Payload, Tab,
};
use crate::theme::{self, icons};
use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{
        Block, Borders, Cell, Clear, List, ListItem, Paragraph, Row, Table, TableState, Tabs,
        Wrap,
    },
    Frame,
};
use sysmon_sync::{CacheEntry, PageView, SortSpec, ViewState};

pub fn render(f: &mut Frame, app: &mut App) {
    let area = f.size();
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1),
            Constraint::Min(5),
            Constraint::Length(1),
            Constraint::Length(1),
        ])
        .split(area);

    render_tabs(f, app, chunks[0]);
    match app.tab {
        Tab::Logs => render_logs(f, app, chunks[1]),
        Tab::Services => {
            app.update_layout(chunks[1], None);
            render_services(f, app, chunks[1]);
        }
        Tab::Tasks => {
            app.update_layout(chunks[1], None);
            render_processes(f, app, chunks[1]);
        }
    }
    render_footer(f, app, chunks[2]);
    render_notice(f, app, chunks[3]);

    if app.show_help {
        render_help(f, centered(area, 60, 70));
    }
    if app.confirming.is_some() {
        render_confirm(f, app, centered(area, 50, 30));
    }
}

fn render_tabs(f: &mut Frame, app: &App, area: Rect) {
    let titles: Vec<Line> = Tab::ALL.iter().map(|tab| Line::from(tab.label())).collect();
    let selected = Tab::ALL.iter().position(|tab| *tab == app.tab).unwrap_or(0);
    let tabs = Tabs::new(titles)
        .select(selected)
        .style(theme::MUTED)
        .highlight_style(theme::HEADER_STYLE.add_modifier(Modifier::UNDERLINED))
        .divider("|");
    f.render_widget(tabs, area);
}

fn status_span<T>(entry: Option<&CacheEntry<T>>) -> Span<'static> {
    let Some(entry) = entry else {
        return Span::raw("");
    };
    if let Some(err) = &entry.error {
        let label = if entry.is_stale() {
            format!(" stale: {err} ")
        } else {
            format!(" error: {err} ")
        };
        return Span::styled(label, Style::default().fg(Color::Rgb(251, 73, 52)));
    }
    if entry.loading {
        return Span::styled(format!(" {} loading ", icons::LOADING), theme::MUTED);
    }
    Span::raw("")
}

fn titled_block(title: String, focused: bool, status: Span<'static>) -> Block<'static> {
    let border_style = if focused {
        theme::FOCUS_BORDER
    } else {
        Style::default()
    };
    Block::default()
        .borders(Borders::ALL)
        .title(Line::from(vec![Span::raw(title), status]))
        .border_style(border_style)
}

fn header_row<F: Copy + PartialEq>(
    columns: &[F],
    label: impl Fn(F) -> &'static str,
    sort: Option<SortSpec<F>>,
) -> Row<'static> {
    let cells: Vec<Cell> = columns
        .iter()
        .enumerate()
        .map(|(idx, column)| {
            let mut text = format!("{} {}", idx + 1, label(*column));
            if let Some(spec) = sort.filter(|spec| spec.field == *column) {
                text.push(' ');
                text.push_str(spec.direction.arrow());
            }
            Cell::from(text)
        })
        .collect();
    Row::new(cells).style(theme::HEADER_STYLE)
}

fn clamp_selection(table: &mut TableState, len: usize) {
    match table.selected() {
        _ if len == 0 => table.select(None),
        Some(idx) if idx >= len => table.select(Some(len - 1)),
        None => table.select(Some(0)),
        _ => {}
    }
}

fn page_label<R>(page: &PageView<'_, R>, view: &ViewState<impl Copy + Eq>) -> String {
    let size = view.page().page_size;
    let size_label = if size == 0 {
        "all".to_string()
    } else {
        size.to_string()
    };
    format!(
        " page {}/{}  {} rows  {size_label}/page ",
        page.page_index + 1,
        page.page_count,
        page.filtered_len
    )
}

pub fn format_bytes(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["B", "KB", "MB", "GB"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{bytes} B")
    } else {
        format!("{value:.1} {}", UNITS[unit])
    }
}

fn render_logs(f: &mut Frame, app: &mut App, area: Rect) {
    let sidebar_percent = app.layout.width_percent().round() as u16;
    let columns = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage(sidebar_percent),
            Constraint::Percentage(100 - sidebar_percent),
        ])
        .split(area);
    let sidebar = columns[0];
    app.update_layout(area, Some(sidebar.x + sidebar.width.saturating_sub(1)));

    let folder_entries = app.folder_entries();
    let listed = u16::try_from(folder_entries.len()).unwrap_or(u16::MAX);
    let folder_height = listed
        .saturating_add(2)
        .clamp(3, (sidebar.height / 3 + 2).max(3));
    let parts = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(folder_height), Constraint::Min(3)])
        .split(sidebar);

    let items: Vec<ListItem> = folder_entries
        .iter()
        .map(|entry| {
            let icon = if entry == ".." {
                icons::PARENT
            } else {
                icons::FOLDER
            };
            ListItem::new(format!("{icon} {entry}"))
        })
        .collect();
    let folder_title = format!(" {} ", app.logs.folder.as_deref().unwrap_or("/"));
    let list = List::new(items)
        .block(titled_block(
            folder_title,
            app.logs.focus == LogsFocus::Folders,
            Span::raw(""),
        ))
        .highlight_style(theme::SELECTED_STYLE);
    f.render_stateful_widget(list, parts[0], &mut app.logs.folders);

    let files = files_in(&app.cache, &app.logs.key);
    let page = app.logs.view.apply(files);
    clamp_selection(&mut app.logs.table, page.rows.len());
    let tailing = app.tailer.file();
    let rows: Vec<Row> = page
        .rows
        .iter()
        .enumerate()
        .map(|(idx, file)| {
            let marker = if tailing == Some(file.name.as_str()) {
                icons::TAILING
            } else {
                " "
            };
            Row::new(vec![
                Cell::from(format!("{marker} {}", file.name)),
                Cell::from(format_bytes(file.size_bytes)),
                Cell::from(file.last_modified.format("%Y-%m-%d %H:%M").to_string()),
            ])
            .style(theme::zebra_row_style(idx))
        })
        .collect();
    let header = header_row(
        &sysmon_sync::LogColumn::ALL,
        |column| column.label(),
        app.logs.view.sort(),
    );
    let title = format!(" Files{}", page_label(&page, &app.logs.view));
    let table = Table::new(
        rows,
        [
            Constraint::Min(12),
            Constraint::Length(10),
            Constraint::Length(16),
        ],
    )
    .header(header)
    .block(titled_block(
        title,
        app.logs.focus == LogsFocus::Files,
        status_span(app.cache.entry(&app.logs.key)),
    ))
    .highlight_style(theme::SELECTED_STYLE);
    f.render_stateful_widget(table, parts[1], &mut app.logs.table);

    render_tail(f, app, columns[1]);
}

fn render_tail(f: &mut Frame, app: &App, area: Rect) {
    let Some(file) = app.tailer.file() else {
        let empty = listing_in(&app.cache, &app.logs.key)
            .map(|listing| listing.files.is_empty())
            .unwrap_or(true);
        let hint = if empty {
            "No log files in this folder"
        } else {
            "Select a file and press Enter to tail it"
        };
        let p = Paragraph::new(Line::from(Span::styled(hint, theme::MUTED)))
            .block(titled_block(" Content ".to_string(), false, Span::raw("")));
        f.render_widget(p, area);
        return;
    };

    let content = app.tailer.content(&app.cache);
    let status = match &content {
        Some(content) if content.error.is_some() => {
            let err = content.error.map(|err| err.to_string()).unwrap_or_default();
            let label = if content.data.is_some() {
                format!(" stale: {err} ")
            } else {
                format!(" error: {err} ")
            };
            Span::styled(label, Style::default().fg(Color::Rgb(251, 73, 52)))
        }
        Some(content) if content.loading => {
            Span::styled(format!(" {} loading ", icons::LOADING), theme::MUTED)
        }
        _ => Span::raw(""),
    };
    let block = titled_block(format!(" {} {file} ", icons::TAILING), false, status);
    let inner = block.inner(area);
    f.render_widget(block, area);

    let text = match content.and_then(|content| content.data) {
        Some(Payload::Content(text)) => text.as_str(),
        _ => "",
    };
    // Keep the newest lines in view.
    let visible = inner.height as usize;
    let lines: Vec<&str> = text.lines().collect();
    let start = lines.len().saturating_sub(visible);
    let shown: Vec<Line> = lines[start..]
        .iter()
        .map(|line| Line::from(line.to_string()))
        .collect();
    f.render_widget(Paragraph::new(shown), inner);
}

fn render_services(f: &mut Frame, app: &mut App, area: Rect) {
    let services = services_in(&app.cache, &app.services.key);
    let page = app.services.view.apply(services);
    clamp_selection(&mut app.services.table, page.rows.len());
    let rows: Vec<Row> = page
        .rows
        .iter()
        .enumerate()
        .map(|(idx, service)| {
            let busy = if app.invoker.is_executing(&service.service_name) {
                format!("{} ", icons::LOADING)
            } else {
                String::new()
            };
            Row::new(vec![
                Cell::from(service.service_name.clone()),
                Cell::from(service.display_name.clone()),
                Cell::from(Span::styled(
                    format!("{busy}{}", service.status),
                    theme::service_status_color(service.status),
                )),
                Cell::from(service.service_type.clone()),
            ])
            .style(theme::zebra_row_style(idx))
        })
        .collect();
    let header = header_row(
        &sysmon_sync::ServiceColumn::ALL,
        |column| column.label(),
        app.services.view.sort(),
    );
    let title = format!(
        " Services [{}]{}",
        app.services.status.label(),
        page_label(&page, &app.services.view)
    );
    let table = Table::new(
        rows,
        [
            Constraint::Percentage(25),
            Constraint::Percentage(40),
            Constraint::Length(18),
            Constraint::Min(10),
        ],
    )
    .header(header)
    .block(titled_block(
        title,
        true,
        status_span(app.cache.entry(&app.services.key)),
    ))
    .highlight_style(theme::SELECTED_STYLE);
    f.render_stateful_widget(table, area, &mut app.services.table);
}

fn render_processes(f: &mut Frame, app: &mut App, area: Rect) {
    let processes = processes_in(&app.cache, &app.tasks.key);
    let page = app.tasks.view.apply(processes);
    clamp_selection(&mut app.tasks.table, page.rows.len());
    let rows: Vec<Row> = page
        .rows
        .iter()
        .enumerate()
        .map(|(idx, process)| {
            let mut name = Vec::new();
            if app.invoker.is_executing(&format!("pid:{}", process.id)) {
                name.push(Span::styled(format!("{} ", icons::LOADING), theme::MUTED));
            }
            if !process.responding {
                name.push(Span::styled(
                    format!("{} ", icons::NOT_RESPONDING),
                    Style::default().fg(Color::Rgb(251, 73, 52)),
                ));
            }
            name.push(Span::raw(process.name.clone()));
            let started = process
                .start_time
                .map(|ts| ts.format("%Y-%m-%d %H:%M:%S").to_string())
                .unwrap_or_else(|| "-".to_string());
            Row::new(vec![
                Cell::from(process.id.to_string()),
                Cell::from(Line::from(name)),
                Cell::from(format_bytes(process.working_set_bytes)),
                Cell::from(started),
            ])
            .style(theme::zebra_row_style(idx))
        })
        .collect();
    let header = header_row(
        &sysmon_sync::ProcessColumn::ALL,
        |column| column.label(),
        app.tasks.view.sort(),
    );
    let title = format!(" Processes{}", page_label(&page, &app.tasks.view));
    let table = Table::new(
        rows,
        [
            Constraint::Length(8),
            Constraint::Min(16),
            Constraint::Length(12),
            Constraint::Length(21),
        ],
    )
    .header(header)
    .block(titled_block(
        title,
        true,
        status_span(app.cache.entry(&app.tasks.key)),
    ))
    .highlight_style(theme::SELECTED_STYLE);
    f.render_stateful_widget(table, area, &mut app.tasks.table);
}

fn render_footer(f: &mut Frame, app: &App, area: Rect) {
    let filter = match app.tab {
        Tab::Logs => app.logs.view.filter_text(),
        Tab::Services => app.services.view.filter_text(),
        Tab::Tasks => app.tasks.view.filter_text(),
    };
    let mut spans = Vec::new();
    if app.editing_filter {
        spans.push(Span::styled("filter: ", theme::HEADER_STYLE));
        spans.push(Span::raw(format!("{filter}_")));
    } else if !filter.is_empty() {
        spans.push(Span::styled("filter: ", theme::MUTED));
        spans.push(Span::raw(filter.to_string()));
        spans.push(Span::raw("  "));
    }
    if !app.editing_filter {
        let hints = match app.tab {
            Tab::Logs => "Enter open/tail  f focus  Bksp up  x stop  </> resize  o link",
            Tab::Services => "f status  u start  d stop  R restart",
            Tab::Tasks => "K terminate  m monitor",
        };
        spans.push(Span::styled(
            format!("{hints}  / filter  1-4 sort  [ ] page  z size  r refresh  ? help  q quit"),
            theme::MUTED,
        ));
    }
    f.render_widget(Paragraph::new(Line::from(spans)), area);
}

fn render_notice(f: &mut Frame, app: &App, area: Rect) {
    let Some(notice) = app.notices.latest() else {
        return;
    };
    let line = Line::from(Span::styled(
        notice.message.clone(),
        theme::notice_style(notice.level),
    ));
    f.render_widget(Paragraph::new(line), area);
}

fn render_confirm(f: &mut Frame, app: &App, area: Rect) {
    let Some(prompt) = app
        .confirming
        .and_then(|token| app.invoker.pending(token))
        .and_then(|pending| pending.confirm.as_ref())
    else {
        return;
    };
    let block = Block::default()
        .borders(Borders::ALL)
        .title(format!(" {} ", prompt.title))
        .border_style(theme::confirm_border(prompt.variant));
    let text = vec![
        Line::from(prompt.message.clone()),
        Line::from(""),
        Line::from(vec![
            Span::styled("y / Enter", Color::Cyan),
            Span::raw(" confirm   "),
            Span::styled("n / Esc", Color::Cyan),
            Span::raw(" cancel"),
        ]),
    ];
    f.render_widget(Clear, area);
    f.render_widget(
        Paragraph::new(text).block(block).wrap(Wrap { trim: true }),
        area,
    );
}

fn render_help(f: &mut Frame, area: Rect) {
    let block = Block::default()
        .borders(Borders::ALL)
        .title("Help")
        .border_style(Style::default().fg(Color::Yellow));
    let entries = [
        ("Tab / S-Tab", "Switch view"),
        ("j / Down", "Next row"),
        ("k / Up", "Previous row"),
        ("1-4", "Sort by column (again to reverse)"),
        ("/", "Edit filter"),
        ("[ / ]", "Previous / next page"),
        ("z", "Cycle page size"),
        ("r", "Refresh now"),
        ("f", "Logs: folders/files  Services: status"),
        ("Enter", "Open folder / tail file"),
        ("Backspace", "Parent folder"),
        ("< / >", "Resize log sidebar (or drag divider)"),
        ("u d R", "Start / stop / restart service"),
        ("K", "Terminate process"),
        ("m", "Add process to application monitor"),
        ("q", "Quit"),
    ];
    let mut text = vec![
        Line::from(Span::styled(
            "Keyboard Shortcuts",
            Style::default().add_modifier(Modifier::BOLD),
        )),
        Line::from(""),
    ];
    text.extend(entries.iter().map(|(keys, description)| {
        Line::from(vec![
            Span::styled(format!("{keys:<12}"), Color::Cyan),
            Span::raw(*description),
        ])
    }));
    f.render_widget(Clear, area);
    f.render_widget(
        Paragraph::new(text).block(block).wrap(Wrap { trim: true }),
        area,
    );
}

fn centered(area: Rect, percent_x: u16, percent_y: u16) -> Rect {
    let vertical = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(area);
    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(vertical[1])[1]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{harness, press};
    use crossterm::event::KeyCode;
    use ratatui::{backend::TestBackend, Terminal};

    #[test]
    fn byte_sizes_use_binary_units() {
        assert_eq!(format_bytes(512), "512 B");
        assert_eq!(format_bytes(2048), "2.0 KB");
        assert_eq!(format_bytes(5 * 1024 * 1024 + 512 * 1024), "5.5 MB");
    }

    #[test]
    fn centered_rect_stays_inside() {
        let area = Rect::new(0, 0, 100, 40);
        let inner = centered(area, 50, 50);
        assert!(inner.x >= 25 && inner.right() <= 75);
        assert!(inner.y >= 10 && inner.bottom() <= 30);
    }

    #[tokio::test]
    async fn tiny_terminals_render_every_view() {
        let mut h = harness();
        for tab in Tab::ALL {
            for (width, height) in [(80, 1), (80, 0), (0, 0), (1, 1), (10, 3), (30, 8), (120, 40)] {
                let mut terminal =
                    Terminal::new(TestBackend::new(width, height)).expect("terminal");
                terminal
                    .draw(|f| render(f, &mut h.app))
                    .unwrap_or_else(|err| panic!("{tab:?} at {width}x{height}: {err}"));
            }
            press(&mut h.app, KeyCode::Tab);
        }

        press(&mut h.app, KeyCode::Char('?'));
        let mut terminal = Terminal::new(TestBackend::new(4, 2)).expect("terminal");
        terminal.draw(|f| render(f, &mut h.app)).expect("help overlay");
    }
}
