//! Dashboard rendering.

use crate::chat::transcript::Role;
use crate::sensor::hub::SensorStatus;
use crate::ui::app::App;
use ratatui::Frame;
use ratatui::layout::{Constraint, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Gauge, Paragraph, Wrap};

const SPINNER_FRAMES: [&str; 3] = ["·  ", "·· ", "···"];

/// Render the full dashboard.
pub fn render(frame: &mut Frame, app: &App) {
    let [sidebar_area, chat_area] =
        Layout::horizontal([Constraint::Length(34), Constraint::Min(40)]).areas(frame.area());

    render_sidebar(frame, app, sidebar_area);
    render_chat(frame, app, chat_area);
}

fn render_sidebar(frame: &mut Frame, app: &App, area: Rect) {
    let [brand_area, sensor_area, help_area] = Layout::vertical([
        Constraint::Length(3),
        Constraint::Length(8),
        Constraint::Min(3),
    ])
    .areas(area);

    let brand = Paragraph::new(Line::from(vec![
        Span::styled("EmpaAI ", Style::default().add_modifier(Modifier::BOLD)),
        Span::styled("emotion engine", Style::default().fg(Color::DarkGray)),
    ]))
    .block(Block::default().borders(Borders::ALL));
    frame.render_widget(brand, brand_area);

    render_sensor_panel(frame, app, sensor_area);
    render_help(frame, app, help_area);
}

fn render_sensor_panel(frame: &mut Frame, app: &App, area: Rect) {
    let block = Block::default().borders(Borders::ALL).title("Sensory Input");
    let inner = block.inner(area);
    frame.render_widget(block, area);

    let [expression_area, gauge_area, voice_area, status_area] = Layout::vertical([
        Constraint::Length(1),
        Constraint::Length(1),
        Constraint::Length(1),
        Constraint::Min(1),
    ])
    .areas(inner);

    let snapshot = app.snapshot();

    let expression = Paragraph::new(Line::from(vec![
        Span::styled("Expression ", Style::default().fg(Color::DarkGray)),
        Span::styled(
            snapshot.expression.as_str(),
            Style::default().add_modifier(Modifier::BOLD),
        ),
    ]));
    frame.render_widget(expression, expression_area);

    let confidence = Gauge::default()
        .gauge_style(Style::default().fg(Color::Cyan))
        .ratio(f64::from(snapshot.confidence.clamp(0.0, 1.0)))
        .label(format!("{:.0}% conf", snapshot.confidence * 100.0));
    frame.render_widget(confidence, gauge_area);

    let voice = Paragraph::new(Line::from(vec![
        Span::styled("Vocal tone ", Style::default().fg(Color::DarkGray)),
        Span::styled(
            snapshot.voice.as_str(),
            Style::default().add_modifier(Modifier::BOLD),
        ),
    ]));
    frame.render_widget(voice, voice_area);

    let status_line = match app.sensor_status() {
        SensorStatus::Initializing => Line::from(Span::styled(
            "initializing…",
            Style::default().fg(Color::Yellow),
        )),
        SensorStatus::Active => Line::from(Span::styled(
            "sensors live",
            Style::default().fg(Color::Green),
        )),
        SensorStatus::Failed(reason) => Line::from(Span::styled(
            format!("sensing disabled: {reason}"),
            Style::default().fg(Color::Red),
        )),
    };
    frame.render_widget(
        Paragraph::new(status_line).wrap(Wrap { trim: true }),
        status_area,
    );
}

fn render_help(frame: &mut Frame, app: &App, area: Rect) {
    let mut lines = vec![
        Line::from(Span::styled(
            "enter  send message",
            Style::default().fg(Color::DarkGray),
        )),
        Line::from(Span::styled(
            "ctrl-d toggle dictation",
            Style::default().fg(Color::DarkGray),
        )),
        Line::from(Span::styled(
            "esc    quit",
            Style::default().fg(Color::DarkGray),
        )),
    ];

    if let Some(ref notice) = app.notice {
        lines.push(Line::from(""));
        lines.push(Line::from(Span::styled(
            notice.clone(),
            Style::default().fg(Color::Yellow),
        )));
    }

    let help = Paragraph::new(lines)
        .block(Block::default().borders(Borders::ALL))
        .wrap(Wrap { trim: true });
    frame.render_widget(help, area);
}

fn render_chat(frame: &mut Frame, app: &App, area: Rect) {
    let [transcript_area, input_area] =
        Layout::vertical([Constraint::Min(5), Constraint::Length(3)]).areas(area);

    render_transcript(frame, app, transcript_area);
    render_input(frame, app, input_area);
}

fn render_transcript(frame: &mut Frame, app: &App, area: Rect) {
    let block = Block::default().borders(Borders::ALL).title("Conversation");
    let inner = block.inner(area);

    let mut lines: Vec<Line> = Vec::new();
    for message in app.controller.transcript().messages() {
        let (who, style) = match message.role {
            Role::User => ("you", Style::default().fg(Color::Cyan)),
            Role::Assistant => ("empa", Style::default().fg(Color::Magenta)),
        };
        lines.push(Line::from(Span::styled(
            format!("{who} {}", message.timestamp.format("%H:%M")),
            style.add_modifier(Modifier::BOLD),
        )));
        for text_line in message.content.lines() {
            lines.push(Line::from(text_line.to_owned()));
        }
        lines.push(Line::from(""));
    }

    if app.controller.awaiting_reply() {
        let spinner = SPINNER_FRAMES[app.spinner_frame % SPINNER_FRAMES.len()];
        lines.push(Line::from(Span::styled(
            format!("empa is thinking {spinner}"),
            Style::default().fg(Color::DarkGray),
        )));
    }

    let scroll = scroll_offset(&lines, inner.width, inner.height);
    let transcript = Paragraph::new(lines)
        .block(block)
        .wrap(Wrap { trim: false })
        .scroll((scroll, 0));
    frame.render_widget(transcript, area);
}

fn render_input(frame: &mut Frame, app: &App, area: Rect) {
    let listening = app.dictation.is_active();
    let title = if listening { "Listening…" } else { "Message" };
    let border_style = if listening {
        Style::default().fg(Color::Red)
    } else {
        Style::default()
    };

    let input = Paragraph::new(app.input.as_str()).block(
        Block::default()
            .borders(Borders::ALL)
            .title(title)
            .border_style(border_style),
    );
    frame.render_widget(input, area);
}

/// Scroll so the newest lines stay visible, accounting for wrapping.
fn scroll_offset(lines: &[Line], width: u16, height: u16) -> u16 {
    if width == 0 || height == 0 {
        return 0;
    }
    let width = usize::from(width);
    let wrapped: usize = lines
        .iter()
        .map(|line| {
            let len = line.width();
            if len == 0 { 1 } else { len.div_ceil(width) }
        })
        .sum();
    u16::try_from(wrapped.saturating_sub(usize::from(height))).unwrap_or(u16::MAX)
}
