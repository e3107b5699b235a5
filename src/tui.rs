use std::collections::VecDeque;
use std::io;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use crossterm::ExecutableCommand;
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::terminal::{
    EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode,
};
use miette::IntoDiagnostic;
use ratatui::Terminal;
use ratatui::backend::CrosstermBackend;
use ratatui::layout::{Constraint, Direction, Layout};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Gauge, Paragraph, Wrap};

use crate::error::KiraError;
use crate::progress::{ProgressEvent, ProgressSink};

const EVENTS_MAX: usize = 8;
const SPINNER: &[&str] = &["|", "/", "-", "\\"];

#[derive(Debug)]
struct AppState {
    total: usize,
    completed: usize,
    succeeded: usize,
    failed: usize,
    crashed: usize,
    workers: usize,
    status: String,
    events: VecDeque<String>,
    started: Instant,
    finished: bool,
}

pub struct Tui {
    state: Arc<Mutex<AppState>>,
}

struct TuiProgress {
    state: Arc<Mutex<AppState>>,
}

impl ProgressSink for TuiProgress {
    fn event(&self, event: ProgressEvent) {
        let Ok(mut state) = self.state.lock() else {
            return;
        };
        match event {
            ProgressEvent::Started { total, workers } => {
                state.total = total;
                state.workers = workers;
                state.status = format!("requesting {total} batch(es)");
            }
            ProgressEvent::BatchFinished {
                operation_id,
                completed,
                total,
                success,
            } => {
                state.completed = completed;
                state.total = total;
                let line = match success {
                    Some(true) => {
                        state.succeeded += 1;
                        format!("op {operation_id}: fetched")
                    }
                    Some(false) => {
                        state.failed += 1;
                        format!("op {operation_id}: failed, see log")
                    }
                    None => {
                        state.crashed += 1;
                        format!("op {operation_id}: crashed, no output")
                    }
                };
                push_event(&mut state.events, line);
            }
            ProgressEvent::Message(message) => {
                state.status = message.clone();
                push_event(&mut state.events, message);
            }
            ProgressEvent::Finished => {
                state.finished = true;
                state.status = "done".to_string();
            }
        }
    }
}

impl Tui {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(AppState {
                total: 0,
                completed: 0,
                succeeded: 0,
                failed: 0,
                crashed: 0,
                workers: 0,
                status: "starting".to_string(),
                events: VecDeque::new(),
                started: Instant::now(),
                finished: false,
            })),
        }
    }

    /// Runs `f` on a worker thread while drawing its progress. `q`, `Esc`
    /// or Ctrl-C leave the screen and return `KiraError::Interrupted`.
    pub fn run<F, R>(&mut self, f: F) -> miette::Result<R>
    where
        F: FnOnce(&dyn ProgressSink) -> Result<R, KiraError> + Send + 'static,
        R: Send + 'static,
    {
        let mut stdout = io::stdout();
        enable_raw_mode().into_diagnostic()?;
        stdout.execute(EnterAlternateScreen).into_diagnostic()?;

        let backend = CrosstermBackend::new(stdout);
        let mut terminal = Terminal::new(backend).into_diagnostic()?;
        terminal.clear().into_diagnostic()?;

        let (tx, rx) = std::sync::mpsc::channel();
        let sink = TuiProgress {
            state: self.state.clone(),
        };
        let handle = thread::spawn(move || tx.send(f(&sink)));

        let mut tick = 0usize;
        loop {
            if let Ok(state) = self.state.lock() {
                terminal
                    .draw(|frame| draw_ui(frame, &state, tick))
                    .into_diagnostic()?;
            }

            if let Ok(result) = rx.try_recv() {
                leave_screen()?;
                handle.join().ok();
                return result.map_err(miette::Report::new);
            }

            if event::poll(Duration::from_millis(120)).into_diagnostic()? {
                if let Event::Key(key) = event::read().into_diagnostic()? {
                    if is_interrupt(key) {
                        break;
                    }
                }
            }

            tick = tick.wrapping_add(1);
        }

        leave_screen()?;
        Err(miette::Report::new(KiraError::Interrupted))
    }
}

impl Default for Tui {
    fn default() -> Self {
        Self::new()
    }
}

fn leave_screen() -> miette::Result<()> {
    disable_raw_mode().into_diagnostic()?;
    io::stdout()
        .execute(LeaveAlternateScreen)
        .into_diagnostic()?;
    Ok(())
}

fn is_interrupt(key: KeyEvent) -> bool {
    if key.kind != KeyEventKind::Press {
        return false;
    }
    match key.code {
        KeyCode::Char('q') | KeyCode::Esc => true,
        KeyCode::Char('c') => key.modifiers.contains(KeyModifiers::CONTROL),
        _ => false,
    }
}

fn draw_ui(frame: &mut ratatui::Frame, state: &AppState, tick: usize) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Length(3),
            Constraint::Length(4),
            Constraint::Min(4),
        ])
        .split(frame.area());

    frame.render_widget(draw_header(state, tick), chunks[0]);
    frame.render_widget(draw_gauge(state), chunks[1]);
    frame.render_widget(draw_counts(state), chunks[2]);
    frame.render_widget(draw_events(state), chunks[3]);
}

fn draw_header(state: &AppState, tick: usize) -> Paragraph<'static> {
    let spinner = if state.finished {
        "*"
    } else {
        SPINNER[tick % SPINNER.len()]
    };
    let elapsed = state.started.elapsed().as_secs();
    Paragraph::new(Line::from(vec![
        Span::styled(
            "KIRA-SEQFETCH ",
            Style::default()
                .fg(Color::Cyan)
                .add_modifier(Modifier::BOLD),
        ),
        Span::raw(format!("{spinner} {} ", state.status)),
        Span::styled(
            format!("[{:02}:{:02}]  q to quit", elapsed / 60, elapsed % 60),
            Style::default().fg(Color::Gray),
        ),
    ]))
    .block(Block::default().borders(Borders::ALL))
}

fn draw_gauge(state: &AppState) -> Gauge<'static> {
    Gauge::default()
        .block(Block::default().borders(Borders::ALL).title("Batches"))
        .gauge_style(Style::default().fg(Color::Green))
        .ratio(progress_ratio(state.completed, state.total))
        .label(format!("{}/{}", state.completed, state.total))
}

fn draw_counts(state: &AppState) -> Paragraph<'static> {
    Paragraph::new(vec![
        Line::from(vec![
            Span::styled("Fetched: ", Style::default().fg(Color::Gray)),
            Span::styled(state.succeeded.to_string(), Style::default().fg(Color::Green)),
            Span::styled("   Failed: ", Style::default().fg(Color::Gray)),
            Span::styled(state.failed.to_string(), Style::default().fg(Color::Yellow)),
            Span::styled("   Crashed: ", Style::default().fg(Color::Gray)),
            Span::styled(state.crashed.to_string(), Style::default().fg(Color::Red)),
        ]),
        Line::from(vec![
            Span::styled("Workers: ", Style::default().fg(Color::Gray)),
            Span::raw(state.workers.to_string()),
        ]),
    ])
    .block(Block::default().borders(Borders::LEFT | Borders::RIGHT))
}

fn draw_events(state: &AppState) -> Paragraph<'static> {
    let lines = state
        .events
        .iter()
        .rev()
        .map(|event| Line::from(format!("- {event}")))
        .collect::<Vec<_>>();
    Paragraph::new(lines)
        .block(Block::default().borders(Borders::ALL).title("Recent events"))
        .wrap(Wrap { trim: true })
}

fn progress_ratio(completed: usize, total: usize) -> f64 {
    if total == 0 {
        return 1.0;
    }
    (completed as f64 / total as f64).clamp(0.0, 1.0)
}

fn push_event(buffer: &mut VecDeque<String>, item: String) {
    buffer.push_back(item);
    while buffer.len() > EVENTS_MAX {
        buffer.pop_front();
    }
}
