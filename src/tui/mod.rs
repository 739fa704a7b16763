//! Ratatui-based diagnostic viewer.
//!
//! Shows one fit (scan points with error bars, fitted curve, edge and width)
//! and blocks until the user dismisses it.

use std::io;
use std::time::Duration;

use crossterm::{
    event::{self, Event, KeyCode, KeyEventKind},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Style},
    text::{Line, Span, Text},
    widgets::{Block, Borders, Clear, Paragraph},
    Terminal,
};

use crate::error::AppError;
use crate::plot::{DiagnosticPlot, DEFAULT_Y_BOUNDS};

mod plotters_chart;

use plotters_chart::MaskPlottersChart;

/// Show `plot` full screen until `q`, `Esc` or `Enter` is pressed.
pub fn show_diagnostic(plot: &DiagnosticPlot) -> Result<(), AppError> {
    let _guard = TerminalGuard::new()?;

    let backend = CrosstermBackend::new(io::stdout());
    let mut terminal = Terminal::new(backend)
        .map_err(|e| AppError::new(4, format!("Failed to initialize terminal: {e}")))?;

    let mut viewer = Viewer::new(plot);
    viewer.event_loop(&mut terminal)
}

/// Ensures the terminal is restored (raw mode, alternate screen) on exit.
struct TerminalGuard;

impl TerminalGuard {
    fn new() -> Result<Self, AppError> {
        enable_raw_mode().map_err(|e| AppError::new(4, format!("Failed to enable raw mode: {e}")))?;
        if let Err(e) = execute!(io::stdout(), EnterAlternateScreen) {
            let _ = disable_raw_mode();
            return Err(AppError::new(4, format!("Failed to enter alternate screen: {e}")));
        }
        Ok(Self)
    }
}

impl Drop for TerminalGuard {
    fn drop(&mut self) {
        let _ = disable_raw_mode();
        let _ = execute!(io::stdout(), LeaveAlternateScreen);
    }
}

struct Viewer<'a> {
    plot: &'a DiagnosticPlot,
    /// Apply the count clamp (`y` toggles).
    clamp: bool,
}

impl<'a> Viewer<'a> {
    fn new(plot: &'a DiagnosticPlot) -> Self {
        Self {
            plot,
            clamp: plot.y_bounds.is_some(),
        }
    }

    fn y_bounds(&self) -> [f64; 2] {
        if self.clamp {
            self.plot.y_bounds.unwrap_or(DEFAULT_Y_BOUNDS)
        } else {
            DiagnosticPlot {
                y_bounds: None,
                ..self.plot.clone()
            }
            .resolved_y_bounds()
        }
    }

    fn event_loop<B: ratatui::backend::Backend>(&mut self, terminal: &mut Terminal<B>) -> Result<(), AppError> {
        let mut needs_redraw = true;
        loop {
            if needs_redraw {
                terminal
                    .draw(|f| self.draw(f))
                    .map_err(|e| AppError::new(4, format!("Terminal draw error: {e}")))?;
                needs_redraw = false;
            }

            if !event::poll(Duration::from_millis(100))
                .map_err(|e| AppError::new(4, format!("Event poll error: {e}")))? {
                continue;
            }

            match event::read().map_err(|e| AppError::new(4, format!("Event read error: {e}")))? {
                Event::Key(key) => {
                    if key.kind != KeyEventKind::Press {
                        continue;
                    }
                    match key.code {
                        KeyCode::Char('q') | KeyCode::Esc | KeyCode::Enter => break,
                        KeyCode::Char('y') => {
                            self.clamp = !self.clamp;
                            needs_redraw = true;
                        }
                        _ => {}
                    }
                }
                Event::Resize(_, _) => {
                    needs_redraw = true;
                }
                _ => {}
            }
        }
        Ok(())
    }

    fn draw(&self, frame: &mut ratatui::Frame<'_>) {
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Length(4), Constraint::Min(0), Constraint::Length(3)])
            .split(frame.area());

        self.draw_header(frame, chunks[0]);
        self.draw_chart(frame, chunks[1]);
        self.draw_footer(frame, chunks[2]);
    }

    fn draw_header(&self, frame: &mut ratatui::Frame<'_>, area: Rect) {
        let [y0, y1] = self.y_bounds();
        let lines = vec![
            Line::from(vec![
                Span::styled("maskfit", Style::default().fg(Color::Cyan)),
                Span::raw(format!(" {}", self.plot.title)),
            ]),
            Line::from(Span::styled(
                format!(
                    "edge={:.1} px | width={:.1} px | n={} | counts=[{y0:.0}, {y1:.0}]",
                    self.plot.edge,
                    self.plot.width,
                    self.plot.points.len()
                ),
                Style::default().fg(Color::Gray),
            )),
        ];
        let p = Paragraph::new(Text::from(lines)).block(Block::default().borders(Borders::ALL));
        frame.render_widget(p, area);
    }

    fn draw_chart(&self, frame: &mut ratatui::Frame<'_>, area: Rect) {
        let block = Block::default().title("Mask scan").borders(Borders::ALL);
        let inner = block.inner(area);
        frame.render_widget(block, area);
        frame.render_widget(Clear, inner);

        if self.plot.points.is_empty() {
            let msg = Paragraph::new("No points in fit window.").style(Style::default().fg(Color::Yellow));
            frame.render_widget(msg, inner);
            return;
        }

        let widget = MaskPlottersChart {
            curve: &self.plot.curve,
            points: &self.plot.points,
            x_bounds: self.plot.x_bounds,
            y_bounds: self.y_bounds(),
            x_label: "pixel",
            y_label: "counts",
        };
        frame.render_widget(widget, inner);
    }

    fn draw_footer(&self, frame: &mut ratatui::Frame<'_>, area: Rect) {
        let clamp = if self.clamp { "on" } else { "off" };
        let line = Line::from(vec![
            Span::styled("q/Esc/Enter continue  y toggle clamp", Style::default().fg(Color::Gray)),
            Span::raw(" | "),
            Span::styled(format!("clamp: {clamp}"), Style::default().fg(Color::Yellow)),
        ]);
        let p = Paragraph::new(line).block(Block::default().borders(Borders::ALL));
        frame.render_widget(p, area);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plot() -> DiagnosticPlot {
        DiagnosticPlot {
            title: "tube 10 | mask 700 | run 70454".to_string(),
            points: vec![(150.0, 2000.0, 40.0), (170.0, 20.0, 4.0)],
            curve: vec![(143.0, 816.0), (199.0, 816.0)],
            x_bounds: [143.0, 200.0],
            y_bounds: None,
            edge: 161.0,
            width: 21.0,
        }
    }

    #[test]
    fn toggled_clamp_uses_scan_count_range() {
        let p = plot();
        let mut viewer = Viewer::new(&p);
        viewer.clamp = true;
        assert_eq!(viewer.y_bounds(), DEFAULT_Y_BOUNDS);
    }

    #[test]
    fn unclamped_bounds_cover_the_data() {
        let p = plot();
        let viewer = Viewer::new(&p);
        assert!(!viewer.clamp);
        let [lo, hi] = viewer.y_bounds();
        assert!(lo < 16.0);
        assert!(hi > 2040.0);
    }
}
