//! Full-screen diagnostic plot of the signals behind a tempo estimate

use std::io::{self, stdout};
use std::time::Duration;

use crossterm::{
    cursor,
    event::{self, Event, KeyCode, KeyEventKind},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::CrosstermBackend,
    buffer::Buffer,
    layout::{Constraint, Layout, Rect},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph, Widget},
    Terminal,
};
use tempo_analysis::{DetectorConfig, TempoDiagnostics};

use crate::theme::Theme;

/// Characters for vertical bar rendering (8 levels)
const BAR_CHARS: [char; 9] = [' ', '▁', '▂', '▃', '▄', '▅', '▆', '▇', '█'];

/// One plotted signal
pub struct Series<'a> {
    pub title: String,
    pub values: &'a [f32],
    /// Whether each value belongs to the searched tempo band
    pub in_band: Vec<bool>,
    /// Strongest in-band value, first on ties
    pub peak: Option<usize>,
}

impl<'a> Series<'a> {
    fn new(title: String, values: &'a [f32], in_band: Vec<bool>) -> Self {
        let mut peak: Option<usize> = None;
        for (i, &value) in values.iter().enumerate() {
            if in_band[i] && peak.map_or(true, |p| value > values[p]) {
                peak = Some(i);
            }
        }
        Self {
            title,
            values,
            in_band,
            peak,
        }
    }

    /// Onset strength over time; every frame is shown as in band
    pub fn envelope(diagnostics: &'a TempoDiagnostics) -> Self {
        let secs = diagnostics.envelope.len() as f32 / diagnostics.frame_rate;
        let mut series = Self::new(
            format!(" ONSET STRENGTH  0-{:.1}s ", secs),
            &diagnostics.envelope,
            vec![true; diagnostics.envelope.len()],
        );
        series.peak = None;
        series
    }

    /// Envelope magnitude spectrum, in-band bins highlighted
    pub fn spectrum(diagnostics: &'a TempoDiagnostics, config: &DetectorConfig) -> Self {
        let in_band = diagnostics
            .frequencies
            .iter()
            .map(|&hz| config.band.contains_hz(hz))
            .collect();
        let mut series = Self::new(String::new(), &diagnostics.magnitudes, in_band);
        series.title = match series.peak {
            Some(bin) => format!(
                " SPECTRUM  peak {:.2} Hz = {:.1} BPM ",
                diagnostics.frequencies[bin],
                config.hz_to_bpm(diagnostics.frequencies[bin])
            ),
            None => " SPECTRUM ".to_string(),
        };
        series
    }

    /// Autocorrelation by lag, in-band lags highlighted
    pub fn autocorrelation(diagnostics: &'a TempoDiagnostics, config: &DetectorConfig) -> Self {
        let in_band = (0..diagnostics.autocorrelation.len())
            .map(|lag| lag > 0 && config.band.contains(config.lag_to_bpm(lag)))
            .collect();
        let mut series = Self::new(String::new(), &diagnostics.autocorrelation, in_band);
        series.title = match series.peak {
            Some(lag) => format!(
                " AUTOCORRELATION  peak lag {} = {:.1} BPM ",
                lag,
                config.lag_to_bpm(lag)
            ),
            None => " AUTOCORRELATION ".to_string(),
        };
        series
    }

    /// Scale that maps the largest in-band value to full height
    fn scale(&self) -> f32 {
        let in_band_max = self
            .values
            .iter()
            .zip(&self.in_band)
            .filter(|(_, in_band)| **in_band)
            .map(|(&v, _)| v)
            .fold(0.0f32, f32::max);
        let max = if in_band_max > 0.0 {
            in_band_max
        } else {
            self.values.iter().copied().fold(0.0f32, f32::max)
        };
        if max > 0.0 {
            1.0 / max
        } else {
            0.0
        }
    }
}

/// Bar chart of one [`Series`], one column per group of values
pub struct SignalWidget<'a> {
    series: &'a Series<'a>,
    theme: &'a Theme,
}

impl<'a> SignalWidget<'a> {
    pub fn new(series: &'a Series<'a>, theme: &'a Theme) -> Self {
        Self { series, theme }
    }

    /// Full height bar, bottom row first
    fn render_bar(magnitude: f32, height: u16) -> Vec<char> {
        let total_levels = (magnitude.clamp(0.0, 1.0) * 8.0 * height as f32) as usize;
        let full_blocks = total_levels / 8;
        let partial = total_levels % 8;

        (0..height as usize)
            .map(|row| {
                if row < full_blocks {
                    '█'
                } else if row == full_blocks && partial > 0 {
                    BAR_CHARS[partial]
                } else {
                    ' '
                }
            })
            .collect()
    }
}

impl Widget for SignalWidget<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let block = Block::default()
            .borders(Borders::ALL)
            .border_style(self.theme.border())
            .title(Span::styled(self.series.title.as_str(), self.theme.title()));

        let inner = block.inner(area);
        block.render(area, buf);

        let n = self.series.values.len();
        if inner.height < 1 || inner.width < 1 || n == 0 {
            return;
        }

        let width = inner.width as usize;
        let columns = width.min(n);
        let scale = self.series.scale();

        for column in 0..columns {
            // Each column shows the largest value of its group
            let start = column * n / columns;
            let end = ((column + 1) * n / columns).max(start + 1).min(n);
            let group = start..end;

            let magnitude = self.series.values[group.clone()]
                .iter()
                .copied()
                .fold(0.0f32, f32::max)
                * scale;
            let in_band = self.series.in_band[group.clone()].iter().any(|&b| b);
            let is_peak = self.series.peak.is_some_and(|p| group.contains(&p));
            let style = self.theme.bar_style(in_band, is_peak);

            let x = inner.x + column as u16;
            let bar = Self::render_bar(magnitude, inner.height);
            for (row, &ch) in bar.iter().enumerate() {
                if ch == ' ' {
                    continue;
                }
                let y = inner.y + inner.height - 1 - row as u16;
                buf[(x, y)].set_char(ch).set_style(style);
            }
        }
    }
}

/// Runs the wrapped closure when dropped
struct RestoreOnDrop<F: FnMut()>(F);

impl<F: FnMut()> Drop for RestoreOnDrop<F> {
    fn drop(&mut self) {
        (self.0)()
    }
}

fn restore_terminal() {
    let restored = disable_raw_mode()
        .and_then(|_| execute!(stdout(), LeaveAlternateScreen, cursor::Show));
    if let Err(e) = restored {
        tracing::warn!("Failed to restore terminal: {}", e);
    }
}

/// Show the plot until `q` or `Esc` is pressed
pub fn show(diagnostics: &TempoDiagnostics, bpm: f32, config: &DetectorConfig) -> anyhow::Result<()> {
    enable_raw_mode()?;
    // Leaves raw mode on every exit path from here on, setup failures included
    let _restore = RestoreOnDrop(restore_terminal);

    let mut stdout = stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;
    terminal.clear()?;

    run(&mut terminal, diagnostics, bpm, config)
}

fn run(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    diagnostics: &TempoDiagnostics,
    bpm: f32,
    config: &DetectorConfig,
) -> anyhow::Result<()> {
    let theme = Theme::default();
    let band = config.band;
    let envelope = Series::envelope(diagnostics);
    let spectrum = Series::spectrum(diagnostics, config);
    let autocorrelation = Series::autocorrelation(diagnostics, config);

    loop {
        terminal.draw(|frame| {
            let [header, top, middle, bottom] = Layout::vertical([
                Constraint::Length(1),
                Constraint::Ratio(1, 3),
                Constraint::Ratio(1, 3),
                Constraint::Ratio(1, 3),
            ])
            .areas(frame.area());

            let title = Line::from(vec![
                Span::styled(format!(" {:.2} BPM ", bpm), theme.title()),
                Span::styled(
                    format!(
                        " band {:.0}-{:.0} BPM | {:.2} frames/s | q to quit",
                        band.min_bpm, band.max_bpm, diagnostics.frame_rate
                    ),
                    theme.normal(),
                ),
            ]);
            frame.render_widget(Paragraph::new(title), header);
            frame.render_widget(SignalWidget::new(&envelope, &theme), top);
            frame.render_widget(SignalWidget::new(&spectrum, &theme), middle);
            frame.render_widget(SignalWidget::new(&autocorrelation, &theme), bottom);
        })?;

        if event::poll(Duration::from_millis(250))? {
            if let Event::Key(key) = event::read()? {
                if key.kind == KeyEventKind::Press
                    && matches!(key.code, KeyCode::Char('q') | KeyCode::Esc)
                {
                    return Ok(());
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    fn diagnostics() -> TempoDiagnostics {
        // 10 s of envelope at ~43 frames/s; a 2 Hz spectral peak and a lag 21 ACF peak
        let frame_rate = 22050.0 / 512.0;
        let len = 430;
        let frequencies: Vec<f32> = (0..len / 2)
            .map(|i| i as f32 * frame_rate / len as f32)
            .collect();
        let mut magnitudes = vec![1.0; len / 2];
        magnitudes[0] = 100.0;
        magnitudes[20] = 10.0;
        let mut autocorrelation = vec![1.0; 43];
        autocorrelation[0] = 50.0;
        autocorrelation[21] = 8.0;

        TempoDiagnostics {
            frame_rate,
            envelope: vec![0.5; len],
            frequencies,
            magnitudes,
            autocorrelation,
        }
    }

    #[test]
    fn test_spectrum_peak_ignores_out_of_band_bins() {
        let diagnostics = diagnostics();
        let series = Series::spectrum(&diagnostics, &DetectorConfig::default());
        assert_eq!(series.peak, Some(20));
        assert!(!series.in_band[0]);
        assert!(series.title.contains("BPM"));
    }

    #[test]
    fn test_autocorrelation_peak_skips_lag_zero() {
        let diagnostics = diagnostics();
        let series = Series::autocorrelation(&diagnostics, &DetectorConfig::default());
        assert_eq!(series.peak, Some(21));
        assert!(!series.in_band[0]);
        // Lags below 9 are faster than 300 BPM
        assert!(!series.in_band[8]);
        assert!(series.in_band[9]);
    }

    #[test]
    fn test_autocorrelation_title_matches_lag_tempo() {
        let diagnostics = diagnostics();
        let config = DetectorConfig::default();
        let series = Series::autocorrelation(&diagnostics, &config);
        let expected = format!("{:.1} BPM", config.lag_to_bpm(21));
        assert!(series.title.contains(&expected), "{}", series.title);
    }

    #[test]
    fn test_restore_runs_when_setup_fails() {
        let restored = Cell::new(0);
        let enter_screen = || -> io::Result<()> { Err(io::Error::other("no terminal")) };
        let setup = || -> io::Result<()> {
            let _restore = RestoreOnDrop(|| restored.set(restored.get() + 1));
            enter_screen()?;
            Ok(())
        };

        assert!(setup().is_err());
        assert_eq!(restored.get(), 1);
    }

    #[test]
    fn test_render_bar_levels() {
        assert_eq!(SignalWidget::render_bar(0.0, 3), vec![' ', ' ', ' ']);
        assert_eq!(SignalWidget::render_bar(1.0, 2), vec!['█', '█']);
        assert_eq!(SignalWidget::render_bar(0.5, 2), vec!['█', ' ']);
    }

    #[test]
    fn test_peak_column_reaches_top() {
        let diagnostics = diagnostics();
        let series = Series::autocorrelation(&diagnostics, &DetectorConfig::default());
        let theme = Theme::default();
        let area = Rect::new(0, 0, 45, 6);
        let mut buf = Buffer::empty(area);
        SignalWidget::new(&series, &theme).render(area, &mut buf);

        // 43 lags fit one per column inside the border
        let top = 1;
        assert_eq!(buf[(1 + 21, top)].symbol(), "█");
        assert_eq!(buf[(1 + 21, top)].fg, theme.highlight);
        assert_eq!(buf[(1 + 30, top)].symbol(), " ");
    }
}
