use std::io::{self, IsTerminal, Write};

use anyhow::anyhow;
use chrono::NaiveDate;
use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

use crate::config::Config;
use crate::countdown::Countdown;
use crate::datetime::format_project_datetime;
use crate::grid::{CalendarDay, MonthAnchor};
use crate::release::{HypeLevel, Release};

const CELL_WIDTH: usize = 16;

#[derive(Debug, Clone)]
pub struct Renderer {
    color: bool,
}

impl Renderer {
    pub fn new(cfg: &Config) -> anyhow::Result<Self> {
        let color_cfg = cfg.get("color").unwrap_or_else(|| "on".to_string());
        let color = match color_cfg.to_ascii_lowercase().as_str() {
            "on" | "yes" | "true" | "1" => true,
            "off" | "no" | "false" | "0" => false,
            other => return Err(anyhow!("invalid color setting: {other}")),
        };

        Ok(Self { color })
    }

    pub fn plain() -> Self {
        Self { color: false }
    }

    #[tracing::instrument(skip(self, out, days))]
    pub fn write_calendar<W: Write>(
        &self,
        mut out: W,
        anchor: MonthAnchor,
        days: &[CalendarDay],
        columns: usize,
    ) -> anyhow::Result<()> {
        writeln!(out, "{}", anchor.first_day().format("%B %Y"))?;
        if days.is_empty() || columns == 0 {
            return Ok(());
        }

        for day in days.iter().take(columns) {
            let label = day.date.format("%a").to_string();
            write!(out, "{} ", pad(&label, CELL_WIDTH))?;
        }
        writeln!(out)?;
        writeln!(out, "{}", "-".repeat((CELL_WIDTH + 1) * columns))?;

        for week in days.chunks(columns) {
            let cells: Vec<Vec<String>> = week.iter().map(|day| self.day_cell(day)).collect();
            let height = cells.iter().map(Vec::len).max().unwrap_or(1);
            for line in 0..height {
                for cell in &cells {
                    let text = cell.get(line).map(String::as_str).unwrap_or("");
                    let visible = UnicodeWidthStr::width(strip_ansi(text).as_str());
                    let padding = CELL_WIDTH.saturating_sub(visible);
                    write!(out, "{}{} ", text, " ".repeat(padding))?;
                }
                writeln!(out)?;
            }
            writeln!(out)?;
        }

        Ok(())
    }

    fn day_cell(&self, day: &CalendarDay) -> Vec<String> {
        let mut lines = Vec::with_capacity(day.primary().len() + 2);

        let number = if day.is_today {
            format!("[{}]", day.date.format("%-d"))
        } else {
            day.date.format("%-d").to_string()
        };
        let number = if day.is_today {
            self.paint(&number, "1;36")
        } else if !day.in_anchor_month {
            self.paint(&number, "2")
        } else {
            number
        };
        lines.push(number);

        for release in day.primary() {
            let title = truncate(&release.title, CELL_WIDTH);
            lines.push(self.paint_hype(&title, &release.hype));
        }
        if day.overflow() > 0 {
            lines.push(format!("+{} more", day.overflow()));
        }
        lines
    }

    #[tracing::instrument(skip(self, out, releases))]
    pub fn write_feed<W: Write>(&self, mut out: W, title: &str, releases: &[Release]) -> anyhow::Result<()> {
        writeln!(out, "{title}")?;
        if releases.is_empty() {
            writeln!(out, "(none)")?;
            return Ok(());
        }

        let headers = vec![
            "ID".to_string(),
            "Date".to_string(),
            "Title".to_string(),
            "Hype".to_string(),
            "Kind".to_string(),
            "Platforms".to_string(),
        ];

        let rows = releases
            .iter()
            .map(|release| {
                vec![
                    release.id.clone(),
                    release
                        .instant()
                        .map(format_project_datetime)
                        .unwrap_or_else(|| "TBA".to_string()),
                    self.paint_hype(&release.title, &release.hype),
                    release.hype.to_string(),
                    release.kind.clone(),
                    release.platforms.join(", "),
                ]
            })
            .collect();

        write_table(&mut out, headers, rows)
    }

    #[tracing::instrument(skip(self, out, release, countdown))]
    pub fn write_release_detail<W: Write>(
        &self,
        mut out: W,
        release: &Release,
        countdown: Option<Countdown>,
    ) -> anyhow::Result<()> {
        writeln!(out, "id         {}", release.id)?;
        writeln!(out, "title      {}", self.paint_hype(&release.title, &release.hype))?;
        writeln!(out, "hype       {}", release.hype)?;
        writeln!(
            out,
            "release    {}",
            release
                .instant()
                .map(format_project_datetime)
                .unwrap_or_else(|| "TBA".to_string())
        )?;
        if !release.kind.is_empty() {
            writeln!(out, "kind       {}", release.kind)?;
        }
        if !release.platforms.is_empty() {
            writeln!(out, "platforms  {}", release.platforms.join(", "))?;
        }
        writeln!(out, "countdown  {}", countdown_text(release, countdown))?;
        Ok(())
    }

    #[tracing::instrument(skip(self, out, releases))]
    pub fn write_day_detail<W: Write>(&self, out: W, day: NaiveDate, releases: &[Release]) -> anyhow::Result<()> {
        let title = format!("Releases on {}", day.format("%Y-%m-%d"));
        self.write_feed(out, &title, releases)
    }

    pub fn write_countdown_line<W: Write>(
        &self,
        mut out: W,
        release: &Release,
        countdown: Option<Countdown>,
    ) -> anyhow::Result<()> {
        writeln!(out, "{}  {}", countdown_text(release, countdown), release.title)?;
        out.flush()?;
        Ok(())
    }

    pub fn stdout(&self) -> io::StdoutLock<'static> {
        io::stdout().lock()
    }

    fn paint_hype(&self, text: &str, hype: &HypeLevel) -> String {
        match hype {
            HypeLevel::VeryHigh => self.paint(text, "1;33"),
            HypeLevel::High => self.paint(text, "33"),
            _ => text.to_string(),
        }
    }

    fn paint(&self, text: &str, code: &str) -> String {
        if !self.color || !io::stdout().is_terminal() {
            return text.to_string();
        }
        format!("\x1b[{code}m{text}\x1b[0m")
    }
}

fn countdown_text(release: &Release, countdown: Option<Countdown>) -> String {
    match (countdown, release.is_tba()) {
        (Some(left), _) => left.to_string(),
        (None, true) => format!("{} (TBA)", Countdown::placeholder()),
        (None, false) => format!("{} (released)", Countdown::placeholder()),
    }
}

fn pad(text: &str, width: usize) -> String {
    let visible = UnicodeWidthStr::width(text);
    format!("{}{}", text, " ".repeat(width.saturating_sub(visible)))
}

fn truncate(text: &str, width: usize) -> String {
    if UnicodeWidthStr::width(text) <= width {
        return text.to_string();
    }

    let mut out = String::new();
    let mut used = 0;
    for ch in text.chars() {
        let w = UnicodeWidthChar::width(ch).unwrap_or(0);
        if used + w + 1 > width {
            break;
        }
        out.push(ch);
        used += w;
    }
    out.push('…');
    out
}

fn write_table<W: Write>(
    mut writer: W,
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
) -> anyhow::Result<()> {
    let column_count = headers.len();
    let mut widths = vec![0usize; column_count];

    for (idx, header) in headers.iter().enumerate() {
        widths[idx] = widths[idx].max(UnicodeWidthStr::width(header.as_str()));
    }

    for row in &rows {
        for (idx, cell) in row.iter().enumerate() {
            widths[idx] = widths[idx].max(UnicodeWidthStr::width(strip_ansi(cell).as_str()));
        }
    }

    for idx in 0..column_count {
        write!(writer, "{:width$} ", headers[idx], width = widths[idx])?;
    }
    writeln!(writer)?;

    for idx in 0..column_count {
        write!(writer, "{:-<width$} ", "", width = widths[idx])?;
    }
    writeln!(writer)?;

    for row in rows {
        for idx in 0..column_count {
            let cell = &row[idx];
            let visible_width = UnicodeWidthStr::width(strip_ansi(cell).as_str());
            let padding = widths[idx].saturating_sub(visible_width);
            write!(writer, "{}{} ", cell, " ".repeat(padding))?;
        }
        writeln!(writer)?;
    }

    Ok(())
}

fn strip_ansi(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut escaped = false;

    for ch in s.chars() {
        if escaped {
            if ch == 'm' {
                escaped = false;
            }
            continue;
        }

        if ch == '\x1b' {
            escaped = true;
            continue;
        }

        out.push(ch);
    }

    out
}
