use std::io::Write;
use std::thread;

use anyhow::{Context, anyhow};
use chrono::{DateTime, NaiveDate, Utc};
use tracing::{debug, info, instrument};

use crate::cli::Invocation;
use crate::config::Config;
use crate::countdown::{CountdownTicker, SystemClock, TICK_PERIOD};
use crate::datetime::{MonthExpr, parse_month_expr, project_timezone};
use crate::grid::{GridOptions, MonthAnchor};
use crate::index::ReleaseIndex;
use crate::render::Renderer;
use crate::view::{QueryParamSelection, ViewStateController};

type View = ViewStateController<QueryParamSelection>;

pub fn known_command_names() -> Vec<&'static str> {
    vec![
        "dashboard",
        "calendar",
        "upcoming",
        "hype",
        "undated",
        "search",
        "info",
        "day",
        "countdown",
        "_commands",
        "_show",
        "help",
        "version",
    ]
}

pub fn expand_command_abbrev<'a>(token: &'a str, known: &[&'a str]) -> Option<&'a str> {
    if known.contains(&token) {
        return Some(token);
    }

    let mut matches = known.iter().copied().filter(|name| name.starts_with(token));
    let first = matches.next()?;
    if matches.next().is_some() {
        None
    } else {
        Some(first)
    }
}

#[instrument(skip(cfg, renderer, index, inv))]
pub fn dispatch(
    cfg: &Config,
    renderer: &Renderer,
    index: ReleaseIndex,
    inv: Invocation,
) -> anyhow::Result<()> {
    let now = Utc::now();
    let command = inv.command.as_str();

    debug!(command, args = ?inv.command_args, "dispatching command");

    match command {
        "_commands" => return cmd_commands(),
        "_show" => return cmd_show(cfg),
        "help" => return cmd_help(),
        "version" => {
            println!("{}", env!("CARGO_PKG_VERSION"));
            return Ok(());
        }
        _ => {}
    }

    let columns = terminal_columns();
    let options = cfg
        .view_options(*project_timezone(), columns)
        .context("invalid view configuration")?;
    let mut view = ViewStateController::new(index, QueryParamSelection::default(), options, now);

    match command {
        "dashboard" => cmd_dashboard(&mut view, renderer, now),
        "calendar" => cmd_calendar(&mut view, renderer, &inv.command_args, now),
        "upcoming" => {
            let feed = view.upcoming(now);
            renderer.write_feed(renderer.stdout(), "Upcoming", &feed)
        }
        "hype" => {
            let feed = view.hype_future(now);
            renderer.write_feed(renderer.stdout(), "Hype radar", &feed)
        }
        "undated" => renderer.write_feed(renderer.stdout(), "Undated", &view.undated()),
        "search" => cmd_search(&mut view, renderer, &inv.command_args, now),
        "info" => cmd_info(&mut view, renderer, &inv.command_args, now),
        "day" => cmd_day(&mut view, renderer, &inv.command_args),
        "countdown" => cmd_countdown(&mut view, renderer, &inv.command_args),
        other => Err(anyhow!("unknown command: {other}")),
    }
}

#[instrument(skip(view, renderer, now))]
fn cmd_dashboard(view: &mut View, renderer: &Renderer, now: DateTime<Utc>) -> anyhow::Result<()> {
    info!("command dashboard");

    write_calendar(view, renderer, now)?;
    let mut out = renderer.stdout();
    renderer.write_feed(&mut out, "Upcoming", &view.upcoming(now))?;
    writeln!(out)?;
    renderer.write_feed(&mut out, "Hype radar", &view.hype_future(now))?;
    writeln!(out)?;
    renderer.write_feed(&mut out, "Undated", &view.undated())?;
    Ok(())
}

#[instrument(skip(view, renderer, args, now))]
fn cmd_calendar(view: &mut View, renderer: &Renderer, args: &[String], now: DateTime<Utc>) -> anyhow::Result<()> {
    info!("command calendar");

    match args {
        [] => {}
        [month] => {
            let expr = parse_month_expr(month, view.today(now))?;
            apply_month_expr(view, expr, now)?;
        }
        _ => return Err(anyhow!("calendar takes at most one month argument")),
    }

    write_calendar(view, renderer, now)
}

fn apply_month_expr(view: &mut View, expr: MonthExpr, now: DateTime<Utc>) -> anyhow::Result<()> {
    match expr {
        MonthExpr::Today => view.jump_to_today(now),
        MonthExpr::Offset(1) => view.next_month(),
        MonthExpr::Offset(-1) => view.prev_month(),
        MonthExpr::Offset(n) => {
            let target = view.state().anchor_month.shift(n);
            view.show_month(target);
        }
        MonthExpr::Absolute { year, month } => {
            let target =
                MonthAnchor::new(year, month).ok_or_else(|| anyhow!("invalid month: {year}-{month}"))?;
            view.show_month(target);
        }
    }
    Ok(())
}

#[instrument(skip(view, renderer, args, now))]
fn cmd_search(view: &mut View, renderer: &Renderer, args: &[String], now: DateTime<Utc>) -> anyhow::Result<()> {
    info!("command search");

    let query = args.join(" ");
    view.set_search_query(&query);
    let title = format!("Search: {}", query.trim());
    let hits = view.search_results(now);
    renderer.write_feed(renderer.stdout(), &title, hits)
}

#[instrument(skip(view, renderer, args, now))]
fn cmd_info(view: &mut View, renderer: &Renderer, args: &[String], now: DateTime<Utc>) -> anyhow::Result<()> {
    info!("command info");

    let id = single_arg(args, "info requires a release id")?;
    if !view.select_release(id) {
        return Err(anyhow!("no release with id {id}"));
    }
    let release = view
        .selected_release()
        .cloned()
        .ok_or_else(|| anyhow!("no release with id {id}"))?;

    let mut out = renderer.stdout();
    renderer.write_release_detail(&mut out, &release, view.active_countdown(now))?;
    writeln!(out)?;
    drop(out);

    if !release.is_tba() {
        write_calendar(view, renderer, now)?;
    }
    debug!(selection = %view.selection().to_query(), "release detail shown");
    Ok(())
}

#[instrument(skip(view, renderer, args))]
fn cmd_day(view: &mut View, renderer: &Renderer, args: &[String]) -> anyhow::Result<()> {
    info!("command day");

    let raw = single_arg(args, "day requires a date (YYYY-MM-DD)")?;
    let day = NaiveDate::parse_from_str(raw, "%Y-%m-%d").with_context(|| format!("invalid date: {raw}"))?;

    if !view.select_day(day) {
        println!("No releases on {}.", day.format("%Y-%m-%d"));
        return Ok(());
    }
    renderer.write_day_detail(renderer.stdout(), day, &view.day_detail())
}

#[instrument(skip(view, renderer, args))]
fn cmd_countdown(view: &mut View, renderer: &Renderer, args: &[String]) -> anyhow::Result<()> {
    info!("command countdown");

    let (id, max_ticks) = countdown_args(args)?;

    if !view.select_release(id) {
        return Err(anyhow!("no release with id {id}"));
    }
    let release = view
        .selected_release()
        .cloned()
        .ok_or_else(|| anyhow!("no release with id {id}"))?;

    let mut ticker = CountdownTicker::new(SystemClock, release.instant());
    loop {
        let left = ticker.tick();
        renderer.write_countdown_line(renderer.stdout(), &release, left)?;
        if left.is_none() {
            break;
        }
        if let Some(max) = max_ticks
            && ticker.ticks() >= max
        {
            break;
        }
        thread::sleep(TICK_PERIOD);
    }

    view.deselect();
    Ok(())
}

fn countdown_args(args: &[String]) -> anyhow::Result<(&str, Option<u64>)> {
    match args {
        [id] => Ok((id.as_str(), None)),
        [id, ticks] => {
            let ticks: u64 = ticks
                .parse()
                .with_context(|| format!("countdown ticks must be a number, got {ticks}"))?;
            if ticks == 0 {
                return Err(anyhow!("countdown ticks must be at least 1"));
            }
            Ok((id.as_str(), Some(ticks)))
        }
        _ => Err(anyhow!("countdown requires a release id and optional tick count")),
    }
}

fn cmd_commands() -> anyhow::Result<()> {
    for command in known_command_names() {
        println!("{command}");
    }
    Ok(())
}

fn cmd_show(cfg: &Config) -> anyhow::Result<()> {
    let mut entries: Vec<_> = cfg.iter().collect();
    entries.sort();
    for (k, v) in entries {
        println!("{k}={v}");
    }
    Ok(())
}

fn cmd_help() -> anyhow::Result<()> {
    println!(
        "Commands: dashboard, calendar [MONTH], upcoming, hype, undated, search TEXT, info ID, day YYYY-MM-DD, countdown ID [TICKS]"
    );
    Ok(())
}

fn write_calendar(view: &mut View, renderer: &Renderer, now: DateTime<Utc>) -> anyhow::Result<()> {
    let anchor = view.state().anchor_month;
    let columns = GridOptions {
        compact: view.state().is_compact_layout,
        ..view.options().grid
    }
    .columns();
    let days = view.grid(now);
    renderer.write_calendar(renderer.stdout(), anchor, days, columns)
}

fn single_arg<'a>(args: &'a [String], usage: &str) -> anyhow::Result<&'a str> {
    match args {
        [one] => Ok(one.as_str()),
        _ => Err(anyhow!("{usage}")),
    }
}

fn terminal_columns() -> Option<usize> {
    std::env::var("COLUMNS").ok().and_then(|raw| raw.trim().parse().ok())
}
