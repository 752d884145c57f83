mod app;

use std::io;
use std::time::Duration;

use app::{
    format_amount, format_completion, format_orders, format_time_ns, truncate, AdResponse,
    AppState, ConnectionStatus,
};
use crossterm::{
    event::{self, Event, KeyCode, KeyEventKind},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Cell, Paragraph, Row, Table, TableState},
    Frame, Terminal,
};

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> io::Result<()> {
    let base_url = std::env::var("API_URL").unwrap_or_else(|_| "http://localhost:3000".to_string());

    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(5))
        .build()
        .map_err(io::Error::other)?;

    let mut app = AppState::new(base_url);

    app.load_catalog(&client).await;
    app.refresh(&client).await;

    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let mut table_state = TableState::default();

    let result = run_loop(&mut terminal, &mut app, &client, &mut table_state).await;

    // Restore terminal regardless of result
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    result
}

// ---------------------------------------------------------------------------
// Main event loop
// ---------------------------------------------------------------------------

async fn run_loop(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    app: &mut AppState,
    client: &reqwest::Client,
    table_state: &mut TableState,
) -> io::Result<()> {
    // The countdown is owned by the service; one poll per second keeps it live.
    let poll_interval = Duration::from_secs(1);
    let mut last_tick = std::time::Instant::now();

    loop {
        terminal.draw(|f| render(f, app, table_state))?;

        let timeout = poll_interval
            .checked_sub(last_tick.elapsed())
            .unwrap_or(Duration::ZERO);

        if event::poll(timeout)? {
            if let Event::Key(key) = event::read()? {
                if key.kind == KeyEventKind::Press {
                    let mut acted = true;
                    match key.code {
                        KeyCode::Char('q' | 'Q') | KeyCode::Esc => return Ok(()),
                        KeyCode::Char('r') => app.search(client).await,
                        KeyCode::Char('b') => app.select_trade_type(client, "BUY").await,
                        KeyCode::Char('s') => app.select_trade_type(client, "SELL").await,
                        KeyCode::Char('a') => app.cycle_asset(client).await,
                        KeyCode::Char('x') => app.cycle_fiat(client).await,
                        KeyCode::Char('t') => app.cycle_pay_type(client).await,
                        KeyCode::Char('f') => app.toggle_merchant_only(client).await,
                        KeyCode::Char('p') => app.sort_by(client, "price").await,
                        KeyCode::Char('m') => app.sort_by(client, "amount").await,
                        KeyCode::Char('n') => app.sort_by(client, "merchant").await,
                        KeyCode::Char('c') => app.sort_by(client, "completion").await,
                        KeyCode::Char('o') => app.sort_by(client, "orders").await,
                        KeyCode::Char(' ') => app.toggle_auto_refresh(client).await,
                        KeyCode::Char('+' | '=') => app.bump_interval(client, 5).await,
                        KeyCode::Char('-') => app.bump_interval(client, -5).await,
                        KeyCode::Down | KeyCode::Char('j') => {
                            acted = false;
                            let max = app.book.snapshot.records.len().saturating_sub(1);
                            let next = table_state.selected().map_or(0, |i| (i + 1).min(max));
                            table_state.select(Some(next));
                        }
                        KeyCode::Up | KeyCode::Char('k') => {
                            acted = false;
                            let prev = table_state.selected().map_or(0, |i| i.saturating_sub(1));
                            table_state.select(Some(prev));
                        }
                        _ => acted = false,
                    }
                    if acted {
                        // Pull the updated view straight away instead of waiting a tick.
                        app.refresh_keeping_error(client).await;
                        last_tick = std::time::Instant::now();
                    }
                }
            }
        }

        if last_tick.elapsed() >= poll_interval {
            app.refresh(client).await;
            last_tick = std::time::Instant::now();
        }
    }
}

// ---------------------------------------------------------------------------
// Rendering
// ---------------------------------------------------------------------------

fn render(f: &mut Frame, app: &AppState, table_state: &mut TableState) {
    let area = f.area();

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(4), // header
            Constraint::Min(0),    // listings
            Constraint::Length(1), // summary
            Constraint::Length(1), // keys
        ])
        .split(area);

    render_header(f, app, chunks[0]);
    render_listings(f, app, table_state, chunks[1]);
    render_summary(f, app, chunks[2]);
    render_footer(f, chunks[3]);
}

fn render_header(f: &mut Frame, app: &AppState, area: Rect) {
    let (conn_text, conn_color) = match &app.status {
        ConnectionStatus::Connected => ("● connected".to_string(), Color::Green),
        ConnectionStatus::Connecting => ("◌ connecting".to_string(), Color::Yellow),
        ConnectionStatus::Error(e) => (format!("✗ {}", truncate(e, 50)), Color::Red),
    };

    let snapshot = &app.book.snapshot;
    let status_color = match snapshot.status.as_str() {
        "ready" => Color::Green,
        "loading" => Color::Yellow,
        "error" => Color::Red,
        _ => Color::DarkGray,
    };

    let criteria = &app.book.criteria;
    let refresh = &app.book.refresh;
    let refresh_text = if refresh.is_running && refresh.interval_secs > 0 {
        let (every, next) = (refresh.interval_secs, refresh.seconds_remaining);
        format!("auto {every}s · next in {next}s")
    } else {
        format!("auto off ({}s)", refresh.interval_secs)
    };
    let updated = refresh
        .last_updated_at_ns
        .map_or("never".to_string(), format_time_ns);

    let mut top = vec![
        Span::styled(" P2P Order Book  ", bold(Color::Cyan)),
        Span::styled(conn_text, Style::default().fg(conn_color)),
        Span::raw("  │  "),
        Span::styled(snapshot.status.clone(), Style::default().fg(status_color)),
        Span::raw("  │  "),
        Span::raw(refresh_text),
        Span::raw("  │  updated "),
        Span::raw(updated),
    ];
    if snapshot.alert_triggered {
        top.push(Span::raw("  "));
        let alert = Span::styled("▲ PRICE ALERT", bold(Color::Black).bg(Color::Green));
        top.push(alert);
    }

    let side = &criteria.trade_type;
    let pair = format!(" {side} {}/{}", criteria.asset, criteria.fiat);
    let mut second = vec![Span::styled(pair, bold(Color::White))];
    if !criteria.pay_types.is_empty() {
        second.push(Span::raw(format!("  via {}", criteria.pay_types.join(", "))));
    }
    if let (Some(min), Some(max)) = (criteria.amount_min, criteria.amount_max) {
        let (min, max) = (format_amount(min), format_amount(max));
        second.push(Span::raw(format!("  amount {min}–{max}")));
    }
    if criteria.merchant_only {
        let style = Style::default().fg(Color::Magenta);
        second.push(Span::styled("  merchants only", style));
    }
    if let Some(t) = app.book.alert.threshold_price {
        second.push(Span::styled(
            format!("  alert ≤ {}", format_amount(t)),
            Style::default().fg(Color::DarkGray),
        ));
    }
    if let Some(msg) = &snapshot.error_message {
        second.push(Span::styled(
            format!("  {}", truncate(msg, 60)),
            Style::default().fg(Color::Red),
        ));
    }

    let lines = vec![Line::from(top), Line::from(second)];
    let paragraph = Paragraph::new(lines).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::DarkGray)),
    );
    f.render_widget(paragraph, area);
}

fn render_listings(f: &mut Frame, app: &AppState, state: &mut TableState, area: Rect) {
    let sort = &app.book.sort;
    let arrow = if sort.direction == "desc" { " ▼" } else { " ▲" };
    let headers = [
        ("Seller", "merchant"),
        ("Price", "price"),
        ("Limits / Available", "amount"),
        ("Payment", ""),
        ("Completion", "completion"),
        ("Orders", "orders"),
    ];
    let header_cells = headers.iter().map(|(label, key)| {
        let text = if !key.is_empty() && *key == sort.key {
            format!("{label}{arrow}")
        } else {
            label.to_string()
        };
        Cell::from(text).style(bold(Color::Yellow))
    });
    let header = Row::new(header_cells).height(1);

    let rows: Vec<Row> = app.book.snapshot.records.iter().map(listing_row).collect();

    let title = format!(" {} LISTINGS ", app.book.criteria.trade_type);
    let table = Table::new(
        rows,
        [
            Constraint::Min(16),
            Constraint::Length(12),
            Constraint::Length(30),
            Constraint::Min(14),
            Constraint::Length(11),
            Constraint::Length(7),
        ],
    )
    .header(header)
    .block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::DarkGray))
            .title(Span::styled(title, bold(Color::Cyan))),
    )
    .row_highlight_style(
        Style::default()
            .bg(Color::DarkGray)
            .add_modifier(Modifier::BOLD),
    );

    f.render_stateful_widget(table, area, state);
}

fn listing_row(ad: &AdResponse) -> Row<'static> {
    let mut seller = truncate(&ad.seller_name, 18);
    if ad.is_merchant {
        seller.push_str(" ✓");
    }
    if ad.is_promoted {
        seller.push_str(" ★");
    }
    let seller_style = if ad.is_merchant {
        Style::default().fg(Color::Magenta)
    } else {
        Style::default()
    };

    let completion_color = match ad.month_finish_rate {
        Some(r) if r >= 0.95 => Color::Green,
        Some(r) if r >= 0.90 => Color::Yellow,
        Some(_) => Color::Red,
        None => Color::DarkGray,
    };

    let limits = format!(
        "{}–{} · {} {}",
        format_amount(ad.min_fiat),
        format_amount(ad.max_fiat),
        format_amount(ad.available_asset),
        ad.asset
    );

    Row::new(vec![
        Cell::from(seller).style(seller_style),
        Cell::from(format!("{} {}", format_amount(ad.price), ad.fiat))
            .style(bold(Color::White)),
        Cell::from(limits),
        Cell::from(truncate(&ad.pay_methods.join(", "), 24))
            .style(Style::default().fg(Color::Cyan)),
        Cell::from(format_completion(ad.month_finish_rate))
            .style(Style::default().fg(completion_color)),
        Cell::from(format_orders(ad.month_order_count)),
    ])
}

fn render_summary(f: &mut Frame, app: &AppState, area: Rect) {
    let s = &app.book.summary;
    let fiat = &app.book.criteria.fiat;
    let merchants = format!("{} merchants", s.merchant_count);
    let best = price_text(s.best_price, fiat);
    let line = Line::from(vec![
        Span::raw(format!(" {} listings", s.count)),
        Span::raw("  │  "),
        Span::styled(merchants, Style::default().fg(Color::Magenta)),
        Span::raw("  │  avg "),
        Span::raw(price_text(s.average_price, fiat)),
        Span::raw("  │  best "),
        Span::styled(best, Style::default().fg(Color::Green)),
    ]);
    let summary = Paragraph::new(line).style(Style::default().fg(Color::White));
    f.render_widget(summary, area);
}

fn price_text(price: Option<f64>, fiat: &str) -> String {
    match price {
        Some(v) => format!("{} {fiat}", format_amount(v)),
        None => "—".to_string(),
    }
}

fn render_footer(f: &mut Frame, area: Rect) {
    let key = |k: &'static str| Span::styled(k, Style::default().fg(Color::Yellow));
    let line = Line::from(vec![
        key(" [q] "),
        Span::raw("quit  "),
        key("[r] "),
        Span::raw("search  "),
        key("[b/s] "),
        Span::raw("buy/sell  "),
        key("[a] "),
        Span::raw("asset  "),
        key("[x] "),
        Span::raw("fiat  "),
        key("[t] "),
        Span::raw("pay method  "),
        key("[f] "),
        Span::raw("merchants  "),
        key("[p m n c o] "),
        Span::raw("sort  "),
        key("[space] "),
        Span::raw("auto  "),
        key("[+/-] "),
        Span::raw("interval"),
    ]);
    let footer = Paragraph::new(line).style(Style::default().fg(Color::White));
    f.render_widget(footer, area);
}

fn bold(color: Color) -> Style {
    Style::default().fg(color).add_modifier(Modifier::BOLD)
}
