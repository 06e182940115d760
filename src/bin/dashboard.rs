// 端末で動くPDAリモコン
// SPDX-License-Identifier: MPL-2.0
// SPDX-FileCopyrightText: 2025 Akihiro Yamamoto <github.com/ak1211>
//
use aquapda::aqualink::{Key, KeyRequest, Macro, SerialConnector, Transport};
use aquapda::bus_settings::BusSettings;
use aquapda::emulator::Emulator;
use aquapda::pda::{Panel, PdaHandle, ScreenBuffer, StatusFlags};
use clap::Parser;
use color_eyre::{Result, eyre::Context};
use futures::StreamExt;
use ratatui::widgets::{Block, Paragraph};
use ratatui::{
    DefaultTerminal, Frame,
    crossterm::event::{Event, EventStream, KeyCode, KeyEventKind},
    layout::{Constraint, Layout},
    style::{Color, Modifier, Style, Stylize},
    text::{Line, Span},
    widgets::{Bar, BarChart, BarGroup},
};
use std::path::PathBuf;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// 端末で動くPDAリモコン
#[derive(Parser, Debug)]
#[command(name = "dashboard")]
#[command(version, about, long_about = None)]
struct Cli {
    /// 設定ファイル名
    #[arg(short = 'S', long, default_value = "aquapda.toml")]
    config_file: PathBuf,

    /// シリアルデバイス名(設定ファイルより優先する)
    #[arg(short = 'D', long, env = "SERIAL_DEVICE")]
    device: Option<String>,

    /// ログファイル名(端末は画面表示に使う)
    #[arg(long, default_value = "dashboard.log")]
    log_file: PathBuf,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    color_eyre::install()?;
    let cli = Cli::parse();

    let directory = cli
        .log_file
        .parent()
        .map(|p| p.to_path_buf())
        .unwrap_or_default();
    let file_name = cli.log_file.file_name().unwrap_or("dashboard.log".as_ref());
    let (writer, _guard) =
        tracing_appender::non_blocking(tracing_appender::rolling::never(directory, file_name));
    tracing_subscriber::fmt()
        .with_writer(writer)
        .with_ansi(false)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let mut settings = BusSettings::load(&cli.config_file).wrap_err("setting file error")?;
    if let Some(device) = cli.device {
        settings.Device = device;
    }

    // バス受信は専用のスレッドで動かす
    let handle = PdaHandle::new(Panel::from_settings(&settings));
    let cancel = CancellationToken::new();
    let bus = tokio::task::spawn_blocking({
        let connector =
            SerialConnector::new(&settings.Device, settings.BaudRate, settings.read_timeout());
        let mut emulator = Emulator::new(
            Transport::new(connector, settings.reconnect_delay()),
            handle.clone(),
        );
        let cancel = cancel.clone();
        move || emulator.run(&cancel)
    });

    let terminal = ratatui::init();
    let app = App::new(settings.Device.clone(), handle);
    let app_result = app.run(terminal).await;
    ratatui::restore();

    cancel.cancel();
    bus.await?;
    app_result
}

struct App {
    device: String,
    handle: PdaHandle,
    should_quit: bool,
    screen: ScreenBuffer,
    status: StatusFlags,
    last_request: Option<KeyRequest>,
}

impl App {
    const FRAMES_PER_SECOND: f32 = 30.0;

    fn new(device: String, handle: PdaHandle) -> Self {
        Self {
            device,
            screen: handle.screen_snapshot(),
            status: handle.current_status(),
            handle,
            should_quit: false,
            last_request: None,
        }
    }

    async fn run(mut self, mut terminal: DefaultTerminal) -> Result<()> {
        let period = Duration::from_secs_f32(1.0 / Self::FRAMES_PER_SECOND);
        let mut interval = tokio::time::interval(period);
        let mut events = EventStream::new();

        while !self.should_quit {
            tokio::select! {
                _ = interval.tick() => {
                    self.screen = self.handle.screen_snapshot();
                    self.status = self.handle.current_status();
                    terminal.draw(|frame| self.draw(frame))?;
                },
                Some(Ok(event)) = events.next() => self.handle_event(&event),
            }
        }
        Ok(())
    }

    fn draw(&self, frame: &mut Frame) {
        let [title, body, help] = Layout::vertical([
            Constraint::Length(1),
            Constraint::Length(12),
            Constraint::Length(2),
        ])
        .spacing(1)
        .areas(frame.area());
        let [left, right] =
            Layout::horizontal([Constraint::Length(18), Constraint::Fill(1)]).areas(body);
        let [flags, chart] =
            Layout::vertical([Constraint::Fill(1), Constraint::Length(5)]).areas(right);

        frame.render_widget(
            Line::from(format!("AQUALINK PDA on {} (press q key to exit.)", self.device))
                .bold()
                .centered(),
            title,
        );
        frame.render_widget(screen_widget(&self.screen), left);
        frame.render_widget(status_widget(&self.status, self.last_request), flags);
        frame.render_widget(pump_chart(&self.status), chart);
        frame.render_widget(
            Paragraph::new(vec![
                Line::from("↑/↓ move  Enter select  Esc back  1/2 buttons"),
                Line::from("p pool mode  s spa mode  h pool heater  j spa heater  e equipment off  ? status"),
            ]),
            help,
        );
    }

    fn handle_event(&mut self, event: &Event) {
        let Event::Key(key) = event else {
            return;
        };
        if key.kind != KeyEventKind::Press {
            return;
        }
        let request = match key.code {
            KeyCode::Char('q') => {
                self.should_quit = true;
                return;
            }
            KeyCode::Up => KeyRequest::Key(Key::Up),
            KeyCode::Down => KeyRequest::Key(Key::Down),
            KeyCode::Enter => KeyRequest::Key(Key::Select),
            KeyCode::Esc | KeyCode::Backspace => KeyRequest::Key(Key::Back),
            KeyCode::Char('1') => KeyRequest::Key(Key::Button1),
            KeyCode::Char('2') => KeyRequest::Key(Key::Button2),
            KeyCode::Char('p') => KeyRequest::Macro(Macro::PoolMode),
            KeyCode::Char('s') => KeyRequest::Macro(Macro::SpaMode),
            KeyCode::Char('h') => KeyRequest::Macro(Macro::PoolHeater),
            KeyCode::Char('j') => KeyRequest::Macro(Macro::SpaHeater),
            KeyCode::Char('e') => KeyRequest::Macro(Macro::AllOff),
            KeyCode::Char('?') => KeyRequest::Status,
            _ => return,
        };
        self.handle.request(request);
        self.last_request = Some(request);
    }
}

/// 反転表示部分を強調した画面
fn screen_widget(screen: &ScreenBuffer) -> Paragraph<'static> {
    let highlight = Style::new()
        .fg(Color::Black)
        .bg(Color::Yellow)
        .add_modifier(Modifier::BOLD);
    let lines: Vec<Line> = screen
        .lines()
        .iter()
        .enumerate()
        .map(|(n, text)| {
            let spans: Vec<Span> = text
                .chars()
                .enumerate()
                .map(|(col, c)| match screen.highlight() {
                    Some(h) if h.contains(n, col) => Span::styled(c.to_string(), highlight),
                    _ => Span::raw(c.to_string()),
                })
                .collect();
            Line::from(spans)
        })
        .collect();
    Paragraph::new(lines).block(Block::bordered())
}

fn status_widget(status: &StatusFlags, last_request: Option<KeyRequest>) -> Paragraph<'static> {
    let flag = |name: &str, on: bool| {
        let value = if on { "ON".green() } else { "OFF".dark_gray() };
        Line::from(vec![Span::raw(format!("{:<12}", name)), value])
    };
    let mut lines = vec![
        flag("pool mode", status.pool_mode),
        flag("spa mode", status.spa_mode),
        flag("pool heater", status.pool_heater),
        flag("spa heater", status.spa_heater),
        flag("heater", status.heater),
        flag("pump", status.pump),
        Line::from(format!("{:<12}{}`", "air", status.air_temp)),
        Line::from(format!("{:<12}{}`", "water", status.water_temp)),
    ];
    if let Some(request) = last_request {
        lines.push(Line::from(format!("requested: {:?}", request)).italic());
    }
    Paragraph::new(lines).block(Block::new().title(Line::from("status").centered()))
}

fn pump_chart(status: &StatusFlags) -> BarChart<'static> {
    let style = Style::new().fg(Color::Cyan);
    let bars = [
        ("RPM", status.pump_rpm),
        ("WATTS", status.pump_watts),
    ]
    .into_iter()
    .map(|(label, value)| {
        Bar::default()
            .value(value as u64)
            .label(Line::from(label))
            .text_value(format!("{value:>4}"))
            .style(style)
            .value_style(style.reversed())
    })
    .collect::<Vec<_>>();
    BarChart::default()
        .data(BarGroup::default().bars(&bars))
        .direction(ratatui::layout::Direction::Horizontal)
        .max(3450)
        .bar_width(1)
        .bar_gap(1)
}
