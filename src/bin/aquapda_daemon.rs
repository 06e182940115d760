// PDAリモコンとしてRS485バスに接続して、コントローラーに応答し続ける。
// SPDX-License-Identifier: MPL-2.0
// SPDX-FileCopyrightText: 2025 Akihiro Yamamoto <github.com/ak1211>
//
use aquapda::aqualink::{SerialConnector, Transport};
use aquapda::bus_settings::{self, BusSettings};
use aquapda::emulator::Emulator;
use aquapda::pda::{Panel, PdaHandle};
use clap::Parser;
use std::io::{self, BufRead};
use std::path::PathBuf;
use std::process::ExitCode;
use std::result;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

/// PDAリモコンをエミュレートする。
#[derive(Parser, Debug)]
#[command(name = "aquapda_daemon")]
#[command(version, about, long_about = None)]
struct Cli {
    /// 設定ファイル名
    #[arg(short = 'S', long, default_value = "aquapda.toml")]
    config_file: PathBuf,

    /// シリアルデバイス名(設定ファイルより優先する)
    #[arg(short = 'D', long, env = "SERIAL_DEVICE")]
    device: Option<String>,

    /// ログファイルを置くディレクトリ
    #[arg(long)]
    log_dir: Option<PathBuf>,
}

#[derive(Debug, Error)]
pub enum PdaDaemonError {
    #[error(r#"i/o "{0}""#)]
    Io(#[from] io::Error),

    #[error(r#"settings "{0}""#)]
    Settings(#[from] bus_settings::Error),

    #[error(r#"json "{0}""#)]
    Json(#[from] serde_json::Error),

    #[error(r#"bus thread "{0}""#)]
    BusThread(#[from] tokio::task::JoinError),
}

/// 設定ファイルとコマンドラインから設定を得る
fn read_settings(cli: &Cli) -> result::Result<BusSettings, PdaDaemonError> {
    let mut settings = BusSettings::load(&cli.config_file)?;
    if let Some(device) = cli.device.as_ref() {
        settings.Device = device.clone();
    }
    Ok(settings)
}

/// バスに応答し続ける
async fn exec_emulation(
    settings: &BusSettings,
    handle: PdaHandle,
    cancel: CancellationToken,
) -> result::Result<(), PdaDaemonError> {
    let connector = SerialConnector::new(&settings.Device, settings.BaudRate, settings.read_timeout());
    let transport = Transport::new(connector, settings.reconnect_delay());
    let mut emulator = Emulator::new(transport, handle);

    // シリアルポートの読み込みはブロックするので専用のスレッドで動かす
    tokio::task::spawn_blocking(move || emulator.run(&cancel)).await?;
    Ok(())
}

/// 標準入力を専用のスレッドで読む
///
/// 読み込み中のスレッドはランタイムの終了を待たせない。
fn spawn_stdin_reader() -> io::Result<mpsc::UnboundedReceiver<String>> {
    let (tx, rx) = mpsc::unbounded_channel();
    std::thread::Builder::new()
        .name("console".into())
        .spawn(move || {
            for line in io::stdin().lock().lines() {
                let line = match line {
                    Ok(line) => line,
                    Err(e) => {
                        tracing::warn!("stdin: {}", e);
                        break;
                    }
                };
                // 受け手がいなくなったら終わる
                if tx.send(line).is_err() {
                    break;
                }
            }
        })?;
    Ok(rx)
}

/// 入力行からボタン名を受け付ける
async fn console(
    handle: PdaHandle,
    cancel: CancellationToken,
    mut lines: mpsc::UnboundedReceiver<String>,
) -> result::Result<(), PdaDaemonError> {
    loop {
        let line = tokio::select! {
            _ = cancel.cancelled() => break,
            line = lines.recv() => match line {
                Some(line) => line,
                None => break,
            },
        };
        match line.trim() {
            "" => {}
            "screen" => println!("{}", handle.render_text()),
            "html" => println!("{}", handle.render_screen()),
            "status" => println!("{}", serde_json::to_string_pretty(&handle.current_status())?),
            "quit" => {
                cancel.cancel();
                break;
            }
            name => match handle.request_key(name) {
                Ok(request) => println!("{:?}", request),
                Err(e) => println!("{}", e),
            },
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    // プログラムの情報
    let git_head_ref = built_info::GIT_HEAD_REF.unwrap_or_default();
    let app_info = format!(
        "{} / {}{}",
        built_info::PKG_NAME,
        built_info::PKG_VERSION,
        built_info::GIT_COMMIT_HASH_SHORT
            .map(|s| format!(" ({s} - {git_head_ref})"))
            .unwrap_or_default()
    );

    dotenv::dotenv().ok();
    let cli = Cli::parse();

    // ログファイル
    let (file_layer, _guard) = match cli.log_dir.as_ref() {
        Some(dir) => {
            let appender = tracing_appender::rolling::never(dir, "aquapda.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = tracing_subscriber::fmt::layer()
                .with_timer(tracing_subscriber::fmt::time::LocalTime::rfc_3339())
                .with_writer(writer)
                .with_ansi(false);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    // tracingの設定
    let registry = tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(file_layer);

    // systemd-journaldに接続
    match tracing_journald::layer() {
        // journaldにログ出力する
        Ok(journald_layer) => registry.with(journald_layer).init(),
        // journaldが使えないので、標準出力にログ出力する
        Err(e) => {
            registry
                .with(
                    tracing_subscriber::fmt::layer()
                        .with_timer(tracing_subscriber::fmt::time::LocalTime::rfc_3339())
                        .with_file(false)
                        .with_line_number(false)
                        .with_thread_names(false)
                        .with_thread_ids(false)
                        .with_ansi(false),
                )
                .init();
            tracing::error!("couldn't connect to journald: {}", e)
        }
    }

    let settings = match read_settings(&cli) {
        Ok(settings) => settings,
        Err(e) => {
            tracing::error!("{app_info} aborted, reason: {e}");
            return ExitCode::FAILURE;
        }
    };
    tracing::info!(
        r#"device="{}" baud={} node={:02X} firmware={:?}"#,
        settings.Device,
        settings.BaudRate,
        settings.NodeId,
        settings.Firmware
    );

    let handle = PdaHandle::new(Panel::from_settings(&settings));
    let cancel = CancellationToken::new();

    // Ctrl-Cで停止する
    tokio::spawn({
        let cancel = cancel.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::info!("interrupted");
                cancel.cancel();
            }
        }
    });

    // ボタン入力
    match spawn_stdin_reader() {
        Ok(lines) => {
            tokio::spawn({
                let handle = handle.clone();
                let cancel = cancel.clone();
                async move {
                    if let Err(e) = console(handle, cancel, lines).await {
                        tracing::error!("console: {}", e);
                    }
                }
            });
        }
        Err(e) => tracing::error!("console: {}", e),
    }

    // サービスを開始する
    tracing::info!("{app_info} started.");
    let reason = loop {
        break match exec_emulation(&settings, handle.clone(), cancel.clone()).await {
            // バス受信ループは取り消されたときだけ戻る
            Ok(()) => {
                tracing::info!("{app_info} stopped.");
                return ExitCode::SUCCESS;
            }
            Err(e @ PdaDaemonError::BusThread(_)) => {
                tracing::error!("{}", e);
                tokio::time::sleep(Duration::from_secs(5)).await; // 再始動まで少々クールダウン時間をもつ
                continue; // 再始動
            }
            Err(e @ PdaDaemonError::Io(_)) => e.to_string(),
            Err(e @ PdaDaemonError::Settings(_)) => e.to_string(),
            Err(e @ PdaDaemonError::Json(_)) => e.to_string(),
        };
    };

    // ここに到達するのは異常終了しかありえない
    tracing::error!("{app_info} aborted, reason: {reason}");
    return ExitCode::FAILURE;
}

#[tokio::test]
async fn test1() {
    use aquapda::aqualink::{Frame, Key, PDA_ADDRESS};

    // ボタン名を受け付けて、quitで止める
    let handle = PdaHandle::new(Panel::default());
    let cancel = CancellationToken::new();
    let (tx, rx) = mpsc::unbounded_channel();
    tx.send("up".to_string()).unwrap();
    tx.send("nosuchkey".to_string()).unwrap();
    tx.send("quit".to_string()).unwrap();
    console(handle.clone(), cancel.clone(), rx).await.unwrap();
    assert!(cancel.is_cancelled());
    // 次のポーリングへの応答でupを送る
    let reply = handle.dispatch(&Frame::new(PDA_ADDRESS, 0x02, &[])).unwrap();
    assert_eq!(reply.payload, vec![0x40, Key::Up.code()]);
}

#[tokio::test]
async fn test2() {
    // 入力が来なくても取り消されたらすぐに戻る
    let handle = PdaHandle::new(Panel::default());
    let cancel = CancellationToken::new();
    let (_tx, rx) = mpsc::unbounded_channel::<String>();
    cancel.cancel();
    let result = tokio::time::timeout(Duration::from_secs(1), console(handle, cancel, rx)).await;
    assert!(matches!(result, Ok(Ok(()))));
}
