// RS485バスに接続してみる。
// SPDX-License-Identifier: MPL-2.0
// SPDX-FileCopyrightText: 2025 Akihiro Yamamoto <github.com/ak1211>
//
use anyhow::{Context, bail};
use aquapda::aqualink::{SerialConnector, Transport};
use aquapda::bus_settings::BusSettings;
use aquapda::emulator::Emulator;
use aquapda::pda::{Panel, PdaHandle};
use clap::{Args, Parser, Subcommand};
use std::fs::File;
use std::io::Write;
use std::path::PathBuf;
use std::thread;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::FmtSubscriber;

/// Aqualink RS485バスを観察する。
#[derive(Parser, Debug)]
#[command(name = "dryrun")]
#[command(version, about, long_about = None)]
struct Cli {
    /// 設定ファイル名
    #[arg(short = 'S', long, default_value = "aquapda.toml")]
    config_file: PathBuf,

    /// シリアルデバイス名(設定ファイルより優先する)
    #[arg(short = 'D', long)]
    device: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// バス上の電文をすべて記録する(応答しない)
    Sniff(RunArgs),
    /// PDAとして応答しながらボタンを押す
    Press(PressArgs),
    /// 既定値の設定ファイルを書き出す
    Defaults,
}

#[derive(Debug, Args)]
struct RunArgs {
    /// 動作時間(秒)
    #[arg(short = 'T', long, default_value_t = 30)]
    seconds: u64,
}

#[derive(Debug, Args)]
struct PressArgs {
    /// ボタン名(up, down, back, select, but1, but2, poolmode, cleaner など)
    key: String,
    /// 動作時間(秒)
    #[arg(short = 'T', long, default_value_t = 30)]
    seconds: u64,
}

fn read_settings(cli: &Cli) -> anyhow::Result<BusSettings> {
    let mut settings = BusSettings::load(&cli.config_file).context("setting file error.")?;
    if let Some(device) = cli.device.as_ref() {
        settings.Device = device.clone();
    }
    Ok(settings)
}

fn open_transport(settings: &BusSettings) -> Transport<SerialConnector> {
    let connector = SerialConnector::new(&settings.Device, settings.BaudRate, settings.read_timeout());
    Transport::new(connector, settings.reconnect_delay())
}

/// 指定時間だけバスを動かす
fn run_for(mut emulator: Emulator<SerialConnector>, seconds: u64) -> anyhow::Result<()> {
    let cancel = CancellationToken::new();
    thread::scope(|s| {
        let handle = s.spawn(|| emulator.run(&cancel));
        thread::sleep(Duration::from_secs(seconds));
        cancel.cancel();
        match handle.join() {
            Ok(()) => Ok(()),
            Err(e) => bail!("bus thread panicked: {:?}", e),
        }
    })
}

fn exec_sniff(cli: &Cli, args: &RunArgs) -> anyhow::Result<()> {
    let settings = read_settings(cli)?;
    run_for(Emulator::sniffer(open_transport(&settings)), args.seconds)?;
    Ok(println!("Good Bye!"))
}

fn exec_press(cli: &Cli, args: &PressArgs) -> anyhow::Result<()> {
    let settings = read_settings(cli)?;
    let handle = PdaHandle::new(Panel::from_settings(&settings));
    let request = handle.request_key(&args.key)?;
    tracing::info!("{:?}", request);
    run_for(Emulator::new(open_transport(&settings), handle.clone()), args.seconds)?;
    println!("{}", handle.render_text());
    println!("{}", serde_json::to_string_pretty(&handle.current_status())?);
    Ok(())
}

fn exec_defaults(cli: &Cli) -> anyhow::Result<()> {
    // TOML化
    let comment = "# aquapda設定ファイル".to_string();
    let toml = toml::to_string_pretty(&BusSettings::default())?;
    // ファイル出力
    let file_name = &cli.config_file;
    if file_name.exists() {
        bail!(r#""{}" already exists."#, file_name.display());
    }
    let mut file = File::create(file_name)?;
    match file.write_all([comment, toml].join("\n").as_bytes()) {
        Ok(()) => Ok(println!("\"{}\" file write finished.", file_name.display())),
        Err(e) => {
            tracing::error!("{:?}", e);
            bail!(e);
        }
    }
}

fn main() -> anyhow::Result<()> {
    let subscriber = FmtSubscriber::builder()
        .with_max_level(tracing::Level::TRACE)
        .with_thread_names(true)
        .with_thread_ids(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber).context("setting default subscriber failed")?;

    let cli = Cli::parse();

    match &cli.command {
        Commands::Sniff(args) => exec_sniff(&cli, args),
        Commands::Press(args) => exec_press(&cli, args),
        Commands::Defaults => exec_defaults(&cli),
    }
}
