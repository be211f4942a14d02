use anyhow::Context;
use bridge::config;
use bridge::protocol::EVENT_INIT;
use bridge::{Bridge, ChannelTransport, PrepareMethod};
use clap::{Parser, Subcommand};
use futures_util::{SinkExt, StreamExt};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;

#[derive(Parser)]
#[command(name = "addin")]
#[command(about = "Add-in bridge CLI", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Show version
    Version,

    /// Write a default configuration file if none exists.
    Init {
        /// Config file path (default: ADDIN_CONFIG_PATH or ~/.addin/config.json)
        #[arg(long, short, value_name = "PATH")]
        config: Option<PathBuf>,
    },

    /// Connect to a host as a demo add-in: print the conversation on init, then run the requested actions.
    Connect {
        /// Config file path (default: ADDIN_CONFIG_PATH or ~/.addin/config.json)
        #[arg(long, short, value_name = "PATH")]
        config: Option<PathBuf>,

        /// Host origin passed to init (default: ADDIN_HOST_URL or host.url)
        #[arg(long, value_name = "URL")]
        host: Option<String>,

        /// WebSocket endpoint carrying envelopes (default: host.socketUrl)
        #[arg(long, value_name = "URL")]
        socket: Option<String>,

        /// Stage this text in the agent's compose box once initialized.
        #[arg(long, value_name = "TEXT")]
        prepare: Option<String>,

        /// How prepared text is combined: replace, append or prepend.
        #[arg(long, value_name = "METHOD", requires = "prepare")]
        method: Option<PrepareMethod>,

        /// Store this extension data on the conversation and wait for the host's answer.
        #[arg(long, value_name = "DATA")]
        extension_data: Option<String>,
    },
}

struct ConnectArgs {
    config: Option<PathBuf>,
    host: Option<String>,
    socket: Option<String>,
    prepare: Option<String>,
    method: Option<PrepareMethod>,
    extension_data: Option<String>,
}

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Version) => {
            println!("addin {}", env!("CARGO_PKG_VERSION"));
        }
        Some(Commands::Init { config }) => {
            if let Err(e) = run_init(config) {
                log::error!("init failed: {:#}", e);
                std::process::exit(1);
            }
        }
        Some(Commands::Connect {
            config,
            host,
            socket,
            prepare,
            method,
            extension_data,
        }) => {
            let args = ConnectArgs {
                config,
                host,
                socket,
                prepare,
                method,
                extension_data,
            };
            if let Err(e) = run_connect(args).await {
                log::error!("connect failed: {:#}", e);
                std::process::exit(1);
            }
        }
        None => {
            println!("Run with --help for usage");
        }
    }
}

fn run_init(config_path: Option<PathBuf>) -> anyhow::Result<()> {
    let path = config_path.unwrap_or_else(config::default_config_path);
    if config::init_config_file(&path)? {
        println!("wrote default configuration to {}", path.display());
    } else {
        println!("configuration already exists at {}", path.display());
    }
    Ok(())
}

async fn run_connect(args: ConnectArgs) -> anyhow::Result<()> {
    let (cfg, _) = config::load_config(args.config)?;
    let host = args
        .host
        .or_else(|| config::resolve_host_url(&cfg))
        .context("no host URL: pass --host, set host.url in config, or set ADDIN_HOST_URL")?;
    let socket_url = args.socket.unwrap_or(cfg.host.socket_url);

    let (ws, _) = tokio_tungstenite::connect_async(&socket_url)
        .await
        .with_context(|| format!("connecting to {}", socket_url))?;
    log::info!("connected to {}", socket_url);
    let (mut sink, mut stream) = ws.split();

    let (transport, mut outbound) = ChannelTransport::new();
    let addin = Bridge::new(Arc::new(transport));

    let writer = tokio::spawn(async move {
        while let Some(frame) = outbound.recv().await {
            let text = match serde_json::to_string(&frame.envelope) {
                Ok(t) => t,
                Err(e) => {
                    log::warn!("dropping outbound {}: {}", frame.envelope.event_type, e);
                    continue;
                }
            };
            if let Err(e) = sink.send(Message::Text(text)).await {
                log::warn!("socket write failed: {}", e);
                break;
            }
        }
    });

    addin.init(&host)?;
    let (inbound_tx, inbound_rx) = mpsc::channel::<String>(64);
    let (ready_rx, listener) = listen_for_init(&addin, inbound_rx);
    let mut reader = tokio::spawn(async move {
        while let Some(msg) = stream.next().await {
            match msg {
                Ok(Message::Text(text)) => {
                    if inbound_tx.send(text).await.is_err() {
                        break;
                    }
                }
                Ok(Message::Close(_)) => break,
                Ok(_) => {}
                Err(e) => {
                    log::warn!("socket read failed: {}", e);
                    break;
                }
            }
        }
    });

    tokio::select! {
        ready = ready_rx => ready.context("init handler dropped")?,
        _ = &mut reader => anyhow::bail!("host closed the connection before sending init"),
    }

    if let Some(text) = args.prepare.as_deref() {
        addin.prepare_message(text, args.method)?;
        println!("prepared message");
    }
    if let Some(data) = args.extension_data {
        let pending = addin.set_extension_data(data)?;
        tokio::select! {
            answer = pending => match answer {
                Ok(v) => println!("extension data saved: {}", v),
                Err(e) => println!("extension data not saved: {}", e),
            },
            _ = &mut reader => anyhow::bail!("host closed the connection before answering"),
        }
    }

    let _ = reader.await;
    let _ = listener.await;
    writer.abort();
    Ok(())
}

/// Register the `init` handler, then start dispatching inbound frames. The receiver fires on the
/// first `init`; the handler must be in place before any frame is dispatched.
fn listen_for_init(
    addin: &Bridge,
    inbound_rx: mpsc::Receiver<String>,
) -> (oneshot::Receiver<()>, JoinHandle<()>) {
    let (ready_tx, ready_rx) = oneshot::channel::<()>();
    let ready_tx = Mutex::new(Some(ready_tx));
    addin.on(EVENT_INIT, move |data| {
        let conversation = data.get("conversation").cloned().unwrap_or_default();
        match serde_json::to_string_pretty(&conversation) {
            Ok(text) => println!("{}", text),
            Err(e) => log::warn!("cannot print conversation: {}", e),
        }
        if let Some(tx) = ready_tx.lock().ok().and_then(|mut g| g.take()) {
            let _ = tx.send(());
        }
    });
    let listener = bridge::listener::spawn_listener(addin.clone(), inbound_rx);
    (ready_rx, listener)
}
