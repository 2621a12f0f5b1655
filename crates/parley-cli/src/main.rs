//! Parley terminal client.
//!
//! # Usage
//!
//! ```bash
//! # Local development server
//! parley --token "$PARLEY_TOKEN"
//!
//! # Remote server with capped exponential backoff
//! parley --server wss://chat.example.com --api https://chat.example.com \
//!     --token "$PARLEY_TOKEN" --backoff-max-ms 30000
//! ```

mod command;
mod screen;
mod upload;

use std::time::Duration;

use clap::Parser;
use command::{HELP, Input};
use parley_client::{
    Attachment, ConnectionConfig, ReconnectPolicy, Runtime, RuntimeConfig, RuntimeError, RuntimeHandle,
    SyncUpdate, SystemEnv,
    transport::{DEFAULT_API_URL, HttpBackend, WsDriver},
};
use screen::Screen;
use tokio::{
    io::{self, AsyncBufReadExt, AsyncWriteExt, BufReader, Stdout},
    sync::broadcast::error::RecvError,
};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Parley chat client
#[derive(Parser, Debug)]
#[command(name = "parley")]
#[command(about = "Terminal client for Parley chat")]
#[command(version)]
struct Args {
    /// Chat server socket address
    #[arg(short, long, default_value = "ws://localhost:4040")]
    server: String,

    /// Chat service API address
    #[arg(short, long, default_value = DEFAULT_API_URL)]
    api: String,

    /// Session token sent as the `token` cookie
    #[arg(short, long, env = "PARLEY_TOKEN")]
    token: Option<String>,

    /// Delay before reconnecting after the socket drops
    #[arg(long, default_value = "1000")]
    reconnect_ms: u64,

    /// Double the reconnect delay on every failure, up to this ceiling
    #[arg(long)]
    backoff_max_ms: Option<u64>,

    /// Give up on a socket handshake after this long
    #[arg(long, default_value = "10000")]
    connect_timeout_ms: u64,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "warn")]
    log_level: String,
}

impl Args {
    fn connection(&self) -> ConnectionConfig {
        let base = Duration::from_millis(self.reconnect_ms);
        let reconnect = match self.backoff_max_ms {
            Some(max) => ReconnectPolicy::Exponential { base, max: Duration::from_millis(max) },
            None => ReconnectPolicy::Fixed(base),
        };

        ConnectionConfig {
            url: self.server.clone(),
            reconnect,
            connect_timeout: Duration::from_millis(self.connect_timeout_ms),
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    // stdout belongs to the conversation
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    let (runtime, handle) = Runtime::start(
        WsDriver::new(args.token.clone()),
        HttpBackend::new(args.api.clone(), args.token.clone()),
        SystemEnv::new(),
        args.connection(),
        RuntimeConfig::default(),
    )
    .await?;

    let mut screen = Screen::new(runtime.controller().profile().clone());
    let mut updates = handle.subscribe();
    let task = tokio::spawn(runtime.run());

    let mut out = io::stdout();
    write_lines(&mut out, &["* signed in, /help for commands".to_string()]).await?;

    let mut lines = BufReader::new(io::stdin()).lines();
    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                let reply = match command::parse(&line) {
                    Ok(Input::Quit) => break,
                    Ok(input) => dispatch(&handle, &mut screen, input).await,
                    Err(e) => vec![format!("! {e}")],
                };
                write_lines(&mut out, &reply).await?;
            }
            update = updates.recv() => match update {
                Ok(update) => {
                    let logged_out = update == SyncUpdate::LoggedOut;
                    write_lines(&mut out, &screen.apply(&update)).await?;
                    if logged_out {
                        break;
                    }
                },
                Err(RecvError::Lagged(missed)) => {
                    tracing::warn!(missed, "display fell behind");
                },
                Err(RecvError::Closed) => break,
            },
        }
    }

    // Already stopped if the runtime ended on its own
    let _ = handle.shutdown().await;
    task.await??;

    Ok(())
}

async fn dispatch(handle: &RuntimeHandle, screen: &mut Screen, input: Input) -> Vec<String> {
    match input {
        Input::Nothing | Input::Quit => Vec::new(),
        Input::Help => HELP.iter().map(|line| (*line).to_string()).collect(),
        Input::Who => screen.who(),
        Input::Select(query) => {
            let Some(peer) = screen.resolve(&query) else {
                return vec![format!("! no peer called {query}")];
            };
            let header = screen.open(peer.clone());
            match handle.select_peer(peer).await {
                Ok(()) => vec![header],
                Err(e) => vec![format!("! {e}")],
            }
        },
        Input::Say(text) => send(handle, text, None).await,
        Input::File(path) => match upload::read_attachment(&path).await {
            Ok(file) => send(handle, String::new(), Some(file)).await,
            Err(e) => vec![format!("! cannot read {}: {e}", path.display())],
        },
        Input::Logout => match handle.logout().await {
            Ok(()) => Vec::new(),
            Err(e) => vec![format!("! logout failed: {e}")],
        },
    }
}

async fn send(handle: &RuntimeHandle, text: String, file: Option<Attachment>) -> Vec<String> {
    match handle.send(text, file).await {
        Ok(()) => Vec::new(),
        Err(RuntimeError::Client(e)) if e.is_transient() => vec![format!("! not sent: {e}")],
        Err(e) => vec![format!("! {e}")],
    }
}

async fn write_lines(out: &mut Stdout, lines: &[String]) -> io::Result<()> {
    for line in lines {
        out.write_all(line.as_bytes()).await?;
        out.write_all(b"\n").await?;
    }
    out.flush().await
}
