mod cli;
mod render;
mod settings;

use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::EnvFilter;

use pulse_common::PulseError;
use pulse_presence::ws::WsTransport;
use pulse_presence::{ChannelTransport, ChatClient, LocalHub, TransportError};

use crate::cli::Input;

fn init_logging(level: &str) {
    let directive = format!("pulse_chat={level},pulse_presence={level},pulse_config={level}");
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(directive)),
        )
        .init();
}

#[tokio::main]
async fn main() -> pulse_common::Result<()> {
    let args = cli::parse();

    let config = pulse_config::load_config_from(args.config.as_deref())?;
    let config = settings::apply_overrides(config, &args)?;

    if args.print_config {
        println!("{}", pulse_config::config_to_json(&config));
        return Ok(());
    }

    init_logging(config.logging.level.as_filter());
    tracing::info!("pulse-chat v{} starting...", env!("CARGO_PKG_VERSION"));

    let identity = settings::identity(&config);

    let relay = if args.offline {
        None
    } else {
        Some(Arc::new(WsTransport::connect(settings::ws_config(&config))))
    };
    let transport: Arc<dyn ChannelTransport> = match &relay {
        Some(ws) => Arc::clone(ws) as Arc<dyn ChannelTransport>,
        None => {
            tracing::info!("Offline mode: using in-process bus");
            Arc::new(LocalHub::new())
        }
    };

    let mut client = ChatClient::new(identity, settings::chat_settings(&config), transport);
    let mut events = client.subscribe();
    client
        .start()
        .map_err(|e| PulseError::Other(e.to_string()))?;

    println!("chatting as {}. {}", client.identity(), cli::HELP);

    let result = chat_loop(&client, &mut events).await;

    client.stop().await;
    if let Some(ws) = relay {
        ws.shutdown().await;
    }
    tracing::info!("Shutdown complete");
    result
}

async fn chat_loop(
    client: &ChatClient,
    events: &mut pulse_presence::Subscription,
) -> pulse_common::Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        tokio::select! {
            event = events.recv() => match event {
                Some(event) => println!("{}", render::event_line(&event, &chrono::Local::now())),
                None => return Ok(()),
            },

            line = lines.next_line() => {
                let Some(line) = line? else {
                    return Ok(());
                };
                match Input::parse(&line) {
                    Input::Chat(text) => match client.send_chat(&text) {
                        Ok(()) => {}
                        Err(TransportError::NotConnected) => {
                            println!("-- not connected, message not sent");
                        }
                        Err(e) => return Err(PulseError::Transport(e.to_string())),
                    },
                    Input::Who => println!("{}", render::roster_line(&client.online().await)),
                    Input::Help => println!("{}", cli::HELP),
                    Input::Quit => return Ok(()),
                    Input::Empty => {}
                    Input::Unknown(command) => {
                        println!("-- unknown command /{command}. {}", cli::HELP);
                    }
                }
            }

            _ = tokio::signal::ctrl_c() => return Ok(()),
        }
    }
}
