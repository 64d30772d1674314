// chat-client/src/main.rs
use actix::Actor;
use chat_client::{
    ActivitySource, AppContext, ChatActor, ChatTransport, ClientError, CloseChat, IdleWatchdog,
    OpenChat, RawInput, StartMonitoring, StopMonitoring, Submit, TokenIdentity, WatchdogSignals,
    WatchdogTimings,
};
use common::{setup_tracing, ChatMessage, Config, MessageKind};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::mpsc;

const QUIT_COMMAND: &str = "/quit";

fn render(message: &ChatMessage) {
    match (message.kind, message.error) {
        (MessageKind::Sent, _) => println!("you> {}", message.text),
        (MessageKind::Received, false) => println!("bot> {}", message.text),
        (MessageKind::Received, true) => println!("bot! {}", message.text),
    }
}

#[actix_rt::main]
async fn main() -> Result<(), ClientError> {
    // Load configuration first; it decides the log level
    let (config, load_error) = Config::resolve();
    setup_tracing(config.production);

    match load_error {
        Some(e) => tracing::warn!("Failed to load configuration files, using defaults: {}", e),
        None => tracing::info!(production = config.production, "Configuration loaded"),
    }
    config.validate()?;

    let context = AppContext::new(config, Arc::new(TokenIdentity::from_env()));

    // Inactivity watchdog and the activity source feeding it
    let signals = WatchdogSignals::new();
    let mut warnings = signals.subscribe_warning();
    let mut logouts = signals.subscribe_force_logout();
    let watchdog = IdleWatchdog::new(
        WatchdogTimings::from_config(&context.config.inactivity),
        signals.clone(),
    ).start();
    let mut activity = ActivitySource::new(
        context.config.inactivity.check_activity_interval(),
        watchdog.clone().recipient(),
    );

    // Chat orchestrator over the configured transport
    let (view_tx, mut view_rx) = mpsc::unbounded_channel();
    let transport = ChatTransport::from_context(&context)?;
    let chat = ChatActor::new(context.clone(), transport, view_tx).start();

    if let Err(e) = chat.send(OpenChat).await? {
        tracing::warn!("Chat started without a backend connection: {}", e);
    }
    watchdog.do_send(StartMonitoring);

    println!("Type a question and press enter. {} exits.", QUIT_COMMAND);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut forced_logout = false;

    loop {
        tokio::select! {
            line = lines.next_line() => match line? {
                Some(line) => {
                    activity.record(RawInput::KeyPress);
                    if line.trim() == QUIT_COMMAND {
                        break;
                    }
                    chat.do_send(Submit(line));
                },
                None => break,
            },
            Some(message) = view_rx.recv() => render(&message),
            warning = warnings.recv() => match warning {
                Ok(0) => {},
                Ok(remaining) => println!("-- inactive: signing out in {} s, type anything to stay --", remaining),
                Err(RecvError::Lagged(_)) => {},
                Err(RecvError::Closed) => break,
            },
            _ = logouts.recv() => {
                println!("-- signed out after inactivity --");
                forced_logout = true;
                break;
            },
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    // Teardown: no timers or connections may outlive the session
    activity.detach();
    watchdog.do_send(StopMonitoring);
    if let Err(e) = chat.send(CloseChat).await? {
        tracing::warn!("Error closing chat connection: {}", e);
    }
    if forced_logout {
        context.identity.sign_out().await?;
    }

    tracing::info!("Chat client exiting");
    Ok(())
}
