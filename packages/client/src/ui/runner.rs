//! Terminal client: wires line input and snapshot rendering to a chat session.

use std::sync::{Arc, Mutex};

use hubchat_shared::time::SystemClock;
use rustyline::{DefaultEditor, Event, EventHandler, error::ReadlineError};
use tokio::sync::mpsc;

use crate::{
    config::ClientConfig, infrastructure::transport::WebSocketTransport, session::ChatSession,
};

use super::{
    command::{Command, HELP},
    formatter::ViewRenderer,
    input::{InputEvent, KeystrokeNotifier},
    prompt::{prompt_for, redisplay_prompt},
};

/// Run the terminal client until the user quits or input ends.
///
/// # Arguments
///
/// * `user_name` - Initial user name, if given on the command line
/// * `group_name` - Group to join right after connecting
pub async fn run_client(
    config: ClientConfig,
    user_name: Option<String>,
    group_name: Option<String>,
) {
    let transport = Arc::new(WebSocketTransport::new(config.skip_negotiation));
    let session = ChatSession::connect(config, transport, Arc::new(SystemClock)).await;

    if let Some(user_name) = user_name {
        session.set_user_name(user_name).await;
    }
    let join_on_start = group_name.is_some();
    if let Some(group_name) = group_name {
        session.set_group_name(group_name).await;
    }
    if join_on_start && session.snapshot().connection_state.is_connected() {
        // Outcome is shown on the status line
        let _ = session.join_group().await;
    }

    println!(
        "\nType messages and press Enter to send. Type /help for commands, Ctrl+C to exit.\n"
    );

    // Shared with the readline thread so the prompt follows name and group changes
    let prompt = Arc::new(Mutex::new(prompt_for(&session.snapshot())));

    let mut snapshots = session.subscribe();
    let prompt_for_render = prompt.clone();
    let render_task = tokio::spawn(async move {
        let mut renderer = ViewRenderer::default();
        loop {
            let snapshot = snapshots.borrow_and_update().clone();
            let output = renderer.render(&snapshot);
            let current_prompt = prompt_for(&snapshot);
            if let Ok(mut shared) = prompt_for_render.lock() {
                shared.clone_from(&current_prompt);
            }
            if !output.is_empty() {
                print!("\n{}", output);
                redisplay_prompt(&current_prompt);
            }
            if snapshots.changed().await.is_err() {
                break;
            }
        }
    });

    let (input_tx, mut input_rx) = mpsc::unbounded_channel::<InputEvent>();

    // Spawn a blocking thread for rustyline (synchronous readline)
    let _readline_handle = std::thread::spawn(move || {
        let mut rl = match DefaultEditor::new() {
            Ok(rl) => rl,
            Err(e) => {
                eprintln!("Failed to initialize readline: {}", e);
                return;
            }
        };
        rl.bind_sequence(
            Event::Any,
            EventHandler::Conditional(Box::new(KeystrokeNotifier::new(input_tx.clone()))),
        );

        loop {
            let current_prompt = prompt
                .lock()
                .map(|guard| guard.clone())
                .unwrap_or_else(|_| "> ".to_string());
            match rl.readline(&current_prompt) {
                Ok(line) => {
                    let line = line.trim();
                    if !line.is_empty() {
                        rl.add_history_entry(line).ok();
                        if input_tx.send(InputEvent::Line(line.to_string())).is_err() {
                            break;
                        }
                    }
                }
                Err(ReadlineError::Interrupted) => {
                    tracing::info!("Interrupted");
                    break;
                }
                Err(ReadlineError::Eof) => {
                    tracing::info!("EOF");
                    break;
                }
                Err(err) => {
                    tracing::error!("Readline error: {}", err);
                    break;
                }
            }
        }
    });

    while let Some(event) = input_rx.recv().await {
        let line = match event {
            InputEvent::Keystroke => {
                session.on_keystroke().await;
                continue;
            }
            InputEvent::Line(line) => line,
        };
        let command = match Command::parse(&line) {
            Ok(command) => command,
            Err(e) => {
                println!("{}", e);
                continue;
            }
        };

        // Failures already land on the status line; the results are for logging only
        match command {
            Command::Join(group_name) => {
                if let Some(group_name) = group_name {
                    session.set_group_name(group_name).await;
                }
                let _ = session.join_group().await;
            }
            Command::Leave => {
                let _ = session.leave_group().await;
            }
            Command::Name(user_name) => session.set_user_name(user_name).await,
            Command::Reconnect => session.reconnect().await,
            Command::Help => print!("{}", HELP),
            Command::Quit => break,
            Command::Message(text) => {
                session.set_draft(text).await;
                let _ = session.send_message().await;
            }
        }
    }

    session.close().await;
    render_task.abort();
    tracing::info!("Client exited");
}
