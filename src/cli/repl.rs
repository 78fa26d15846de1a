use anyhow::Result;
use std::io::{self, Write};

use super::output;
use super::App;
use crate::chat::{ChatSessionStore, Outcome};
use crate::core::persona::{persona_for_category, PersonaInfo};
use crate::http::AuthState;

pub async fn run(app: App, persona: &str, name: Option<String>) -> Result<()> {
    let owner = app.owner()?.to_string();
    let persona = persona_for_category(persona);
    if persona.is_unknown() {
        anyhow::bail!("Unknown persona. Use an id from 1 to 5 or a persona key.");
    }

    let store = ChatSessionStore::new(app.api.clone(), app.persistence.clone());
    let auth = app.api.auth_state();

    if let Err(e) = store.ensure_session(&owner, persona.id, name.clone()).await {
        output::print_error(&e);
        anyhow::bail!("could not start a chat session");
    }
    print_banner(&store, persona);

    loop {
        if *auth.borrow() == AuthState::SignedOut {
            eprintln!("Signed out by the server. Run `htp auth login` again.");
            break;
        }

        eprint!("\x1b[32;1mhtp>\x1b[0m ");
        io::stderr().flush().ok();

        let mut input = String::new();
        match io::stdin().read_line(&mut input) {
            Ok(0) => {
                println!("\nGoodbye!");
                break;
            }
            Ok(_) => {}
            Err(e) => {
                eprintln!("Input error: {e}");
                break;
            }
        }

        let input = input.trim();
        if input.is_empty() {
            continue;
        }

        if input.starts_with('/') {
            match handle_command(input, &store, &owner, persona, &name).await {
                Ok(true) => continue,
                Ok(false) => break,
                Err(e) => {
                    eprintln!("\x1b[31mCommand error: {e}\x1b[0m");
                    continue;
                }
            }
        }

        let before = store.messages().len();
        match store.send_message(input).await {
            Ok(Outcome::Applied) => {
                for message in store.messages().iter().skip(before).filter(|m| !m.is_user()) {
                    output::print_message(message);
                }
            }
            Ok(Outcome::Skipped) => eprintln!("\x1b[90m(message not sent)\x1b[0m"),
            Err(e) if e.is_auth() => {
                output::print_error(&e);
                break;
            }
            Err(e) => output::print_error(&e),
        }
        output::print_warnings(&store.snapshot().warnings);
    }

    Ok(())
}

fn print_banner(store: &ChatSessionStore, persona: &PersonaInfo) {
    let state = store.snapshot();
    println!("\x1b[1mhtp\x1b[0m v{}", env!("CARGO_PKG_VERSION"));
    if let Some(session) = &state.session {
        println!(
            "Chatting with \x1b[36m{}\x1b[0m in \"{}\"",
            persona.display_name,
            session.display_name()
        );
    }
    println!("Type \x1b[33m/help\x1b[0m for commands, \x1b[33mCtrl-D\x1b[0m to exit.\n");

    if let Some(greeting) = &state.greeting {
        println!("\x1b[36mbot>\x1b[0m {greeting}");
    }
    for message in &state.messages {
        output::print_message(message);
    }
    output::print_warnings(&state.warnings);
}

async fn handle_command(
    input: &str,
    store: &ChatSessionStore,
    owner: &str,
    persona: &PersonaInfo,
    name: &Option<String>,
) -> Result<bool> {
    let (command, rest) = input.split_once(' ').unwrap_or((input, ""));
    match command {
        "/help" | "/h" => {
            println!("\x1b[1mCommands:\x1b[0m");
            println!("  /history           Show the transcript");
            println!("  /reset             Start a fresh session");
            println!("  /rate <1-5> [text] Rate this session");
            println!("  /delete            Delete this session and exit");
            println!("  /quit              Exit");
            Ok(true)
        }
        "/quit" | "/exit" | "/q" => {
            println!("Goodbye!");
            Ok(false)
        }
        "/history" => {
            let messages = store.messages();
            if messages.is_empty() {
                println!("No messages yet.");
            }
            for message in &messages {
                output::print_message(message);
            }
            Ok(true)
        }
        "/reset" => {
            store.reset_session();
            if let Err(e) = store.create_session(owner, persona.id, name.clone()).await {
                output::print_error(&e);
                return Ok(false);
            }
            print_banner(store, persona);
            Ok(true)
        }
        "/rate" => {
            let Some(session) = store.session() else {
                anyhow::bail!("no active session");
            };
            let (stars, comment) = rest.trim().split_once(' ').unwrap_or((rest.trim(), ""));
            let stars: u8 = stars
                .parse()
                .map_err(|_| anyhow::anyhow!("usage: /rate <1-5> [comment]"))?;
            let comment = Some(comment.to_string()).filter(|c| !c.trim().is_empty());
            match store.rate_session(&session.id, stars, comment).await {
                Ok(()) => println!("Thanks for the feedback!"),
                Err(e) => output::print_error(&e),
            }
            store.clear_error();
            Ok(true)
        }
        "/delete" => delete_current(store).await,
        _ => {
            eprintln!("Unknown command: {input}. Type /help for available commands.");
            Ok(true)
        }
    }
}

/// Delete the active session. Returns whether the REPL still has a session
/// to talk to, which is never the case once the delete was attempted.
pub(super) async fn delete_current(store: &ChatSessionStore) -> Result<bool> {
    let Some(session) = store.session() else {
        anyhow::bail!("no active session");
    };
    match store.delete_session(&session.id).await {
        Ok(()) => println!("Session deleted."),
        Err(e) => {
            output::print_error(&e);
            eprintln!("Left the session; it may still exist on the server.");
        }
    }
    Ok(store.session().is_some())
}
