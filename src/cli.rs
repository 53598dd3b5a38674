use crate::{
    config::Config,
    forms::{LoginForm, SignupForm},
    profile::{Profile, LOGIN_REQUIRED},
    session::{Session, SessionStore},
    Command,
};
use anyhow::Result;
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use std::cell::RefCell;
use std::path::{Path, PathBuf};

pub struct Context {
    pub config: Config,
    /// None when running with in-memory storage
    pub storage_path: Option<PathBuf>,
    pub store: RefCell<SessionStore>,
}

pub fn run_command(ctx: &Context, command: &Command) -> Result<()> {
    match command {
        Command::Login { email, password } => {
            LoginForm::new(email, password).submit(&mut ctx.store.borrow_mut())?;
            println!("Logged in as {}", email);
        }
        Command::Signup {
            email,
            password,
            confirm_password,
        } => {
            SignupForm::new(email, password, confirm_password)
                .submit(&mut ctx.store.borrow_mut())?;
            println!("Signed up as {}", email);
        }
        Command::Logout => {
            ctx.store.borrow_mut().logout()?;
            println!("Logged out");
        }
        Command::Status { json } => print_status(ctx.store.borrow().current(), *json)?,
        Command::Profile { json } => print_profile(ctx.store.borrow().current(), *json)?,
        Command::Shell => run_repl(ctx)?,
    }
    Ok(())
}

pub fn run_repl(ctx: &Context) -> Result<()> {
    let mut rl = DefaultEditor::new()?;
    let history = history_path();
    if let Some(path) = &history {
        // Missing history on first run is expected
        let _ = rl.load_history(path);
    }

    let subscription = ctx.store.borrow_mut().subscribe(|session| match session {
        Session::LoggedIn(user) => println!("[session] logged in as {}", user.email),
        Session::LoggedOut => println!("[session] logged out"),
    });

    println!("vxfb - type /help for commands, /exit to quit");

    loop {
        let prompt = format!("{}> ", ctx.store.borrow().current().display_name());
        match rl.readline(&prompt) {
            Ok(line) => {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                rl.add_history_entry(line)?;

                if handle_command(ctx, line) {
                    break;
                }
            }
            Err(ReadlineError::Interrupted | ReadlineError::Eof) => break,
            Err(e) => {
                eprintln!("Input error: {}", e);
                break;
            }
        }
    }

    ctx.store.borrow_mut().unsubscribe(subscription);

    if let Some(path) = history.as_deref().filter(|p| ensure_history_dir(p)) {
        if let Err(e) = rl.save_history(path) {
            tracing::warn!(path = %path.display(), error = %e, "failed to save history");
        }
    }

    Ok(())
}

/// Execute one shell line. Returns true when the shell should exit.
fn handle_command(ctx: &Context, line: &str) -> bool {
    let parts = match shell_words::split(line) {
        Ok(parts) => parts,
        Err(e) => {
            println!("Parse error: {}", e);
            return false;
        }
    };
    let Some((cmd, rest)) = parts.split_first() else {
        return false;
    };
    let arg = |i: usize| rest.get(i).map(String::as_str).unwrap_or("");

    let result = match cmd.as_str() {
        "/exit" | "/quit" => return true,
        "/help" => {
            println!("Commands:");
            println!("  /exit                              - quit");
            println!("  /help                              - show commands");
            println!("  /status                            - show who is logged in");
            println!("  /login <email> [password]          - log in (any password works)");
            println!("  /signup <email> [password] [again] - create an account and log in");
            println!("  /logout                            - log out");
            println!("  /profile                           - show profile");
            println!("  /session                           - show storage details");
            Ok(())
        }
        "/status" => print_status(ctx.store.borrow().current(), false),
        "/profile" => print_profile(ctx.store.borrow().current(), false),
        "/login" => LoginForm::new(arg(0), arg(1))
            .submit(&mut ctx.store.borrow_mut())
            .map_err(anyhow::Error::from),
        "/signup" => SignupForm::new(arg(0), arg(1), arg(2))
            .submit(&mut ctx.store.borrow_mut())
            .map_err(anyhow::Error::from),
        "/logout" => ctx.store.borrow_mut().logout().map_err(anyhow::Error::from),
        "/session" => {
            let store = ctx.store.borrow();
            match &ctx.storage_path {
                Some(path) => println!("Storage: {}", path.display()),
                None => println!("Storage: in memory"),
            }
            println!("Key: {}", store.key());
            println!("Logged in: {}", store.current().is_logged_in());
            println!(
                "Log level: {}",
                ctx.config.log.level.as_deref().unwrap_or("warn")
            );
            Ok(())
        }
        other => {
            println!("Unknown command: {}. Type /help for commands.", other);
            Ok(())
        }
    };

    if let Err(e) = result {
        println!("{}", e);
    }
    false
}

fn print_status(session: &Session, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(&session.snapshot())?);
    } else {
        println!("[{}] {}", session.avatar_initial(), session.display_name());
    }
    Ok(())
}

fn print_profile(session: &Session, json: bool) -> Result<()> {
    match Profile::for_session(session) {
        Some(profile) if json => println!("{}", serde_json::to_string_pretty(&profile)?),
        Some(profile) => println!("{}", profile),
        None => println!("{}", LOGIN_REQUIRED),
    }
    Ok(())
}

/// Create the parent of the history file. Failure only costs the history.
fn ensure_history_dir(path: &Path) -> bool {
    let Some(parent) = path.parent() else {
        return true;
    };
    match std::fs::create_dir_all(parent) {
        Ok(()) => true,
        Err(e) => {
            tracing::warn!(path = %parent.display(), error = %e, "failed to create history directory");
            false
        }
    }
}

fn history_path() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".vxfb").join("history"))
}
