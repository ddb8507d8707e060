use std::path::PathBuf;

use anyhow::Result;
use chatdesk_core::{SelectedFile, UploadKind};
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers, MouseEvent, MouseEventKind};

use crate::app::{App, FileSelection};
use crate::tui::AppEvent;

/// What a submitted composer line asks for
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Message(String),
    Upload(UploadKind, Option<PathBuf>),
    Reset,
    Quit,
    Unknown(String),
}

/// A leading `//` sends the text with a single literal `/`.
pub fn parse_command(input: &str) -> Command {
    let trimmed = input.trim();
    if trimmed.starts_with("//") {
        return Command::Message(trimmed[1..].to_string());
    }
    let Some(rest) = trimmed.strip_prefix('/') else {
        return Command::Message(input.to_string());
    };

    let (name, arg) = match rest.split_once(char::is_whitespace) {
        Some((name, arg)) => (name, arg.trim()),
        None => (rest, ""),
    };
    let path = if arg.is_empty() {
        None
    } else {
        Some(PathBuf::from(arg))
    };

    match name {
        "reset" | "clear" => Command::Reset,
        "quit" | "q" => Command::Quit,
        _ => match UploadKind::from_str(name) {
            Some(kind) => Command::Upload(kind, path),
            None => Command::Unknown(name.to_string()),
        },
    }
}

pub async fn handle_event(app: &mut App, event: AppEvent) -> Result<()> {
    match event {
        AppEvent::Key(key) => handle_key(app, key).await?,
        AppEvent::Mouse(mouse) => handle_mouse(app, mouse),
        AppEvent::Resize(_, _) => {}
        AppEvent::Tick => {
            app.tick_animation();
        }
        AppEvent::Exchange(completion) => app.apply_completion(completion),
    }
    Ok(())
}

async fn handle_key(app: &mut App, key: KeyEvent) -> Result<()> {
    let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);

    match key.code {
        // Global keys
        KeyCode::Char('c') | KeyCode::Char('q') if ctrl => app.should_quit = true,
        KeyCode::Char('r') if ctrl => reset(app),

        KeyCode::Enter
            if key.modifiers.contains(KeyModifiers::ALT)
                || key.modifiers.contains(KeyModifiers::SHIFT) =>
        {
            app.chat_mut().composer.newline();
        }
        KeyCode::Enter => submit(app).await?,

        // Chat scrolling
        KeyCode::PageUp => {
            let half = app.chat().half_page();
            app.chat_mut().scroll_up(half);
        }
        KeyCode::PageDown => {
            let half = app.chat().half_page();
            app.chat_mut().scroll_down(half);
        }
        KeyCode::Up => app.chat_mut().scroll_up(1),
        KeyCode::Down => app.chat_mut().scroll_down(1),

        // Composer editing
        KeyCode::Backspace => app.chat_mut().composer.backspace(),
        KeyCode::Delete => app.chat_mut().composer.delete(),
        KeyCode::Left => app.chat_mut().composer.left(),
        KeyCode::Right => app.chat_mut().composer.right(),
        KeyCode::Home => app.chat_mut().composer.home(),
        KeyCode::End => app.chat_mut().composer.end(),
        KeyCode::Char(c) if !ctrl => app.chat_mut().composer.insert(c),
        _ => {}
    }

    Ok(())
}

async fn submit(app: &mut App) -> Result<()> {
    let input = app.chat().composer.text.clone();

    match parse_command(&input) {
        Command::Message(text) => {
            // Blank input is a no-op and leaves the composer alone
            app.client.submit_text(&text);
        }
        Command::Upload(kind, path) => {
            app.chat_mut().composer.clear();
            upload(app, kind, path).await;
        }
        Command::Reset => {
            app.chat_mut().composer.clear();
            reset(app);
        }
        Command::Quit => app.should_quit = true,
        Command::Unknown(name) => {
            app.set_notice(format!(
                "Unknown command /{} (try /image, /csv, /reset, /quit, or // to send a /)",
                name
            ));
        }
    }
    Ok(())
}

fn reset(app: &mut App) {
    app.client.reset();
    app.set_notice("Conversation reset");
}

/// Pick a file and hand it to the exchange client. A file that can't be
/// read counts as no file picked.
async fn upload(app: &mut App, kind: UploadKind, path: Option<PathBuf>) {
    let Some(path) = path else {
        app.set_notice(format!("No {} selected", kind.display_name().to_lowercase()));
        return;
    };

    app.chat_mut().selection = Some(FileSelection {
        kind,
        path: path.clone(),
    });

    let file = match SelectedFile::read(&path).await {
        Ok(file) => {
            if !kind.accepts(&file.name) {
                app.set_notice(format!(
                    "{} may not be accepted as a {}",
                    file.name,
                    kind.display_name().to_lowercase()
                ));
            }
            Some(file)
        }
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "could not read picked file");
            app.set_notice(format!("Could not read {}: {}", path.display(), e));
            app.chat_mut().selection = None;
            None
        }
    };

    match kind {
        UploadKind::Image => app.client.submit_image(file),
        UploadKind::Csv => app.client.submit_csv(file),
    };
}

fn handle_mouse(app: &mut App, mouse: MouseEvent) {
    match mouse.kind {
        MouseEventKind::ScrollDown => app.chat_mut().scroll_down(3),
        MouseEventKind::ScrollUp => app.chat_mut().scroll_up(3),
        _ => {}
    }
}
