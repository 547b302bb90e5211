//! Console mode
//!
//! Interactive REPL standing in for the status popup and the settings page.
//! Commands go through the coordinator service like any other surface;
//! `/show` reads the settings record the way the settings page does.
//! Failures are printed and never end the session.

use std::sync::Arc;

use ac_coordinator::surface::{self, PopupView, DEFAULTS_RESTORED};
use ac_coordinator::{Coordinator, CoordinatorHandle};
use ac_core::{EditableSettings, Request, Response};
use nu_ansi_term::{Color, Style};
use reedline::{
    ColumnarMenu, Completer, DefaultHinter, Emacs, KeyCode, KeyModifiers, Keybindings, MenuBuilder,
    Prompt, Reedline, ReedlineEvent, ReedlineMenu, Signal, Suggestion,
};
use tracing::info;

/// Available commands for autocomplete display
const COMMANDS: &[(&str, &str)] = &[
    ("/status", "Status of a page: /status <url>"),
    ("/toggle", "Flip the master switch"),
    ("/global", "Master switch: /global on|off"),
    ("/dry-run", "Simulate activations: /dry-run on|off"),
    ("/site", "Per-site switch: /site <url> on|off"),
    ("/show", "Print the stored settings"),
    ("/save", "Save editable settings: /save <json>"),
    ("/reset", "Restore default settings"),
    ("/help", "Show this help"),
    ("/exit", "Leave the console"),
];

/// A parsed console line
#[derive(Debug, Clone, PartialEq)]
enum Command {
    Status(String),
    Toggle,
    Global(bool),
    DryRun(bool),
    Site { url: String, enabled: bool },
    Show,
    Save(String),
    Reset,
    Help,
    Exit,
}

impl Command {
    fn parse(input: &str) -> Result<Self, String> {
        let (head, rest) = match input.split_once(char::is_whitespace) {
            Some((head, rest)) => (head, rest.trim()),
            None => (input, ""),
        };

        match head.to_lowercase().as_str() {
            "/status" if !rest.is_empty() => Ok(Self::Status(rest.to_string())),
            "/status" => Err("usage: /status <url>".to_string()),
            "/toggle" => Ok(Self::Toggle),
            "/global" => parse_switch(rest)
                .map(Self::Global)
                .ok_or_else(|| "usage: /global on|off".to_string()),
            "/dry-run" => parse_switch(rest)
                .map(Self::DryRun)
                .ok_or_else(|| "usage: /dry-run on|off".to_string()),
            "/site" => {
                let mut words = rest.split_whitespace();
                match (words.next(), words.next().and_then(parse_switch), words.next()) {
                    (Some(url), Some(enabled), None) => Ok(Self::Site {
                        url: url.to_string(),
                        enabled,
                    }),
                    _ => Err("usage: /site <url> on|off".to_string()),
                }
            }
            "/show" => Ok(Self::Show),
            "/save" if !rest.is_empty() => Ok(Self::Save(rest.to_string())),
            "/save" => Err("usage: /save <json>".to_string()),
            "/reset" => Ok(Self::Reset),
            "/help" | "/?" => Ok(Self::Help),
            "/exit" | "/quit" | "/q" => Ok(Self::Exit),
            _ => Err(format!("Unknown command: {}. Type /help for the list.", input)),
        }
    }
}

fn parse_switch(value: &str) -> Option<bool> {
    match value.trim().to_lowercase().as_str() {
        "on" | "true" | "1" => Some(true),
        "off" | "false" | "0" => Some(false),
        _ => None,
    }
}

/// Command completer for reedline
#[derive(Clone)]
pub struct CommandCompleter {
    commands: Vec<(&'static str, &'static str)>,
}

impl CommandCompleter {
    pub fn new() -> Self {
        Self {
            commands: COMMANDS.to_vec(),
        }
    }
}

impl Default for CommandCompleter {
    fn default() -> Self {
        Self::new()
    }
}

impl Completer for CommandCompleter {
    fn complete(&mut self, line: &str, pos: usize) -> Vec<Suggestion> {
        if !line.starts_with('/') {
            return Vec::new();
        }

        self.commands
            .iter()
            .filter(|(cmd, _)| cmd.starts_with(line))
            .map(|(cmd, desc)| Suggestion {
                value: cmd.to_string(),
                description: Some(desc.to_string()),
                extra: None,
                span: reedline::Span::new(0, pos),
                append_whitespace: true,
                style: None,
            })
            .collect()
    }
}

struct ColoredPrompt {
    style: Style,
}

impl ColoredPrompt {
    fn new() -> Self {
        Self {
            style: Color::Cyan.bold(),
        }
    }
}

impl Prompt for ColoredPrompt {
    fn render_prompt_left(&self) -> std::borrow::Cow<'_, str> {
        std::borrow::Cow::Owned(self.style.paint("autoclick> ").to_string())
    }

    fn render_prompt_right(&self) -> std::borrow::Cow<'_, str> {
        std::borrow::Cow::Borrowed("")
    }

    fn render_prompt_indicator(&self, _prompt_mode: reedline::PromptEditMode) -> std::borrow::Cow<'_, str> {
        std::borrow::Cow::Borrowed("")
    }

    fn render_prompt_multiline_indicator(&self) -> std::borrow::Cow<'_, str> {
        std::borrow::Cow::Borrowed("")
    }

    fn render_prompt_history_search_indicator(
        &self,
        _history_search: reedline::PromptHistorySearch,
    ) -> std::borrow::Cow<'_, str> {
        std::borrow::Cow::Borrowed("")
    }
}

/// Run the interactive console until /exit or Ctrl+D.
pub async fn run_console(coordinator: Arc<Coordinator>, handle: CoordinatorHandle) -> anyhow::Result<()> {
    info!("Starting console mode");
    print_welcome();

    let mut keybindings = default_keybindings();
    keybindings.add_binding(
        KeyModifiers::NONE,
        KeyCode::Char('/'),
        ReedlineEvent::Edit(vec![reedline::EditCommand::Complete]),
    );

    let menu = Box::new(
        ColumnarMenu::default()
            .with_name("command_menu")
            .with_columns(1)
            .with_column_width(Some(48))
            .with_only_buffer_difference(false),
    );
    let hinter = DefaultHinter::default().with_style(Style::new().dimmed());

    let mut line_editor = Reedline::create()
        .with_completer(Box::new(CommandCompleter::new()))
        .with_menu(ReedlineMenu::EngineCompleter(menu))
        .with_hinter(Box::new(hinter))
        .with_edit_mode(Box::new(Emacs::new(keybindings)));
    let prompt = ColoredPrompt::new();

    loop {
        // reedline blocks the thread while waiting for input.
        let signal = tokio::task::block_in_place(|| line_editor.read_line(&prompt));

        match signal {
            Ok(Signal::Success(line)) => {
                let input = line.trim();
                if input.is_empty() {
                    continue;
                }
                match Command::parse(input) {
                    Ok(Command::Exit) => break,
                    Ok(command) => execute(&coordinator, &handle, command).await,
                    Err(message) => eprintln!("{}", message),
                }
            }
            Ok(Signal::CtrlC) => {
                println!("^C");
                continue;
            }
            Ok(Signal::CtrlD) => break,
            Err(err) => {
                eprintln!("Error: {}", err);
                break;
            }
        }
    }

    println!("Bye.");
    Ok(())
}

fn default_keybindings() -> Keybindings {
    let mut keybindings = Keybindings::new();
    keybindings.add_binding(
        KeyModifiers::NONE,
        KeyCode::Tab,
        ReedlineEvent::Edit(vec![reedline::EditCommand::Complete]),
    );
    keybindings.add_binding(KeyModifiers::NONE, KeyCode::Enter, ReedlineEvent::Submit);
    keybindings.add_binding(KeyModifiers::NONE, KeyCode::Esc, ReedlineEvent::Esc);
    keybindings.add_binding(KeyModifiers::CONTROL, KeyCode::Char('c'), ReedlineEvent::CtrlC);
    keybindings.add_binding(KeyModifiers::CONTROL, KeyCode::Char('d'), ReedlineEvent::CtrlD);
    keybindings.add_binding(KeyModifiers::NONE, KeyCode::Up, ReedlineEvent::Up);
    keybindings.add_binding(KeyModifiers::NONE, KeyCode::Down, ReedlineEvent::Down);
    keybindings
}

async fn execute(coordinator: &Coordinator, handle: &CoordinatorHandle, command: Command) {
    let text = match command {
        Command::Status(url) => status_view(handle, &url).await,
        Command::Toggle => reply_text(handle.request(Request::ToggleGlobal).await, "global_enabled"),
        Command::Global(enabled) => {
            reply_text(handle.request(Request::SetGlobalEnabled { enabled }).await, "global_enabled")
        }
        Command::DryRun(enabled) => {
            reply_text(handle.request(Request::SetDryRun { enabled }).await, "dry_run")
        }
        Command::Site { url, enabled } => reply_text(
            handle
                .request(Request::SetSiteEnabled { origin: url, enabled })
                .await,
            "site_overrides",
        ),
        Command::Show => match coordinator.settings().await {
            Ok(settings) => serde_json::to_string_pretty(&settings).unwrap_or_else(|e| e.to_string()),
            Err(e) => format!("Error: {}", e),
        },
        Command::Save(raw) => save(handle, &raw).await,
        Command::Reset => match handle.request(Request::ResetDefaults).await {
            Ok(response) => message_of(&response, DEFAULTS_RESTORED),
            Err(e) => surface::reset_failed_text(&e),
        },
        Command::Help => help_text(),
        Command::Exit => return,
    };
    println!("{}", text);
}

/// The popup for one page
async fn status_view(handle: &CoordinatorHandle, url: &str) -> String {
    let response = handle
        .request(Request::GetTabStatus { url: url.to_string() })
        .await
        .unwrap_or_else(|e| Response::failure(e.code()));
    let view = PopupView::build(url, &response);

    let mut lines = vec![view.status, view.site, view.last_action];
    lines.push(format!("Global: {}", on_off(view.global_enabled)));
    lines.push(format!("Dry-run: {}", on_off(view.dry_run)));
    if view.site_switch_available {
        lines.push(format!("This site: {}", on_off(view.site_enabled)));
    }
    lines.join("\n")
}

async fn save(handle: &CoordinatorHandle, raw: &str) -> String {
    let settings: EditableSettings = match serde_json::from_str(raw) {
        Ok(settings) => settings,
        Err(e) => return format!("Save failed: {}", e),
    };
    match handle.request(Request::SaveSettings { settings }).await {
        Ok(response) => message_of(&response, "Saved."),
        Err(e) => surface::save_failed_text(&e),
    }
}

/// The coordinator's own feedback line for save and reset.
fn message_of(response: &Response, fallback: &str) -> String {
    response
        .get("message")
        .and_then(|m| m.as_str())
        .unwrap_or(fallback)
        .to_string()
}

fn reply_text(reply: ac_coordinator::Result<Response>, field: &str) -> String {
    match reply {
        Ok(response) if response.ok => match response.get(field) {
            Some(value) => format!("{}: {}", field, value),
            None => "ok".to_string(),
        },
        Ok(response) => format!("Error: {}", response.error.unwrap_or_default()),
        Err(e) => format!("Error: {}", e),
    }
}

fn on_off(value: bool) -> &'static str {
    if value { "on" } else { "off" }
}

fn print_welcome() {
    println!();
    println!("autoclick console");
    println!("Type / for command suggestions, /help for the list, /exit to leave.");
    println!();
}

fn help_text() -> String {
    let mut text = String::from("Available commands:\n");
    for (cmd, desc) in COMMANDS {
        text.push_str(&format!("  {:<10} {}\n", cmd, desc));
    }
    text
}

#[cfg(test)]
mod tests {
    use super::*;
    use ac_core::MemoryStore;

    #[test]
    fn test_parse_commands() {
        assert_eq!(Command::parse("/toggle"), Ok(Command::Toggle));
        assert_eq!(Command::parse("/GLOBAL on"), Ok(Command::Global(true)));
        assert_eq!(Command::parse("/dry-run off"), Ok(Command::DryRun(false)));
        assert_eq!(
            Command::parse("/status https://example.com/a"),
            Ok(Command::Status("https://example.com/a".to_string()))
        );
        assert_eq!(
            Command::parse("/site https://example.com off"),
            Ok(Command::Site {
                url: "https://example.com".to_string(),
                enabled: false,
            })
        );
        assert_eq!(Command::parse("/q"), Ok(Command::Exit));
    }

    #[test]
    fn test_parse_rejects_bad_usage() {
        assert!(Command::parse("/status").is_err());
        assert!(Command::parse("/global maybe").is_err());
        assert!(Command::parse("/site https://example.com").is_err());
        assert!(Command::parse("/site a on extra").is_err());
        assert!(Command::parse("/launch").is_err());
    }

    #[test]
    fn test_completer_filters_by_prefix() {
        let mut completer = CommandCompleter::new();
        let values: Vec<_> = completer.complete("/s", 2).into_iter().map(|s| s.value).collect();
        assert_eq!(values, vec!["/status", "/site", "/show", "/save"]);
        assert!(completer.complete("status", 6).is_empty());
    }

    #[tokio::test]
    async fn test_status_view_for_unsupported_page() {
        let coordinator = Arc::new(Coordinator::new(Arc::new(MemoryStore::new())));
        let (handle, _task) = ac_coordinator::spawn(coordinator.clone());

        let text = status_view(&handle, "about:blank").await;
        assert!(text.starts_with("Not active: disabled for this site."));
        assert!(text.contains("Site: unsupported page"));
        assert!(!text.contains("This site:"));
    }

    #[tokio::test]
    async fn test_status_view_shows_reported_activation() {
        let coordinator = Arc::new(Coordinator::new(Arc::new(MemoryStore::new())));
        let (handle, _task) = ac_coordinator::spawn(coordinator);

        let text = status_view(&handle, "https://example.com/form").await;
        assert!(text.contains("Last action: none"));
        assert!(text.contains("This site: on"));

        handle
            .request(Request::ReportClick {
                origin: "https://example.com".to_string(),
                label: None,
                at: None,
                dry_run: true,
            })
            .await
            .unwrap();
        let text = status_view(&handle, "https://example.com/other").await;
        assert!(text.contains("Last action: "));
        assert!(text.contains("(dry-run)"));
        assert!(!text.contains("Last action: none"));
    }

    #[tokio::test]
    async fn test_reset_prints_coordinator_message() {
        let coordinator = Arc::new(Coordinator::new(Arc::new(MemoryStore::new())));
        let (handle, _task) = ac_coordinator::spawn(coordinator);

        let response = handle.request(Request::ResetDefaults).await.unwrap();
        assert_eq!(message_of(&response, "unused"), DEFAULTS_RESTORED);
        assert!(save(&handle, "{not json").await.starts_with("Save failed: "));
    }

    #[tokio::test]
    async fn test_reply_text_reports_failure_code() {
        let coordinator = Arc::new(Coordinator::new(Arc::new(MemoryStore::new())));
        let (handle, _task) = ac_coordinator::spawn(coordinator);

        let reply = handle
            .request(Request::SetSiteEnabled {
                origin: "not a url".to_string(),
                enabled: true,
            })
            .await;
        assert_eq!(reply_text(reply, "site_overrides"), "Error: invalid_origin");

        let reply = handle.request(Request::SetDryRun { enabled: true }).await;
        assert_eq!(reply_text(reply, "dry_run"), "dry_run: true");
    }
}
