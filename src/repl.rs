use crate::picker;
use crate::render::{format_reply, truncate, BOLD, CYAN, GOLD, GRAY, LIME, PINK, RED, RESET};
use crate::spinner::Spinner;
use anyhow::Result;
use relay_core::agent_loop::{AgentLoop, LoopOutcome};
use relay_core::config::AppConfig;
use relay_core::persona;
use relay_core::picker::{main_menu, persona_menu};
use relay_core::provider::{HttpChatEndpoint, ModelInfo};
use relay_core::registry::{Registry, RegistryStore};
use relay_core::resolver::{resolve, MetaDirective, Registration, Resolution, META_DIRECTIVES};
use relay_core::session::SessionState;
use relay_core::transcript::Transcript;
use relay_core::types::AgentEvent;
use relay_tools::{list_remote_models, swap_model, RemoteToolClient};
use rustyline::error::ReadlineError;
use rustyline::{Config as RlConfig, DefaultEditor};
use std::io::Write;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::debug;

const CLEAR_SCREEN: &str = "\x1b[2J\x1b[H";

const BANNER: &str = r#"
  ┌─────────────────────────────────────┐
  │  relay-shell                        │
  │  remote model, remote tools, yours  │
  └─────────────────────────────────────┘"#;

enum Flow {
    Continue,
    Exit,
}

/// One operator session: registries, conversation and the two endpoints.
pub struct Shell {
    config: AppConfig,
    registry: Registry,
    session: SessionState,
    chat: Arc<HttpChatEndpoint>,
    tools: Arc<RemoteToolClient>,
    agent: AgentLoop,
}

impl Shell {
    pub fn new(config: AppConfig, token: String) -> Result<Self> {
        let registry_dir = config.registry_dir();
        let registry = Registry::load(RegistryStore::new(&registry_dir));
        let chat = Arc::new(HttpChatEndpoint::from_config(&config.endpoint, Some(token.clone()))?);
        let tools = Arc::new(RemoteToolClient::from_config(&config.endpoint, Some(token))?);
        let agent = AgentLoop::new(chat.clone(), tools.clone())
            .with_transcript(Transcript::in_dir(&registry_dir))
            .with_tools_enabled(config.agent.tools_enabled);
        let session = SessionState::new(config.endpoint.model.clone(), config.system_prompt.clone());

        tracing::info!(
            "Loaded {} commands, {} tools, {} personas; model {} at {}",
            registry.commands().len(),
            registry.tools().len(),
            registry.personas().len(),
            session.model,
            chat.api_base(),
        );

        Ok(Self {
            config,
            registry,
            session,
            chat,
            tools,
            agent,
        })
    }

    /// Run the agentic loop for one message while rendering its progress.
    pub async fn ask(&mut self, text: &str) -> LoopOutcome {
        let (tx, rx) = mpsc::unbounded_channel();
        let model = self.session.model.clone();
        let run = self.agent.run(
            &model,
            self.session.conversation_mut(),
            text,
            self.registry.tools(),
            tx,
        );
        let (outcome, ()) = tokio::join!(run, print_events(rx));

        println!("{}", outcome_text(&outcome, !self.config.agent.tools_enabled));
        outcome
    }

    fn print_banner(&self) {
        println!("{BANNER}");
        println!(
            "\n  {GRAY}server:{RESET} {CYAN}{}{RESET}   {GRAY}model:{RESET} {LIME}{}{RESET}",
            self.config.endpoint.server, self.session.model
        );
        if let Some(active) = self.session.persona() {
            println!("  {GRAY}persona:{RESET} {GOLD}{}{RESET}", active.name);
        }
        let yours: Vec<String> = self
            .registry
            .commands()
            .keys()
            .chain(self.registry.tools().keys())
            .map(|k| format!("{LIME}/{k}{RESET}"))
            .chain(self.registry.personas().keys().map(|k| format!("{GOLD}{k}{RESET}")))
            .collect();
        if !yours.is_empty() {
            println!("  {GRAY}yours:{RESET}  {}", yours.join("  "));
        }
        println!("  {GRAY}meta:{RESET}   /  (menu)  /run  /addcmd  /addtool  /addspecialty  /spesh  /help  exit\n");
    }

    fn print_list(&self) {
        println!();
        for (name, body) in self.registry.commands() {
            println!("  {LIME}/{name:<18}{RESET}  {GRAY}cmd →{RESET}  {body}");
        }
        for (name, spec) in self.registry.tools() {
            println!("  {CYAN}/{name:<18}{RESET}  {GRAY}tool →{RESET}  {}", spec.description);
        }
        let active = self.session.persona().map(|p| p.name.as_str());
        for (name, text) in self.registry.personas() {
            let tag = if active == Some(name.as_str()) {
                format!(" {GOLD}← active{RESET}")
            } else {
                String::new()
            };
            println!("  {GOLD}{name:<19}{RESET}  {GRAY}persona →{RESET}  {}{tag}", truncate(text, 50));
        }
        if self.registry.is_empty() {
            println!("  {GRAY}nothing registered yet{RESET}");
        }
        println!();
    }

    fn print_help(&self) {
        println!();
        for (name, description) in META_DIRECTIVES {
            println!("  {LIME}/{name:<14}{RESET}  {GRAY}{description}{RESET}");
        }
        println!("\n  {GRAY}anything else is sent to the model{RESET}\n");
    }

    fn register(&mut self, registration: Registration) {
        let result = match &registration {
            Registration::Command { name, expansion } => self
                .registry
                .add_command(name, expansion)
                .map(|n| format!("{LIME}✓  /{n}{RESET}  →  {expansion}")),
            Registration::Tool {
                name,
                description,
                template,
            } => self
                .registry
                .add_tool(name, description, template)
                .map(|n| format!("{LIME}✓  tool /{n}{RESET}  →  {description}  {GRAY}[{template}]{RESET}")),
            Registration::Persona { name, instruction } => self
                .registry
                .add_persona(name, instruction)
                .map(|n| format!("{LIME}✓  persona:{RESET} {GOLD}{n}{RESET}  →  {}", truncate(instruction, 60))),
        };
        match result {
            Ok(message) => println!("\n  {message}  {GRAY}(saved){RESET}\n"),
            Err(e) => println!("\n  {RED}✗  {e}{RESET}\n"),
        }
    }

    fn activate_persona(&mut self, name: &str) {
        let (active, found) = persona::activate(name, self.registry.personas());
        if !found {
            println!("\n  {RED}persona '{name}' not found{RESET}");
            if !self.registry.personas().is_empty() {
                let names: Vec<&str> = self.registry.personas().keys().map(String::as_str).collect();
                println!("  {GRAY}available: {}{RESET}", names.join(", "));
            }
            println!();
            return;
        }
        match &active {
            Some(p) => println!("\n  {LIME}✓  persona active:{RESET} {GOLD}{}{RESET}\n", p.name),
            None => println!("\n  {GRAY}persona deactivated{RESET}\n"),
        }
        self.session.set_persona(active);
    }

    async fn show_models(&self) {
        println!("\n  {GOLD}fetching models...{RESET}\n");
        match self.chat.list_models().await {
            Ok(models) if models.is_empty() => println!("  {GRAY}no models found{RESET}\n"),
            Ok(models) => {
                for line in model_table(&models, &self.session.model) {
                    println!("{line}");
                }
                println!();
            }
            Err(e) => println!("  {RED}✗  {e}{RESET}\n"),
        }
    }

    async fn run_model(&mut self, model: &str) {
        let spinner = Spinner::start(format!("loading {model}"));
        let result = swap_model(&*self.tools, &self.config.agent.model_swap_command, model).await;
        spinner.stop();
        match result {
            Ok(output) => {
                self.session.model = model.trim().to_string();
                if !output.trim().is_empty() {
                    println!("\n{GRAY}{}{RESET}", output.trim_end());
                }
                println!("\n  {LIME}✓  model:{RESET} {}\n", self.session.model);
            }
            Err(e) => println!("\n  {RED}✗  {e}{RESET}\n"),
        }
    }

    async fn handle_line(&mut self, line: &str) -> Result<Flow> {
        let mut line = line.to_string();
        loop {
            let resolution = resolve(&line, &self.registry, self.config.resolver.fuzzy_threshold);
            debug!("Resolved {:?} as {:?}", line, resolution);
            match resolution {
                Resolution::Picker => {
                    match picker::pick("relay commands", main_menu(&self.registry))? {
                        Some(option) => {
                            line = option.directive();
                            println!("  {GRAY}▶{RESET}  {line}\n");
                            continue;
                        }
                        None => return Ok(Flow::Continue),
                    }
                }
                Resolution::Meta(MetaDirective::Persona(None)) => {
                    if let Some(option) = picker::pick("choose persona", persona_menu(&self.registry))? {
                        self.activate_persona(&option.name);
                    }
                }
                Resolution::Meta(MetaDirective::Persona(Some(name))) => self.activate_persona(&name),
                Resolution::Meta(MetaDirective::Exit) => return Ok(Flow::Exit),
                Resolution::Meta(MetaDirective::Clear) => {
                    print!("{CLEAR_SCREEN}");
                    self.print_banner();
                }
                Resolution::Meta(MetaDirective::List) => self.print_list(),
                Resolution::Meta(MetaDirective::Help) => self.print_help(),
                Resolution::Meta(MetaDirective::Models) => self.show_models().await,
                Resolution::Meta(MetaDirective::RunModel(model)) => self.run_model(&model).await,
                Resolution::Register(registration) => self.register(registration),
                Resolution::Usage(kind) => println!("\n  {RED}usage:{RESET}  {}\n", kind.usage()),
                Resolution::Suggest(Some(suggestion)) => println!(
                    "\n  {GRAY}did you mean:{RESET}  {LIME}{}{RESET} ?\n",
                    suggestion.directive()
                ),
                Resolution::Suggest(None) => {
                    println!("\n  {GRAY}no match for{RESET} {line}  {GRAY}(type / for the menu){RESET}\n")
                }
                Resolution::Expand { name, text } => {
                    debug!("Expanded /{} to {:?}", name, text);
                    self.ask(&text).await;
                }
                Resolution::PassThrough(text) => {
                    self.ask(&text).await;
                }
            }
            return Ok(Flow::Continue);
        }
    }

    fn prompt(&self) -> String {
        let label = self
            .session
            .persona()
            .map(|p| format!("{GOLD}[{}]{RESET} ", p.name))
            .unwrap_or_default();
        format!("{label}{PINK}{BOLD}relay{RESET}{GRAY} ›{RESET} ")
    }
}

fn model_table(models: &[ModelInfo], current: &str) -> Vec<String> {
    let col_id = models.iter().map(|m| m.id.chars().count()).max().unwrap_or(0) + 2;
    let col_q = 12;
    let mut lines = vec![
        format!("  {GRAY}{:<col_id$} {:<col_q$} {:>7}   STATUS{RESET}", "MODEL", "QUANT", "SIZE"),
        format!(
            "  {GRAY}{} {} {}   {}{RESET}",
            "─".repeat(col_id),
            "─".repeat(col_q),
            "─".repeat(7),
            "─".repeat(10)
        ),
    ];
    for m in models {
        let quant = m.quant.as_deref().unwrap_or("-");
        let size = m.size_gb.map(|s| format!("{s}GB")).unwrap_or_else(|| "-".into());
        let status = if m.active {
            format!("{LIME}◉ active{RESET}")
        } else {
            format!("{GRAY}· idle{RESET}")
        };
        let current_mark = if m.id == current {
            format!("{GOLD} ← current{RESET}")
        } else {
            String::new()
        };
        lines.push(format!(
            "  {CYAN}{:<col_id$}{RESET} {:<col_q$} {:>7}   {status}{current_mark}",
            m.id, quant, size
        ));
    }
    lines
}

/// What to print once the loop has finished. A streamed reply is already on
/// screen; an empty one counts as no response.
fn outcome_text(outcome: &LoopOutcome, streamed: bool) -> String {
    match outcome {
        LoopOutcome::Failed(message) => format!("\n{RED}  {message}{RESET}\n{RED}  no response{RESET}\n"),
        LoopOutcome::Completed(text) if text.is_empty() => format!("\n{RED}  no response{RESET}\n"),
        LoopOutcome::Completed(_) if streamed => String::new(),
        _ => outcome
            .reply()
            .map(|reply| format!("\n{}\n", format_reply(reply)))
            .unwrap_or_default(),
    }
}

/// Render loop events while the loop runs. Returns once the loop drops its
/// sender.
async fn print_events(mut rx: mpsc::UnboundedReceiver<AgentEvent>) {
    let mut spinner: Option<Spinner> = None;
    let mut streaming = false;
    let stop = |spinner: &mut Option<Spinner>| {
        if let Some(s) = spinner.take() {
            s.stop();
        }
    };

    while let Some(event) = rx.recv().await {
        match event {
            AgentEvent::RoundStarted { round, model } => {
                let label = if round == 1 {
                    format!("{model} ...")
                } else {
                    format!("{model} round {round} ...")
                };
                spinner = Some(Spinner::start(label));
            }
            AgentEvent::ResponseReceived { .. } => stop(&mut spinner),
            AgentEvent::ContentChunk(text) => {
                stop(&mut spinner);
                if !streaming {
                    print!("\n{CYAN}");
                    streaming = true;
                }
                print!("{text}");
                let _ = std::io::stdout().flush();
            }
            AgentEvent::ToolCallStart { name, arguments, .. } => {
                println!("\n  {GOLD}⚙{RESET}  {CYAN}{name}{RESET}  {GRAY}{}{RESET}", truncate(&arguments.to_string(), 80));
                spinner = Some(Spinner::start(name));
            }
            AgentEvent::ToolResult(output) => {
                stop(&mut spinner);
                let color = if output.is_error { RED } else { LIME };
                println!("  {color}↩  {}{RESET}", truncate(&output.content, 140));
            }
            AgentEvent::Done(_) | AgentEvent::Error(_) => {
                stop(&mut spinner);
                if streaming {
                    print!("{RESET}");
                    streaming = false;
                }
            }
        }
    }
    stop(&mut spinner);
}

/// Interactive session.
pub async fn run(config: AppConfig, token: String) -> Result<()> {
    let mut shell = Shell::new(config, token)?;
    shell.print_banner();

    let rl_config = RlConfig::builder().auto_add_history(true).build();
    let history_path = AppConfig::data_dir().join("repl_history.txt");
    let mut rl = DefaultEditor::with_config(rl_config)?;
    let _ = rl.load_history(&history_path);

    loop {
        match rl.readline(&shell.prompt()) {
            Ok(line) => {
                let input = line.trim();
                if input.is_empty() {
                    continue;
                }
                if let Flow::Exit = shell.handle_line(input).await? {
                    break;
                }
            }
            Err(ReadlineError::Interrupted) => {
                println!("^C");
                continue;
            }
            Err(ReadlineError::Eof) => break,
            Err(e) => {
                eprintln!("Input error: {}", e);
                break;
            }
        }
    }
    println!("\n{GRAY}  relay out{RESET}\n");

    if let Some(parent) = history_path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let _ = rl.save_history(&history_path);

    Ok(())
}

/// Answer a single query against a fresh conversation.
pub async fn one_shot(config: AppConfig, token: String, query: &str) -> Result<()> {
    let mut shell = Shell::new(config, token)?;
    if let LoopOutcome::Failed(_) = shell.ask(query).await {
        anyhow::bail!("no response from {}", shell.chat.api_base());
    }
    Ok(())
}

/// Print the server's model listing.
pub async fn list(config: AppConfig, token: String) -> Result<()> {
    println!("\n  {GRAY}fetching models...{RESET}");
    let tools = RemoteToolClient::from_config(&config.endpoint, Some(token))?;
    let output = list_remote_models(&tools, &config.agent.model_swap_command).await?;
    println!("{output}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn model(id: &str, active: bool) -> ModelInfo {
        ModelInfo {
            id: id.into(),
            quant: Some("Q4_K_M".into()),
            size_gb: Some(4.5),
            active,
        }
    }

    #[test]
    fn test_model_table_marks_current_and_active() {
        let lines = model_table(&[model("small", true), model("large-model", false)], "large-model");
        assert_eq!(lines.len(), 4);
        assert!(lines[2].contains("◉ active"));
        assert!(!lines[2].contains("current"));
        assert!(lines[3].contains("← current"));
        assert!(lines[3].contains("4.5GB"));
    }

    #[test]
    fn test_empty_reply_reports_no_response() {
        assert!(outcome_text(&LoopOutcome::Completed(String::new()), false).contains("no response"));
        assert!(outcome_text(&LoopOutcome::Completed(String::new()), true).contains("no response"));
        assert!(outcome_text(&LoopOutcome::Failed("cannot reach x".into()), false).contains("no response"));
    }

    #[test]
    fn test_reply_printed_unless_streamed() {
        let done = LoopOutcome::Completed("all good".into());
        assert!(outcome_text(&done, false).contains("all good"));
        assert_eq!(outcome_text(&done, true), "");
        assert!(outcome_text(&LoopOutcome::MaxRounds, true).contains("max rounds reached"));
    }

    #[test]
    fn test_model_table_missing_fields() {
        let bare = ModelInfo {
            id: "x".into(),
            quant: None,
            size_gb: None,
            active: false,
        };
        let lines = model_table(&[bare], "y");
        assert!(lines[2].contains("· idle"));
    }
}
