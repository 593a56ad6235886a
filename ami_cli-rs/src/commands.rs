//! Command processing and execution for ami_cli-rs

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use anyhow::Result;
use asterisk_ami_tokio::{AmiClient, Originate, DND_FAMILY, DND_VALUE};
use colored::*;
use rustyline::DefaultEditor;

/// Channel of the last caller seen ringing, shared with the event display
pub type CallerSlot = Arc<Mutex<Option<String>>>;

/// How long an originated call may ring before Asterisk gives up
const ORIGINATE_TIMEOUT: Duration = Duration::from_millis(30000);

/// A parsed input line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CliCommand {
    Call {
        from: String,
        to: String,
        internal: bool,
    },
    /// `call` without both numbers
    CallUsage,
    Hangup {
        channel: Option<String>,
    },
    DndStatus(String),
    DndOn(String),
    DndOff(String),
    DndUsage,
    Ping,
    Version,
    /// Anything else is an Asterisk CLI command
    Raw(String),
}

impl CliCommand {
    pub fn parse(line: &str) -> Self {
        let parts: Vec<&str> = line
            .split_whitespace()
            .collect();
        let Some(first) = parts.first() else {
            return CliCommand::Raw(String::new());
        };

        match first
            .to_lowercase()
            .as_str()
        {
            "call" => {
                let internal = parts
                    .iter()
                    .any(|p| *p == "--internal" || *p == "-i");
                let numbers: Vec<&str> = parts[1..]
                    .iter()
                    .copied()
                    .filter(|p| !p.starts_with('-'))
                    .collect();
                match numbers.as_slice() {
                    [from, to] => CliCommand::Call {
                        from: from.to_string(),
                        to: to.to_string(),
                        internal,
                    },
                    _ => CliCommand::CallUsage,
                }
            }
            "hangup" => CliCommand::Hangup {
                channel: parts
                    .get(1)
                    .map(|c| c.to_string()),
            },
            "dnd" => match &parts[1..] {
                [ext] => CliCommand::DndStatus(ext.to_string()),
                [mode, ext] if mode.eq_ignore_ascii_case("on") => {
                    CliCommand::DndOn(ext.to_string())
                }
                [mode, ext] if mode.eq_ignore_ascii_case("off") => {
                    CliCommand::DndOff(ext.to_string())
                }
                _ => CliCommand::DndUsage,
            },
            "ping" => CliCommand::Ping,
            "version" => CliCommand::Version,
            _ => CliCommand::Raw(
                line.trim()
                    .to_string(),
            ),
        }
    }
}

/// Dialplan context `call` sends the answered leg to
fn call_context(internal: bool) -> &'static str {
    if internal {
        "from-internal"
    } else {
        "from-trunk"
    }
}

fn originating_line(from: &str, to: &str, internal: bool) -> String {
    format!(
        "{} from {} to {} (context {})",
        "Originating call".green(),
        from,
        to,
        call_context(internal)
    )
}

/// Command processor for AMI CLI commands
pub struct CommandProcessor {
    /// Channel technology used for `call`, e.g. `SIP` or `PJSIP`
    tech: String,
    last_caller: CallerSlot,
}

impl CommandProcessor {
    pub fn new(tech: impl Into<String>, last_caller: CallerSlot) -> Self {
        Self {
            tech: tech.into(),
            last_caller,
        }
    }

    /// Build the `Originate` for `call <from> <to>`.
    ///
    /// Rings `<tech>/<to>` and, once answered, sends it to extension `<from>`.
    pub fn originate_for(&self, from: &str, to: &str, internal: bool) -> Originate {
        let context = call_context(internal);
        Originate::new(format!("{}/{}", self.tech, to))
            .caller_id(to)
            .dialplan(context, from, "1")
            .timeout(ORIGINATE_TIMEOUT)
            .run_async(true)
    }

    fn last_caller(&self) -> Option<String> {
        self.last_caller
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Execute one input line
    pub async fn execute_command(&self, client: &AmiClient, line: &str) -> Result<()> {
        match CliCommand::parse(line) {
            CliCommand::Call { from, to, internal } => {
                client
                    .originate(self.originate_for(&from, &to, internal))
                    .await?;
                println!("{}", originating_line(&from, &to, internal));
            }
            CliCommand::CallUsage => {
                println!("Fill 'call from' and 'call to' fields.");
                println!("Usage: call <from> <to> [--internal]");
            }
            CliCommand::Hangup { channel } => {
                let Some(channel) = channel.or_else(|| self.last_caller()) else {
                    println!("No ringing caller to hang up. Usage: hangup [channel]");
                    return Ok(());
                };
                client
                    .hangup(&channel)
                    .await?;
                println!("{} {}", "Hung up".green(), channel);
            }
            CliCommand::DndStatus(ext) => {
                let active = client
                    .db_get(DND_FAMILY, &ext)
                    .await?
                    .is_some();
                if active {
                    println!("{} is {}", ext, "active".yellow().bold());
                } else {
                    println!("{} is {}", ext, "inactive".green());
                }
            }
            CliCommand::DndOn(ext) => {
                client
                    .db_put(DND_FAMILY, &ext, DND_VALUE)
                    .await?;
                println!("DND enabled for {}", ext);
            }
            CliCommand::DndOff(ext) => {
                client
                    .db_del(DND_FAMILY, &ext)
                    .await?;
                println!("DND disabled for {}", ext);
            }
            CliCommand::DndUsage => println!("Usage: dnd [on|off] <extension>"),
            CliCommand::Ping => {
                client
                    .ping()
                    .await?;
                println!("Pong");
            }
            CliCommand::Version => {
                let version = client
                    .asterisk_version()
                    .await?;
                println!("Asterisk {} (AMI {})", version, client.protocol_version());
            }
            CliCommand::Raw(command) => {
                if command.is_empty() {
                    return Ok(());
                }
                let response = client
                    .command(&command)
                    .await?;
                let output = response.output_text();
                if !output
                    .trim()
                    .is_empty()
                {
                    println!("{}", output);
                } else if let Some(message) = response.message() {
                    println!("{}", message);
                }
            }
        }
        Ok(())
    }

    /// Show command history
    pub fn show_history(&self, rl: &DefaultEditor) {
        println!("{}", "Command History:".cyan().bold());

        let history = rl.history();
        for (i, entry) in history
            .iter()
            .enumerate()
            .collect::<Vec<_>>()
            .into_iter()
            .rev()
            .take(20)
        {
            println!("  {}: {}", (i + 1).to_string().dimmed(), entry);
        }
    }

    /// Show help information
    pub fn show_help(&self) {
        let help_text = r#"
Asterisk AMI CLI Commands:

Call Control:
  call <from> <to> [--internal]  - Ring <to>, then connect it to extension <from>
                                   (context from-internal with --internal, else from-trunk)
  hangup [channel]               - Hang up a channel, or the last ringing caller

Do Not Disturb:
  dnd <ext>                      - Show DND status
  dnd on <ext>                   - Enable DND
  dnd off <ext>                  - Disable DND

Basic Commands:
  ping                           - Check the manager connection
  version                        - Show Asterisk version
  help                           - Show this help

Function Key Shortcuts (type f1..f12):
  F1  = help                     F7  = pjsip show endpoints
  F2  = core show version        F8  = sip show peers
  F3  = core show channels       F9  = database show DND
  F4  = core show calls          F10 = queue show
  F5  = core show uptime         F11 = manager show connected
  F6  = dialplan reload          F12 = version

Built-in Commands:
  history                        - Show command history
  clear                          - Clear screen
  quit/exit/bye                  - Exit the CLI

Any other input is run as an Asterisk CLI command (e.g. 'core show channels').
"#;

        println!("{}", help_text.cyan());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_call() {
        assert_eq!(
            CliCommand::parse("call 100 200"),
            CliCommand::Call {
                from: "100".into(),
                to: "200".into(),
                internal: false
            }
        );
        assert_eq!(
            CliCommand::parse("call 100 --internal 200"),
            CliCommand::Call {
                from: "100".into(),
                to: "200".into(),
                internal: true
            }
        );
        assert_eq!(CliCommand::parse("call 100"), CliCommand::CallUsage);
        assert_eq!(CliCommand::parse("CALL"), CliCommand::CallUsage);
    }

    #[test]
    fn parse_hangup() {
        assert_eq!(
            CliCommand::parse("hangup"),
            CliCommand::Hangup { channel: None }
        );
        assert_eq!(
            CliCommand::parse("hangup SIP/200-00000003"),
            CliCommand::Hangup {
                channel: Some("SIP/200-00000003".into())
            }
        );
    }

    #[test]
    fn parse_dnd() {
        assert_eq!(
            CliCommand::parse("dnd 100"),
            CliCommand::DndStatus("100".into())
        );
        assert_eq!(
            CliCommand::parse("dnd ON 100"),
            CliCommand::DndOn("100".into())
        );
        assert_eq!(
            CliCommand::parse("dnd off 100"),
            CliCommand::DndOff("100".into())
        );
        assert_eq!(CliCommand::parse("dnd"), CliCommand::DndUsage);
        assert_eq!(CliCommand::parse("dnd maybe 100"), CliCommand::DndUsage);
    }

    #[test]
    fn everything_else_is_a_cli_command() {
        assert_eq!(
            CliCommand::parse("  core show channels "),
            CliCommand::Raw("core show channels".into())
        );
        assert_eq!(CliCommand::parse("ping"), CliCommand::Ping);
    }

    #[test]
    fn originate_for_trunk_and_internal() {
        let processor = CommandProcessor::new("SIP", Arc::new(Mutex::new(None)));

        let action = processor
            .originate_for("100", "200", false)
            .to_action()
            .unwrap();
        assert_eq!(action.get_header("Channel"), Some("SIP/200"));
        assert_eq!(action.get_header("CallerID"), Some("200"));
        assert_eq!(action.get_header("Context"), Some("from-trunk"));
        assert_eq!(action.get_header("Exten"), Some("100"));
        assert_eq!(action.get_header("Priority"), Some("1"));
        assert_eq!(action.get_header("Timeout"), Some("30000"));
        assert_eq!(action.get_header("Async"), Some("true"));

        let internal = processor
            .originate_for("100", "200", true)
            .to_action()
            .unwrap();
        assert_eq!(internal.get_header("Context"), Some("from-internal"));
    }

    #[test]
    fn originating_line_names_context() {
        let trunk = originating_line("100", "200", false);
        assert!(trunk.contains("Originating call"));
        assert!(trunk.ends_with("from 100 to 200 (context from-trunk)"));

        let internal = originating_line("100", "200", true);
        assert!(internal.ends_with("from 100 to 200 (context from-internal)"));
    }

    #[test]
    fn last_caller_fallback() {
        let slot: CallerSlot = Arc::new(Mutex::new(None));
        let processor = CommandProcessor::new("PJSIP", slot.clone());
        assert_eq!(processor.last_caller(), None);

        *slot
            .lock()
            .unwrap() = Some("PJSIP/100-00000001".into());
        assert_eq!(
            processor.last_caller(),
            Some("PJSIP/100-00000001".to_string())
        );
    }
}
