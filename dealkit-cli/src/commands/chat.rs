//! Chat command - line-driven session as one user
//!
//! Lines starting with `/` are commands, anything else is free text fed to
//! the running dialog. Notifications for every participant are printed
//! inline, so two terminals on one data directory behave like two chats.

use anyhow::Result;
use dealkit_lib::{
    dispatch_all, Category, DealEngine, DealError, DealEvent, DealId, DealkitConfig, DialogInput,
    DialogReply, DialogStep, SessionStore, UserId, ValidationError,
};
use tokio::io::{AsyncBufReadExt, BufReader};

use super::ConsoleNotifier;
use crate::ui;

const HELP: &[(&str, &str)] = &[
    ("/wallet", "set your wallet address"),
    ("/create", "list a new deal"),
    ("/cat <channel|gift|nft|other>", "pick a category"),
    ("/cancel", "abandon the current input"),
    ("/start <deal_id>", "open a deal from a share link"),
    ("/join <id>", "join a deal as buyer"),
    ("/paid <id>", "report payment sent"),
    ("/leave <id>", "leave a deal before paying"),
    ("/finish <id>", "confirm payment received"),
    ("/canceldeal <id>", "cancel a deal"),
    ("/deals", "your deals"),
    ("/quit", "exit"),
];

/// One parsed input line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatCommand {
    Dialog(DialogInput),
    Start(DealId),
    Transition(DealEvent, DealId),
    Deals,
    Help,
    Quit,
}

pub fn parse_line(line: &str) -> Result<ChatCommand, ValidationError> {
    let line = line.trim();
    let Some(rest) = line.strip_prefix('/') else {
        return Ok(ChatCommand::Dialog(DialogInput::Text(line.to_string())));
    };

    let (name, arg) = match rest.split_once(char::is_whitespace) {
        Some((name, arg)) => (name, arg.trim()),
        None => (rest, ""),
    };
    let deal_id = || -> Result<DealId, ValidationError> {
        if arg.is_empty() {
            return Err(ValidationError::EmptyField("deal id"));
        }
        DealId::parse(arg)
    };

    let command = match name.to_ascii_lowercase().as_str() {
        "wallet" => ChatCommand::Dialog(DialogInput::EditWallet),
        "create" => ChatCommand::Dialog(DialogInput::CreateDeal),
        "cancel" => ChatCommand::Dialog(DialogInput::Cancel),
        "cat" => ChatCommand::Dialog(DialogInput::Category(arg.parse::<Category>()?)),
        "start" => ChatCommand::Start(
            DealId::from_start_payload(arg)
                .ok_or_else(|| ValidationError::MalformedDealId(arg.to_string()))?,
        ),
        "join" => ChatCommand::Transition(DealEvent::Join, deal_id()?),
        "paid" => ChatCommand::Transition(DealEvent::MarkPaid, deal_id()?),
        "leave" => ChatCommand::Transition(DealEvent::Leave, deal_id()?),
        "finish" => ChatCommand::Transition(DealEvent::Finish, deal_id()?),
        "canceldeal" => ChatCommand::Transition(DealEvent::Cancel, deal_id()?),
        "deals" => ChatCommand::Deals,
        "quit" | "exit" => ChatCommand::Quit,
        _ => ChatCommand::Help,
    };
    Ok(command)
}

fn print_help() {
    ui::header("Commands");
    for (command, what) in HELP {
        ui::key_value(command, what);
    }
    ui::info("Any other line answers the current question.");
}

fn prompt(step: DialogStep) {
    ui::info(step.prompt());
    if step == DialogStep::ChooseCategory {
        ui::info("Reply with /cat <channel|gift|nft|other>");
    }
}

struct Chat<'a> {
    engine: &'a DealEngine,
    sessions: SessionStore,
    actor: UserId,
    bot_username: Option<&'a str>,
}

impl Chat<'_> {
    async fn handle(&self, command: ChatCommand) -> dealkit_lib::Result<()> {
        match command {
            ChatCommand::Dialog(input) => {
                let reply = self
                    .engine
                    .handle_dialog_input(&self.sessions, self.actor, input)
                    .await?;
                self.show_reply(reply);
            }
            ChatCommand::Start(deal_id) => {
                let deal = self.engine.preview_join(&deal_id, self.actor).await?;
                ui::deal(&deal, None);
                ui::info(&format!("Send /join {} to take this deal", deal.id));
            }
            ChatCommand::Transition(event, deal_id) => {
                let outcome = self
                    .engine
                    .apply_transition(&deal_id, event, self.actor)
                    .await?;
                dispatch_all(&ConsoleNotifier, &outcome.notifications).await;
            }
            ChatCommand::Deals => {
                let deals = self.engine.deals_for_user(self.actor).await?;
                if deals.is_empty() {
                    ui::info("You have no deals yet");
                } else {
                    ui::deal_list(&deals);
                }
            }
            ChatCommand::Help | ChatCommand::Quit => print_help(),
        }
        Ok(())
    }

    fn show_reply(&self, reply: DialogReply) {
        match reply {
            DialogReply::Prompt(step) => prompt(step),
            DialogReply::WalletSaved(user) => {
                ui::success(&format!(
                    "Wallet saved: {}",
                    user.wallet.as_deref().unwrap_or_default()
                ));
            }
            DialogReply::DealCreated(deal) => {
                ui::success("Deal created");
                ui::deal(&deal, self.bot_username);
                if self.bot_username.is_none() {
                    ui::info(&format!("Share this with the buyer: /start {}", deal.id.start_payload()));
                }
            }
            DialogReply::Cancelled => ui::info("Cancelled"),
            DialogReply::Idle => ui::info("Nothing in progress. Send /help for commands."),
        }
    }

    fn report(&self, err: &DealError) {
        ui::error(&err.to_string());
        if let DealError::Validation(ValidationError::WalletRequired(_)) = err {
            ui::info("Send /wallet first");
        }
        // A rejected answer leaves the session where it was; ask again.
        if let Some(step) = self.sessions.step_of(self.actor) {
            prompt(step);
        }
    }
}

pub async fn run(config: &DealkitConfig, user: i64, name: Option<&str>) -> Result<()> {
    let engine = super::open_engine(config)?;
    let actor = UserId(user);
    let registered = engine.register_user(actor, name).await?;

    let chat = Chat {
        engine: &engine,
        sessions: SessionStore::new(),
        actor,
        bot_username: config.bot_username.as_deref(),
    };

    ui::header(&format!("Chatting as {}", registered.mention()));
    ui::info("Send /help for commands");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }
        let command = match parse_line(&line) {
            Ok(command) => command,
            Err(e) => {
                ui::error(&e.to_string());
                continue;
            }
        };
        if command == ChatCommand::Quit {
            break;
        }
        if let Err(e) = chat.handle(command).await {
            chat.report(&e);
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_text_feeds_dialog() {
        assert_eq!(
            parse_line("  99,5 ").unwrap(),
            ChatCommand::Dialog(DialogInput::Text("99,5".to_string()))
        );
    }

    #[test]
    fn test_flow_commands() {
        assert_eq!(
            parse_line("/wallet").unwrap(),
            ChatCommand::Dialog(DialogInput::EditWallet)
        );
        assert_eq!(
            parse_line("/create").unwrap(),
            ChatCommand::Dialog(DialogInput::CreateDeal)
        );
        assert_eq!(
            parse_line("/cat NFT").unwrap(),
            ChatCommand::Dialog(DialogInput::Category(Category::Nft))
        );
        assert!(matches!(
            parse_line("/cat cars"),
            Err(ValidationError::UnknownCategory(_))
        ));
    }

    #[test]
    fn test_deal_commands() {
        let id = DealId::parse("a1b2c3").unwrap();
        assert_eq!(
            parse_line("/start deal_a1b2c3").unwrap(),
            ChatCommand::Start(id.clone())
        );
        assert_eq!(
            parse_line("/paid a1b2c3").unwrap(),
            ChatCommand::Transition(DealEvent::MarkPaid, id.clone())
        );
        assert_eq!(
            parse_line("/canceldeal a1b2c3").unwrap(),
            ChatCommand::Transition(DealEvent::Cancel, id)
        );
        assert!(matches!(
            parse_line("/join"),
            Err(ValidationError::EmptyField("deal id"))
        ));
        assert!(parse_line("/join ../etc").is_err());
    }

    #[test]
    fn test_unknown_command_shows_help() {
        assert_eq!(parse_line("/wat").unwrap(), ChatCommand::Help);
        assert_eq!(parse_line("/quit").unwrap(), ChatCommand::Quit);
    }
}
