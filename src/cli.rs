use std::path::PathBuf;

use clap::builder::styling::{AnsiColor, Effects, Styles};
use clap::{Args, Parser, Subcommand};
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

use crate::domain::kind::ItemKind;

fn cli_styles() -> Styles {
    Styles::styled()
        .header(AnsiColor::BrightCyan.on_default() | Effects::BOLD)
        .usage(AnsiColor::BrightYellow.on_default() | Effects::BOLD)
        .literal(AnsiColor::BrightGreen.on_default() | Effects::BOLD)
        .placeholder(AnsiColor::BrightMagenta.on_default())
}

#[derive(Debug, Parser)]
#[command(name = "agenda-notify")]
#[command(bin_name = "agenda-notify")]
#[command(version)]
#[command(about = "Reminder scheduler for agenda appointments and events")]
#[command(styles = cli_styles())]
pub struct Cli {
    #[arg(
        short = 'd',
        long,
        env = "AGENDA_NOTIFY_DB",
        default_value = ".agenda-notify/state.sqlite",
        help = "Path to the shared schedule database."
    )]
    pub db: String,

    #[arg(
        short = 'c',
        long,
        env = "AGENDA_NOTIFY_CONFIG",
        default_value = "agenda-notify.toml",
        help = "Path to the TOML config file. A missing file means defaults."
    )]
    pub config: PathBuf,

    #[arg(
        long,
        global = true,
        help = "Log filter directive, e.g. debug or agenda_notify=trace."
    )]
    pub log: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    #[command(about = "Run the scheduler in the foreground.")]
    Run(RunArgs),
    #[command(about = "Poll once and fire whatever is due.")]
    Tick(TickArgs),
    #[command(about = "List tracked schedules and muted items.")]
    Status(StatusArgs),
    #[command(about = "Stop alerts for one item.")]
    Mute(MuteArgs),
    #[command(about = "Resume alerts for one item.")]
    Unmute(ItemRefArgs),
    #[command(about = "Drop an item's schedule state after an edit or delete.")]
    Forget(ItemRefArgs),
    #[command(about = "Send a test alert through every configured channel.")]
    TestAlert,
}

#[derive(Debug, Clone, Args)]
pub struct SourceArgs {
    #[arg(short = 'k', long, help = "Only handle this item kind (appointment or event).")]
    pub kind: Option<ItemKind>,

    #[arg(
        long = "items-file",
        requires = "kind",
        help = "Read items from a JSON file instead of the backend."
    )]
    pub items_file: Option<PathBuf>,
}

#[derive(Debug, Args)]
pub struct RunArgs {
    #[command(flatten)]
    pub source: SourceArgs,

    #[arg(
        long = "duration-secs",
        help = "Stop after this many seconds instead of running until killed."
    )]
    pub duration_secs: Option<u64>,
}

#[derive(Debug, Args)]
pub struct TickArgs {
    #[command(flatten)]
    pub source: SourceArgs,

    #[arg(
        long,
        value_parser = parse_instant,
        help = "Evaluate at this RFC 3339 instant instead of the current time."
    )]
    pub now: Option<OffsetDateTime>,

    #[arg(long, help = "Print the tick reports as JSON.")]
    pub json: bool,
}

#[derive(Debug, Args)]
pub struct StatusArgs {
    #[arg(short = 'k', long, help = "Only list this item kind.")]
    pub kind: Option<ItemKind>,

    #[arg(long, help = "Print as JSON.")]
    pub json: bool,
}

#[derive(Debug, Args)]
pub struct ItemRefArgs {
    #[arg(help = "Item kind (appointment or event).")]
    pub kind: ItemKind,

    #[arg(help = "Item id as reported by the source.")]
    pub id: String,
}

#[derive(Debug, Args)]
pub struct MuteArgs {
    #[command(flatten)]
    pub item: ItemRefArgs,

    #[arg(long, help = "Also archive the item at the source.")]
    pub archive: bool,

    #[arg(
        long = "items-file",
        help = "Archive in this JSON items file instead of the backend."
    )]
    pub items_file: Option<PathBuf>,
}

fn parse_instant(raw: &str) -> Result<OffsetDateTime, String> {
    OffsetDateTime::parse(raw, &Rfc3339)
        .map_err(|err| format!("expected an RFC 3339 instant, got '{}': {}", raw, err))
}
