mod alert;
mod app;
mod cli;
mod config;
mod db;
mod domain;
mod planner;
mod scheduler;
mod source;
mod storage;
mod store;
mod ticker;
mod ui;

use std::time::Duration;

use tracing::Level;
use tracing_subscriber::EnvFilter;

use domain::kind::ItemKind;

fn main() {
    if let Err(err) = run() {
        eprintln!("error: {}", err);
        std::process::exit(1);
    }
}

fn print_json(value: &impl serde::Serialize) -> Result<(), app::AppError> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn init_logging(cli: &cli::Cli) {
    let default_level = match cli.command {
        cli::Commands::Run(_) => Level::INFO,
        _ => Level::WARN,
    };
    let mut filter = EnvFilter::from_default_env().add_directive(default_level.into());
    if let Some(directive) = cli.log.as_deref() {
        match directive.parse() {
            Ok(directive) => filter = filter.add_directive(directive),
            Err(err) => eprintln!("warning: ignoring --log '{directive}': {err}"),
        }
    }
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn selected_kinds(kind: Option<ItemKind>) -> Vec<ItemKind> {
    kind.map(|kind| vec![kind])
        .unwrap_or_else(|| ItemKind::ALL.to_vec())
}

fn run() -> Result<(), app::AppError> {
    use clap::Parser;
    use cli::Commands;

    let cli = cli::Cli::parse();
    init_logging(&cli);
    let app = app::App::open(&cli.db, &cli.config)?;

    match cli.command {
        Commands::Run(args) => {
            let kinds = selected_kinds(args.source.kind);
            app.run(
                &kinds,
                args.source.items_file.as_deref(),
                args.duration_secs.map(Duration::from_secs),
            )?;
        }
        Commands::Tick(args) => {
            let kinds = selected_kinds(args.source.kind);
            let reports = app.tick_once(&kinds, args.source.items_file.as_deref(), args.now)?;
            if args.json {
                print_json(&reports)?;
            } else {
                ui::print_tick_reports(&reports);
            }
        }
        Commands::Status(args) => {
            let rows = app.status(&selected_kinds(args.kind))?;
            if args.json {
                print_json(&rows)?;
            } else {
                ui::print_schedule_list(&rows);
            }
        }
        Commands::Mute(args) => {
            let outcome = app.mute(
                args.item.kind,
                &args.item.id,
                args.archive,
                args.items_file.as_deref(),
            )?;
            let verb = if outcome.changed {
                "muted"
            } else {
                "already muted"
            };
            let archived = if outcome.archived { " and archived" } else { "" };
            println!("{verb}{archived} {} {}", outcome.kind, outcome.id);
        }
        Commands::Unmute(args) => {
            let changed = app.unmute(args.kind, &args.id)?;
            let verb = if changed { "unmuted" } else { "not muted" };
            println!("{verb} {} {}", args.kind, args.id);
        }
        Commands::Forget(args) => {
            let changed = app.forget(args.kind, &args.id)?;
            let verb = if changed { "forgot" } else { "no schedule for" };
            println!("{verb} {} {}", args.kind, args.id);
        }
        Commands::TestAlert => {
            let results = app.test_alert();
            ui::print_channel_results(&results);
            let failed = results.iter().filter(|(_, result)| result.is_err()).count();
            if failed > 0 {
                return Err(app::AppError::Delivery(format!(
                    "{failed} of {} channel(s) failed",
                    results.len()
                )));
            }
        }
    }

    Ok(())
}
