mod amount;
mod browser;
mod category;
mod cli;
mod db;
mod error;
mod fmt;
mod form;
mod mapper;
mod metrics;
mod models;
mod settings;
mod sheets;
mod store;
mod tui;

use clap::{CommandFactory, Parser};
use env_logger::Env;

use cli::transactions::{AddArgs, EditArgs, ListArgs};
use cli::{AuthCommands, Cli, Commands};

fn main() {
    env_logger::Builder::from_env(Env::default().default_filter_or("off")).init();
    amount::set_display_format(settings::load_settings().amount_format);

    let cli = Cli::parse();

    let result = match cli.command {
        None => cli::dashboard::run(),
        Some(command) => match command {
            Commands::Init {
                data_dir,
                spreadsheet_id,
                client_id,
            } => cli::init::run(data_dir, spreadsheet_id, client_id),
            Commands::Auth { command } => match command {
                AuthCommands::Login => cli::auth::login(),
                AuthCommands::Logout => cli::auth::logout(),
                AuthCommands::Status => cli::auth::status(),
            },
            Commands::Add {
                amount,
                category,
                description,
                account,
                date,
                tag,
                kind,
            } => cli::transactions::add(AddArgs {
                amount,
                category,
                description,
                account,
                date,
                tag,
                kind,
            }),
            Commands::List {
                month,
                account,
                category,
                kind,
                tag,
                search,
                limit,
            } => cli::transactions::list(ListArgs {
                month,
                account,
                category,
                kind,
                tag,
                search,
                limit,
            }),
            Commands::Edit {
                id,
                amount,
                category,
                description,
                account,
                date,
                tag,
                kind,
            } => cli::transactions::edit(
                &id,
                EditArgs {
                    amount,
                    category,
                    description,
                    account,
                    date,
                    tag,
                    kind,
                },
            ),
            Commands::Delete { id, yes } => cli::transactions::delete(&id, yes),
            Commands::Balances => cli::accounts::balances(),
            Commands::Categories => cli::categories::list(),
            Commands::Sync => cli::sync::run(),
            Commands::Summary { month } => cli::summary::run(month),
            Commands::Analytics { month } => cli::analytics::run(month),
            Commands::Export { output, month } => cli::export::run(output, month),
            Commands::Status => cli::status::run(),
            Commands::Completions { shell } => {
                let mut cmd = Cli::command();
                clap_complete::generate(shell, &mut cmd, "sheetledger", &mut std::io::stdout());
                Ok(())
            }
        },
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
