use std::env;

use tokio_stream::wrappers::ReceiverStream;
use tracing::warn;
use tracing_subscriber::EnvFilter;

use perk_ledger::csv::{read_events, read_tasks, write_accounts};
use perk_ledger::{Config, Engine};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("warn".parse().unwrap()))
        .with_writer(std::io::stderr)
        .init();

    let mut args = env::args().skip(1);
    let usage = "usage: perk-ledger <tasks.csv> <events.csv>";
    let tasks_path = args.next().expect(usage);
    let events_path = args.next().expect(usage);

    let mut engine = Engine::new(Config::default());

    let mut tasks = Vec::new();
    for result in read_tasks(&tasks_path) {
        match result {
            Ok(task) => tasks.push(task),
            Err(e) => warn!("{e}"),
        }
    }
    engine.load_tasks(tasks);

    let (sender, receiver) = tokio::sync::mpsc::channel(16);
    tokio::spawn(async move {
        for result in read_events(&events_path) {
            match result {
                Ok(cmd) => {
                    sender.send(cmd).await.unwrap();
                }
                Err(e) => {
                    warn!("{e}");
                }
            }
        }
    });

    engine.run(ReceiverStream::new(receiver)).await;

    let mut accounts: Vec<_> = engine.accounts().collect();
    accounts.sort_by_key(|a| a.id());
    write_accounts(accounts);
}
