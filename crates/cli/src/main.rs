//! Hestia interactive home controller shell

use hestia_automation::{AutomationEvent, HomeController};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;

use commands::Command;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "hestia_cli=info,hestia_automation=info,info".into()),
        )
        .init();

    tracing::info!("Starting Hestia home controller");

    let controller = Arc::new(HomeController::new());
    spawn_event_logger(controller.subscribe());

    println!("hestia shell, type 'help' for commands");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        match commands::parse(line) {
            Ok(Command::Quit) => break,
            Ok(command) => run(&controller, command)?,
            Err(message) => eprintln!("error: {message}"),
        }
    }

    tracing::info!("Shutting down");
    Ok(())
}

/// Execute one parsed command against the controller.
fn run(controller: &HomeController, command: Command) -> anyhow::Result<()> {
    let outcome = match command {
        Command::AddDevice { id, kind } => controller.add_device(id, &kind),
        Command::TurnOn { id } => {
            controller.turn_on(id);
            Ok(())
        }
        Command::TurnOff { id } => {
            controller.turn_off(id);
            Ok(())
        }
        Command::Power { id, on } => {
            controller.set_power(id, on);
            Ok(())
        }
        Command::SetAttribute { id, name, value } => controller.set_attribute(id, &name, value),
        Command::Schedule { id, time, action } => controller.schedule_device(id, &time, &action),
        Command::AddTrigger {
            kind,
            relation,
            value,
            action,
            interval_secs,
            trigger_id,
        } => controller.add_automated_trigger(
            &kind,
            &relation,
            value,
            &action,
            interval_secs,
            trigger_id,
        ),
        Command::ChangeInterval {
            trigger_id,
            interval_secs,
        } => controller.change_trigger_checking_interval(trigger_id, interval_secs),
        Command::Interval { trigger_id } => {
            match controller.current_interval(trigger_id) {
                Some(secs) => println!("{secs}"),
                None => println!("no trigger with id {trigger_id}"),
            }
            Ok(())
        }
        Command::Status => {
            println!("{}", serde_json::to_string_pretty(&controller.status_report())?);
            Ok(())
        }
        Command::Tasks => {
            println!("{}", serde_json::to_string(&controller.list_scheduled_tasks())?);
            Ok(())
        }
        Command::Triggers => {
            println!("{}", serde_json::to_string(&controller.list_triggers())?);
            Ok(())
        }
        Command::Help => {
            println!("{}", commands::USAGE);
            Ok(())
        }
        Command::Quit => Ok(()),
    };

    if let Err(e) = outcome {
        eprintln!("error: {e}");
    }
    Ok(())
}

/// Surface controller events on the log so timer fires are visible in the
/// shell.
fn spawn_event_logger(mut events: broadcast::Receiver<AutomationEvent>) {
    tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(event) => log_event(&event),
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    tracing::warn!("event logger lagged by {} events", n);
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    });
}

fn log_event(event: &AutomationEvent) {
    match event {
        AutomationEvent::DeviceAdded { device_id, kind } => {
            tracing::info!("device {device_id} ({kind}) added");
        }
        AutomationEvent::TaskScheduled { device_id } => {
            tracing::info!("one-shot task armed for device {device_id}");
        }
        AutomationEvent::TaskFired { device_id, command } => {
            tracing::info!("one-shot task fired: {command} -> device {device_id}");
        }
        AutomationEvent::TriggerAdded {
            trigger_id,
            device_id,
        } => {
            tracing::info!("trigger {trigger_id} armed on device {device_id}");
        }
        AutomationEvent::TriggerFired {
            trigger_id,
            device_id,
            command,
        } => {
            tracing::info!("trigger {trigger_id} fired: {command} -> device {device_id}");
        }
        AutomationEvent::IntervalChanged {
            trigger_id,
            interval_secs,
        } => {
            tracing::info!("trigger {trigger_id} interval changed to {interval_secs}s");
        }
    }
}
