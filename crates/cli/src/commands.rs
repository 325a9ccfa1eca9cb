//! Line command parsing for the interactive shell

use hestia_devices::AttributeValue;

/// One parsed shell command
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    AddDevice {
        id: u32,
        kind: String,
    },
    TurnOn {
        id: u32,
    },
    TurnOff {
        id: u32,
    },
    Power {
        id: u32,
        on: bool,
    },
    SetAttribute {
        id: u32,
        name: String,
        value: AttributeValue,
    },
    Schedule {
        id: u32,
        time: String,
        action: String,
    },
    AddTrigger {
        kind: String,
        relation: String,
        value: f64,
        action: String,
        interval_secs: u64,
        trigger_id: u32,
    },
    ChangeInterval {
        trigger_id: u32,
        interval_secs: u64,
    },
    Interval {
        trigger_id: u32,
    },
    Status,
    Tasks,
    Triggers,
    Help,
    Quit,
}

pub const USAGE: &str = "\
commands:
  add-device <id> <light|outlet|thermostat>
  turn-on <id> | turn-off <id> | power <id> <on|off>
  set <id> <attribute> <value>
  schedule <id> <HH:mm> <on|off|toggle|attr=value>
  add-trigger <kind> <relation> <value> <action> <interval-secs> <trigger-id>
  change-interval <trigger-id> <interval-secs>
  interval <trigger-id>
  status | tasks | triggers
  help | quit";

/// Parse one input line into a command.
///
/// Errors are human-readable messages for the shell prompt.
pub fn parse(line: &str) -> Result<Command, String> {
    let tokens: Vec<&str> = line.split_whitespace().collect();
    let (head, args) = tokens
        .split_first()
        .ok_or_else(|| "empty command".to_string())?;

    match (*head, args) {
        ("add-device", [id, kind]) => Ok(Command::AddDevice {
            id: parse_u32(id, "device id")?,
            kind: (*kind).to_string(),
        }),
        ("turn-on", [id]) => Ok(Command::TurnOn {
            id: parse_u32(id, "device id")?,
        }),
        ("turn-off", [id]) => Ok(Command::TurnOff {
            id: parse_u32(id, "device id")?,
        }),
        ("power", [id, state]) => {
            let on = match *state {
                "on" => true,
                "off" => false,
                other => return Err(format!("expected on or off, got {other:?}")),
            };
            Ok(Command::Power {
                id: parse_u32(id, "device id")?,
                on,
            })
        }
        ("set", [id, name, value]) => Ok(Command::SetAttribute {
            id: parse_u32(id, "device id")?,
            name: (*name).to_string(),
            value: value
                .parse::<f64>()
                .map(AttributeValue::Number)
                .unwrap_or_else(|_| AttributeValue::Text((*value).to_string())),
        }),
        ("schedule", [id, time, action]) => Ok(Command::Schedule {
            id: parse_u32(id, "device id")?,
            time: (*time).to_string(),
            action: (*action).to_string(),
        }),
        ("add-trigger", [kind, relation, value, action, interval, trigger_id]) => {
            Ok(Command::AddTrigger {
                kind: (*kind).to_string(),
                relation: (*relation).to_string(),
                value: value
                    .parse::<f64>()
                    .map_err(|_| format!("threshold must be a number, got {value:?}"))?,
                action: (*action).to_string(),
                interval_secs: parse_u64(interval, "interval")?,
                trigger_id: parse_u32(trigger_id, "trigger id")?,
            })
        }
        ("change-interval", [trigger_id, interval]) => Ok(Command::ChangeInterval {
            trigger_id: parse_u32(trigger_id, "trigger id")?,
            interval_secs: parse_u64(interval, "interval")?,
        }),
        ("interval", [trigger_id]) => Ok(Command::Interval {
            trigger_id: parse_u32(trigger_id, "trigger id")?,
        }),
        ("status", []) => Ok(Command::Status),
        ("tasks", []) => Ok(Command::Tasks),
        ("triggers", []) => Ok(Command::Triggers),
        ("help", []) => Ok(Command::Help),
        ("quit" | "exit", []) => Ok(Command::Quit),
        _ => Err(format!("unrecognized command {line:?} (try 'help')")),
    }
}

fn parse_u32(s: &str, what: &str) -> Result<u32, String> {
    s.parse()
        .map_err(|_| format!("{what} must be a non-negative integer, got {s:?}"))
}

fn parse_u64(s: &str, what: &str) -> Result<u64, String> {
    s.parse()
        .map_err(|_| format!("{what} must be a non-negative integer, got {s:?}"))
}
