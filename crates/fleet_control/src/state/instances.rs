//! Handles to running server and proxy instances.
//!
//! Instances are registered by the supervisor that owns the processes. The
//! control plane only mutates their labels and forwards commands; it never
//! creates or deletes the processes itself.

use serde::{Deserialize, Serialize};
use std::sync::RwLock;
use tokio::sync::mpsc;
use tracing::warn;

/// Commands forwarded to the supervisor of an instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "command", rename_all = "snake_case")]
pub enum InstanceCommand {
    /// Run a console command inside the instance.
    Execute(String),
    Stop,
}

/// Sender half used to reach an instance's supervisor.
pub type CommandSender = mpsc::UnboundedSender<InstanceCommand>;

fn forward(identifier: &str, commands: &CommandSender, command: InstanceCommand) {
    // A closed channel means the supervisor already dropped the instance.
    if commands.send(command).is_err() {
        warn!(instance = identifier, "supervisor channel closed, command dropped");
    }
}

/// Snapshot returned to clients after an instance operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstanceSnapshot {
    pub identifier: String,
    pub group: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extra: Option<String>,
}

/// A running game-server instance.
#[derive(Debug)]
pub struct Server {
    identifier: String,
    group: String,
    state: RwLock<String>,
    extra: RwLock<String>,
    commands: CommandSender,
}

impl Server {
    pub fn new(identifier: impl Into<String>, group: impl Into<String>, commands: CommandSender) -> Self {
        Self {
            identifier: identifier.into(),
            group: group.into(),
            state: RwLock::new(String::new()),
            extra: RwLock::new(String::new()),
            commands,
        }
    }

    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    pub fn group(&self) -> &str {
        &self.group
    }

    pub fn state(&self) -> String {
        read_label(&self.state)
    }

    pub fn extra(&self) -> String {
        read_label(&self.extra)
    }

    pub fn set_state(&self, value: String) {
        write_label(&self.state, value);
    }

    pub fn set_extra(&self, value: String) {
        write_label(&self.extra, value);
    }

    pub fn execute_command(&self, command: String) {
        forward(&self.identifier, &self.commands, InstanceCommand::Execute(command));
    }

    pub fn stop(&self) {
        forward(&self.identifier, &self.commands, InstanceCommand::Stop);
    }

    pub fn snapshot(&self) -> InstanceSnapshot {
        InstanceSnapshot {
            identifier: self.identifier.clone(),
            group: self.group.clone(),
            state: Some(self.state()),
            extra: Some(self.extra()),
        }
    }
}

/// A running proxy instance.
#[derive(Debug)]
pub struct Proxy {
    identifier: String,
    group: String,
    commands: CommandSender,
}

impl Proxy {
    pub fn new(identifier: impl Into<String>, group: impl Into<String>, commands: CommandSender) -> Self {
        Self {
            identifier: identifier.into(),
            group: group.into(),
            commands,
        }
    }

    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    pub fn group(&self) -> &str {
        &self.group
    }

    pub fn execute_command(&self, command: String) {
        forward(&self.identifier, &self.commands, InstanceCommand::Execute(command));
    }

    pub fn stop(&self) {
        forward(&self.identifier, &self.commands, InstanceCommand::Stop);
    }

    pub fn snapshot(&self) -> InstanceSnapshot {
        InstanceSnapshot {
            identifier: self.identifier.clone(),
            group: self.group.clone(),
            state: None,
            extra: None,
        }
    }
}

fn read_label(lock: &RwLock<String>) -> String {
    match lock.read() {
        Ok(guard) => guard.clone(),
        Err(poisoned) => poisoned.into_inner().clone(),
    }
}

fn write_label(lock: &RwLock<String>, value: String) {
    match lock.write() {
        Ok(mut guard) => *guard = value,
        Err(poisoned) => *poisoned.into_inner() = value,
    }
}
