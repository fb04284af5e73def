//! CommandRegistry - name to handler lookup for slash commands.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, RwLock};

use crate::domain::foundation::sync::{read, write};
use crate::domain::foundation::ValidationError;

/// Arguments passed to a command handler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandInvocation {
    /// Everything after the command name, trimmed.
    pub args: String,
}

/// Callback run when a command executes.
pub type CommandHandler = Arc<dyn Fn(&CommandInvocation) + Send + Sync>;

/// A named slash command.
#[derive(Clone)]
pub struct Command {
    name: String,
    description: String,
    handler: CommandHandler,
}

impl Command {
    /// Creates a command. Names must be non-empty and contain no whitespace.
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        handler: impl Fn(&CommandInvocation) + Send + Sync + 'static,
    ) -> Result<Self, ValidationError> {
        let name = name.into();
        if name.is_empty() {
            return Err(ValidationError::empty_field("command_name"));
        }
        if name.chars().any(char::is_whitespace) {
            return Err(ValidationError::invalid_format(
                "command_name",
                "must not contain whitespace",
            ));
        }
        Ok(Self {
            name,
            description: description.into(),
            handler: Arc::new(handler),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }
}

impl fmt::Debug for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Command")
            .field("name", &self.name)
            .field("description", &self.description)
            .finish_non_exhaustive()
    }
}

/// Name/description pair returned by `CommandRegistry::list`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandInfo {
    pub name: String,
    pub description: String,
}

/// Registry of slash commands, keyed by name.
#[derive(Debug, Default)]
pub struct CommandRegistry {
    commands: RwLock<BTreeMap<String, Command>>,
}

impl CommandRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `command`, replacing any command with the same name.
    pub fn register(&self, command: Command) {
        write(&self.commands).insert(command.name.clone(), command);
    }

    pub fn unregister(&self, name: &str) -> bool {
        write(&self.commands).remove(name).is_some()
    }

    /// Runs the command called `name`. Returns false, with no side effect,
    /// if no such command exists.
    pub fn execute(&self, name: &str, args: &str) -> bool {
        let handler = match read(&self.commands).get(name) {
            Some(command) => Arc::clone(&command.handler),
            None => return false,
        };
        tracing::debug!(command = name, "Executing command");
        handler(&CommandInvocation {
            args: args.trim().to_string(),
        });
        true
    }

    /// Registered commands, sorted by name.
    pub fn list(&self) -> Vec<CommandInfo> {
        read(&self.commands)
            .values()
            .map(|c| CommandInfo {
                name: c.name.clone(),
                description: c.description.clone(),
            })
            .collect()
    }

    pub fn has(&self, name: &str) -> bool {
        read(&self.commands).contains_key(name)
    }

    pub fn clear(&self) {
        write(&self.commands).clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    fn recording(name: &str, seen: Arc<Mutex<Vec<String>>>) -> Command {
        Command::new(name, "test command", move |inv| {
            seen.lock().unwrap().push(inv.args.clone());
        })
        .unwrap()
    }

    #[test]
    fn execute_unknown_returns_false() {
        let registry = CommandRegistry::new();
        assert!(!registry.execute("missing", ""));
    }

    #[test]
    fn execute_passes_trimmed_args() {
        let registry = CommandRegistry::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        registry.register(recording("echo", seen.clone()));

        assert!(registry.execute("echo", "  hello world "));
        assert_eq!(*seen.lock().unwrap(), vec!["hello world".to_string()]);
    }

    #[test]
    fn register_overwrites_same_name() {
        let registry = CommandRegistry::new();
        let first = Arc::new(Mutex::new(Vec::new()));
        let second = Arc::new(Mutex::new(Vec::new()));
        registry.register(recording("x", first.clone()));
        registry.register(recording("x", second.clone()));

        registry.execute("x", "1");

        assert!(first.lock().unwrap().is_empty());
        assert_eq!(second.lock().unwrap().len(), 1);
        assert_eq!(registry.list().len(), 1);
    }

    #[test]
    fn list_is_sorted_and_clear_empties() {
        let registry = CommandRegistry::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        registry.register(recording("zeta", seen.clone()));
        registry.register(recording("alpha", seen));

        let names: Vec<_> = registry.list().into_iter().map(|c| c.name).collect();
        assert_eq!(names, vec!["alpha", "zeta"]);

        assert!(registry.unregister("zeta"));
        assert!(!registry.has("zeta"));
        registry.clear();
        assert!(registry.list().is_empty());
    }

    #[test]
    fn handler_may_reenter_registry() {
        let registry = Arc::new(CommandRegistry::new());
        let inner = Arc::clone(&registry);
        registry.register(
            Command::new("self-remove", "", move |_| {
                inner.unregister("self-remove");
            })
            .unwrap(),
        );

        assert!(registry.execute("self-remove", ""));
        assert!(!registry.has("self-remove"));
    }

    #[test]
    fn command_names_are_validated() {
        assert!(Command::new("", "", |_| {}).is_err());
        assert!(Command::new("two words", "", |_| {}).is_err());
    }
}
