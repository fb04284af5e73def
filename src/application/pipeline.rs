//! Extension pipeline - ordered message transformers and lifecycle hooks.
//!
//! Extensions are installed by name. During `install` an extension registers
//! transformers, hooks and commands on an `ExtensionContext`; the pipeline keeps
//! those registrations grouped per extension so `uninstall` can remove them again.
//!
//! Transformers run in registration order. The first one that returns `None`
//! drops the message and later transformers never see it.

use std::sync::{Arc, RwLock};
use thiserror::Error;

use crate::domain::command::{Command, CommandRegistry};
use crate::domain::foundation::sync::{read, write};
use crate::domain::message::{IncomingMessage, OutgoingMessage};

/// A message transform. Returning `None` drops the message.
pub type Transformer<M> = Arc<dyn Fn(M) -> Option<M> + Send + Sync>;

/// Zero-argument lifecycle callback run when the widget opens or closes.
pub type LifecycleHook = Arc<dyn Fn() -> Result<(), ExtensionError> + Send + Sync>;

/// Errors raised by extensions and the pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExtensionError {
    #[error("Extension '{0}' is already installed")]
    AlreadyInstalled(String),

    #[error("Extension '{extension}' failed: {reason}")]
    Hook { extension: String, reason: String },
}

impl ExtensionError {
    pub fn hook(extension: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Hook {
            extension: extension.into(),
            reason: reason.into(),
        }
    }
}

/// A named, versioned bundle of transformers, hooks and commands.
pub trait Extension: Send + Sync {
    fn name(&self) -> &str;

    fn version(&self) -> &str;

    /// Registers everything the extension contributes.
    fn install(&self, ctx: &mut ExtensionContext) -> Result<(), ExtensionError>;

    /// Called after the extension's registrations have been removed.
    fn uninstall(&self) {}
}

/// Collects the registrations of one extension during `install`.
#[derive(Default)]
pub struct ExtensionContext {
    before_send: Vec<Transformer<OutgoingMessage>>,
    after_receive: Vec<Transformer<IncomingMessage>>,
    on_open: Vec<LifecycleHook>,
    on_close: Vec<LifecycleHook>,
    commands: Vec<Command>,
}

impl ExtensionContext {
    pub fn on_before_send<F>(&mut self, transform: F)
    where
        F: Fn(OutgoingMessage) -> Option<OutgoingMessage> + Send + Sync + 'static,
    {
        self.before_send.push(Arc::new(transform));
    }

    pub fn on_after_receive<F>(&mut self, transform: F)
    where
        F: Fn(IncomingMessage) -> Option<IncomingMessage> + Send + Sync + 'static,
    {
        self.after_receive.push(Arc::new(transform));
    }

    pub fn on_open<F>(&mut self, hook: F)
    where
        F: Fn() -> Result<(), ExtensionError> + Send + Sync + 'static,
    {
        self.on_open.push(Arc::new(hook));
    }

    pub fn on_close<F>(&mut self, hook: F)
    where
        F: Fn() -> Result<(), ExtensionError> + Send + Sync + 'static,
    {
        self.on_close.push(Arc::new(hook));
    }

    /// Registers a slash command owned by this extension.
    pub fn register_command(&mut self, command: Command) {
        self.commands.push(command);
    }
}

struct Installed {
    name: String,
    version: String,
    extension: Arc<dyn Extension>,
    registrations: ExtensionContext,
}

/// Ordered before-send / after-receive chains plus open/close hooks.
pub struct ExtensionPipeline {
    installed: RwLock<Vec<Installed>>,
    commands: Option<Arc<CommandRegistry>>,
}

impl Default for ExtensionPipeline {
    fn default() -> Self {
        Self::new()
    }
}

impl ExtensionPipeline {
    /// Creates a pipeline that ignores command registrations.
    pub fn new() -> Self {
        Self {
            installed: RwLock::new(Vec::new()),
            commands: None,
        }
    }

    /// Creates a pipeline that forwards extension commands to `commands`.
    pub fn with_commands(commands: Arc<CommandRegistry>) -> Self {
        Self {
            installed: RwLock::new(Vec::new()),
            commands: Some(commands),
        }
    }

    /// Installs an extension.
    ///
    /// # Errors
    ///
    /// - `AlreadyInstalled` if an extension with the same name is present
    /// - whatever the extension's own `install` returns
    pub fn install(&self, extension: Arc<dyn Extension>) -> Result<(), ExtensionError> {
        let name = extension.name().to_string();
        if self.is_installed(&name) {
            return Err(ExtensionError::AlreadyInstalled(name));
        }

        let mut ctx = ExtensionContext::default();
        extension.install(&mut ctx)?;

        {
            let mut installed = write(&self.installed);
            if installed.iter().any(|entry| entry.name == name) {
                return Err(ExtensionError::AlreadyInstalled(name));
            }
            if let Some(registry) = &self.commands {
                for command in &ctx.commands {
                    registry.register(command.clone());
                }
            }
            installed.push(Installed {
                name: name.clone(),
                version: extension.version().to_string(),
                extension,
                registrations: ctx,
            });
        }

        tracing::debug!(extension = %name, "Extension installed");
        Ok(())
    }

    /// Removes an extension and everything it registered. Returns `false` if
    /// no extension with that name is installed.
    pub fn uninstall(&self, name: &str) -> bool {
        let removed = {
            let mut installed = write(&self.installed);
            match installed.iter().position(|entry| entry.name == name) {
                Some(index) => installed.remove(index),
                None => return false,
            }
        };

        if let Some(registry) = &self.commands {
            for command in &removed.registrations.commands {
                registry.unregister(command.name());
            }
        }
        removed.extension.uninstall();

        tracing::debug!(extension = %name, "Extension uninstalled");
        true
    }

    pub fn is_installed(&self, name: &str) -> bool {
        read(&self.installed).iter().any(|entry| entry.name == name)
    }

    /// `(name, version)` of every installed extension, in install order.
    pub fn installed(&self) -> Vec<(String, String)> {
        read(&self.installed)
            .iter()
            .map(|entry| (entry.name.clone(), entry.version.clone()))
            .collect()
    }

    /// Folds an outbound message through every before-send transformer.
    pub fn run_before_send(&self, message: OutgoingMessage) -> Option<OutgoingMessage> {
        let transformers = self.collect(|r| &r.before_send);
        transformers
            .iter()
            .try_fold(message, |message, transform| transform(message))
    }

    /// Folds an inbound message through every after-receive transformer.
    pub fn run_after_receive(&self, message: IncomingMessage) -> Option<IncomingMessage> {
        let transformers = self.collect(|r| &r.after_receive);
        transformers
            .iter()
            .try_fold(message, |message, transform| transform(message))
    }

    /// Runs every on-open hook. Returns the number of hooks that failed.
    pub fn notify_open(&self) -> usize {
        self.run_hooks("open", |r| &r.on_open)
    }

    /// Runs every on-close hook. Returns the number of hooks that failed.
    pub fn notify_close(&self) -> usize {
        self.run_hooks("close", |r| &r.on_close)
    }

    // Clones the selected registrations so no lock is held while they run.
    fn collect<T: Clone>(&self, select: impl Fn(&ExtensionContext) -> &Vec<T>) -> Vec<T> {
        read(&self.installed)
            .iter()
            .flat_map(|entry| select(&entry.registrations).iter().cloned())
            .collect()
    }

    fn run_hooks(
        &self,
        phase: &'static str,
        select: impl Fn(&ExtensionContext) -> &Vec<LifecycleHook>,
    ) -> usize {
        let hooks: Vec<(String, LifecycleHook)> = read(&self.installed)
            .iter()
            .flat_map(|entry| {
                select(&entry.registrations)
                    .iter()
                    .map(|hook| (entry.name.clone(), Arc::clone(hook)))
            })
            .collect();

        let mut failures = 0;
        for (extension, hook) in hooks {
            if let Err(error) = hook() {
                failures += 1;
                tracing::warn!(extension = %extension, phase, error = %error, "Lifecycle hook failed");
            }
        }
        failures
    }
}
