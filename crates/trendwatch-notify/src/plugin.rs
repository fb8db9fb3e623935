use crate::error::{NotifyError, Result};
use crate::retry::DeliveryOptions;
use crate::utils::redact_sensitive_json;
use crate::NotificationChannel;
use serde_json::Value;
use std::collections::HashMap;

/// Factory for creating [`NotificationChannel`] instances from JSON
/// configuration.
///
/// Each plugin is registered in the [`ChannelRegistry`] by its `name()`.
pub trait ChannelPlugin: Send + Sync {
    /// Returns the plugin type name (e.g., `"telegram"`).
    fn name(&self) -> &str;

    /// Validates a JSON config blob against this plugin's expected schema.
    fn validate_config(&self, config: &Value) -> Result<()>;

    /// Creates a configured channel instance from a validated JSON config.
    fn create_channel(
        &self,
        instance_id: &str,
        config: &Value,
        options: &DeliveryOptions,
    ) -> Result<Box<dyn NotificationChannel>>;

    /// Returns a copy of `config` safe to show to operators.
    fn redact_config(&self, config: &Value) -> Value {
        redact_sensitive_json(config)
    }
}

/// Registry of available [`ChannelPlugin`]s, used to instantiate
/// notification channels from configuration.
///
/// # Examples
///
/// ```
/// use trendwatch_notify::plugin::ChannelRegistry;
///
/// let registry = ChannelRegistry::default();
/// assert!(registry.has_plugin("telegram"));
/// assert!(registry.has_plugin("webhook"));
/// assert!(!registry.has_plugin("nonexistent"));
/// ```
pub struct ChannelRegistry {
    plugins: HashMap<String, Box<dyn ChannelPlugin>>,
    options: DeliveryOptions,
}

impl ChannelRegistry {
    pub fn new(options: DeliveryOptions) -> Self {
        Self {
            plugins: HashMap::new(),
            options,
        }
    }

    /// Registry with the built-in plugins.
    pub fn with_builtin(options: DeliveryOptions) -> Self {
        let mut registry = Self::new(options);
        registry.register(Box::new(crate::channels::telegram::TelegramPlugin));
        registry.register(Box::new(crate::channels::webhook::WebhookPlugin));
        registry
    }

    pub fn register(&mut self, plugin: Box<dyn ChannelPlugin>) {
        let name = plugin.name().to_string();
        self.plugins.insert(name, plugin);
    }

    pub fn create_channel(
        &self,
        type_name: &str,
        instance_id: &str,
        config: &Value,
    ) -> Result<Box<dyn NotificationChannel>> {
        let plugin = self.plugin(type_name)?;
        plugin.validate_config(config)?;
        plugin.create_channel(instance_id, config, &self.options)
    }

    pub fn validate(&self, type_name: &str, config: &Value) -> Result<()> {
        self.plugin(type_name)?.validate_config(config)
    }

    pub fn redact(&self, type_name: &str, config: &Value) -> Value {
        match self.plugins.get(type_name) {
            Some(plugin) => plugin.redact_config(config),
            None => redact_sensitive_json(config),
        }
    }

    pub fn has_plugin(&self, type_name: &str) -> bool {
        self.plugins.contains_key(type_name)
    }

    pub fn plugin_names(&self) -> Vec<&str> {
        self.plugins.keys().map(|s| s.as_str()).collect()
    }

    fn plugin(&self, type_name: &str) -> Result<&dyn ChannelPlugin> {
        self.plugins
            .get(type_name)
            .map(|p| p.as_ref())
            .ok_or_else(|| NotifyError::UnknownChannelType(type_name.to_string()))
    }
}

impl Default for ChannelRegistry {
    fn default() -> Self {
        Self::with_builtin(DeliveryOptions::default())
    }
}
