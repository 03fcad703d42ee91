//! Config page: edit the control-API endpoint, persist it and repoint the client.

use std::sync::{Arc, Mutex};

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

use ht_base::api::ControlApi;
use ht_base::lifecycle::Page;
use ht_base::queue::Mutation;
use ht_base::sync::PageContext;

use super::PageId;
use crate::app::actions::Action;
use crate::config::{ApiConfig, ConfigManager};
use crate::state::{StatusMessage, UiState};

/// Something that talks to the control API and can be pointed elsewhere.
pub trait EndpointTarget: Send + Sync {
    fn repoint(&self, base_url: &str, secret: &str) -> Result<(), String>;
}

impl EndpointTarget for ht_api::HttpClient {
    fn repoint(&self, base_url: &str, secret: &str) -> Result<(), String> {
        self.update_endpoint(base_url, secret).map_err(|e| e.to_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SettingsField {
    #[default]
    BaseUrl,
    Secret,
}

#[derive(Debug, Clone, Default)]
pub struct SettingsView {
    pub base_url: String,
    pub secret: String,
    pub field: SettingsField,
    pub testing: bool,
    pub message: Option<StatusMessage>,
}

impl SettingsView {
    fn from_config(api: &ApiConfig) -> Self {
        Self { base_url: api.base_url.clone(), secret: api.secret.clone(), ..Self::default() }
    }

    pub fn active_field_mut(&mut self) -> &mut String {
        match self.field {
            SettingsField::BaseUrl => &mut self.base_url,
            SettingsField::Secret => &mut self.secret,
        }
    }
}

#[derive(Clone)]
pub struct SettingsPage {
    api: Arc<dyn ControlApi>,
    endpoint: Arc<dyn EndpointTarget>,
    config: Arc<Mutex<ConfigManager>>,
}

impl SettingsPage {
    pub fn new(api: Arc<dyn ControlApi>, endpoint: Arc<dyn EndpointTarget>, config: Arc<Mutex<ConfigManager>>) -> Self {
        Self { api, endpoint, config }
    }

    fn saved(&self) -> ApiConfig {
        self.config.lock().unwrap_or_else(|e| e.into_inner()).get().api.clone()
    }

    /// Back up, validate, persist and apply a new endpoint.
    /// A rejected endpoint leaves the previous file and client untouched.
    pub fn save(&self, state: &mut UiState, base_url: &str, secret: &str) {
        let result = {
            let mut manager = self.config.lock().unwrap_or_else(|e| e.into_inner());
            save_endpoint(&mut manager, base_url, secret)
        };
        let result = result.and_then(|api| self.endpoint.repoint(&api.base_url, &api.secret).map(|_| api));
        state.settings.message = Some(match result {
            Ok(api) => {
                log::info!("control API endpoint set to {}", api.base_url);
                state.settings.base_url = api.base_url;
                StatusMessage::info("Settings saved")
            }
            Err(e) => {
                log::warn!("settings: save failed: {}", e);
                StatusMessage::error(e)
            }
        });
    }

    pub fn reset(&self, state: &mut UiState) {
        let result = {
            let mut manager = self.config.lock().unwrap_or_else(|e| e.into_inner());
            manager.reset().map(|_| manager.get().api.clone())
        };
        let result = result.and_then(|api| self.endpoint.repoint(&api.base_url, &api.secret).map(|_| api));
        match result {
            Ok(api) => {
                state.settings = SettingsView::from_config(&api);
                state.settings.message = Some(StatusMessage::info("Settings reset to defaults"));
            }
            Err(e) => {
                log::warn!("settings: reset failed: {}", e);
                state.settings.message = Some(StatusMessage::error(e));
            }
        }
    }

    /// Health check against the current client, in the background.
    pub fn test_connection(&self, ctx: &PageContext<UiState>) -> bool {
        let api = Arc::clone(&self.api);
        ctx.submit(|state| {
            state.settings.testing = true;
            state.settings.message = Some(StatusMessage::info("Testing connection..."));
            Ok(())
        });
        ctx.spawn("test", move |ctx| {
            let message = match api.health_check().and_then(|_| api.get_version()) {
                Ok(version) => StatusMessage::info(format!("Connected: {}", version.version)),
                Err(e) => StatusMessage::error(format!("Connection failed: {}", e)),
            };
            ctx.submit(move |state| {
                state.settings.testing = false;
                state.settings.message = Some(message);
                Ok(())
            });
        })
    }
}

/// Persist a new endpoint, rolling back to the backup if anything fails.
fn save_endpoint(manager: &mut ConfigManager, base_url: &str, secret: &str) -> Result<ApiConfig, String> {
    manager.backup()?;
    let attempt = manager.set_endpoint(base_url, secret).and_then(|_| manager.validate());
    if let Err(e) = attempt {
        if let Err(restore) = manager.restore() {
            log::warn!("settings: restore after failed save: {}", restore);
        }
        return Err(e);
    }
    Ok(manager.get().api.clone())
}

impl Page<UiState> for SettingsPage {
    fn id(&self) -> &'static str {
        PageId::Config.id()
    }

    fn start(&self, _ctx: &PageContext<UiState>) {}

    fn activated_view(&self) -> Option<Mutation<UiState>> {
        let api = self.saved();
        Some(Box::new(move |state: &mut UiState| {
            state.settings = SettingsView::from_config(&api);
            Ok(())
        }))
    }

    fn on_deactivated(&self, state: &mut UiState) {
        state.settings = SettingsView::default();
    }
}

pub fn handle_key(key: &KeyEvent, _state: &UiState) -> Option<Action> {
    let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
    let alt = key.modifiers.contains(KeyModifiers::ALT);
    if ctrl {
        return match key.code {
            KeyCode::Char('s') => Some(Action::SaveSettings),
            KeyCode::Char('r') => Some(Action::ResetSettings),
            KeyCode::Char('t') => Some(Action::TestConnection),
            _ => None,
        };
    }
    match key.code {
        KeyCode::Enter => Some(Action::SaveSettings),
        KeyCode::Tab | KeyCode::BackTab | KeyCode::Up | KeyCode::Down => Some(Action::SettingsNextField),
        KeyCode::Backspace => Some(Action::SettingsBackspace),
        KeyCode::Char(c) if !alt => Some(Action::SettingsInput(c)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DEFAULT_BASE_URL;
    use crate::pages::test_support::Harness;
    use ht_base::api::ApiError;

    #[test]
    fn activation_loads_the_saved_endpoint() {
        let mut h = Harness::new();
        h.config.lock().unwrap().set_endpoint("http://10.0.0.2:9097", "s3cret").unwrap();
        h.registry.activate(PageId::Config.id());
        h.pump();
        assert_eq!(h.state.settings.base_url, "http://10.0.0.2:9097");
        assert_eq!(h.state.settings.secret, "s3cret");
    }

    #[test]
    fn save_persists_and_repoints() {
        let mut h = Harness::new();
        h.pages.settings.save(&mut h.state, " http://10.0.0.3:9090 ", "tok");

        assert!(h.state.settings.message.as_ref().is_some_and(|m| !m.is_error));
        assert_eq!(h.config.lock().unwrap().get().api.base_url, "http://10.0.0.3:9090");
        let calls = h.endpoint.calls.lock().unwrap().clone();
        assert_eq!(calls, vec![("http://10.0.0.3:9090".to_string(), "tok".to_string())]);
    }

    #[test]
    fn invalid_url_rolls_back() {
        let mut h = Harness::new();
        h.pages.settings.save(&mut h.state, "not a url", "tok");

        assert!(h.state.settings.message.as_ref().is_some_and(|m| m.is_error));
        assert_eq!(h.config.lock().unwrap().get().api.base_url, DEFAULT_BASE_URL);
        assert!(h.endpoint.calls.lock().unwrap().is_empty());
    }

    #[test]
    fn reset_restores_defaults() {
        let mut h = Harness::new();
        h.pages.settings.save(&mut h.state, "http://10.0.0.3:9090", "tok");
        h.pages.settings.reset(&mut h.state);

        assert_eq!(h.state.settings.base_url, DEFAULT_BASE_URL);
        assert_eq!(h.state.settings.secret, "");
        assert_eq!(h.config.lock().unwrap().get().api.secret, "");
        assert_eq!(h.endpoint.calls.lock().unwrap().len(), 2);
    }

    #[test]
    fn test_connection_reports_the_version() {
        let mut h = Harness::new();
        h.registry.activate(PageId::Config.id());
        let ctx = h.context(PageId::Config);
        h.pages.settings.test_connection(&ctx);

        assert!(h.pump_until(|s| !s.settings.testing && s.settings.message.is_some()));
        assert_eq!(h.state.settings.message.as_ref().map(|m| m.text.as_str()), Some("Connected: v1.18.0"));
        h.shutdown();
    }

    #[test]
    fn test_connection_failure_is_an_error_message() {
        let mut h = Harness::new();
        h.api.fail("health_check", ApiError::Network("refused".into()));
        h.registry.activate(PageId::Config.id());
        let ctx = h.context(PageId::Config);
        h.pages.settings.test_connection(&ctx);

        assert!(h.pump_until(|s| s.settings.message.as_ref().is_some_and(|m| m.is_error)));
        h.shutdown();
    }
}
