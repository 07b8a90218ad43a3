use std::sync::Arc;

use roster_auth::PreferenceOptions;
use roster_core::RosterApp;

use crate::cookies::PreferenceCookie;

/// Where routine resolution outcomes send the browser.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedirectRoutes {
    pub sign_in: String,
    pub onboarding: String,
}

#[derive(Clone)]
pub struct RosterAxumState {
    pub app: RosterApp,
    pub preference: Arc<PreferenceCookie>,
    pub routes: Arc<RedirectRoutes>,
}

impl RosterAxumState {
    pub fn new(app: RosterApp, preference: PreferenceCookie, routes: RedirectRoutes) -> Self {
        Self {
            app,
            preference: Arc::new(preference),
            routes: Arc::new(routes),
        }
    }

    /// Build cookie and redirect settings from the app's configuration.
    pub fn from_app(app: RosterApp) -> anyhow::Result<Self> {
        let config = app.config_snapshot();
        let preference = PreferenceCookie::from_options(&PreferenceOptions::from_config(&config))?;
        let routes = RedirectRoutes {
            sign_in: config.sign_in_route(),
            onboarding: config.onboarding_route(),
        };
        Ok(Self::new(app, preference, routes))
    }
}
