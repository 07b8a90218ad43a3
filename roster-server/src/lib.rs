mod app;
mod config;

use anyhow::Result;
use futures::FutureExt;
use roster_axum::{axum, RosterAxumApp};
use roster_core::{listener, InvalidationPattern, RosterApp};

pub async fn build() -> Result<RosterAxumApp> {
    let cfg = config::config();
    let snapshot = cfg.snapshot();

    let identity = app::identity_provider(&snapshot)?;
    let memberships = app::membership_store(&snapshot).await?;

    let roster = RosterApp::new(identity, memberships);
    roster.configure(|c| *c = cfg);

    roster.on(
        InvalidationPattern::any(),
        listener(|inv| {
            tracing::debug!(tag = %inv.tag(), "invalidated");
            async { Ok(()) }.boxed()
        }),
    );

    axum(roster)
}
