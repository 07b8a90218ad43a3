use axum::handler::Handler;
use axum::routing::get;
use axum::Router;
use roster_core::RosterApp;
use tokio::net::{TcpListener, ToSocketAddrs};
use tower::ServiceBuilder;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::trace::TraceLayer;

use crate::routes::context_router;
use crate::RosterAxumState;

#[derive(Clone)]
pub struct RosterAxumApp {
    pub app: RosterApp,
    pub router: Router<()>,
}

impl RosterAxumApp {
    /// Mount the context and tenancy routes.
    pub fn new(state: RosterAxumState) -> Self {
        let app = state.app.clone();
        Self {
            app,
            router: context_router(state),
        }
    }

    /// Nest extra routes, e.g. tenant-scoped data handlers.
    pub fn use_router(mut self, path: &str, router: Router<()>) -> Self {
        self.router = self.router.nest(path, router);
        self
    }

    pub fn use_get<H, T>(self, path: &str, handler: H) -> Self
    where
        H: Handler<T, ()> + Clone + Send + 'static,
        T: 'static,
    {
        let router = Router::new().route("/", get(handler));
        self.use_router(path, router)
    }

    /// The finished router: every route gets an `x-request-id` and a trace span.
    pub fn into_router(self) -> Router<()> {
        self.router.layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
                .layer(TraceLayer::new_for_http())
                .layer(PropagateRequestIdLayer::x_request_id()),
        )
    }

    pub async fn listen<A>(self, addr: A) -> anyhow::Result<()>
    where
        A: ToSocketAddrs,
    {
        let listener = TcpListener::bind(addr).await?;
        tracing::info!(addr = ?listener.local_addr()?, "listening");
        axum::serve(listener, self.into_router()).await?;
        Ok(())
    }
}

/// Build the HTTP app, reading cookie and redirect settings from `app`'s config.
pub fn axum(app: RosterApp) -> anyhow::Result<RosterAxumApp> {
    Ok(RosterAxumApp::new(RosterAxumState::from_app(app)?))
}
