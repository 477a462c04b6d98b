use std::sync::Arc;

use auth_gateway::authenticator::Authenticator;
use auth_gateway::config::GatewayConfig;
use auth_gateway::static_authn::StaticAuthenticator;
use auth_gateway::{build_router, AppState, SERVICE_NAME};
use common_config::load;
use common_obs::ObsInit;
use tokio::net::TcpListener;

const VERSION: &str = env!("CARGO_PKG_VERSION");

fn build_sha() -> &'static str {
    option_env!("BUILD_SHA").unwrap_or("unknown")
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    ObsInit::init(SERVICE_NAME)?;

    let config = load::<GatewayConfig>()?;
    let addr = config.socket_addr()?;
    let auth = &config.authentication;
    tracing::info!(
        event = "service_start",
        service = SERVICE_NAME,
        version = VERSION,
        build_sha = build_sha(),
        listen_addr = %addr,
        inherit_host_client_identity = auth.inherit_host_client_identity,
        send_www_authenticate = auth.send_www_authenticate_response_header,
        default_scheme = auth.default_authentication_scheme.as_str(),
        set_no_redirect_marker = auth.set_no_redirect_marker,
        credentials = config.credentials.len(),
        "starting service"
    );

    let authenticator: Arc<dyn Authenticator> = Arc::new(StaticAuthenticator::from_config(&config));
    let state = Arc::new(AppState::new(&config, authenticator)?);
    let router = build_router(state);

    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, router).await?;

    tracing::info!(event = "service_stop", service = SERVICE_NAME);

    Ok(())
}
