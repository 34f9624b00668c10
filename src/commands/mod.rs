//! Command handlers behind the CLI.

use anyhow::Result;
use log::debug;

use crate::{
    lifecycle::{Action, notify::Notifier},
    runtime::Runtime,
    setup::{SetupOptions, run_setup},
};

mod list;
mod notifications;
mod services;
pub mod settings;

pub use list::list;
pub use notifications::notifications;
pub use services::Services;

/// Run one lifecycle action and print its message.
#[tracing::instrument(skip(services))]
pub async fn act<R: Runtime + 'static>(
    services: &Services<R>,
    identity: &str,
    action: Action,
) -> Result<()> {
    let outcome = services.manager.act(identity, action).await?;
    println!("{}", outcome.message);
    Ok(())
}

/// Queue the core update, then wait for the worker and report how it went.
#[tracing::instrument(skip(services))]
pub async fn update_core<R: Runtime + 'static>(services: &mut Services<R>) -> Result<()> {
    let core = services.config.core_identity();
    act(services, &core, Action::UpdateCore).await?;

    services.shutdown().await?;
    if let Some(last) = services.notifier.list()?.last() {
        debug!("Latest notification: {:?}", last);
        println!("{}", last.message);
    }
    Ok(())
}

#[tracing::instrument(skip(services))]
pub async fn setup<R: Runtime + 'static>(
    services: &Services<R>,
    options: SetupOptions,
) -> Result<()> {
    let report = run_setup(
        services.runtime.as_ref(),
        &services.config,
        services.settings.as_ref(),
        &services.manager,
        options,
    )
    .await?;

    println!("{} is set up.", report.settings.app_name());
    for identity in &report.installed {
        println!("  installed {}", identity);
    }
    Ok(())
}
