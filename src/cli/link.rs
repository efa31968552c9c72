//! Handlers for `devicelink link` and `devicelink status`.

use crate::auth::{AuthBackend, HttpBackend, StartResponse};
use crate::coordinator::{Coordinator, Phase, StartOutcome};
use crate::error::Result;

use super::ConfigArgs;

/// Run one flow to completion. Returns whether the account ended up linked.
pub async fn handle_link(args: &ConfigArgs) -> Result<bool> {
    let config = args.resolve()?;
    let coordinator = Coordinator::from_config(&config)?;

    match coordinator.start().await {
        StartOutcome::AlreadyAuthorized => {
            println!("Already linked.");
            return Ok(true);
        }
        StartOutcome::Failed { reason } => {
            eprintln!("Could not start authorization: {reason}");
            return Ok(false);
        }
        StartOutcome::Superseded => return Ok(false),
        StartOutcome::Started => {}
    }

    println!("Requesting a device code...");
    let mut views = coordinator.watch_view();
    let mut announced = false;
    loop {
        let view = views.borrow_and_update().clone();
        if !announced && view.phase == Phase::AwaitingToken {
            if let Some(code) = &view.device_code {
                println!("Visit: {}", code.verification_url);
                println!("Enter code: {}", code.code);
                println!("The code expires in {}s. Waiting for authorization...", code.expires_in_secs);
                announced = true;
            }
        }
        if view.is_settled() {
            if view.authorized {
                println!("Linked.");
            } else {
                eprintln!("{}", view.summary());
            }
            return Ok(view.authorized);
        }
        if views.changed().await.is_err() {
            return Ok(false);
        }
    }
}

/// Print the resolved configuration and ask the backend whether it is linked.
///
/// A backend that is not yet linked answers by starting a flow, which is left
/// to expire on its own.
pub async fn handle_status(args: &ConfigArgs) -> Result<bool> {
    let config = args.resolve()?;
    println!("base_url: {}", config.base_url);
    println!(
        "polling: device code every {}s (give up after {}s), token every {}s",
        config.timing.device_code_interval_secs,
        config.timing.device_code_ceiling_secs,
        config.timing.token_interval_secs
    );

    let backend = HttpBackend::new(&config)?;
    match backend.start_authorization().await? {
        StartResponse::AlreadyAuthorized => {
            println!("status: linked");
            Ok(true)
        }
        StartResponse::FlowStarted => {
            println!("status: not linked");
            Ok(false)
        }
    }
}
