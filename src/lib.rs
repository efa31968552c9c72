//! devicelink: device authorization polling coordinator.
//!
//! Links a client to an external account through a backend that proxies an
//! OAuth2-style device flow. The client asks the backend to start the flow,
//! polls until a device code is issued, shows the code to the user, then
//! polls until the backend reports a token or a flow error, all under two
//! deadlines.
//!
//! # Quick Start
//!
//! ```no_run
//! use devicelink::prelude::*;
//!
//! # async fn example() -> devicelink::error::Result<()> {
//! let coordinator = Coordinator::from_config(&LinkConfig::from_env()?)?;
//! match coordinator.start().await {
//!     StartOutcome::Started => {
//!         let view = coordinator.wait_until_settled().await;
//!         println!("{}", view.summary());
//!     }
//!     other => println!("{other:?}"),
//! }
//! # Ok(())
//! # }
//! ```

pub mod auth;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod prelude;

#[cfg(feature = "cli")]
pub mod cli;
