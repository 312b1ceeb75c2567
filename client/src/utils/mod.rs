//! # Utilities Module
//!
//! Helpers shared by the configuration layer.
//!
//! The [`env`] module provides validated access to environment variables:
//!
//! ```no_run
//! use tablekit::utils::EnvUtils;
//!
//! if EnvUtils::has_non_empty_var("TABLEKIT_ENDPOINT") {
//!     let endpoint = EnvUtils::get_validated_var("TABLEKIT_ENDPOINT")?;
//!     println!("Using endpoint {endpoint}");
//! }
//! # Ok::<(), tablekit::utils::EnvVarError>(())
//! ```

pub mod env;

pub use env::{EnvUtils, EnvVarError};
