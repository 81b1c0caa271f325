//! Edge Promo application shell: promotion sources, the compiler service with
//! parallel company compilation, the usage ledger, configuration and logging.

pub mod config;
pub mod logging;
pub mod service;
pub mod source;
pub mod usage;
