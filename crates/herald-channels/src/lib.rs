//! # Herald Channels
//! Delivery strategies and their transports.
//!
//! - `email`: lettre SMTP relay + EMAIL strategy
//! - `rest`: reqwest HTTP exchange + REST strategy

pub mod email;
pub mod rest;

use std::sync::Arc;

use herald_core::config::HeraldConfig;
use herald_core::error::Result;
use herald_core::traits::Deliverer;

pub use email::{EmailDeliverer, SmtpMailer};
pub use rest::{ReqwestExchange, RestDeliverer};

/// Build the default strategy set (EMAIL over SMTP, REST over reqwest).
pub fn default_deliverers(config: &HeraldConfig) -> Result<Vec<Arc<dyn Deliverer>>> {
    let mailer = Arc::new(SmtpMailer::new(&config.mail)?);
    let exchange = Arc::new(ReqwestExchange::new(&config.rest)?);
    Ok(vec![
        Arc::new(EmailDeliverer::from_config(mailer, &config.mail)),
        Arc::new(RestDeliverer::new(exchange)),
    ])
}
