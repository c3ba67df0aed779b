//! Domain layer: the basket ledger, payment and order types, and the ports
//! through which the checkout talks to remote collaborators.

pub mod basket;
pub mod money;
pub mod order;
pub mod payment;
pub mod ports;
pub mod promo;
