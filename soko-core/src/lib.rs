pub mod chat;
pub mod identity;
pub mod payment;
pub mod phone;

pub use identity::{Role, User};
pub use payment::{PaymentGateway, PushOutcome, StkAck};
pub use phone::Msisdn;
