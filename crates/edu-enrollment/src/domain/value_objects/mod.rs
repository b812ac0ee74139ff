//! Value Objects module
//!
//! Immutable, validated domain primitives.

pub mod cpf;
pub mod email;
pub mod money;
pub mod payment;
pub mod phone;

pub use cpf::{is_valid_cpf, Cpf, CpfError};
pub use email::{Email, EmailError};
pub use money::{Cents, MoneyError};
pub use payment::{IdempotencyKey, Installments, InstallmentsError, Payer, PaymentMethod};
pub use phone::{Phone, PhoneError};
