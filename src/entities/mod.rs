//! Entity module - Contains all SeaORM entity definitions for the ledger store.
//! These entities represent the database tables and their relationships.
//! Each entity has a Model struct for data and an Entity struct for operations.

pub mod commission;
pub mod commission_rate;
pub mod exchange_rate;
pub mod pack;
pub mod sea_orm_active_enums;
pub mod user;
pub mod user_pack;
pub mod wallet;
pub mod wallet_system;
pub mod wallet_system_transaction;
pub mod wallet_transaction;
pub mod withdrawal_request;

// Re-export specific types to avoid conflicts
pub use commission::{Column as CommissionColumn, Entity as Commission, Model as CommissionModel};
pub use commission_rate::{
    Column as CommissionRateColumn, Entity as CommissionRate, Model as CommissionRateModel,
};
pub use exchange_rate::{
    Column as ExchangeRateColumn, Entity as ExchangeRate, Model as ExchangeRateModel,
};
pub use pack::{Column as PackColumn, Entity as Pack, Model as PackModel};
pub use user::{Column as UserColumn, Entity as User, Model as UserModel};
pub use user_pack::{Column as UserPackColumn, Entity as UserPack, Model as UserPackModel};
pub use wallet::{Column as WalletColumn, Entity as Wallet, Model as WalletModel};
pub use wallet_system::{
    Column as WalletSystemColumn, Entity as WalletSystem, Model as WalletSystemModel,
};
pub use wallet_system_transaction::{
    Column as WalletSystemTransactionColumn, Entity as WalletSystemTransaction,
    Model as WalletSystemTransactionModel,
};
pub use wallet_transaction::{
    Column as WalletTransactionColumn, Entity as WalletTransaction,
    Model as WalletTransactionModel,
};
pub use withdrawal_request::{
    Column as WithdrawalRequestColumn, Entity as WithdrawalRequest,
    Model as WithdrawalRequestModel,
};
