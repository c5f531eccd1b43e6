pub mod health;
pub mod purchases;
pub mod tasks;
pub mod wallets;
