use serde::{Deserialize, Serialize};

/// A custodial wallet owned by exactly one user
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Wallet {
    pub id: i64,
    pub user_id: i64,
    pub address: String,
    /// Cached native gas balance, in whole native units
    pub native_gas_balance: f64,
    /// Credited stable-token balance, truncated to 6 decimals
    pub stable_token_balance: f64,
    pub withdraw_address: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl Wallet {
    /// Checks the address looks like a 20-byte hex account before it is sent to the ledger.
    pub fn validate_address(&self) -> Result<(), String> {
        let addr = self.address.trim();
        if addr.is_empty() {
            return Err(format!("wallet {} has no address", self.id));
        }
        let hex_part = addr
            .strip_prefix("0x")
            .or_else(|| addr.strip_prefix("0X"))
            .ok_or_else(|| format!("wallet {} address '{}' is missing 0x prefix", self.id, addr))?;
        if hex_part.len() != 40 || !hex_part.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(format!("wallet {} address '{}' is malformed", self.id, addr));
        }
        Ok(())
    }

    pub fn is_recipient(&self, to: &str) -> bool {
        self.address.trim().eq_ignore_ascii_case(to.trim())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wallet(address: &str) -> Wallet {
        Wallet {
            id: 7,
            user_id: 1,
            address: address.to_string(),
            native_gas_balance: 0.0,
            stable_token_balance: 0.0,
            withdraw_address: None,
            created_at: String::new(),
            updated_at: String::new(),
        }
    }

    #[test]
    fn test_validate_address() {
        assert!(wallet("0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266").validate_address().is_ok());
        assert!(wallet("").validate_address().is_err());
        assert!(wallet("f39fd6e51aad88f6f4ce6ab8827279cfffb92266").validate_address().is_err());
        assert!(wallet("0x1234").validate_address().is_err());
        assert!(wallet("0xzz9fd6e51aad88f6f4ce6ab8827279cfffb92266").validate_address().is_err());
    }

    #[test]
    fn test_recipient_match_ignores_case() {
        let w = wallet("0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266");
        assert!(w.is_recipient("0xF39FD6E51AAD88F6F4CE6AB8827279CFFFB92266"));
        assert!(!w.is_recipient("0x70997970c51812dc3a010c7d01b50e0d17dc79c8"));
    }
}
