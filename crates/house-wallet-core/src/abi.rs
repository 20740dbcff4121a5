use alloy::primitives::{Address, Bytes, U256};
use alloy::sol;
use alloy::sol_types::SolCall;

use crate::ports::PortError;

// Subset of https://github.com/OpenZeppelin/openzeppelin-contracts/blob/master/contracts/token/ERC20/IERC20.sol
sol! {
    interface IERC20 {
        function balanceOf(address account) external view returns (uint256);
        function transfer(address to, uint256 amount) external returns (bool);
    }
}

pub const BALANCE_OF_SELECTOR: [u8; 4] = IERC20::balanceOfCall::SELECTOR;
pub const TRANSFER_SELECTOR: [u8; 4] = IERC20::transferCall::SELECTOR;

pub fn balance_of_calldata(account: Address) -> Bytes {
    Bytes::from(IERC20::balanceOfCall { account }.abi_encode())
}

pub fn transfer_calldata(to: Address, amount: U256) -> Bytes {
    Bytes::from(IERC20::transferCall { to, amount }.abi_encode())
}

/// Decode a single `uint256` return word.
pub fn decode_uint256(data: &[u8]) -> Result<U256, PortError> {
    if data.len() < 32 {
        return Err(PortError::Validation(format!(
            "uint256 return must be 32 bytes, got {}",
            data.len()
        )));
    }
    Ok(U256::from_be_slice(&data[..32]))
}
