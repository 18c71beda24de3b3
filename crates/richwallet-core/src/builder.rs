//! Call data for token transfers, chosen by the token's contract type.

use ethers::abi::Token;

use crate::abi::ContractAbi;
use crate::error::CoreError;
use crate::types::{Address, ContractType, U256};

/// Encode a transfer of `amount` to `to` against `contract`.
///
/// ERC20 and FansCoin tokens share `transfer(address,uint256)`; ERC777
/// tokens use `send(address,uint256,bytes)` with empty operator data.
/// Any other contract type is rejected.
pub fn transfer_call_data(
    contract_type: ContractType,
    contract: &ContractAbi,
    to: &Address,
    amount: U256,
) -> Result<Vec<u8>, CoreError> {
    let (method, args) = match contract_type {
        ContractType::Erc20 | ContractType::FansCoin => {
            ("transfer", vec![Token::Address(*to), Token::Uint(amount)])
        }
        ContractType::Erc777 => (
            "send",
            vec![
                Token::Address(*to),
                Token::Uint(amount),
                Token::Bytes(Vec::new()),
            ],
        ),
        other => return Err(CoreError::UnsupportedContractType(other.to_string())),
    };

    contract.encode_call(method, &args).map_err(|e| {
        let target = contract
            .address()
            .map(|a| format!(" of {a:?}"))
            .unwrap_or_default();
        e.context(format!(
            "get data of contract{target} method {method}, params {{to: {to:?}, amount: {amount}}}"
        ))
    })
}
