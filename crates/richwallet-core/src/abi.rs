//! Contract ABIs fetched at runtime and bound to a contract address.

use ethers::abi::{Abi, Function, Token};

use crate::error::CoreError;
use crate::types::Address;

/// A parsed JSON ABI, optionally bound to the contract it describes.
#[derive(Debug, Clone)]
pub struct ContractAbi {
    abi: Abi,
    address: Option<Address>,
}

impl ContractAbi {
    pub fn from_json(abi: &str, address: Option<Address>) -> Result<Self, CoreError> {
        let abi: Abi = serde_json::from_str(abi)
            .map_err(|e| CoreError::Abi(format!("invalid contract ABI: {e}")))?;
        Ok(Self { abi, address })
    }

    pub fn address(&self) -> Option<&Address> {
        self.address.as_ref()
    }

    /// Encode a call to `method`, picking the overload whose inputs accept
    /// `args`.
    pub fn encode_call(&self, method: &str, args: &[Token]) -> Result<Vec<u8>, CoreError> {
        let function = self.function_for(method, args)?;
        function.encode_input(args).map_err(|e| {
            CoreError::Abi(format!("encode {}: {e}", function.signature()))
        })
    }

    fn function_for(&self, method: &str, args: &[Token]) -> Result<&Function, CoreError> {
        let overloads = self
            .abi
            .functions_by_name(method)
            .map_err(|_| CoreError::Abi(format!("method `{method}` not found in ABI")))?;

        overloads
            .iter()
            .find(|f| {
                let kinds: Vec<_> = f.inputs.iter().map(|p| p.kind.clone()).collect();
                Token::types_check(args, &kinds)
            })
            .ok_or_else(|| {
                let available: Vec<String> = overloads.iter().map(Function::signature).collect();
                CoreError::Abi(format!(
                    "no overload of `{method}` takes {} argument(s) of the given types; ABI has {}",
                    args.len(),
                    available.join(", ")
                ))
            })
    }
}
