pub mod token;

pub use token::{
    is_token_program_account, unpack_mint, unpack_token_balance, AccountData,
    MintInfo, TokenBalance,
};
