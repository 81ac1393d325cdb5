mod money;

pub mod op;

pub use money::{Money, MoneyConversionError, MARKET_CURRENCY_CODE, MARKET_CURRENCY_CODE_LOWER};
