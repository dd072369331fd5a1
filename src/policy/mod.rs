//! Page classification and the migration policy.

mod scanner;
mod tier;

pub use self::scanner::Scanner;
pub use self::tier::{Tier, Transition};
