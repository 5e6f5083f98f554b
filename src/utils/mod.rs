mod numbers;
mod plurals;

pub use numbers::format_count;
pub use plurals::pluralize;
