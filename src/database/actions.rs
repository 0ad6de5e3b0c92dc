pub mod forbidden_words;
pub mod ingredients;
pub mod lists;
pub mod recipes;
pub mod subscriptions;
pub mod tags;
pub mod users;

#[cfg(test)]
pub mod fixtures;

pub use forbidden_words::*;
pub use ingredients::*;
pub use lists::*;
pub use recipes::*;
pub use subscriptions::*;
pub use tags::*;
pub use users::*;
