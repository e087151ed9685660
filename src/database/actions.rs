pub mod favorites;
pub mod ingredients;
pub mod recipes;
pub mod sessions;
pub mod shopping_cart;
pub mod subscriptions;
pub mod tags;
pub mod users;

#[cfg(test)]
pub(crate) mod fixtures;
