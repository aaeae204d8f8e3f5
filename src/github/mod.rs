mod client;
pub mod pagination;
mod queries;

pub use client::GithubClient;
pub use queries::{MembersQuery, RepositoriesQuery};
