pub mod board;
pub mod comments;
pub mod gateway;
pub mod integrity;
pub mod listing;
pub mod subscription;
pub mod users;

pub use board::TokenBoard;
pub use comments::CommentService;
pub use gateway::PersistenceGateway;
pub use integrity::IntegrityEngine;
pub use listing::{ListingPage, ListingQuery, SortOrder};
pub use subscription::{CommentSubscription, TokenListSubscription, VoteCountSubscription};
pub use users::{Eligibility, UserService};
