//! Services layer - Business logic
//!
//! Services own the domain rules: who may see or change what, limits, and
//! the coordination between repositories, the feed cache and the LLM.
//! Each service reports failures through its own error enum, which the API
//! layer maps onto HTTP responses.

pub mod admin;
pub mod curriculum;
pub mod engagement;
pub mod feed;
pub mod jwt;
pub mod learning;
pub mod llm;
pub mod password;
pub mod rate_limiter;
pub mod social;
pub mod stats;
pub mod taxonomy;
pub mod user;

pub use admin::{AdminService, AdminServiceError};
pub use curriculum::{CurriculumService, CurriculumServiceError};
pub use engagement::{EngagementService, EngagementServiceError};
pub use feed::{FeedService, FeedServiceError};
pub use jwt::{Claims, TokenError, TokenService};
pub use learning::{LearningService, LearningServiceError};
pub use llm::{LlmClient, LlmError, OpenAiClient};
pub use password::{hash_password, verify_password};
pub use rate_limiter::LoginRateLimiter;
pub use social::{SocialService, SocialServiceError};
pub use stats::{StatsService, StatsServiceError};
pub use taxonomy::{TaxonomyService, TaxonomyServiceError};
pub use user::{UserService, UserServiceError};
