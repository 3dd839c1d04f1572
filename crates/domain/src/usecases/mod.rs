//! Application use cases / business logic

pub mod feed;
pub mod gamification;
pub mod media;
pub mod optimistic;
pub mod reconcile;
pub mod search;
pub mod translate;

pub use feed::{Feed, FeedConfig, FeedError, FeedSnapshot, LikeState, LoadSource, Posted};
pub use gamification::{ProfileSummary, XpAward, XpLedger, XpSource};
pub use media::MediaService;
pub use optimistic::{TxOutcome, TxState, Versioned};
pub use reconcile::{Reconciler, ReconcilerConfig, ReconcilerHandle};
pub use search::{filter_questions, timeframe_start};
pub use translate::{TranslationCache, TranslationService, user_language};
