// Public modules
pub mod backend;
pub mod card;
pub mod classifier;
pub mod config;
pub mod export;
pub mod gateway;
pub mod highlighter;
pub mod io;
pub mod markup;
pub mod models;
pub mod pipeline;
pub mod publisher;
pub mod store;

// Re-export commonly used types
pub use backend::{BackendClient, NewsSource};
pub use card::{CardDraft, CardSummarizer, CardSummary};
pub use classifier::{classify, Classification};
pub use config::Config;
pub use export::{DigestFormatter, DocumentBuilder, NewsletterFormatter};
pub use gateway::{ChatCompletionsGateway, ChatGateway, Completion, GatewayError};
pub use highlighter::highlight;
pub use io::{load_draft, save_draft};
pub use models::{Article, RawNewsItem, ReviewStatus, StatusFilter, Tier};
pub use pipeline::{DateSelection, IngestEvent, IngestReport, Ingestor};
pub use publisher::DocsPublisher;
pub use store::{ArchiveReport, ReviewStore, StoreError};
