// Adapters layer: concrete implementations of the domain ports.

pub mod camera;
pub mod location;
pub mod predictor;
pub mod sqlite;
pub mod storage;

pub use location::LocationStore;
pub use predictor::HttpPredictor;
pub use sqlite::SqliteReportRepository;
pub use storage::LocalStorage;
