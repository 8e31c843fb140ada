mod errors;
mod memory;
mod traits;

pub use errors::StorageError;
pub use memory::InMemoryStore;
pub use traits::{ChallengeStore, CredentialStore, UserStore};
