pub mod identity;
pub mod page;
pub mod residence;
pub mod validate;

/// Boxed error type used by repository traits, mirroring the storage layer's
/// "any backend error" contract.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

pub type RepoResult<T> = Result<T, BoxError>;
