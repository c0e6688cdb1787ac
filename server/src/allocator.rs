//! Short-code allocation.
//!
//! The allocator either honours a caller-supplied alias or draws random codes
//! from a 62-symbol alphabet until the registry reports one as free. It never
//! reserves anything: the caller inserts the link right after allocation and
//! the store's UNIQUE constraint settles any race.

use async_trait::async_trait;
use rand::Rng;

use crate::error::{Error, Result};

/// Symbols a generated code is drawn from.
pub const ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789";

pub const DEFAULT_CODE_LENGTH: usize = 6;

pub const DEFAULT_MAX_ATTEMPTS: u32 = 10;

/// Longest alias a caller may choose.
pub const MAX_ALIAS_LENGTH: usize = 64;

/// Path segments routed to something other than a redirect.
const RESERVED_ALIASES: &[&str] = &["api", "health"];

/// Membership check over every stored code, active or inactive.
#[async_trait]
pub trait CodeRegistry: Send + Sync {
    async fn code_exists(&self, short_code: &str) -> Result<bool>;
}

/// Produces candidate codes. Implementations don't touch storage.
pub trait CodeSource: Send + Sync {
    fn next_code(&self) -> String;
}

/// Uniformly random codes of a fixed length over [`ALPHABET`].
#[derive(Debug, Clone)]
pub struct RandomCode {
    length: usize,
}

impl RandomCode {
    pub fn new(length: usize) -> Self {
        Self { length }
    }
}

impl Default for RandomCode {
    fn default() -> Self {
        Self::new(DEFAULT_CODE_LENGTH)
    }
}

impl CodeSource for RandomCode {
    fn next_code(&self) -> String {
        let mut rng = rand::thread_rng();
        (0..self.length)
            .map(|_| ALPHABET[rng.gen_range(0..ALPHABET.len())] as char)
            .collect()
    }
}

#[derive(Debug, Clone)]
pub struct CodeAllocator<S = RandomCode> {
    source: S,
    max_attempts: u32,
}

impl CodeAllocator<RandomCode> {
    pub fn random(length: usize, max_attempts: u32) -> Self {
        Self::new(RandomCode::new(length), max_attempts)
    }
}

impl<S: CodeSource> CodeAllocator<S> {
    pub fn new(source: S, max_attempts: u32) -> Self {
        Self {
            source,
            max_attempts: max_attempts.max(1),
        }
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Return `alias` if nobody holds it yet, otherwise a freshly generated
    /// code that the registry does not know about.
    ///
    /// Fails with [`Error::AliasConflict`] for a taken alias and with
    /// [`Error::AllocationExhausted`] when every draw collided.
    pub async fn allocate<R>(&self, registry: &R, alias: Option<&str>) -> Result<String>
    where
        R: CodeRegistry + ?Sized,
    {
        match alias {
            Some(alias) => {
                if registry.code_exists(alias).await? {
                    return Err(Error::AliasConflict(alias.to_owned()));
                }
                Ok(alias.to_owned())
            }
            None => self.generate(registry).await,
        }
    }

    async fn generate<R>(&self, registry: &R) -> Result<String>
    where
        R: CodeRegistry + ?Sized,
    {
        for attempt in 1..=self.max_attempts {
            let candidate = self.source.next_code();
            if is_reserved(&candidate) {
                tracing::debug!("Short code '{}' is reserved (attempt {})", candidate, attempt);
                continue;
            }
            if !registry.code_exists(&candidate).await? {
                return Ok(candidate);
            }
            tracing::debug!("Short code '{}' taken (attempt {})", candidate, attempt);
        }

        Err(Error::AllocationExhausted(self.max_attempts))
    }
}

fn is_reserved(code: &str) -> bool {
    RESERVED_ALIASES
        .iter()
        .any(|reserved| code.eq_ignore_ascii_case(reserved))
}

/// Trim a caller-supplied alias and check its shape.
///
/// Returns `Ok(None)` for a missing or blank alias so the caller falls back to
/// a generated code.
pub fn normalize_alias(alias: Option<&str>) -> Result<Option<String>> {
    let alias = match alias.map(str::trim).filter(|s| !s.is_empty()) {
        Some(a) => a,
        None => return Ok(None),
    };

    if alias.len() > MAX_ALIAS_LENGTH {
        return Err(Error::InvalidInput(format!(
            "Custom alias must be at most {MAX_ALIAS_LENGTH} characters"
        )));
    }

    if !alias
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    {
        return Err(Error::InvalidInput(
            "Custom alias may only contain letters, numbers, hyphens, and underscores".into(),
        ));
    }

    if is_reserved(alias) {
        return Err(Error::InvalidInput(format!("Custom alias '{alias}' is reserved")));
    }

    Ok(Some(alias.to_owned()))
}
